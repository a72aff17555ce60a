//! Closed-form addressing for the fat tree.
//!
//! Hosts live in `10.<pod>.<edge>.<2 + offset>`. Aggregation switches route
//! per edge subnet (`/24`), core switches per pod (`/16`). Inputs are assumed
//! to come from [`FatTree`](crate::models::FatTree), which bounds them.

use std::net::Ipv4Addr;

use crate::models::{AddressPrefix, CoreSwitch, DeviceId, FatTree, PodSwitch};

/// First octet of every fabric address
const FABRIC_NET: u8 = 10;
/// Host addresses start at .2 on every edge subnet
const HOST_OFFSET_BASE: u8 = 2;

pub fn device_id(pod: u8, a: u8, b: u8) -> DeviceId {
    DeviceId::new(pod, a, b)
}

/// Pod switches all carry a trailing field of 1
pub fn pod_switch_device(switch: PodSwitch) -> DeviceId {
    device_id(switch.pod(), switch.index(), 1)
}

/// Core switches borrow pod field K, which no real pod ever uses
pub fn core_switch_device(tree: &FatTree, switch: CoreSwitch) -> DeviceId {
    device_id(tree.k(), switch.row() + 1, switch.col() + 1)
}

pub fn host_address(pod: u8, edge: u8, host_offset: u8) -> Ipv4Addr {
    Ipv4Addr::new(FABRIC_NET, pod, edge, HOST_OFFSET_BASE + host_offset)
}

/// `/32` for one host behind an edge switch
pub fn edge_host_prefix(pod: u8, edge: u8, host_offset: u8) -> AddressPrefix {
    AddressPrefix::new(host_address(pod, edge, host_offset), 32)
}

/// `/24` for one edge switch's subnet
pub fn pod_subnet_prefix(pod: u8, edge: u8) -> AddressPrefix {
    AddressPrefix::new(Ipv4Addr::new(FABRIC_NET, pod, edge, 0), 24)
}

/// `/16` for an entire pod
pub fn pod_wide_prefix(pod: u8) -> AddressPrefix {
    AddressPrefix::new(Ipv4Addr::new(FABRIC_NET, pod, 0, 0), 16)
}

/// Last octet matched by the `idx`-th uplink rule
pub fn uplink_suffix(idx: u8) -> u8 {
    HOST_OFFSET_BASE + idx
}

/// Output port of the `idx`-th uplink rule on a switch.
///
/// Rotating by the switch index makes every switch of a pod prefer a
/// different core-facing port for the same destination suffix.
pub fn uplink_port(switch_index: u8, idx: u8, k: u8) -> u32 {
    let half = (k / 2) as u32;
    (switch_index as u32 + idx as u32) % half + half + 1
}
