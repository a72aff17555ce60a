use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::addressing;
use crate::models::{DeviceId, FatTree, SwitchRole};

/// What sits on the far side of a switch port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    Host { address: Ipv4Addr },
    Switch { device: DeviceId, port: u32 },
}

/// A host attached to an edge switch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub name: String,
    pub address: Ipv4Addr,
    pub edge: DeviceId,
    pub edge_port: u32,
}

/// Physical cabling of a fat tree, with the port numbers every link lands on.
///
/// Port numbers follow link creation order on each switch: an edge switch
/// has its hosts on ports `1..=K/2` and its aggregation uplinks on
/// `K/2+1..=K`; an aggregation switch has edge links on `1..=K/2` and core
/// links on `K/2+1..=K`; a core switch reaches pod `p` on port `p + 1`.
#[derive(Debug, Clone)]
pub struct Wiring {
    hosts: Vec<Host>,
    host_index: HashMap<Ipv4Addr, usize>,
    ports: HashMap<(DeviceId, u32), Endpoint>,
    roles: HashMap<DeviceId, SwitchRole>,
}

impl Wiring {
    pub fn build(tree: &FatTree) -> Self {
        let mut wiring = Self {
            hosts: Vec::with_capacity(tree.host_count()),
            host_index: HashMap::new(),
            ports: HashMap::new(),
            roles: HashMap::new(),
        };
        let k = tree.k();
        let half = tree.half();

        for switch in tree.pod_switches() {
            let (pod, index) = (switch.pod(), switch.index());
            let device = addressing::pod_switch_device(switch);
            wiring.roles.insert(device, switch.role());

            match switch.role() {
                SwitchRole::Edge => {
                    for m in 0..half {
                        let address = addressing::host_address(pod, index, m);
                        wiring.attach_host(Host {
                            name: format!("h{}{}{}", pod, index, address.octets()[3]),
                            address,
                            edge: device,
                            edge_port: m as u32 + 1,
                        });
                    }
                    for m in 0..half {
                        let agg = addressing::device_id(pod, half + m, 1);
                        wiring.connect(device, (half + m) as u32 + 1, agg, index as u32 + 1);
                    }
                }
                _ => {
                    let column = index - half;
                    for m in 0..half {
                        let core = addressing::device_id(k, column + 1, m + 1);
                        wiring.connect(device, (half + m) as u32 + 1, core, pod as u32 + 1);
                    }
                }
            }
        }
        for core in tree.core_switches() {
            wiring.roles.insert(addressing::core_switch_device(tree, core), SwitchRole::Core);
        }

        wiring
    }

    fn attach_host(&mut self, host: Host) {
        self.ports.insert((host.edge, host.edge_port), Endpoint::Host { address: host.address });
        self.host_index.insert(host.address, self.hosts.len());
        self.hosts.push(host);
    }

    fn connect(&mut self, a: DeviceId, a_port: u32, b: DeviceId, b_port: u32) {
        self.ports.insert((a, a_port), Endpoint::Switch { device: b, port: b_port });
        self.ports.insert((b, b_port), Endpoint::Switch { device: a, port: a_port });
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host(&self, address: Ipv4Addr) -> Option<&Host> {
        self.host_index.get(&address).map(|&i| &self.hosts[i])
    }

    pub fn peer(&self, device: DeviceId, port: u32) -> Option<Endpoint> {
        self.ports.get(&(device, port)).copied()
    }

    pub fn role(&self, device: DeviceId) -> Option<SwitchRole> {
        self.roles.get(&device).copied()
    }

    #[cfg(test)]
    pub(super) fn forget_switch(&mut self, device: DeviceId) {
        self.roles.remove(&device);
    }

    /// Count of cables, host links included
    pub fn link_count(&self) -> usize {
        let switch_ports = self
            .ports
            .values()
            .filter(|e| matches!(e, Endpoint::Switch { .. }))
            .count();
        self.hosts.len() + switch_ports / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k4() -> (FatTree, Wiring) {
        let tree = FatTree::new(4).unwrap();
        let wiring = Wiring::build(&tree);
        (tree, wiring)
    }

    #[test]
    fn test_host_layout() {
        let (tree, wiring) = k4();
        assert_eq!(wiring.hosts().len(), tree.host_count());
        let h = wiring.host(Ipv4Addr::new(10, 2, 1, 3)).unwrap();
        assert_eq!(h.name, "h213");
        assert_eq!(h.edge.to_string(), "of:0000000000020101");
        assert_eq!(h.edge_port, 2);
        assert!(wiring.host(Ipv4Addr::new(10, 2, 2, 3)).is_none());
    }

    #[test]
    fn test_edge_to_aggregation_links() {
        let (_, wiring) = k4();
        // edge (1, 1) port 4 -> aggregation (1, 3) port 2
        let edge = DeviceId::new(1, 1, 1);
        assert_eq!(
            wiring.peer(edge, 4),
            Some(Endpoint::Switch { device: DeviceId::new(1, 3, 1), port: 2 })
        );
        assert_eq!(
            wiring.peer(DeviceId::new(1, 3, 1), 2),
            Some(Endpoint::Switch { device: edge, port: 4 })
        );
    }

    #[test]
    fn test_aggregation_to_core_links() {
        let (_, wiring) = k4();
        // aggregation (3, 2) is column 0 of the core grid, port 4 -> core (0, 1)
        assert_eq!(
            wiring.peer(DeviceId::new(3, 2, 1), 4),
            Some(Endpoint::Switch { device: DeviceId::new(4, 1, 2), port: 4 })
        );
        for pod in 0..4u8 {
            let peer = wiring.peer(DeviceId::new(4, 2, 1), pod as u32 + 1);
            assert_eq!(peer, Some(Endpoint::Switch { device: DeviceId::new(pod, 3, 1), port: 3 }));
        }
    }

    #[test]
    fn test_link_count_and_roles() {
        let (tree, wiring) = k4();
        // hosts + edge-agg + agg-core
        assert_eq!(wiring.link_count(), 16 + 16 + 16);
        assert_eq!(wiring.role(DeviceId::new(0, 3, 1)), Some(SwitchRole::Aggregation));
        assert_eq!(wiring.role(DeviceId::new(4, 2, 2)), Some(SwitchRole::Core));
        assert_eq!(wiring.role(DeviceId::new(9, 9, 9)), None);
        // every switch has all K ports cabled
        assert_eq!(wiring.ports.len(), tree.switch_count() * 4);
    }
}
