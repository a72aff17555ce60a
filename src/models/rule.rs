use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use super::{AddressPrefix, BridgeName, DeviceId, SuffixMatch};

/// EtherType matched by every planned rule
pub const ETH_TYPE_IPV4: u16 = 0x0800;
pub const DEFAULT_PRIORITY_PREFIX: u16 = 100;
pub const DEFAULT_PRIORITY_SUFFIX: u16 = 10;
/// Zero means the suffix rule never expires
pub const DEFAULT_IDLE_TIMEOUT: u32 = 0;

/// Which installation path a rule takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleTier {
    /// Longest-prefix downlink rules, installed through the flow backend
    Prefix,
    /// Last-octet load-spreading uplink rules, installed through the control channel
    Suffix,
}

/// PREFIX-tier rule: IPv4 destination prefix to output port
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForwardingRule {
    pub device: DeviceId,
    pub eth_type: u16,
    pub dst: AddressPrefix,
    pub output_port: u32,
    pub priority: u16,
    pub permanent: bool,
}

impl ForwardingRule {
    pub fn new(device: DeviceId, dst: AddressPrefix, output_port: u32, priority: u16) -> Self {
        Self {
            device,
            eth_type: ETH_TYPE_IPV4,
            dst,
            output_port,
            priority,
            permanent: true,
        }
    }
}

/// SUFFIX-tier rule installed on a named bridge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SuffixRule {
    pub device: DeviceId,
    pub bridge: BridgeName,
    pub suffix: SuffixMatch,
    pub output_port: u32,
    pub priority: u16,
    pub idle_timeout_secs: u32,
}

/// One rule produced by the planner
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum PlannedRule {
    Prefix(ForwardingRule),
    Suffix(SuffixRule),
}

impl PlannedRule {
    pub fn tier(&self) -> RuleTier {
        match self {
            PlannedRule::Prefix(_) => RuleTier::Prefix,
            PlannedRule::Suffix(_) => RuleTier::Suffix,
        }
    }

    pub fn output_port(&self) -> u32 {
        match self {
            PlannedRule::Prefix(r) => r.output_port,
            PlannedRule::Suffix(r) => r.output_port,
        }
    }

    pub fn priority(&self) -> u16 {
        match self {
            PlannedRule::Prefix(r) => r.priority,
            PlannedRule::Suffix(r) => r.priority,
        }
    }

    /// Does an IPv4 packet for `dst` hit this rule
    pub fn matches(&self, dst: Ipv4Addr) -> bool {
        match self {
            PlannedRule::Prefix(r) => r.dst.contains(dst),
            PlannedRule::Suffix(r) => r.suffix.matches(dst),
        }
    }

    /// Number of significant destination bits, used to break priority ties
    pub fn specificity(&self) -> u8 {
        match self {
            PlannedRule::Prefix(r) => r.dst.mask_bits(),
            PlannedRule::Suffix(_) => 8,
        }
    }

    /// Human-readable destination match
    pub fn match_text(&self) -> String {
        match self {
            PlannedRule::Prefix(r) => r.dst.to_string(),
            PlannedRule::Suffix(r) => r.suffix.to_string(),
        }
    }
}
