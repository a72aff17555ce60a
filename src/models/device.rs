use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use super::SwitchRole;

const DEVICE_URI_PREFIX: &str = "of:";
/// Leading zero digits of the 16-digit datapath id
const DPID_PAD: &str = "0000000000";

/// OpenFlow device identifier built from three two-digit decimal fields.
///
/// Pod switches use `(pod, index, 1)`, core switches `(K, row + 1, col + 1)`.
/// Text form is `of:0000000000PPAABB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DeviceId {
    pod: u8,
    a: u8,
    b: u8,
}

impl DeviceId {
    /// Fields must each be below 100
    pub fn new(pod: u8, a: u8, b: u8) -> Self {
        debug_assert!(pod < 100 && a < 100 && b < 100, "device id fields are two digits");
        Self { pod, a, b }
    }

    /// The six decimal digits at the end of the dpid
    pub fn suffix(&self) -> String {
        format!("{:02}{:02}{:02}", self.pod, self.a, self.b)
    }

    /// 16-digit datapath id as configured on the switch
    pub fn dpid(&self) -> String {
        format!("{}{}", DPID_PAD, self.suffix())
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", DEVICE_URI_PREFIX, self.dpid())
    }
}

impl FromStr for DeviceId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let re = device_uri_pattern().ok_or_else(|| anyhow::anyhow!("device id pattern failed to compile"))?;
        let caps = re
            .captures(s)
            .ok_or_else(|| anyhow::anyhow!("Invalid device id: {}", s))?;
        let field = |i: usize| -> anyhow::Result<u8> {
            Ok(caps[i].parse::<u8>()?)
        };
        Ok(Self::new(field(1)?, field(2)?, field(3)?))
    }
}

fn device_uri_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^of:0000000000(\d{2})(\d{2})(\d{2})$").ok())
        .as_ref()
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for DeviceId {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Name of an Open vSwitch bridge reachable through the control channel:
/// role letter followed by the device id suffix, e.g. `e000001`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BridgeName(String);

impl BridgeName {
    pub fn for_switch(role: SwitchRole, device: DeviceId) -> Self {
        Self(format!("{}{}", role.name_prefix(), device.suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BridgeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_text() {
        let id = DeviceId::new(0, 2, 1);
        assert_eq!(id.to_string(), "of:0000000000000201");
        assert_eq!(id.dpid(), "0000000000000201");
        assert_eq!(id.suffix(), "000201");
        assert_eq!(DeviceId::new(4, 1, 2).to_string(), "of:0000000000040102");
    }

    #[test]
    fn test_device_id_parse() {
        let id: DeviceId = "of:0000000000031201".parse().unwrap();
        assert_eq!(id, DeviceId::new(3, 12, 1));
        assert!("of:00000000000312".parse::<DeviceId>().is_err());
        assert!("of:1000000000031201".parse::<DeviceId>().is_err());
        assert!("0000000000031201".parse::<DeviceId>().is_err());
        // compiled once, shared by every parse
        assert!(std::ptr::eq(device_uri_pattern().unwrap(), device_uri_pattern().unwrap()));
    }

    #[test]
    fn test_device_id_serde_as_string() {
        let id = DeviceId::new(1, 3, 1);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"of:0000000000010301\"");
        let back: DeviceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_bridge_names() {
        let id = DeviceId::new(0, 0, 1);
        assert_eq!(BridgeName::for_switch(SwitchRole::Edge, id).as_str(), "e000001");
        assert_eq!(BridgeName::for_switch(SwitchRole::Aggregation, DeviceId::new(2, 3, 1)).as_str(), "a020301");
        assert_eq!(BridgeName::for_switch(SwitchRole::Core, DeviceId::new(4, 2, 1)).to_string(), "c040201");
    }
}
