use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// IPv4 destination prefix. The network is stored with host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AddressPrefix {
    network: Ipv4Addr,
    mask_bits: u8,
}

impl AddressPrefix {
    pub fn new(network: Ipv4Addr, mask_bits: u8) -> Self {
        let mask_bits = mask_bits.min(32);
        let network = Ipv4Addr::from(u32::from(network) & mask_of(mask_bits));
        Self { network, mask_bits }
    }

    pub fn mask_bits(&self) -> u8 {
        self.mask_bits
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask_of(self.mask_bits) == u32::from(self.network)
    }
}

fn mask_of(bits: u8) -> u32 {
    match bits {
        0 => 0,
        b => u32::MAX << (32 - b as u32),
    }
}

impl fmt::Display for AddressPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.mask_bits)
    }
}

impl FromStr for AddressPrefix {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, bits) = s
            .split_once('/')
            .ok_or_else(|| anyhow::anyhow!("Invalid prefix (missing '/'): {}", s))?;
        let network: Ipv4Addr = addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid prefix address {}: {}", addr, e))?;
        let mask_bits: u8 = bits
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid prefix length {}: {}", bits, e))?;
        if mask_bits > 32 {
            return Err(anyhow::anyhow!("Invalid prefix length {}", mask_bits));
        }
        Ok(Self::new(network, mask_bits))
    }
}

impl From<AddressPrefix> for String {
    fn from(p: AddressPrefix) -> Self {
        p.to_string()
    }
}

impl TryFrom<String> for AddressPrefix {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Match on the last octet of the destination address, `0.0.0.N/0.0.0.255`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SuffixMatch {
    last_octet: u8,
}

impl SuffixMatch {
    pub const MASK: Ipv4Addr = Ipv4Addr::new(0, 0, 0, 255);

    pub fn new(last_octet: u8) -> Self {
        Self { last_octet }
    }

    pub fn last_octet(&self) -> u8 {
        self.last_octet
    }

    pub fn address(&self) -> Ipv4Addr {
        Ipv4Addr::new(0, 0, 0, self.last_octet)
    }

    pub fn matches(&self, addr: Ipv4Addr) -> bool {
        addr.octets()[3] == self.last_octet
    }
}

impl fmt::Display for SuffixMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address(), Self::MASK)
    }
}
