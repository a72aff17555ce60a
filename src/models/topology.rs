use serde::{Deserialize, Serialize};

use crate::error::TopologyError;

/// Largest K whose core switches still fit the two-digit device id fields
pub const MAX_K: u32 = 98;

/// Role of a switch in the fat tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchRole {
    Edge,
    Aggregation,
    Core,
}

impl SwitchRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchRole::Edge => "edge",
            SwitchRole::Aggregation => "aggregation",
            SwitchRole::Core => "core",
        }
    }

    /// Tier height above the hosts (hosts are tier 0)
    pub fn tier(&self) -> u8 {
        match self {
            SwitchRole::Edge => 1,
            SwitchRole::Aggregation => 2,
            SwitchRole::Core => 3,
        }
    }

    /// Leading letter of switch and bridge names
    pub fn name_prefix(&self) -> char {
        match self {
            SwitchRole::Edge => 'e',
            SwitchRole::Aggregation => 'a',
            SwitchRole::Core => 'c',
        }
    }
}

impl std::fmt::Display for SwitchRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge or aggregation switch, identified by pod and index within the pod.
/// Only a [`FatTree`] can mint one, so the coordinates are always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct PodSwitch {
    pod: u8,
    index: u8,
    role: SwitchRole,
}

impl PodSwitch {
    pub fn pod(&self) -> u8 {
        self.pod
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn role(&self) -> SwitchRole {
        self.role
    }
}

/// Core switch at (row, col) of the (K/2)x(K/2) core grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CoreSwitch {
    row: u8,
    col: u8,
}

impl CoreSwitch {
    pub fn row(&self) -> u8 {
        self.row
    }

    pub fn col(&self) -> u8 {
        self.col
    }
}

/// Any switch of the fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Switch {
    Pod(PodSwitch),
    Core(CoreSwitch),
}

impl From<PodSwitch> for Switch {
    fn from(s: PodSwitch) -> Self {
        Switch::Pod(s)
    }
}

impl From<CoreSwitch> for Switch {
    fn from(s: CoreSwitch) -> Self {
        Switch::Core(s)
    }
}

/// A k-ary fat tree: K pods of K/2 edge and K/2 aggregation switches, plus (K/2)^2 cores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FatTree {
    k: u8,
}

impl FatTree {
    pub fn new(k: u32) -> Result<Self, TopologyError> {
        if k < 2 || k % 2 != 0 {
            return Err(TopologyError::InvalidK(k));
        }
        if k > MAX_K {
            return Err(TopologyError::KTooLarge { k, max: MAX_K });
        }
        Ok(Self { k: k as u8 })
    }

    pub fn k(&self) -> u8 {
        self.k
    }

    /// K/2: edge switches per pod, aggregation switches per pod, hosts per edge switch
    pub fn half(&self) -> u8 {
        self.k / 2
    }

    pub fn pod_count(&self) -> u8 {
        self.k
    }

    pub fn core_count(&self) -> usize {
        let half = self.half() as usize;
        half * half
    }

    pub fn host_count(&self) -> usize {
        let k = self.k as usize;
        k * k * k / 4
    }

    pub fn switch_count(&self) -> usize {
        let k = self.k as usize;
        k * k + self.core_count()
    }

    /// Edge below K/2, aggregation from K/2 up
    pub fn role_of(&self, index: u8) -> SwitchRole {
        if index < self.half() {
            SwitchRole::Edge
        } else {
            SwitchRole::Aggregation
        }
    }

    #[cfg(test)]
    pub fn pod_switch(&self, pod: u8, index: u8) -> Option<PodSwitch> {
        (pod < self.k && index < self.k).then(|| self.mint_pod_switch(pod, index))
    }

    #[cfg(test)]
    pub fn core_switch(&self, row: u8, col: u8) -> Option<CoreSwitch> {
        let half = self.half();
        (row < half && col < half).then_some(CoreSwitch { row, col })
    }

    /// Pod switches, pod-major, index-minor
    pub fn pod_switches(&self) -> impl Iterator<Item = PodSwitch> + '_ {
        (0..self.k).flat_map(move |pod| (0..self.k).map(move |index| self.mint_pod_switch(pod, index)))
    }

    /// Core switches in row-major order
    pub fn core_switches(&self) -> impl Iterator<Item = CoreSwitch> {
        let half = self.half();
        (0..half).flat_map(move |row| (0..half).map(move |col| CoreSwitch { row, col }))
    }

    /// Every switch: pod switches first, then the core
    pub fn switches(&self) -> impl Iterator<Item = Switch> + '_ {
        self.pod_switches()
            .map(Switch::from)
            .chain(self.core_switches().map(Switch::from))
    }

    fn mint_pod_switch(&self, pod: u8, index: u8) -> PodSwitch {
        PodSwitch { pod, index, role: self.role_of(index) }
    }
}
