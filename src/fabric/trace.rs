use std::collections::HashMap;
use std::net::Ipv4Addr;

use serde::Serialize;

use super::wiring::{Endpoint, Wiring};
use crate::error::TraceError;
use crate::models::{DeviceId, PlannedRule, SwitchRole};
use crate::planner::SwitchPlan;

/// Valid paths cross at most 5 switches; 16 leaves room before a loop is declared
const HOP_LIMIT: usize = 16;

/// Rules of every device, as the switches would hold them
#[derive(Debug, Clone, Default)]
pub struct FlowTables {
    tables: HashMap<DeviceId, Vec<PlannedRule>>,
}

impl FlowTables {
    pub fn from_plans(plans: &[SwitchPlan]) -> Self {
        let mut tables: HashMap<DeviceId, Vec<PlannedRule>> = HashMap::new();
        for plan in plans {
            tables.entry(plan.device).or_default().extend(plan.rules.iter().cloned());
        }
        Self { tables }
    }

    /// Highest priority match wins, longest match breaks ties
    pub fn lookup(&self, device: DeviceId, dst: Ipv4Addr) -> Option<&PlannedRule> {
        self.tables
            .get(&device)?
            .iter()
            .filter(|r| r.matches(dst))
            .max_by_key(|r| (r.priority(), r.specificity()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub device: DeviceId,
    pub role: SwitchRole,
    pub out_port: u32,
}

/// Switches a packet crossed from source host to destination host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Path {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub hops: Vec<Hop>,
}

impl Path {
    /// Climbs, then descends, never climbs again
    pub fn is_up_down(&self) -> bool {
        let mut descending = false;
        for pair in self.hops.windows(2) {
            let (from, to) = (pair[0].role.tier(), pair[1].role.tier());
            if to > from {
                if descending {
                    return false;
                }
            } else if to < from {
                descending = true;
            } else {
                return false;
            }
        }
        true
    }

    pub fn describe(&self) -> String {
        let hops: Vec<String> = self
            .hops
            .iter()
            .map(|h| format!("{}:{}", h.device, h.out_port))
            .collect();
        format!("{} -> [{}] -> {}", self.src, hops.join(", "), self.dst)
    }
}

/// Outcome of a full all-pairs check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifySummary {
    pub pairs: usize,
    pub longest_path: usize,
    /// Paths seen per switch count (1, 3 or 5 in a healthy fabric)
    pub by_length: HashMap<usize, usize>,
}

/// Replays planned rules over the wiring model
pub struct PathVerifier<'a> {
    wiring: &'a Wiring,
    tables: FlowTables,
}

impl<'a> PathVerifier<'a> {
    pub fn new(wiring: &'a Wiring, plans: &[SwitchPlan]) -> Self {
        Self { wiring, tables: FlowTables::from_plans(plans) }
    }

    pub fn trace(&self, src: Ipv4Addr, dst: Ipv4Addr) -> Result<Path, TraceError> {
        let start = self.wiring.host(src).ok_or(TraceError::UnknownHost(src))?;
        if self.wiring.host(dst).is_none() {
            return Err(TraceError::UnknownHost(dst));
        }

        let mut device = start.edge;
        let mut hops = Vec::new();
        loop {
            if hops.len() >= HOP_LIMIT {
                return Err(TraceError::HopLimit { dst, limit: HOP_LIMIT });
            }
            let role = self.wiring.role(device).ok_or(TraceError::UnknownSwitch(device))?;
            let rule = self
                .tables
                .lookup(device, dst)
                .ok_or(TraceError::TableMiss { device, dst })?;
            let out_port = rule.output_port();
            hops.push(Hop { device, role, out_port });

            match self.wiring.peer(device, out_port) {
                None => return Err(TraceError::DanglingPort { device, port: out_port }),
                Some(Endpoint::Host { address }) if address == dst => {
                    return Ok(Path { src, dst, hops });
                }
                Some(Endpoint::Host { address }) => {
                    return Err(TraceError::Misdelivered { dst, delivered: address });
                }
                Some(Endpoint::Switch { device: next, .. }) => device = next,
            }
        }
    }

    /// Traces every ordered pair of distinct hosts, stopping at the first failure
    pub fn verify_all_pairs(&self) -> Result<VerifySummary, TraceError> {
        let mut summary = VerifySummary::default();
        for src in self.wiring.hosts() {
            for dst in self.wiring.hosts() {
                if src.address == dst.address {
                    continue;
                }
                let path = self.trace(src.address, dst.address)?;
                if !path.is_up_down() {
                    return Err(TraceError::NotUpDown { dst: dst.address, path: path.describe() });
                }
                summary.pairs += 1;
                summary.longest_path = summary.longest_path.max(path.hops.len());
                *summary.by_length.entry(path.hops.len()).or_default() += 1;
            }
        }
        Ok(summary)
    }
}
