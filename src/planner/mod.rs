//! Derives the full static rule set of every switch in the fat tree.
//!
//! Pod switches get K/2 downlink PREFIX rules (one per host or edge subnet)
//! followed by K/2 uplink SUFFIX rules that spread traffic over the
//! core-facing ports by destination last octet. Core switches get one PREFIX
//! rule per pod.

use serde::Serialize;

use crate::addressing;
use crate::models::*;

/// Priorities and timeouts applied to planned rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulePolicy {
    pub prefix_priority: u16,
    pub suffix_priority: u16,
    pub suffix_idle_timeout_secs: u32,
}

impl Default for RulePolicy {
    fn default() -> Self {
        Self {
            prefix_priority: DEFAULT_PRIORITY_PREFIX,
            suffix_priority: DEFAULT_PRIORITY_SUFFIX,
            suffix_idle_timeout_secs: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

/// Ordered rules for one switch: downlinks first, then uplinks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitchPlan {
    pub switch: Switch,
    pub device: DeviceId,
    pub rules: Vec<PlannedRule>,
}

impl SwitchPlan {
    pub fn prefix_rules(&self) -> impl Iterator<Item = &ForwardingRule> {
        self.rules.iter().filter_map(|r| match r {
            PlannedRule::Prefix(rule) => Some(rule),
            PlannedRule::Suffix(_) => None,
        })
    }

    pub fn suffix_rules(&self) -> impl Iterator<Item = &SuffixRule> {
        self.rules.iter().filter_map(|r| match r {
            PlannedRule::Suffix(rule) => Some(rule),
            PlannedRule::Prefix(_) => None,
        })
    }
}

/// Pure planner over a fixed topology
#[derive(Debug, Clone)]
pub struct RulePlanner {
    tree: FatTree,
    policy: RulePolicy,
}

impl RulePlanner {
    pub fn new(tree: FatTree, policy: RulePolicy) -> Self {
        Self { tree, policy }
    }

    pub fn tree(&self) -> &FatTree {
        &self.tree
    }

    pub fn plan_switch(&self, switch: Switch) -> SwitchPlan {
        match switch {
            Switch::Pod(s) => self.plan_pod_switch(s),
            Switch::Core(s) => self.plan_core_switch(s),
        }
    }

    pub fn plan_pod_switch(&self, switch: PodSwitch) -> SwitchPlan {
        let k = self.tree.k();
        let half = self.tree.half();
        let (pod, index, role) = (switch.pod(), switch.index(), switch.role());
        let device = addressing::pod_switch_device(switch);
        let bridge = BridgeName::for_switch(role, device);

        let mut rules = Vec::with_capacity(k as usize);
        for port in 0..half {
            let dst = match role {
                SwitchRole::Edge => addressing::edge_host_prefix(pod, index, port),
                _ => addressing::pod_subnet_prefix(pod, port),
            };
            rules.push(PlannedRule::Prefix(ForwardingRule::new(
                device,
                dst,
                port as u32 + 1,
                self.policy.prefix_priority,
            )));
        }
        for idx in 0..half {
            rules.push(PlannedRule::Suffix(SuffixRule {
                device,
                bridge: bridge.clone(),
                suffix: SuffixMatch::new(addressing::uplink_suffix(idx)),
                output_port: addressing::uplink_port(index, idx, k),
                priority: self.policy.suffix_priority,
                idle_timeout_secs: self.policy.suffix_idle_timeout_secs,
            }));
        }

        SwitchPlan { switch: switch.into(), device, rules }
    }

    pub fn plan_core_switch(&self, switch: CoreSwitch) -> SwitchPlan {
        let device = addressing::core_switch_device(&self.tree, switch);
        let rules = (0..self.tree.pod_count())
            .map(|pod| {
                PlannedRule::Prefix(ForwardingRule::new(
                    device,
                    addressing::pod_wide_prefix(pod),
                    pod as u32 + 1,
                    self.policy.prefix_priority,
                ))
            })
            .collect();
        SwitchPlan { switch: switch.into(), device, rules }
    }

    /// Plans for every switch: pods in order, then the core row-major
    pub fn plan_all(&self) -> Vec<SwitchPlan> {
        self.tree.switches().map(|s| self.plan_switch(s)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn planner(k: u32) -> RulePlanner {
        RulePlanner::new(FatTree::new(k).unwrap(), RulePolicy::default())
    }

    fn prefix_summary(plan: &SwitchPlan) -> Vec<(String, u32)> {
        plan.prefix_rules().map(|r| (r.dst.to_string(), r.output_port)).collect()
    }

    #[test]
    fn test_edge_switch_k4() {
        let p = planner(4);
        let plan = p.plan_pod_switch(p.tree().pod_switch(0, 0).unwrap());
        assert_eq!(plan.device.to_string(), "of:0000000000000001");
        assert_eq!(
            prefix_summary(&plan),
            vec![("10.0.0.2/32".to_string(), 1), ("10.0.0.3/32".to_string(), 2)]
        );
        let suffixes: Vec<_> = plan
            .suffix_rules()
            .map(|r| (r.bridge.to_string(), r.suffix.last_octet(), r.output_port))
            .collect();
        assert_eq!(
            suffixes,
            vec![("e000001".to_string(), 2, 3), ("e000001".to_string(), 3, 4)]
        );
        assert!(plan.prefix_rules().all(|r| r.priority == 100 && r.permanent));
        assert!(plan.suffix_rules().all(|r| r.priority == 10 && r.idle_timeout_secs == 0));
    }

    #[test]
    fn test_aggregation_switch_k4() {
        let p = planner(4);
        let plan = p.plan_pod_switch(p.tree().pod_switch(0, 2).unwrap());
        assert_eq!(
            prefix_summary(&plan),
            vec![("10.0.0.0/24".to_string(), 1), ("10.0.1.0/24".to_string(), 2)]
        );
        let bridges: HashSet<_> = plan.suffix_rules().map(|r| r.bridge.to_string()).collect();
        assert_eq!(bridges, HashSet::from(["a000201".to_string()]));
        let ports: Vec<_> = plan.suffix_rules().map(|r| r.output_port).collect();
        assert_eq!(ports, vec![3, 4]);
    }

    #[test]
    fn test_core_switch_k4() {
        let p = planner(4);
        let plan = p.plan_core_switch(p.tree().core_switch(0, 0).unwrap());
        assert_eq!(plan.device.to_string(), "of:0000000000040101");
        assert_eq!(
            prefix_summary(&plan),
            vec![
                ("10.0.0.0/16".to_string(), 1),
                ("10.1.0.0/16".to_string(), 2),
                ("10.2.0.0/16".to_string(), 3),
                ("10.3.0.0/16".to_string(), 4),
            ]
        );
        assert_eq!(plan.suffix_rules().count(), 0);
    }

    #[test]
    fn test_pod_switch_rule_shape() {
        for k in (2..=16).step_by(2) {
            let p = planner(k);
            let half = p.tree().half() as u32;
            for s in p.tree().pod_switches() {
                let plan = p.plan_pod_switch(s);
                assert_eq!(plan.rules.len(), k as usize);

                // downlinks strictly before uplinks
                let tiers: Vec<_> = plan.rules.iter().map(|r| r.tier()).collect();
                assert!(tiers[..half as usize].iter().all(|t| *t == RuleTier::Prefix));
                assert!(tiers[half as usize..].iter().all(|t| *t == RuleTier::Suffix));

                let down: Vec<u32> = plan.prefix_rules().map(|r| r.output_port).collect();
                assert_eq!(down, (1..=half).collect::<Vec<_>>());

                let up: HashSet<u32> = plan.suffix_rules().map(|r| r.output_port).collect();
                assert_eq!(up, (half + 1..=k).collect::<HashSet<_>>());
            }
        }
    }

    #[test]
    fn test_core_switch_rule_shape() {
        for k in (2..=16).step_by(2) {
            let p = planner(k);
            for c in p.tree().core_switches() {
                let plan = p.plan_core_switch(c);
                assert_eq!(plan.rules.len(), k as usize);
                for (pod, rule) in plan.prefix_rules().enumerate() {
                    assert_eq!(rule.dst.to_string(), format!("10.{}.0.0/16", pod));
                    assert_eq!(rule.output_port as usize, pod + 1);
                }
            }
        }
    }

    #[test]
    fn test_one_rule_per_destination() {
        let p = planner(8);
        for plan in p.plan_all() {
            let mut seen = HashSet::new();
            for rule in &plan.rules {
                let device = match rule {
                    PlannedRule::Prefix(r) => r.device,
                    PlannedRule::Suffix(r) => r.device,
                };
                assert_eq!(device, plan.device);
                assert!(seen.insert((rule.tier(), rule.match_text())), "duplicate match on {}", plan.device);
            }
        }
    }

    #[test]
    fn test_k2_uses_same_formulas() {
        let p = planner(2);
        let plans = p.plan_all();
        assert_eq!(plans.len(), 5);
        let edge = &plans[0];
        assert_eq!(prefix_summary(edge), vec![("10.0.0.2/32".to_string(), 1)]);
        assert_eq!(edge.suffix_rules().map(|r| r.output_port).collect::<Vec<_>>(), vec![2]);
        let core = plans.last().unwrap();
        assert_eq!(core.device.to_string(), "of:0000000000020101");
    }

    #[test]
    fn test_planning_is_deterministic() {
        let p = planner(6);
        let first = serde_json::to_string(&p.plan_all()).unwrap();
        let second = serde_json::to_string(&p.plan_all()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_policy_is_applied() {
        let policy = RulePolicy {
            prefix_priority: 500,
            suffix_priority: 50,
            suffix_idle_timeout_secs: 3000,
        };
        let p = RulePlanner::new(FatTree::new(4).unwrap(), policy);
        let plan = p.plan_switch(p.tree().pod_switch(2, 3).unwrap().into());
        assert!(plan.prefix_rules().all(|r| r.priority == 500));
        assert!(plan.suffix_rules().all(|r| r.priority == 50 && r.idle_timeout_secs == 3000));
    }
}
