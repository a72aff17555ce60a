use serde::{Deserialize, Serialize};

use crate::models::{ForwardingRule, ETH_TYPE_IPV4};

// --- ONOS REST API types ---

pub const CRITERION_ETH_TYPE: &str = "ETH_TYPE";
pub const CRITERION_IPV4_DST: &str = "IPV4_DST";
pub const INSTRUCTION_OUTPUT: &str = "OUTPUT";
/// Flow states that mean the switch is already dropping the entry
const REMOVAL_STATES: [&str; 2] = ["PENDING_REMOVE", "REMOVED"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ethType", default, skip_serializing_if = "Option::is_none")]
    pub eth_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selector {
    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treatment {
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

/// Body of `POST /flowobjectives/{deviceId}/forward`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingObjective {
    pub flag: String,
    pub priority: u16,
    pub timeout: u32,
    pub is_permanent: bool,
    pub operation: String,
    pub app_id: String,
    pub selector: Selector,
    pub treatment: Treatment,
}

impl ForwardingObjective {
    /// VERSATILE objective matching IPv4 destination, output to one port
    pub fn from_rule(rule: &ForwardingRule, app_name: &str) -> Self {
        Self {
            flag: "VERSATILE".to_string(),
            priority: rule.priority,
            timeout: 0,
            is_permanent: rule.permanent,
            operation: "ADD".to_string(),
            app_id: app_name.to_string(),
            selector: Selector {
                criteria: vec![
                    Criterion {
                        kind: CRITERION_ETH_TYPE.to_string(),
                        eth_type: Some(format!("{:#x}", rule.eth_type)),
                        ip: None,
                    },
                    Criterion {
                        kind: CRITERION_IPV4_DST.to_string(),
                        eth_type: None,
                        ip: Some(rule.dst.to_string()),
                    },
                ],
            },
            treatment: Treatment {
                instructions: vec![Instruction {
                    kind: INSTRUCTION_OUTPUT.to_string(),
                    port: Some(rule.output_port.to_string()),
                }],
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnosFlow {
    pub device_id: String,
    pub priority: u16,
    #[serde(default)]
    pub is_permanent: bool,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub selector: Option<Selector>,
    #[serde(default)]
    pub treatment: Option<Treatment>,
}

impl OnosFlow {
    pub fn is_being_removed(&self) -> bool {
        self.state.as_deref().is_some_and(|s| REMOVAL_STATES.contains(&s))
    }

    /// Back to a forwarding rule; flows that are not IPv4-dst to single output are skipped
    pub fn to_rule(&self) -> Option<ForwardingRule> {
        let device = self.device_id.parse().ok()?;
        let dst = self
            .selector
            .as_ref()?
            .criteria
            .iter()
            .find(|c| c.kind == CRITERION_IPV4_DST)?
            .ip
            .as_deref()?
            .parse()
            .ok()?;
        let port = self
            .treatment
            .as_ref()?
            .instructions
            .iter()
            .find(|i| i.kind == INSTRUCTION_OUTPUT)?
            .port
            .as_deref()?
            .parse()
            .ok()?;
        let mut rule = ForwardingRule::new(device, dst, port, self.priority);
        rule.eth_type = ETH_TYPE_IPV4;
        rule.permanent = self.is_permanent;
        Some(rule)
    }
}

#[derive(Debug, Deserialize)]
pub struct FlowsResponse {
    #[serde(default)]
    pub flows: Vec<OnosFlow>,
}
