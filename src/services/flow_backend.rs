use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use super::AppId;
use crate::models::ForwardingRule;

/// Primary flow-programming backend for PREFIX-tier rules
#[async_trait]
pub trait FlowProgrammer: Send + Sync {
    /// Install one permanent forwarding rule owned by `app`
    async fn install_forwarding_rule(&self, rule: &ForwardingRule, app: &AppId) -> Result<()>;

    /// Remove every rule owned by `app`
    async fn remove_all_rules(&self, app: &AppId) -> Result<()>;

    /// Rules currently held for `app`
    async fn rules_for_app(&self, app: &AppId) -> Result<Vec<ForwardingRule>>;
}

/// Flow table kept in process memory. Reinstalling a rule with the same
/// device, match and priority overwrites it, like a switch flow table does.
#[derive(Debug, Default)]
pub struct InMemoryFlowTable {
    flows: RwLock<HashMap<AppId, Vec<ForwardingRule>>>,
}

impl InMemoryFlowTable {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlowProgrammer for InMemoryFlowTable {
    async fn install_forwarding_rule(&self, rule: &ForwardingRule, app: &AppId) -> Result<()> {
        let mut flows = self.flows.write().await;
        let table = flows.entry(app.clone()).or_default();
        match table
            .iter_mut()
            .find(|f| f.device == rule.device && f.dst == rule.dst && f.priority == rule.priority)
        {
            Some(existing) => *existing = rule.clone(),
            None => table.push(rule.clone()),
        }
        Ok(())
    }

    async fn remove_all_rules(&self, app: &AppId) -> Result<()> {
        let removed = self.flows.write().await.remove(app).map(|t| t.len()).unwrap_or(0);
        tracing::info!("Removed {} flows for {}", removed, app);
        Ok(())
    }

    async fn rules_for_app(&self, app: &AppId) -> Result<Vec<ForwardingRule>> {
        Ok(self
            .flows
            .read()
            .await
            .get(app)
            .cloned()
            .unwrap_or_default())
    }
}
