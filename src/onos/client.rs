use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::types::*;
use crate::models::ForwardingRule;
use crate::services::{AppId, FlowProgrammer};

/// ONOS northbound REST client
pub struct OnosClient {
    base_url: String,
    user: String,
    password: String,
    client: Client,
}

impl OnosClient {
    pub fn new(url: String, user: String, password: String, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            user,
            password,
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/onos/v1{}", self.base_url, path)
    }

    /// Test connectivity to ONOS
    pub async fn test_connection(&self) -> bool {
        match self
            .client
            .get(self.api_url("/devices"))
            .basic_auth(&self.user, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl FlowProgrammer for OnosClient {
    async fn install_forwarding_rule(&self, rule: &ForwardingRule, app: &AppId) -> Result<()> {
        let body = ForwardingObjective::from_rule(rule, &app.name);
        let resp = self
            .client
            .post(self.api_url(&format!("/flowobjectives/{}/forward", rule.device)))
            .basic_auth(&self.user, Some(&self.password))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("ONOS API error {}: {}", status, body));
        }
        Ok(())
    }

    async fn remove_all_rules(&self, app: &AppId) -> Result<()> {
        let resp = self
            .client
            .delete(self.api_url(&format!("/flows/application/{}", app.name)))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("ONOS API delete error {}: {}", status, body));
        }
        tracing::info!("Removed ONOS flows for {}", app);
        Ok(())
    }

    async fn rules_for_app(&self, app: &AppId) -> Result<Vec<ForwardingRule>> {
        let resp = self
            .client
            .get(self.api_url(&format!("/flows/application/{}", app.name)))
            .basic_auth(&self.user, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("ONOS API error {}: {}", status, body));
        }

        let flows: FlowsResponse = resp.json().await?;
        Ok(flows
            .flows
            .iter()
            .filter(|f| !f.is_being_removed())
            .filter_map(OnosFlow::to_rule)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_trims_slash() {
        let client = OnosClient::new(
            "http://127.0.0.1:8181/".to_string(),
            "onos".to_string(),
            "rocks".to_string(),
            5,
        )
        .unwrap();
        assert_eq!(client.api_url("/devices"), "http://127.0.0.1:8181/onos/v1/devices");
    }

    #[tokio::test]
    async fn test_unreachable_controller() {
        let client = OnosClient::new("http://127.0.0.1:1".to_string(), "onos".to_string(), "rocks".to_string(), 2).unwrap();
        assert!(!client.test_connection().await);
        let app = AppId { id: uuid::Uuid::new_v4(), name: "fattree".to_string() };
        let rule = ForwardingRule::new(
            crate::models::DeviceId::new(0, 0, 1),
            "10.0.0.2/32".parse().unwrap(),
            1,
            100,
        );
        assert!(client.install_forwarding_rule(&rule, &app).await.is_err());
    }
}
