//! Pushes planned rules to the network.
//!
//! PREFIX-tier rules go to the flow-programming backend, SUFFIX-tier rules to
//! the switch control channel. A failed rule is recorded and installation
//! moves on; nothing here aborts a pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use rand::Rng;
use serde::Serialize;

use crate::error::InstallError;
use crate::models::{DeviceId, PlannedRule, RuleTier};
use crate::planner::SwitchPlan;
use crate::services::{AppId, FlowProgrammer, SwitchChannel};

/// Timeouts, retries and parallelism for one installation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallPolicy {
    pub call_timeout: Duration,
    /// Attempts per SUFFIX rule; flow backend calls are made once
    pub max_attempts: u32,
    pub backoff: Duration,
    /// Switches installed at the same time
    pub concurrency: usize,
}

impl Default for InstallPolicy {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            max_attempts: 1,
            backoff: Duration::from_millis(500),
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallFailure {
    pub device: DeviceId,
    pub tier: RuleTier,
    pub rule: String,
    pub output_port: u32,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SwitchReport {
    pub device: Option<DeviceId>,
    pub prefix_installed: usize,
    pub suffix_installed: usize,
    pub failures: Vec<InstallFailure>,
}

/// Outcome of a full installation pass
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub switches: usize,
    pub prefix_installed: usize,
    pub suffix_installed: usize,
    pub failures: Vec<InstallFailure>,
}

impl InstallReport {
    pub fn installed(&self) -> usize {
        self.prefix_installed + self.suffix_installed
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    fn absorb(&mut self, switch: SwitchReport) {
        self.switches += 1;
        self.prefix_installed += switch.prefix_installed;
        self.suffix_installed += switch.suffix_installed;
        self.failures.extend(switch.failures);
    }
}

pub struct RuleInstaller {
    flows: Arc<dyn FlowProgrammer>,
    channel: Arc<dyn SwitchChannel>,
    app: AppId,
    policy: InstallPolicy,
}

impl RuleInstaller {
    pub fn new(
        flows: Arc<dyn FlowProgrammer>,
        channel: Arc<dyn SwitchChannel>,
        app: AppId,
        policy: InstallPolicy,
    ) -> Self {
        Self { flows, channel, app, policy }
    }

    pub fn app(&self) -> &AppId {
        &self.app
    }

    /// Install one rule. Returns the number of attempts made alongside the outcome.
    pub async fn install_rule(&self, rule: &PlannedRule) -> (u32, Result<(), InstallError>) {
        match rule {
            PlannedRule::Prefix(r) => {
                let result = match tokio::time::timeout(
                    self.policy.call_timeout,
                    self.flows.install_forwarding_rule(r, &self.app),
                )
                .await
                {
                    Ok(Ok(())) => Ok(()),
                    Ok(Err(e)) => Err(InstallError::Backend(e.to_string())),
                    Err(_) => Err(InstallError::Timeout(self.policy.call_timeout)),
                };
                (1, result)
            }
            PlannedRule::Suffix(r) => {
                let max_attempts = self.policy.max_attempts.max(1);
                let mut attempt = 0;
                loop {
                    attempt += 1;
                    let result = match tokio::time::timeout(
                        self.policy.call_timeout,
                        self.channel.install_suffix_rule(
                            &r.bridge,
                            r.output_port,
                            r.suffix.last_octet(),
                            r.priority,
                            r.idle_timeout_secs,
                        ),
                    )
                    .await
                    {
                        Ok(Ok(())) => Ok(()),
                        Ok(Err(e)) => Err(InstallError::Channel(e)),
                        Err(_) => Err(InstallError::Timeout(self.policy.call_timeout)),
                    };

                    match result {
                        Ok(()) => return (attempt, Ok(())),
                        Err(e) if attempt >= max_attempts => return (attempt, Err(e)),
                        Err(e) => {
                            let delay = self.retry_delay(attempt);
                            tracing::warn!(
                                "{} attempt {}/{} failed: {}, retrying in {:?}",
                                r.bridge,
                                attempt,
                                max_attempts,
                                e,
                                delay
                            );
                            tokio::time::sleep(delay).await;
                        }
                    }
                }
            }
        }
    }

    /// Base backoff doubled per failed attempt, plus up to half the base as jitter
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.policy.backoff.as_millis() as u64;
        let exp = base.saturating_mul(1u64 << (attempt - 1).min(16));
        let jitter = if base > 1 { rand::thread_rng().gen_range(0..=base / 2) } else { 0 };
        Duration::from_millis(exp.saturating_add(jitter))
    }

    /// Install a switch's rules strictly in plan order
    pub async fn install_switch(&self, plan: &SwitchPlan) -> SwitchReport {
        let mut report = SwitchReport { device: Some(plan.device), ..Default::default() };

        for rule in &plan.rules {
            let (attempts, result) = self.install_rule(rule).await;
            match result {
                Ok(()) => match rule.tier() {
                    RuleTier::Prefix => report.prefix_installed += 1,
                    RuleTier::Suffix => report.suffix_installed += 1,
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to install {:?} rule {} -> port {} on {}: {}",
                        rule.tier(),
                        rule.match_text(),
                        rule.output_port(),
                        plan.device,
                        e
                    );
                    report.failures.push(InstallFailure {
                        device: plan.device,
                        tier: rule.tier(),
                        rule: rule.match_text(),
                        output_port: rule.output_port(),
                        attempts,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::debug!(
            "{}: {} prefix, {} suffix, {} failed",
            plan.device,
            report.prefix_installed,
            report.suffix_installed,
            report.failures.len()
        );
        report
    }

    /// Install every plan. Up to `concurrency` switches run at once; reports
    /// come back in plan order.
    pub async fn install_all(&self, plans: &[SwitchPlan]) -> InstallReport {
        let concurrency = self.policy.concurrency.max(1);
        let started_at = Utc::now();
        tracing::info!(
            "Installing {} switches for {} (concurrency {})",
            plans.len(),
            self.app,
            concurrency
        );

        let reports: Vec<SwitchReport> = stream::iter(plans)
            .map(|plan| self.install_switch(plan))
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = InstallReport {
            started_at,
            finished_at: started_at,
            switches: 0,
            prefix_installed: 0,
            suffix_installed: 0,
            failures: Vec::new(),
        };
        for switch in reports {
            report.absorb(switch);
        }
        report.finished_at = Utc::now();
        report
    }

    /// Remove every PREFIX rule owned by the application, then read the
    /// backend back to confirm none are left. SUFFIX rules stay on the bridges.
    pub async fn teardown(&self) -> anyhow::Result<()> {
        tracing::info!("Removing flows for {}", self.app);
        self.flows.remove_all_rules(&self.app).await?;

        let leftover = self.flows.rules_for_app(&self.app).await?;
        if !leftover.is_empty() {
            anyhow::bail!("{} flows for {} still installed after teardown", leftover.len(), self.app);
        }
        Ok(())
    }
}
