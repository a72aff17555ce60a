use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::installer::InstallPolicy;
use crate::models::{FatTree, DEFAULT_IDLE_TIMEOUT, DEFAULT_PRIORITY_PREFIX, DEFAULT_PRIORITY_SUFFIX};
use crate::planner::RulePolicy;
use crate::services::DEFAULT_SUFFIX_COMMAND_TEMPLATE;
use crate::utils::{self, SshTarget};

/// Where PREFIX-tier rules are written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowBackendKind {
    Memory,
    Onos,
}

impl FromStr for FlowBackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "onos" => Ok(Self::Onos),
            other => bail!("unknown FLOW_BACKEND '{}' (expected memory or onos)", other),
        }
    }
}

/// How SUFFIX-tier commands reach the bridges
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Ssh,
    Local,
    DryRun,
}

impl FromStr for ChannelKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ssh" => Ok(Self::Ssh),
            "local" => Ok(Self::Local),
            "dry-run" | "dryrun" | "dry_run" => Ok(Self::DryRun),
            other => bail!("unknown SWITCH_CHANNEL '{}' (expected ssh, local or dry-run)", other),
        }
    }
}

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub k: u32,
    pub app_name: String,
    pub prefix_priority: u16,
    pub suffix_priority: u16,
    pub suffix_idle_timeout: u32,
    pub flow_backend: FlowBackendKind,
    pub onos_url: String,
    pub onos_user: String,
    pub onos_pass: String,
    pub switch_channel: ChannelKind,
    pub mgmt_host: String,
    pub mgmt_port: u16,
    pub mgmt_user: String,
    pub mgmt_pass: String,
    pub mgmt_key_path: String,
    pub suffix_command_template: String,
    pub install_timeout_secs: u64,
    pub install_max_attempts: u32,
    pub install_backoff_ms: u64,
    pub install_concurrency: usize,
    pub verify_paths: bool,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            k: parse(&get, "FATTREE_K", "4")?,
            app_name: get("APP_NAME", "net.oiilab.onos-fattree"),
            prefix_priority: parse(&get, "PREFIX_PRIORITY", &DEFAULT_PRIORITY_PREFIX.to_string())?,
            suffix_priority: parse(&get, "SUFFIX_PRIORITY", &DEFAULT_PRIORITY_SUFFIX.to_string())?,
            suffix_idle_timeout: parse(&get, "SUFFIX_IDLE_TIMEOUT", &DEFAULT_IDLE_TIMEOUT.to_string())?,
            flow_backend: parse(&get, "FLOW_BACKEND", "memory")?,
            onos_url: get("ONOS_URL", "http://127.0.0.1:8181"),
            onos_user: get("ONOS_USER", "onos"),
            onos_pass: get("ONOS_PASS", "rocks"),
            switch_channel: parse(&get, "SWITCH_CHANNEL", "dry-run")?,
            mgmt_host: get("MGMT_HOST", "127.0.0.1"),
            mgmt_port: parse(&get, "MGMT_PORT", "22")?,
            mgmt_user: get("MGMT_USER", ""),
            mgmt_pass: get("MGMT_PASS", ""),
            mgmt_key_path: get("MGMT_KEY_PATH", ""),
            suffix_command_template: get("SUFFIX_COMMAND_TEMPLATE", DEFAULT_SUFFIX_COMMAND_TEMPLATE),
            install_timeout_secs: parse(&get, "INSTALL_TIMEOUT_SECS", "30")?,
            install_max_attempts: parse(&get, "INSTALL_MAX_ATTEMPTS", "1")?,
            install_backoff_ms: parse(&get, "INSTALL_BACKOFF_MS", "500")?,
            install_concurrency: parse(&get, "INSTALL_CONCURRENCY", "1")?,
            verify_paths: parse_bool(&get("VERIFY_PATHS", "true"))
                .with_context(|| "VERIFY_PATHS must be true or false")?,
        })
    }

    /// Reject combinations that cannot produce a working installation
    pub fn validate(&self) -> Result<()> {
        FatTree::new(self.k)?;
        if self.app_name.trim().is_empty() {
            bail!("APP_NAME must not be empty");
        }
        if self.prefix_priority <= self.suffix_priority {
            bail!(
                "PREFIX_PRIORITY ({}) must be higher than SUFFIX_PRIORITY ({})",
                self.prefix_priority,
                self.suffix_priority
            );
        }
        if self.install_timeout_secs == 0 {
            bail!("INSTALL_TIMEOUT_SECS must be at least 1");
        }
        if self.install_max_attempts == 0 {
            bail!("INSTALL_MAX_ATTEMPTS must be at least 1");
        }
        if self.install_concurrency == 0 {
            bail!("INSTALL_CONCURRENCY must be at least 1");
        }
        if self.flow_backend == FlowBackendKind::Onos
            && !(self.onos_url.starts_with("http://") || self.onos_url.starts_with("https://"))
        {
            bail!("ONOS_URL must be an http(s) URL, got '{}'", self.onos_url);
        }
        if self.switch_channel == ChannelKind::Ssh {
            if !utils::is_valid_hostname(&self.mgmt_host) {
                bail!("MGMT_HOST '{}' is not a valid hostname or address", self.mgmt_host);
            }
            if self.mgmt_user.is_empty() {
                bail!("MGMT_USER is required for the ssh channel");
            }
            if self.mgmt_pass.is_empty() && self.mgmt_key_path.is_empty() {
                bail!("MGMT_PASS or MGMT_KEY_PATH is required for the ssh channel");
            }
        }
        Ok(())
    }

    pub fn rule_policy(&self) -> RulePolicy {
        RulePolicy {
            prefix_priority: self.prefix_priority,
            suffix_priority: self.suffix_priority,
            suffix_idle_timeout_secs: self.suffix_idle_timeout,
        }
    }

    pub fn install_policy(&self) -> InstallPolicy {
        InstallPolicy {
            call_timeout: Duration::from_secs(self.install_timeout_secs),
            max_attempts: self.install_max_attempts,
            backoff: Duration::from_millis(self.install_backoff_ms),
            concurrency: self.install_concurrency,
        }
    }

    pub fn ssh_target(&self) -> SshTarget {
        SshTarget {
            host: self.mgmt_host.clone(),
            port: self.mgmt_port,
            user: self.mgmt_user.clone(),
            password: non_empty(&self.mgmt_pass),
            key_path: non_empty(&self.mgmt_key_path).map(PathBuf::from),
            timeout_secs: self.install_timeout_secs,
        }
    }
}

fn parse<T, G>(get: &G, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str, &str) -> String,
{
    let raw = get(key, default);
    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid {} '{}': {}", key, raw, e))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("not a boolean: '{}'", other),
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.k, 4);
        assert_eq!(cfg.app_name, "net.oiilab.onos-fattree");
        assert_eq!(cfg.flow_backend, FlowBackendKind::Memory);
        assert_eq!(cfg.switch_channel, ChannelKind::DryRun);
        assert_eq!(cfg.rule_policy(), RulePolicy::default());
        assert_eq!(cfg.install_policy(), InstallPolicy::default());
        assert!(cfg.verify_paths);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("FATTREE_K", "8"),
            ("FLOW_BACKEND", "ONOS"),
            ("SWITCH_CHANNEL", "ssh"),
            ("MGMT_HOST", "mininet.lab"),
            ("MGMT_USER", "mininet"),
            ("MGMT_KEY_PATH", "/root/.ssh/id_ed25519"),
            ("INSTALL_CONCURRENCY", "4"),
            ("VERIFY_PATHS", "off"),
        ])
        .unwrap();
        assert_eq!(cfg.k, 8);
        assert_eq!(cfg.flow_backend, FlowBackendKind::Onos);
        assert_eq!(cfg.switch_channel, ChannelKind::Ssh);
        assert_eq!(cfg.install_policy().concurrency, 4);
        assert!(!cfg.verify_paths);
        assert!(cfg.validate().is_ok());

        let target = cfg.ssh_target();
        assert_eq!(target.user, "mininet");
        assert_eq!(target.password, None);
        assert_eq!(target.key_path, Some(PathBuf::from("/root/.ssh/id_ed25519")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(config(&[("FATTREE_K", "four")]).is_err());
        assert!(config(&[("FLOW_BACKEND", "netconf")]).is_err());
        assert!(config(&[("VERIFY_PATHS", "maybe")]).is_err());
        assert!(config(&[("MGMT_PORT", "70000")]).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(config(&[("FATTREE_K", "5")]).unwrap().validate().is_err());
        assert!(config(&[("FATTREE_K", "100")]).unwrap().validate().is_err());
        assert!(config(&[("SUFFIX_PRIORITY", "100")]).unwrap().validate().is_err());
        assert!(config(&[("INSTALL_MAX_ATTEMPTS", "0")]).unwrap().validate().is_err());
        assert!(config(&[("SWITCH_CHANNEL", "ssh"), ("MGMT_USER", "mininet")])
            .unwrap()
            .validate()
            .is_err());
        assert!(config(&[("FLOW_BACKEND", "onos"), ("ONOS_URL", "127.0.0.1:8181")])
            .unwrap()
            .validate()
            .is_err());
    }
}
