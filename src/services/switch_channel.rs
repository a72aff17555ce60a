use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::process::Command;

use super::command::{CommandTemplate, SuffixFlow};
use crate::error::ChannelError;
use crate::models::BridgeName;
use crate::utils::{self, CommandOutput, SshTarget};

/// Out-of-band channel that programs SUFFIX-tier rules on a named bridge
#[async_trait]
pub trait SwitchChannel: Send + Sync {
    async fn install_suffix_rule(
        &self,
        bridge: &BridgeName,
        output_port: u32,
        last_octet: u8,
        priority: u16,
        idle_timeout_secs: u32,
    ) -> Result<(), ChannelError>;
}

fn log_output(bridge: &BridgeName, output: CommandOutput) {
    let stdout = output.stdout.trim();
    if !stdout.is_empty() {
        tracing::debug!("{}: {}", bridge, stdout);
    }
}

/// Runs the rendered command on a management host over SSH.
///
/// libssh2 calls block and cannot be cancelled, so a caller that times out
/// leaves the command running. Each bridge has a lock that the blocking task
/// holds until the command really finishes; the next command for that bridge
/// waits on it.
pub struct SshSwitchChannel {
    target: SshTarget,
    template: CommandTemplate,
    bridges: Mutex<HashMap<BridgeName, Arc<tokio::sync::Mutex<()>>>>,
}

impl SshSwitchChannel {
    pub fn new(target: SshTarget, template: CommandTemplate) -> Self {
        Self {
            target,
            template,
            bridges: Mutex::new(HashMap::new()),
        }
    }

    fn bridge_lock(&self, bridge: &BridgeName) -> Arc<tokio::sync::Mutex<()>> {
        self.bridges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(bridge.clone())
            .or_default()
            .clone()
    }

    /// Run blocking work for `bridge` on the blocking pool, one job per bridge at a time
    async fn run_on_bridge<F>(&self, bridge: &BridgeName, job: F) -> Result<CommandOutput, ChannelError>
    where
        F: FnOnce() -> Result<CommandOutput, ChannelError> + Send + 'static,
    {
        let guard = self.bridge_lock(bridge).lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            job()
        })
        .await
        .map_err(|e| ChannelError::Task(format!("Task join error: {}", e)))?
    }
}

#[async_trait]
impl SwitchChannel for SshSwitchChannel {
    async fn install_suffix_rule(
        &self,
        bridge: &BridgeName,
        output_port: u32,
        last_octet: u8,
        priority: u16,
        idle_timeout_secs: u32,
    ) -> Result<(), ChannelError> {
        let argv = self.template.render(&SuffixFlow {
            bridge: bridge.as_str(),
            output_port,
            last_octet,
            priority,
            idle_timeout_secs,
        })?;
        let command = utils::shell_join(&argv);
        tracing::debug!("ssh {}@{}: {}", self.target.user, self.target.host, command);

        let target = self.target.clone();
        let output = self
            .run_on_bridge(bridge, move || utils::ssh_run_command(&target, &command))
            .await?
            .into_result()?;
        log_output(bridge, output);
        Ok(())
    }
}

/// Runs the rendered command as a local process, without a shell. The child
/// is killed if the caller stops waiting.
pub struct LocalSwitchChannel {
    template: CommandTemplate,
}

impl LocalSwitchChannel {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl SwitchChannel for LocalSwitchChannel {
    async fn install_suffix_rule(
        &self,
        bridge: &BridgeName,
        output_port: u32,
        last_octet: u8,
        priority: u16,
        idle_timeout_secs: u32,
    ) -> Result<(), ChannelError> {
        let argv = self.template.render(&SuffixFlow {
            bridge: bridge.as_str(),
            output_port,
            last_octet,
            priority,
            idle_timeout_secs,
        })?;
        tracing::debug!("exec: {}", argv.join(" "));

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .kill_on_drop(true)
            .output()
            .await?;
        let output = CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
        .into_result()?;
        log_output(bridge, output);
        Ok(())
    }
}

/// Logs the command it would run and reports success
pub struct DryRunSwitchChannel {
    template: CommandTemplate,
}

impl DryRunSwitchChannel {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }
}

#[async_trait]
impl SwitchChannel for DryRunSwitchChannel {
    async fn install_suffix_rule(
        &self,
        bridge: &BridgeName,
        output_port: u32,
        last_octet: u8,
        priority: u16,
        idle_timeout_secs: u32,
    ) -> Result<(), ChannelError> {
        let argv = self.template.render(&SuffixFlow {
            bridge: bridge.as_str(),
            output_port,
            last_octet,
            priority,
            idle_timeout_secs,
        })?;
        tracing::info!("[dry-run] {}", utils::shell_join(&argv));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DeviceId, SwitchRole};
    use crate::services::DEFAULT_SUFFIX_COMMAND_TEMPLATE;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tokio_test::{assert_err, assert_ok};

    fn bridge() -> BridgeName {
        BridgeName::for_switch(SwitchRole::Edge, DeviceId::new(0, 0, 1))
    }

    fn default_template() -> CommandTemplate {
        CommandTemplate::new(DEFAULT_SUFFIX_COMMAND_TEMPLATE).unwrap()
    }

    fn unreachable_target() -> SshTarget {
        SshTarget {
            host: "127.0.0.1".to_string(),
            port: 1,
            user: "mininet".to_string(),
            password: Some("mininet".to_string()),
            key_path: None,
            timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn test_local_channel_reports_exit_status() {
        let ok = LocalSwitchChannel::new(CommandTemplate::new("true {{ bridge }} {{ port }}").unwrap());
        assert_ok!(ok.install_suffix_rule(&bridge(), 3, 2, 10, 0).await);

        let failing = LocalSwitchChannel::new(CommandTemplate::new("false {{ bridge }}").unwrap());
        match failing.install_suffix_rule(&bridge(), 3, 2, 10, 0).await {
            Err(ChannelError::CommandFailed { status, .. }) => assert_eq!(status, 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_local_channel_missing_binary() {
        let channel = LocalSwitchChannel::new(
            CommandTemplate::new("/nonexistent/ovs-ofctl add-flow {{ bridge }}").unwrap(),
        );
        let err = assert_err!(channel.install_suffix_rule(&bridge(), 3, 2, 10, 0).await);
        assert!(matches!(err, ChannelError::Io(_)));
    }

    #[tokio::test]
    async fn test_dry_run_channel() {
        let channel = DryRunSwitchChannel::new(default_template());
        assert_ok!(channel.install_suffix_rule(&bridge(), 4, 3, 10, 0).await);
    }

    #[tokio::test]
    async fn test_ssh_channel_unreachable_host() {
        let channel = SshSwitchChannel::new(unreachable_target(), default_template());
        let err = assert_err!(channel.install_suffix_rule(&bridge(), 4, 3, 10, 0).await);
        assert!(matches!(err, ChannelError::Connect(_)));
    }

    #[tokio::test]
    async fn test_abandoned_command_still_holds_its_bridge() {
        let channel = SshSwitchChannel::new(unreachable_target(), default_template());
        let finished = Arc::new(AtomicBool::new(false));

        let slow_done = finished.clone();
        let slow_bridge = bridge();
        let slow = channel.run_on_bridge(&slow_bridge, move || {
            std::thread::sleep(Duration::from_millis(300));
            slow_done.store(true, Ordering::SeqCst);
            Ok(CommandOutput::default())
        });
        // caller gives up long before the blocking work ends
        assert!(tokio::time::timeout(Duration::from_millis(20), slow).await.is_err());

        let seen_done = finished.clone();
        let next = channel
            .run_on_bridge(&bridge(), move || {
                Ok(CommandOutput { status: if seen_done.load(Ordering::SeqCst) { 0 } else { 1 }, ..Default::default() })
            })
            .await
            .unwrap();
        assert_eq!(next.status, 0);

        // other bridges are not held up
        let other = BridgeName::for_switch(SwitchRole::Aggregation, DeviceId::new(0, 2, 1));
        assert!(!Arc::ptr_eq(&channel.bridge_lock(&bridge()), &channel.bridge_lock(&other)));
        assert!(Arc::ptr_eq(&channel.bridge_lock(&bridge()), &channel.bridge_lock(&bridge())));
    }
}
