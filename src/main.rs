mod addressing;
mod config;
mod error;
mod fabric;
mod installer;
mod models;
mod onos;
mod planner;
mod services;
mod utils;

use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::{ChannelKind, Config, FlowBackendKind};
use fabric::{PathVerifier, Wiring};
use installer::RuleInstaller;
use models::FatTree;
use onos::OnosClient;
use planner::RulePlanner;
use services::{
    AppRegistry, CommandTemplate, DryRunSwitchChannel, FlowProgrammer, InMemoryFlowTable, LocalAppRegistry,
    LocalSwitchChannel, SshSwitchChannel, SwitchChannel,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fattree_routing=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let cfg = Config::load()?;
    cfg.validate()?;

    let tree = FatTree::new(cfg.k)?;
    tracing::info!(
        "FatTree routing starting: K={} ({} pods, {} core, {} switches, {} hosts)",
        tree.k(),
        tree.pod_count(),
        tree.core_count(),
        tree.switch_count(),
        tree.host_count()
    );

    let registry = LocalAppRegistry::new();
    let app = registry.register_application(&cfg.app_name);

    // Plan
    let planner = RulePlanner::new(tree, cfg.rule_policy());
    let plans = planner.plan_all();
    let prefix_count: usize = plans.iter().map(|p| p.prefix_rules().count()).sum();
    let suffix_count: usize = plans.iter().map(|p| p.suffix_rules().count()).sum();
    let rule_count = prefix_count + suffix_count;
    tracing::info!(
        "Planned {} prefix and {} suffix rules across {} switches",
        prefix_count,
        suffix_count,
        plans.len()
    );
    if tracing::enabled!(tracing::Level::DEBUG) {
        tracing::debug!("Plan: {}", serde_json::to_string(&plans)?);
    }

    // Verify every host pair is reachable before touching the network
    if cfg.verify_paths {
        let wiring = Wiring::build(planner.tree());
        let summary = PathVerifier::new(&wiring, &plans).verify_all_pairs()?;
        tracing::info!(
            "Verified {} host pairs over {} links (longest path {} switches)",
            summary.pairs,
            wiring.link_count(),
            summary.longest_path
        );
    }

    // Backends
    let flows: Arc<dyn FlowProgrammer> = match cfg.flow_backend {
        FlowBackendKind::Memory => Arc::new(InMemoryFlowTable::new()),
        FlowBackendKind::Onos => {
            let client = OnosClient::new(
                cfg.onos_url.clone(),
                cfg.onos_user.clone(),
                cfg.onos_pass.clone(),
                cfg.install_timeout_secs,
            )?;
            if !client.test_connection().await {
                tracing::warn!("ONOS at {} is not reachable, installs will be reported as failures", cfg.onos_url);
            }
            Arc::new(client)
        }
    };

    let template = CommandTemplate::new(&cfg.suffix_command_template)?;
    let channel: Arc<dyn SwitchChannel> = match cfg.switch_channel {
        ChannelKind::Ssh => Arc::new(SshSwitchChannel::new(cfg.ssh_target(), template)),
        ChannelKind::Local => Arc::new(LocalSwitchChannel::new(template)),
        ChannelKind::DryRun => Arc::new(DryRunSwitchChannel::new(template)),
    };

    // Install
    let installer = RuleInstaller::new(flows, channel, app, cfg.install_policy());
    let report = installer.install_all(&plans).await;
    if report.is_complete() {
        tracing::info!(
            "Installed {} prefix and {} suffix rules on {} switches in {}ms",
            report.prefix_installed,
            report.suffix_installed,
            report.switches,
            report.elapsed().num_milliseconds()
        );
    } else {
        tracing::warn!(
            "Installed {} of {} rules in {}ms, {} failed",
            report.installed(),
            rule_count,
            report.elapsed().num_milliseconds(),
            report.failures.len()
        );
    }
    tracing::info!("Started {}", installer.app());

    shutdown_signal().await;

    tracing::info!("Stopping {}", installer.app());
    installer.teardown().await?;
    tracing::info!("FatTree routing shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
