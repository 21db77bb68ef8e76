//! WebSocket to command bridge
//!
//! Connects to every endpoint in the configuration, sends the connect burst
//! and keep-alives, and prints one rendered command per line on stdout for
//! every inbound message. Logs go to stderr.
//!
//! Usage: `wss-to-command [config.yaml]` (defaults to `$WSS_CONFIG_PATH`,
//! then `wsstocommand/config.yaml`).

use anyhow::Result;
use std::sync::Arc;
use tracing::{error, info, warn};
use wss_to_command::bin_common::{init_tracing, load_config_from_env, parse_args, ConfigType, RunConfig};
use wss_to_command::wsbridge::{Bridge, BridgeConfig, CooperativeScheduler, StdoutSink};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let run = RunConfig::new("wss-to-command");
    let config_type = match parse_args().into_iter().next() {
        Some(path) => ConfigType::Custom(path),
        None => ConfigType::Bridge,
    };
    let config_path = load_config_from_env(config_type);

    let config = match BridgeConfig::load_or_create(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Could not load {}: {}", config_path.display(), e);
            error!("Bridge disabled");
            return Ok(());
        }
    };

    info!(
        "Loaded {} endpoints from {} (send={:?}, loops={})",
        config.endpoints.len(),
        config_path.display(),
        config.send,
        config.loops
    );
    if !config.skipped.is_empty() {
        warn!("{} endpoints skipped", config.skipped.len());
    }

    run.print_banner();

    let scheduler = Arc::new(CooperativeScheduler::start("wss-host")?);
    let bridge = Bridge::new(scheduler.clone(), Arc::new(StdoutSink));
    bridge.connect_all(config.endpoints);

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal (Ctrl+C)");

    let closing = bridge.shutdown();
    info!("Closing {} sessions", closing);
    if !bridge.wait_idle(run.grace_period).await {
        warn!("{} sessions did not finish closing", bridge.open_count());
    }
    bridge.abort_all();

    let dispatched: u64 = bridge
        .sessions()
        .iter()
        .map(|s| s.metrics().snapshot().commands_dispatched)
        .sum();

    scheduler.shutdown();
    run.print_shutdown(Some(&format!("Commands dispatched: {}", dispatched)));
    Ok(())
}
