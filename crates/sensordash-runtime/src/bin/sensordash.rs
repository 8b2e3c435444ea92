//! CLI entrypoint for the sensordash telemetry dashboard.

#[path = "sensordash/cli.rs"]
mod cli;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use sensordash_runtime::{DashConfig, HttpHistory, LogSink, Session, WsConnector};
use tracing::info;

use cli::{Cli, Command};

const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("sensordash={level}").parse()?)
                .add_directive(format!("sensordash_runtime={level}").parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Command::Watch { duration: None }) {
        Command::Watch { duration } => watch(&config, duration),
        Command::Send {
            topic,
            payload,
            timeout,
        } => send(&config, &topic, &payload, Duration::from_secs(timeout)),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<DashConfig> {
    let config = match &cli.config {
        Some(path) => DashConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG_PATH).is_file() => {
            DashConfig::load(DEFAULT_CONFIG_PATH).context("loading dashboard.toml")?
        }
        None => DashConfig::default(),
    };
    match &cli.url {
        Some(url) => Ok(config.with_base_url(url)?),
        None => Ok(config),
    }
}

fn session(config: &DashConfig) -> Session<WsConnector, LogSink> {
    let history = HttpHistory::new(
        config.server.base_url.clone(),
        config.server.history_timeout,
    );
    Session::new(
        config,
        WsConnector::new(config.server.ws_url.clone()),
        Arc::new(history),
        LogSink,
    )
}

fn watch(config: &DashConfig, duration: Option<u64>) -> anyhow::Result<()> {
    info!(url = %config.server.ws_url, "watching live stream");
    let stop = Arc::new(AtomicBool::new(false));
    if let Some(seconds) = duration {
        let stop = Arc::clone(&stop);
        thread::Builder::new()
            .name("sensordash-timer".into())
            .spawn(move || {
                thread::sleep(Duration::from_secs(seconds));
                stop.store(true, Ordering::Relaxed);
            })
            .context("starting watch timer")?;
    }
    let mut session = session(config);
    session.run_until(&stop);
    info!(cards = session.dashboard().len(), "watch finished");
    Ok(())
}

fn send(config: &DashConfig, topic: &str, payload: &str, timeout: Duration) -> anyhow::Result<()> {
    let mut session = session(config);
    if !session.wait_connected(timeout) {
        session.shutdown();
        bail!("no connection to {} within {}s", config.server.ws_url, timeout.as_secs());
    }
    let sent = session.send(topic, payload);
    session.shutdown();
    if !sent {
        bail!("link closed before '{topic}' could be sent");
    }
    info!(topic, payload, "sent");
    Ok(())
}
