//! opsbridge: one tool namespace over a cluster's observability backends
//!
//! ```text
//! opsbridge                               # serve tools over stdio
//! opsbridge --config /etc/opsbridge/config.yaml tools
//! opsbridge --disable-service kibana verify
//! opsbridge status
//! ```
//!
//! Logs go to stderr; stdout carries only responses.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opsbridge_core::AppConfig;
use opsbridge_services::{ServiceManager, BUILTIN_SERVICES};
use opsbridge_tools::ToolRegistry;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod serve;

use serve::Dispatcher;

#[derive(Parser, Debug)]
#[command(name = "opsbridge")]
#[command(about = "Unified tool server for Kubernetes and observability backends")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Configuration file (JSON or YAML)
    #[arg(long, short, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Exclude a service (repeatable)
    #[arg(long = "disable-service", value_name = "NAME")]
    disable_services: Vec<String>,

    /// Only run these services (repeatable, wins over --disable-service)
    #[arg(long = "enable-service", value_name = "NAME")]
    enable_services: Vec<String>,

    /// Hide a tool (repeatable)
    #[arg(long = "disable-tool", value_name = "NAME")]
    disable_tools: Vec<String>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Answer JSON tool requests on stdin (default)
    Serve,
    /// Print the merged tool list as JSON
    Tools,
    /// Check that every advertised tool has an executor
    Verify,
    /// Print per-service initialization status as JSON
    Status,
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{}'", level))?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::load_default()?,
    };
    config.apply_env_overrides(BUILTIN_SERVICES);

    config
        .disabled_services
        .extend(cli.disable_services.iter().cloned());
    config
        .enabled_services
        .extend(cli.enable_services.iter().cloned());
    config.disabled_tools.extend(cli.disable_tools.iter().cloned());
    Ok(config)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let command = cli.command.unwrap_or(Command::Serve);
    let config = load_config(&cli)?;

    let mut manager = ServiceManager::new();
    if let Err(e) = manager.initialize(&config).await {
        error!("Startup aborted: {}", e);
        if command == Command::Status {
            println!("{}", serde_json::to_string_pretty(&manager.status_report().await)?);
        }
        close_services(&mut manager).await;
        return Ok(ExitCode::FAILURE);
    }

    let table = ToolRegistry::new();
    let summary = manager.register_capabilities(&table).await;

    let code = match command {
        Command::Tools => {
            println!("{}", serde_json::to_string_pretty(&table.list().await)?);
            ExitCode::SUCCESS
        }
        Command::Verify => {
            let (ok, defects) = manager.verify_registration().await;
            for defect in &defects {
                println!("{}", defect);
            }
            if ok {
                println!("{} tools registered cleanly", summary.registered);
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Status => {
            println!("{}", serde_json::to_string_pretty(&manager.status_report().await)?);
            ExitCode::SUCCESS
        }
        Command::Serve => {
            let dispatcher = Dispatcher::new(&manager, &table, config.default_page_size);
            let stdin = BufReader::new(tokio::io::stdin());

            tokio::select! {
                result = dispatcher.run(stdin, tokio::io::stdout()) => result?,
                _ = tokio::signal::ctrl_c() => info!("Interrupted"),
            }
            ExitCode::SUCCESS
        }
    };

    close_services(&mut manager).await;
    Ok(code)
}

async fn close_services(manager: &mut ServiceManager) {
    if let Err(e) = manager.shutdown().await {
        warn!("{}", e);
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs)?;

    info!("Starting opsbridge {}", env!("CARGO_PKG_VERSION"));
    run(cli).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::parse_from(["opsbridge"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_cli_repeatable_filters() {
        let cli = Cli::parse_from([
            "opsbridge",
            "--disable-service",
            "kibana",
            "--disable-service",
            "jaeger",
            "--enable-service",
            "kubernetes",
            "--disable-tool",
            "utilities_sleep",
            "verify",
        ]);
        assert_eq!(cli.disable_services, vec!["kibana", "jaeger"]);
        assert_eq!(cli.enable_services, vec!["kubernetes"]);
        assert_eq!(cli.disable_tools, vec!["utilities_sleep"]);
        assert_eq!(cli.command, Some(Command::Verify));
    }

    #[test]
    fn test_cli_flags_merge_into_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "disabled_tools: [grafana_health]\n").unwrap();

        let cli = Cli::parse_from([
            "opsbridge",
            "--config",
            path.to_str().unwrap(),
            "--disable-tool",
            "utilities_sleep",
        ]);
        let config = load_config(&cli).unwrap();
        assert!(config.disabled_tools.contains(&"grafana_health".to_string()));
        assert!(config.disabled_tools.contains(&"utilities_sleep".to_string()));
    }
}
