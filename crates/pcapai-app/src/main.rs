//! pcapai binary - composition root.
//!
//! 1. Resolve configuration (CLI > env > TOML file > defaults)
//! 2. Initialize tracing
//! 3. Build the host: session cache, snapshot store, model transport
//! 4. Restore the persisted session and dispatch the subcommand

mod cli;
mod host;
mod output;
mod shell;

use std::path::PathBuf;

use clap::Parser;
use pcapai_core::config::PcapAiConfig;
use pcapai_core::error::PcapAiError;

use cli::{CliArgs, Command};
use host::Host;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // Config is read before tracing exists so its log level can take part.
    let config_file = args.resolve_config_path();
    let loaded = PcapAiConfig::load(&config_file);
    let config_level = loaded
        .as_ref()
        .map(|c| c.general.log_level.clone())
        .unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(args.resolve_log_level(&config_level))
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting pcapai v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match loaded {
        Ok(config) => config,
        Err(e) if config_file.exists() => {
            tracing::warn!(path = %config_file.display(), error = %e, "Invalid config file, using defaults");
            PcapAiConfig::default()
        }
        Err(_) => {
            tracing::debug!(path = %config_file.display(), "No config file, using defaults");
            PcapAiConfig::default()
        }
    };
    config.general.data_dir = args.resolve_data_dir(&config.general.data_dir);
    config.model.command = args.resolve_model_command(config.model.command.as_deref());

    if let Err(e) = run(args.command, &config).await {
        tracing::debug!(error = ?e, "Command failed");
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(command: Command, config: &PcapAiConfig) -> Result<(), PcapAiError> {
    let data_dir = resolve_data_dir(&config.general.data_dir);
    let mut host = Host::from_config(config, &data_dir);
    if config.session.restore_on_start {
        host.restore();
    }

    match command {
        Command::Load { pcap } => {
            let session = host.load(&pcap)?;
            print!("{}", output::format_loaded(&session));
        }
        Command::Ask {
            question,
            pcap,
            focus,
        } => {
            if let Some(pcap) = pcap {
                host.load(&pcap)?;
            }
            let answer = host.ask(&question.join(" "), focus.as_deref()).await?;
            print!("{}", output::format_answer(&answer));
        }
        Command::Focus { protocol } => match host.set_focus(&protocol)? {
            Some(focus) => println!("Focus set to {}.", focus),
            None => println!("Focus cleared."),
        },
        Command::Info { json } => {
            let info = host.info().ok_or(PcapAiError::NoCapture)?;
            let summary = host.summary();
            if json {
                let doc = serde_json::json!({ "session": info, "summary": summary });
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                print!("{}", output::format_info(&info, summary.as_ref()));
            }
        }
        Command::Clear => {
            host.clear()?;
            println!("Session cleared.");
        }
        Command::Shell { pcap } => {
            if let Some(pcap) = pcap {
                let session = host.load(&pcap)?;
                print!("{}", output::format_loaded(&session));
            }
            shell::run(&mut host).await?;
        }
    }
    Ok(())
}

/// Resolve the data directory path, expanding `~` to the user's home.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}
