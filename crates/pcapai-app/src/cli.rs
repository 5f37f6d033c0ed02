//! CLI argument definitions for the pcapai binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pcapai - ask plain-English questions about a packet capture.
#[derive(Parser, Debug)]
#[command(name = "pcapai", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the session snapshot.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Program speaking the JSON model protocol on stdin/stdout.
    #[arg(long = "model-command", global = true)]
    pub model_command: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Parse a capture and make it the active session.
    Load { pcap: PathBuf },

    /// Ask one question about the active capture.
    Ask {
        /// The question; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Load this capture first.
        #[arg(long)]
        pcap: Option<PathBuf>,

        /// Protocol focus for this question only.
        #[arg(long)]
        focus: Option<String>,
    },

    /// Set the protocol focus of the active session (`none` clears it).
    Focus { protocol: String },

    /// Show the active session.
    Info {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Discard the active session and its snapshot.
    Clear,

    /// Interactive question loop.
    Shell {
        #[arg(long)]
        pcap: Option<PathBuf>,
    },
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > PCAPAI_CONFIG env var > ~/.pcapai/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(env_var)
    }

    fn resolve_config_path_with(&self, env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Some(p) = env("PCAPAI_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory.
    ///
    /// Priority: --data-dir flag > PCAPAI_DATA_DIR env var > config file value.
    pub fn resolve_data_dir(&self, config_value: &str) -> String {
        self.resolve_data_dir_with(config_value, env_var)
    }

    fn resolve_data_dir_with(
        &self,
        config_value: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> String {
        if let Some(ref p) = self.data_dir {
            return p.to_string_lossy().to_string();
        }
        env("PCAPAI_DATA_DIR").unwrap_or_else(|| config_value.to_string())
    }

    /// Resolve the tracing filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value > info.
    pub fn resolve_log_level(&self, config_value: &str) -> String {
        self.resolve_log_level_with(config_value, env_var)
    }

    fn resolve_log_level_with(
        &self,
        config_value: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> String {
        if let Some(ref level) = self.log_level {
            return level.clone();
        }
        if let Some(level) = env("RUST_LOG") {
            return level;
        }
        if !config_value.trim().is_empty() {
            return config_value.to_string();
        }
        "info".to_string()
    }

    /// Resolve the model command.
    ///
    /// Priority: --model-command flag > PCAPAI_MODEL_COMMAND env var > config file value.
    /// `None` means no model is configured and questions are answered offline.
    pub fn resolve_model_command(&self, config_value: Option<&str>) -> Option<String> {
        self.resolve_model_command_with(config_value, env_var)
    }

    fn resolve_model_command_with(
        &self,
        config_value: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Option<String> {
        self.model_command
            .clone()
            .or_else(|| env("PCAPAI_MODEL_COMMAND"))
            .or_else(|| config_value.map(str::to_string))
            .filter(|c| !c.trim().is_empty())
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".pcapai").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".pcapai").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_ask_joins_words() {
        let args = parse(&["pcapai", "ask", "--pcap", "t.pcap", "which", "hosts?"]);
        match args.command {
            Command::Ask {
                question,
                pcap,
                focus,
            } => {
                assert_eq!(question.join(" "), "which hosts?");
                assert_eq!(pcap, Some(PathBuf::from("t.pcap")));
                assert_eq!(focus, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(CliArgs::try_parse_from(["pcapai", "ask"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["pcapai", "info", "--json", "--log-level", "debug"]);
        assert_eq!(args.command, Command::Info { json: true });
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_focus_and_shell() {
        let args = parse(&["pcapai", "focus", "none"]);
        assert_eq!(
            args.command,
            Command::Focus {
                protocol: "none".into()
            }
        );
        let args = parse(&["pcapai", "shell"]);
        assert_eq!(args.command, Command::Shell { pcap: None });
    }

    #[test]
    fn test_config_path_priority() {
        let args = parse(&["pcapai", "-c", "/etc/pcapai.toml", "clear"]);
        let env = |_: &str| Some("/from/env.toml".to_string());
        assert_eq!(
            args.resolve_config_path_with(env),
            PathBuf::from("/etc/pcapai.toml")
        );

        let args = parse(&["pcapai", "clear"]);
        assert_eq!(
            args.resolve_config_path_with(env),
            PathBuf::from("/from/env.toml")
        );
        assert!(args
            .resolve_config_path_with(no_env)
            .ends_with("config.toml"));
    }

    #[test]
    fn test_data_dir_priority() {
        let env = |name: &str| (name == "PCAPAI_DATA_DIR").then(|| "/env/data".to_string());
        let args = parse(&["pcapai", "--data-dir", "/flag/data", "info"]);
        assert_eq!(args.resolve_data_dir_with("~/.pcapai/data", env), "/flag/data");

        let args = parse(&["pcapai", "info"]);
        assert_eq!(args.resolve_data_dir_with("~/.pcapai/data", env), "/env/data");
        assert_eq!(
            args.resolve_data_dir_with("~/.pcapai/data", no_env),
            "~/.pcapai/data"
        );
    }

    #[test]
    fn test_log_level_priority() {
        let env = |name: &str| (name == "RUST_LOG").then(|| "warn".to_string());
        let args = parse(&["pcapai", "-l", "trace", "info"]);
        assert_eq!(args.resolve_log_level_with("debug", env), "trace");

        let args = parse(&["pcapai", "info"]);
        assert_eq!(args.resolve_log_level_with("debug", env), "warn");
        assert_eq!(args.resolve_log_level_with("debug", no_env), "debug");
        assert_eq!(args.resolve_log_level_with("", no_env), "info");
    }

    #[test]
    fn test_model_command_priority() {
        let env =
            |name: &str| (name == "PCAPAI_MODEL_COMMAND").then(|| "env-model".to_string());
        let args = parse(&["pcapai", "--model-command", "flag-model", "info"]);
        assert_eq!(
            args.resolve_model_command_with(Some("file-model"), env).as_deref(),
            Some("flag-model")
        );

        let args = parse(&["pcapai", "info"]);
        assert_eq!(
            args.resolve_model_command_with(Some("file-model"), env).as_deref(),
            Some("env-model")
        );
        assert_eq!(
            args.resolve_model_command_with(Some("file-model"), no_env).as_deref(),
            Some("file-model")
        );
        assert_eq!(args.resolve_model_command_with(None, no_env), None);
        assert_eq!(args.resolve_model_command_with(Some("  "), no_env), None);
    }
}
