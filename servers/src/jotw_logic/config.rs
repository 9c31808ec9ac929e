use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use lib_jotw::configs::{ConfigError, PollSettings};

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default)]
#[command(about = "Joke of the Week poll server", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[arg(long, env = "JOTW_PORT", help = "Port for the HTTP command surface.")]
    pub port: Option<u16>,

    #[arg(long, env = "JOTW_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[arg(long, env = "JOTW_DATA_FILE", help = "JSON file holding communities and pending jokes.")]
    pub data_file: Option<PathBuf>,

    #[arg(long, env = "JOTW_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[arg(long, env = "JOTW_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[arg(long, env = "JOTW_CRON", help = "Six-field cron expression for the weekly poll (seconds first).")]
    pub cron: Option<String>,

    #[arg(long, env = "JOTW_TIMEZONE", help = "IANA timezone the cron expression is evaluated in.")]
    pub timezone: Option<String>,

    #[arg(long, env = "JOTW_POLL_WINDOW_SECONDS", help = "How long a poll collects reactions, in seconds.")]
    pub poll_window_seconds: Option<u64>,

    #[arg(long, env = "JOTW_SYMBOLS", help = "Comma separated reaction symbols, in assignment order.")]
    pub symbols: Option<String>,

    #[arg(long, env = "JOTW_BOT_ACCOUNT_ID", help = "Account id the bot reacts as; its reactions never count.")]
    pub bot_account_id: Option<String>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            config_path: other.config_path.or(self.config_path),
            data_file: other.data_file.or(self.data_file),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            cron: other.cron.or(self.cron),
            timezone: other.timezone.or(self.timezone),
            poll_window_seconds: other.poll_window_seconds.or(self.poll_window_seconds),
            symbols: other.symbols.or(self.symbols),
            bot_account_id: other.bot_account_id.or(self.bot_account_id),
        }
    }

    fn defaults() -> Config {
        Config {
            port: Some(9003),
            data_file: Some(PathBuf::from("guilds.json")),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            bot_account_id: Some("jotw-bot".to_string()),
            ..Default::default()
        }
    }

    /// Validated poll settings; anything unset falls back to the library defaults.
    pub fn poll_settings(&self) -> Result<PollSettings, ConfigError> {
        PollSettings::from_parts(
            self.poll_window_seconds,
            self.cron.as_deref(),
            self.timezone.as_deref(),
            self.symbols.as_deref(),
        )
    }
}

/// Resolves the configuration from, lowest to highest precedence: built-in
/// defaults, the JSON config file, then environment variables and CLI flags.
///
/// Problems with the config file are returned rather than printed, since
/// logging is set up from the result.
pub fn load_config() -> (Config, Vec<String>) {
    let cli_args = Config::parse();
    resolve(cli_args)
}

fn resolve(cli_args: Config) -> (Config, Vec<String>) {
    let config_file_path = cli_args
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("server_jotw.conf"));

    let mut current_config = Config::defaults();
    let mut warnings = Vec::new();

    if config_file_path.exists() {
        match fs::read_to_string(&config_file_path) {
            Ok(config_str) => match serde_json::from_str::<Config>(&config_str) {
                Ok(file_config) => current_config = current_config.merge(file_config),
                Err(e) => warnings.push(format!(
                    "Failed to parse config file {}: {}. Falling back to other sources.",
                    config_file_path.display(),
                    e
                )),
            },
            Err(e) => warnings.push(format!(
                "Failed to read config file {}: {}. Falling back to other sources.",
                config_file_path.display(),
                e
            )),
        }
    }

    (current_config.merge(cli_args), warnings)
}
