use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::search::{PollSettings, ShopNames};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CURRENCY_SUFFIX: &str = "руб.";
pub const DEFAULT_LOG_FILE: &str = "shopmux.log";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub base_url: String,
    pub polling: PollingConfig,
    // Requests themselves carry no timeout; only connecting does.
    pub connect_timeout_ms: u64,
    pub currency_suffix: String,
    pub theme: String,
    pub log_file: PathBuf,
    pub log_level: String,
    pub shop_names: HashMap<String, String>,
    pub project_root: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollingConfig {
    pub enabled: bool,
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            polling: PollingConfig::default(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            currency_suffix: DEFAULT_CURRENCY_SUFFIX.to_string(),
            theme: "dark".to_string(),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            log_level: "info".to_string(),
            shop_names: HashMap::new(),
            project_root: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub polling: Option<PartialPollingConfig>,
    pub connect_timeout_ms: Option<u64>,
    pub currency_suffix: Option<String>,
    pub theme: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_level: Option<String>,
    pub shop_names: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PartialPollingConfig {
    pub enabled: Option<bool>,
    pub interval_ms: Option<u64>,
}

impl FileConfig {
    /// Fields set in `self` win over `lower`; shop names are merged per key.
    pub fn layered_over(self, lower: FileConfig) -> FileConfig {
        let polling = match (self.polling, lower.polling) {
            (Some(upper), Some(lower)) => Some(PartialPollingConfig {
                enabled: upper.enabled.or(lower.enabled),
                interval_ms: upper.interval_ms.or(lower.interval_ms),
            }),
            (upper, lower) => upper.or(lower),
        };
        let shop_names = match (self.shop_names, lower.shop_names) {
            (Some(upper), Some(mut merged)) => {
                merged.extend(upper);
                Some(merged)
            }
            (upper, lower) => upper.or(lower),
        };
        FileConfig {
            base_url: self.base_url.or(lower.base_url),
            polling,
            connect_timeout_ms: self.connect_timeout_ms.or(lower.connect_timeout_ms),
            currency_suffix: self.currency_suffix.or(lower.currency_suffix),
            theme: self.theme.or(lower.theme),
            log_file: self.log_file.or(lower.log_file),
            log_level: self.log_level.or(lower.log_level),
            shop_names,
        }
    }
}

/// Values read from `SHOPMUX_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvConfig {
    pub base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub log_level: Option<String>,
}

impl EnvConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("SHOPMUX_BASE_URL").ok(),
            poll_interval_ms: std::env::var("SHOPMUX_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| match v.parse::<u64>() {
                    Ok(ms) => Some(ms),
                    Err(e) => {
                        warn!(value = %v, error = %e, "ignoring invalid SHOPMUX_POLL_INTERVAL_MS");
                        None
                    }
                }),
            log_level: std::env::var("SHOPMUX_LOG").ok(),
        }
    }
}

/// Command-line settings that take precedence over every other layer.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub no_poll: bool,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_cli(cli: &crate::Cli) -> Result<Self> {
        let overrides = cli.overrides();
        let project_root = std::env::current_dir().context("resolve current dir")?;
        let project_cfg = load_project_config(&project_root).unwrap_or_default();
        let file_cfg = load_file_config(overrides.config_path.as_deref()).unwrap_or_default();
        Ok(Self::from_layers(
            project_cfg.layered_over(file_cfg),
            EnvConfig::from_env(),
            &overrides,
            project_root,
        ))
    }

    /// Resolves the final config: defaults, then `file`, then `env`, then `cli`.
    pub fn from_layers(
        file: FileConfig,
        env: EnvConfig,
        cli: &CliOverrides,
        project_root: PathBuf,
    ) -> Self {
        let defaults = AppConfig::default();
        let file_polling = file.polling.unwrap_or_default();
        let interval_ms = cli
            .poll_interval_ms
            .or(env.poll_interval_ms)
            .or(file_polling.interval_ms)
            .unwrap_or(defaults.polling.interval_ms)
            .max(1);
        let enabled = !cli.no_poll && file_polling.enabled.unwrap_or(defaults.polling.enabled);

        Self {
            base_url: cli
                .base_url
                .clone()
                .or(env.base_url)
                .or(file.base_url)
                .unwrap_or(defaults.base_url),
            polling: PollingConfig {
                enabled,
                interval_ms,
            },
            connect_timeout_ms: file
                .connect_timeout_ms
                .unwrap_or(defaults.connect_timeout_ms),
            currency_suffix: file.currency_suffix.unwrap_or(defaults.currency_suffix),
            theme: file.theme.unwrap_or(defaults.theme),
            log_file: cli
                .log_file
                .clone()
                .or(file.log_file)
                .unwrap_or(defaults.log_file),
            log_level: cli
                .log_level
                .clone()
                .or(env.log_level)
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
            shop_names: file.shop_names.unwrap_or_default(),
            project_root,
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            enabled: self.polling.enabled,
            interval: Duration::from_millis(self.polling.interval_ms),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn shop_names(&self) -> ShopNames {
        ShopNames::new(self.shop_names.clone())
    }
}

fn parse_config_file(path: &Path) -> Result<Option<FileConfig>> {
    let s = fs::read_to_string(path)
        .with_context(|| format!("read config file: {}", path.display()))?;
    match toml::from_str::<FileConfig>(&s) {
        Ok(cfg) => {
            info!(path = %path.display(), "loaded config file");
            Ok(Some(cfg))
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e.to_string(), "parse config failed");
            Ok(None)
        }
    }
}

/// Global configuration: the first readable, parseable candidate wins.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    use std::env;

    fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
        let mut v = Vec::new();
        if let Some(p) = explicit {
            v.push(p.to_path_buf());
        }
        if let Ok(p) = env::var("SHOPMUX_CONFIG") {
            v.push(PathBuf::from(p));
        }
        if let Ok(xdg_home) = env::var("XDG_CONFIG_HOME") {
            v.push(Path::new(&xdg_home).join("shopmux/config.toml"));
        } else if let Ok(home) = env::var("HOME") {
            v.push(Path::new(&home).join(".config/shopmux/config.toml"));
        }
        if let Ok(dirs) = env::var("XDG_CONFIG_DIRS") {
            for d in dirs.split(':') {
                if !d.is_empty() {
                    v.push(Path::new(d).join("shopmux/config.toml"));
                }
            }
        }
        v
    }

    for p in candidate_paths(explicit) {
        if p.exists()
            && let Some(cfg) = parse_config_file(&p)?
        {
            return Ok(cfg);
        }
    }
    Ok(FileConfig::default())
}

/// Load project-specific configuration from .shopmux/config.toml
pub fn load_project_config(project_root: &Path) -> Result<FileConfig> {
    let project_config_path = project_root.join(".shopmux").join("config.toml");
    if !project_config_path.exists() {
        return Ok(FileConfig::default());
    }
    Ok(parse_config_file(&project_config_path)?.unwrap_or_default())
}
