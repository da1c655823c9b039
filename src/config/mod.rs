use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub attendance: AttendanceConfig,
    #[serde(default)]
    pub scheduling: SchedulingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Browser origins allowed to call the API; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_admin_token")]
    pub admin_token: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_token: default_admin_token(),
        }
    }
}

fn default_admin_token() -> String {
    // Generate a random token if not provided
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceConfig {
    /// Minutes between clock-in and clock-out that count as a full day.
    /// Anything shorter (with both punches recorded) is a half day.
    #[serde(default = "default_full_day_minutes")]
    pub full_day_minutes: i64,
}

impl Default for AttendanceConfig {
    fn default() -> Self {
        Self {
            full_day_minutes: default_full_day_minutes(),
        }
    }
}

fn default_full_day_minutes() -> i64 {
    480
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulingConfig {
    /// Longest inclusive date span a plan may cover
    #[serde(default = "default_max_plan_days")]
    pub max_plan_days: i64,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            max_plan_days: default_max_plan_days(),
        }
    }
}

fn default_max_plan_days() -> i64 {
    366
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).with_context(|| "Failed to parse configuration file")?;
        if config.attendance.full_day_minutes <= 0 {
            anyhow::bail!("attendance.full_day_minutes must be positive");
        }
        if config.scheduling.max_plan_days <= 0 {
            anyhow::bail!("scheduling.max_plan_days must be positive");
        }
        Ok(config)
    }

    pub fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
            attendance: AttendanceConfig::default(),
            scheduling: SchedulingConfig::default(),
        }
    }
}
