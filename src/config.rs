use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::confirmation::SubjectKind;

/// Main configuration structure for the attendance board
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AttendanceBoardConfig {
    /// Board behavior
    pub board: BoardConfig,
    /// Dialog host settings
    pub dialog: DialogConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Group-by field whose changes require the check in/out wizard
    pub state_field: String,
    /// Entity type shown on the board
    pub subject: SubjectKind,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DialogConfig {
    /// Dialogs that may wait for the host at once
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level, overridden by RUST_LOG
    pub log_level: String,
    /// Structured JSON output instead of plain text
    pub json_logs: bool,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            state_field: "attendance_type_id".to_string(),
            subject: SubjectKind::Employee,
        }
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: true,
        }
    }
}

impl AttendanceBoardConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (attendance-board.toml)
    /// 3. Environment variables (prefixed with ATTENDANCE_BOARD, `__` between sections)
    pub fn load() -> Result<Self> {
        Self::load_from("attendance-board.toml")
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut builder = Config::builder();

        let path = path.as_ref();
        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("ATTENDANCE_BOARD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<AttendanceBoardConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = AttendanceBoardConfig::load_env_file();
        AttendanceBoardConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static AttendanceBoardConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let _config = config()?;
    tracing::info!("Configuration loaded successfully");
    Ok(())
}
