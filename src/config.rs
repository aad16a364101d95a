//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MBOXSPLIT_CONFIG` (environment variable)
//! 2. `~/.config/mboxsplit/config.toml` (Linux/macOS)
//!    `%APPDATA%\mboxsplit\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags take precedence over anything loaded here.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::parser::mbox::DEFAULT_READ_BUFFER_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Where and how output mailboxes are written.
    pub split: SplitConfig,
    /// Console output.
    pub display: DisplayConfig,
    /// Performance tuning.
    pub performance: PerformanceConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override directory for the log file.
    pub log_dir: Option<PathBuf>,
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Directory receiving the `mail-YYMM` files.
    pub output_dir: PathBuf,
    /// Create the output directory when it does not exist.
    pub create_output_dir: bool,
    /// How output files are opened: "reopen" or "held".
    pub write_mode: WriteMode,
    /// Upper bound on simultaneously open output files in "held" mode.
    pub max_open_files: usize,
}

/// Console output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Progress style: "lines", "bar" or "none".
    pub progress: ProgressMode,
}

/// Performance tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Read buffer size in bytes (default: 1048576 = 1 MB).
    pub read_buffer_size: usize,
}

/// Strategy for appending to output files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Open, append and close the file for every message.
    #[default]
    Reopen,
    /// Keep a buffered writer per destination open for the whole run.
    Held,
}

/// How progress is shown while splitting.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ProgressMode {
    /// One `"<n> mails"` line per message on stdout.
    #[default]
    Lines,
    /// A byte progress bar on stderr.
    Bar,
    /// No progress output.
    #[serde(rename = "none")]
    #[value(name = "none")]
    Silent,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("split"),
            create_output_dir: true,
            write_mode: WriteMode::Reopen,
            max_open_files: 64,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            progress: ProgressMode::Lines,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) if path.exists() => load_config_from(&path),
        _ => Config::default(),
    }
}

/// Load configuration from a specific file, falling back to defaults.
pub fn load_config_from(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MBOXSPLIT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mboxsplit").join("config.toml"))
}

/// Return the directory the log file is written to.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mboxsplit")
}
