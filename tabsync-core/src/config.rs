//! Sync configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.tabsync/
//!   config.yaml      (mode 0600; JSON is accepted too, being a YAML subset)
//! ```
//!
//! # API pattern
//!
//! As with every path-bound helper in this workspace:
//! - `fn_at(home: &Path, …)` takes an explicit home; tests use `TempDir`
//! - `fn(…)` derives home from `dirs::home_dir()` and delegates to `_at`
//!
//! A [`SyncConfig`] is immutable once loaded and is passed explicitly into
//! every sync entry point. Nothing downstream reads the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_IDENTIFIER_COLUMN: &str = "Notion Page ID";
pub const DEFAULT_NOTION_API_BASE: &str = "https://api.notion.com";
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com";
pub const DEFAULT_SHEET_NAME: &str = "Sheet1";
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Structured-store (Notion) connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub database_id: String,
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
    #[serde(default = "default_notion_version")]
    pub version: String,
}

/// Spreadsheet (Google Sheets) connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub spreadsheet_id: String,
    /// Bearer token with the spreadsheets scope.
    #[serde(default)]
    pub access_token: String,
    #[serde(default = "default_sheet_name")]
    pub sheet_name: String,
    #[serde(default = "default_sheets_api_base")]
    pub api_base: String,
}

/// Retry bounds for transient remote failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Root of the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub notion: NotionConfig,
    pub google_sheets: SheetsConfig,
    #[serde(default = "default_identifier_column")]
    pub identifier_column: String,
    /// Minimum delay between two remote calls, in milliseconds.
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Reject missing or out-of-range values. Called by every loader, so a
    /// `SyncConfig` obtained from [`load_at`] is always valid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require(&self.notion.api_key, "notion.api_key")?;
        require(&self.notion.database_id, "notion.database_id")?;
        require(&self.google_sheets.spreadsheet_id, "google_sheets.spreadsheet_id")?;
        require(&self.google_sheets.access_token, "google_sheets.access_token")?;
        require(&self.google_sheets.sheet_name, "google_sheets.sheet_name")?;
        require(&self.identifier_column, "identifier_column")?;

        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_attempts",
                message: format!(
                    "must be between 1 and {MAX_RETRY_ATTEMPTS}, got {}",
                    self.retry.max_attempts
                ),
            });
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::InvalidValue {
                key: "retry.max_backoff_ms",
                message: "must not be smaller than retry.initial_backoff_ms".to_string(),
            });
        }
        Ok(())
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    /// Parse and validate a config document.
    pub fn from_yaml_str(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: SyncConfig =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }
}

fn require(value: &str, key: &'static str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingKey(key))
    } else {
        Ok(())
    }
}

fn default_notion_api_base() -> String {
    DEFAULT_NOTION_API_BASE.to_string()
}
fn default_notion_version() -> String {
    DEFAULT_NOTION_VERSION.to_string()
}
fn default_sheet_name() -> String {
    DEFAULT_SHEET_NAME.to_string()
}
fn default_sheets_api_base() -> String {
    DEFAULT_SHEETS_API_BASE.to_string()
}
fn default_identifier_column() -> String {
    DEFAULT_IDENTIFIER_COLUMN.to_string()
}
fn default_rate_limit_delay_ms() -> u64 {
    100
}
fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.tabsync/`
pub fn tabsync_root(home: &Path) -> PathBuf {
    home.join(".tabsync")
}

/// `<home>/.tabsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    tabsync_root(home).join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load and validate the config file at `path`.
///
/// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` (with the
/// path) if malformed, `ConfigError::MissingKey` if a required key is blank.
pub fn load_from(path: &Path) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    SyncConfig::from_yaml_str(&contents, path)
}

/// Load `<home>/.tabsync/config.yaml`.
pub fn load_at(home: &Path) -> Result<SyncConfig, ConfigError> {
    load_from(&config_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<SyncConfig, ConfigError> {
    load_at(&home_dir()?)
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

const TEMPLATE: &str = r#"# tabsync configuration
notion:
  api_key: ""            # integration secret
  database_id: ""
google_sheets:
  spreadsheet_id: ""
  access_token: ""       # OAuth bearer token with the spreadsheets scope
  sheet_name: Sheet1
identifier_column: Notion Page ID
rate_limit_delay_ms: 100
retry:
  max_attempts: 3
  initial_backoff_ms: 500
  max_backoff_ms: 8000
"#;

/// Write a config template to `<home>/.tabsync/config.yaml`.
///
/// Idempotent: an existing file is never overwritten. Returns the path and
/// whether a new file was written.
pub fn write_template_at(home: &Path) -> Result<(PathBuf, bool), ConfigError> {
    let path = config_path_at(home);
    if path.exists() {
        return Ok((path, false));
    }
    let io = |source| ConfigError::Io {
        path: path.clone(),
        source,
    };
    let dir = tabsync_root(home);
    std::fs::create_dir_all(&dir).map_err(io)?;

    let tmp = dir.join("config.yaml.tmp");
    std::fs::write(&tmp, TEMPLATE).map_err(io)?;
    set_file_permissions(&tmp).map_err(io)?;
    std::fs::rename(&tmp, &path).map_err(io)?;
    Ok((path, true))
}

/// `write_template_at` convenience wrapper.
pub fn write_template() -> Result<(PathBuf, bool), ConfigError> {
    write_template_at(&home_dir()?)
}

/// The current user's home directory.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
notion:
  api_key: secret_abc
  database_id: db123
google_sheets:
  spreadsheet_id: sheet456
  access_token: ya29.token
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = SyncConfig::from_yaml_str(MINIMAL, Path::new("config.yaml")).unwrap();
        assert_eq!(config.identifier_column, "Notion Page ID");
        assert_eq!(config.rate_limit_delay(), Duration::from_millis(100));
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.google_sheets.sheet_name, "Sheet1");
        assert_eq!(config.notion.version, DEFAULT_NOTION_VERSION);
    }

    #[test]
    fn json_documents_are_accepted() {
        let json = r#"{
            "notion": {"api_key": "k", "database_id": "d"},
            "google_sheets": {"spreadsheet_id": "s", "access_token": "t"},
            "identifier_column": "Page",
            "rate_limit_delay_ms": 0
        }"#;
        let config = SyncConfig::from_yaml_str(json, Path::new("config.json")).unwrap();
        assert_eq!(config.identifier_column, "Page");
        assert_eq!(config.rate_limit_delay_ms, 0);
    }

    #[test]
    fn blank_identifier_column_is_missing_key() {
        let yaml = format!("{MINIMAL}identifier_column: \"  \"\n");
        let err = SyncConfig::from_yaml_str(&yaml, Path::new("c.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey("identifier_column")), "got: {err}");
    }

    #[test]
    fn retry_attempts_are_bounded() {
        let yaml = format!("{MINIMAL}retry:\n  max_attempts: 9\n");
        let err = SyncConfig::from_yaml_str(&yaml, Path::new("c.yaml")).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "retry.max_attempts",
                ..
            }
        ));
    }

    #[test]
    fn config_path_is_pure() {
        let path = config_path_at(Path::new("/home/u"));
        assert_eq!(path, PathBuf::from("/home/u/.tabsync/config.yaml"));
    }
}
