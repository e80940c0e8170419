//! Configuration loading, root folder and API key resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Environment variable naming the gymdex root folder
pub const ROOT_FOLDER_ENV: &str = "GYMDEX_ROOT_FOLDER";

/// Environment variable carrying the public-data API key
pub const DATA_API_KEY_ENV: &str = "GYMDEX_DATA_API_KEY";

/// Contents of `gymdex.toml`
///
/// Unknown sections are ignored so other crates can park their own tables
/// (e.g. `[harvest]`) in the same file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root data folder override
    pub root_folder: Option<String>,
    /// Logging section
    #[serde(default)]
    pub logging: LoggingConfig,
    /// External data source credentials
    #[serde(default)]
    pub sources: SourcesConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter directive, e.g. "info" or "gymdex_harvest=debug"
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// External data source credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// API key for the keyed public dataset endpoint
    pub data_api_key: Option<String>,
}

impl TomlConfig {
    /// Load from an explicit path
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Load from the default platform location, falling back to defaults
    /// when no config file exists
    pub fn load_default() -> Self {
        match config_file_path() {
            Ok(path) => match Self::load(&path) {
                Ok(config) => {
                    info!(path = %path.display(), "Loaded gymdex.toml");
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load gymdex.toml, using defaults");
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }
}

/// Get the configuration file path for the platform
pub fn config_file_path() -> Result<PathBuf> {
    if cfg!(target_os = "linux") {
        // Try ~/.config/gymdex/gymdex.toml first, then /etc/gymdex/gymdex.toml
        let user_config = dirs::config_dir().map(|d| d.join("gymdex").join("gymdex.toml"));
        let system_config = PathBuf::from("/etc/gymdex/gymdex.toml");

        if let Some(path) = user_config {
            if path.exists() {
                return Ok(path);
            }
        }
        if system_config.exists() {
            return Ok(system_config);
        }
        Err(Error::Config("No config file found".to_string()))
    } else {
        let path = dirs::config_dir()
            .map(|d| d.join("gymdex").join("gymdex.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if path.exists() {
            Ok(path)
        } else {
            Err(Error::Config(format!("Config file not found: {:?}", path)))
        }
    }
}

/// Root folder resolution priority order:
/// 1. Environment variable (highest priority)
/// 2. TOML config file
/// 3. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(toml_config: &TomlConfig) -> PathBuf {
    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        return PathBuf::from(path);
    }

    if let Some(root_folder) = &toml_config.root_folder {
        return PathBuf::from(root_folder);
    }

    default_root_folder()
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("gymdex"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/gymdex"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("gymdex"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/gymdex"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("gymdex"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\gymdex"))
    } else {
        PathBuf::from("./gymdex_data")
    }
}

/// Resolve the public-data API key
///
/// **Priority:** ENV → TOML. Returns None when no valid key is configured;
/// the public-data adapter then degrades to "skipped" instead of failing
/// the run.
pub fn resolve_data_api_key(toml_config: &TomlConfig) -> Option<String> {
    let mut sources = Vec::new();

    let env_key = std::env::var(DATA_API_KEY_ENV).ok();
    if let Some(key) = &env_key {
        if is_valid_key(key) {
            sources.push("environment");
        }
    }

    let toml_key = toml_config.sources.data_api_key.as_ref();
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            sources.push("TOML");
        }
    }

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "Public-data API key found in multiple sources: {}. Using environment (highest priority).",
            sources.join(", ")
        );
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("Public-data API key loaded from environment");
            return Some(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("Public-data API key loaded from TOML config");
            return Some(key.clone());
        }
    }

    warn!(
        "Public-data API key not configured. Set {} or sources.data_api_key in gymdex.toml; \
         the public dataset source will be skipped.",
        DATA_API_KEY_ENV
    );
    None
}

/// Validate an API key (non-empty, non-whitespace, not a placeholder)
pub fn is_valid_key(key: &str) -> bool {
    let trimmed = key.trim();
    !trimmed.is_empty() && trimmed != "YOUR_API_KEY"
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc123"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
        assert!(!is_valid_key("YOUR_API_KEY"));
    }

    #[test]
    fn test_toml_config_parses_sources_section() {
        let toml = r#"
            root_folder = "/tmp/gymdex"

            [logging]
            level = "debug"

            [sources]
            data_api_key = "seoul-open-data-key"
        "#;
        let config: TomlConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.root_folder.as_deref(), Some("/tmp/gymdex"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.sources.data_api_key.as_deref(),
            Some("seoul-open-data-key")
        );
    }

    #[test]
    fn test_toml_config_defaults_for_missing_sections() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert!(config.root_folder.is_none());
        assert_eq!(config.logging.level, "info");
        assert!(config.sources.data_api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_resolve_data_api_key_env_wins_over_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            [sources]
            data_api_key = "from-toml"
        "#,
        )
        .unwrap();

        std::env::set_var(DATA_API_KEY_ENV, "from-env");
        let key = resolve_data_api_key(&config);
        std::env::remove_var(DATA_API_KEY_ENV);

        assert_eq!(key.as_deref(), Some("from-env"));
    }

    #[test]
    #[serial]
    fn test_resolve_data_api_key_missing_everywhere() {
        std::env::remove_var(DATA_API_KEY_ENV);
        let key = resolve_data_api_key(&TomlConfig::default());
        assert!(key.is_none());
    }

    #[test]
    #[serial]
    fn test_resolve_root_folder_env_priority() {
        std::env::set_var(ROOT_FOLDER_ENV, "/tmp/gymdex-test-root");
        let root = resolve_root_folder(&TomlConfig::default());
        std::env::remove_var(ROOT_FOLDER_ENV);

        assert_eq!(root, PathBuf::from("/tmp/gymdex-test-root"));
    }

    #[test]
    #[serial]
    fn test_resolve_root_folder_toml_fallback() {
        std::env::remove_var(ROOT_FOLDER_ENV);
        let config: TomlConfig = toml::from_str(r#"root_folder = "/srv/gymdex""#).unwrap();
        let root = resolve_root_folder(&config);
        assert_eq!(root, PathBuf::from("/srv/gymdex"));
    }
}
