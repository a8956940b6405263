// LogTally - platform/config.rs
//
// Platform data directory resolution and config.toml loading with
// startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::platform::fs::InputConfig;
use crate::store::StoreConfig;
use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved platform paths for LogTally data and configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logtally/ or %APPDATA%\LogTally\config\)
    pub config_dir: PathBuf,

    /// Data directory holding the default database.
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            let data_dir = proj_dirs.data_dir().to_path_buf();

            tracing::debug!(
                config = %config_dir.display(),
                data = %data_dir.display(),
                "Platform paths resolved"
            );

            Self {
                config_dir,
                data_dir,
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                config_dir: fallback.clone(),
                data_dir: fallback,
            }
        }
    }

    /// Location of the implicit config file.
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }

    /// Database used when neither `--database` nor `[database] path` is set.
    pub fn default_database(&self) -> PathBuf {
        self.data_dir.join(constants::DATABASE_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored for forward compatibility.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    /// `[database]` section.
    pub database: DatabaseSection,
    /// `[ingest]` section.
    pub ingest: IngestSection,
    /// `[logging]` section.
    pub logging: LoggingSection,
}

/// `[database]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Database file path.
    pub path: Option<String>,
    /// SQLite busy timeout in ms.
    pub busy_timeout_ms: Option<u64>,
}

/// `[ingest]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct IngestSection {
    /// Number of worker threads (0 = auto).
    pub worker_threads: Option<usize>,
    /// Include glob patterns for directory inputs.
    pub include_patterns: Option<Vec<String>>,
    /// Maximum directory recursion depth.
    pub max_depth: Option<usize>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce actionable warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Database --
    /// Database path from the config file, if set.
    pub database_path: Option<PathBuf>,
    /// SQLite busy timeout in ms.
    pub busy_timeout_ms: u64,

    // -- Ingest --
    /// Ingest worker threads (0 = auto).
    pub worker_threads: usize,
    /// Include globs for files inside input directories.
    pub include_patterns: Vec<String>,
    /// Maximum directory recursion depth.
    pub max_depth: usize,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let input = InputConfig::default();
        Self {
            database_path: None,
            busy_timeout_ms: constants::DEFAULT_BUSY_TIMEOUT_MS,
            worker_threads: constants::DEFAULT_WORKER_THREADS,
            include_patterns: input.include_patterns,
            max_depth: input.max_depth,
            log_level: None,
        }
    }
}

impl AppConfig {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    pub fn input_config(&self) -> InputConfig {
        InputConfig {
            include_patterns: self.include_patterns.clone(),
            max_depth: self.max_depth,
        }
    }
}

/// Load and validate the config file at `config_path`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
///
/// When `explicit` is false (the implicit platform config), a missing file
/// yields defaults and an unreadable or unparseable file yields defaults
/// plus a warning. When `explicit` is true (`--config`), both are errors.
pub fn load_config(
    config_path: &Path,
    explicit: bool,
) -> Result<(AppConfig, Vec<String>), ConfigError> {
    let mut warnings: Vec<String> = Vec::new();

    if !explicit && !config_path.exists() {
        return Ok((AppConfig::default(), warnings));
    }

    let content = match std::fs::read_to_string(config_path) {
        Ok(c) => c,
        Err(source) if explicit => {
            return Err(ConfigError::Io {
                path: config_path.to_path_buf(),
                source,
            })
        }
        Err(e) => {
            warnings.push(format!(
                "Could not read config file '{}': {e}. Using defaults.",
                config_path.display()
            ));
            return Ok((AppConfig::default(), warnings));
        }
    };

    let raw: RawConfig = match toml::from_str(&content) {
        Ok(r) => r,
        Err(source) if explicit => {
            return Err(ConfigError::TomlParse {
                path: config_path.to_path_buf(),
                source,
            })
        }
        Err(e) => {
            warnings.push(format!(
                "Failed to parse config file '{}': {e}. Using defaults.",
                config_path.display()
            ));
            return Ok((AppConfig::default(), warnings));
        }
    };

    let config = validate(raw, config_path, &mut warnings);
    Ok((config, warnings))
}

/// Validate each field against named constants, accumulating all warnings.
fn validate(raw: RawConfig, config_path: &Path, warnings: &mut Vec<String>) -> AppConfig {
    let mut config = AppConfig::default();

    // -- Database: path --
    // Relative paths are taken relative to the config file's directory.
    if let Some(path) = raw.database.path.filter(|p| !p.trim().is_empty()) {
        let path = PathBuf::from(path);
        config.database_path = Some(match config_path.parent() {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        });
    }

    // -- Database: busy_timeout_ms --
    if let Some(ms) = raw.database.busy_timeout_ms {
        if (constants::MIN_BUSY_TIMEOUT_MS..=constants::MAX_BUSY_TIMEOUT_MS).contains(&ms) {
            config.busy_timeout_ms = ms;
        } else {
            warnings.push(format!(
                "[database] busy_timeout_ms = {ms} is out of range ({}-{}). Using default ({}).",
                constants::MIN_BUSY_TIMEOUT_MS,
                constants::MAX_BUSY_TIMEOUT_MS,
                constants::DEFAULT_BUSY_TIMEOUT_MS,
            ));
        }
    }

    // -- Ingest: worker_threads --
    if let Some(threads) = raw.ingest.worker_threads {
        if threads <= constants::MAX_WORKER_THREADS {
            config.worker_threads = threads;
        } else {
            warnings.push(format!(
                "[ingest] worker_threads = {threads} is out of range (0-{}). Using default (auto).",
                constants::MAX_WORKER_THREADS,
            ));
        }
    }

    // -- Ingest: include_patterns --
    if let Some(patterns) = raw.ingest.include_patterns {
        let (valid, invalid): (Vec<String>, Vec<String>) = patterns
            .into_iter()
            .partition(|p| glob::Pattern::new(p).is_ok());
        for pattern in &invalid {
            warnings.push(format!(
                "[ingest] include_patterns entry \"{pattern}\" is not a valid glob. Ignoring it."
            ));
        }
        config.include_patterns = valid;
    }

    // -- Ingest: max_depth --
    if let Some(depth) = raw.ingest.max_depth {
        if (1..=constants::ABSOLUTE_MAX_DEPTH).contains(&depth) {
            config.max_depth = depth;
        } else {
            warnings.push(format!(
                "[ingest] max_depth = {depth} is out of range (1-{}). Using default ({}).",
                constants::ABSOLUTE_MAX_DEPTH,
                constants::DEFAULT_MAX_DEPTH,
            ));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(format!(
                "[logging] level = \"{level}\" is not recognised. \
                 Valid values: error, warn, info, debug, trace. Using default ({}).",
                constants::DEFAULT_LOG_LEVEL,
            ));
        }
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join(constants::CONFIG_FILE_NAME);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_missing_implicit_config_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) =
            load_config(&dir.path().join("absent.toml"), false).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.busy_timeout_ms, constants::DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(config.worker_threads, constants::DEFAULT_WORKER_THREADS);
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_missing_explicit_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(&dir.path().join("absent.toml"), true);
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[database\npath = ");

        let (config, warnings) = load_config(&path, false).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(config.database_path.is_none());

        assert!(matches!(
            load_config(&path, true),
            Err(ConfigError::TomlParse { .. })
        ));
    }

    #[test]
    fn test_valid_values_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[database]
path = "data/tally.db"
busy_timeout_ms = 2000

[ingest]
worker_threads = 4
include_patterns = ["*.access"]
max_depth = 3

[logging]
level = "DEBUG"
"#,
        );
        let (config, warnings) = load_config(&path, true).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(
            config.database_path,
            Some(dir.path().join("data/tally.db"))
        );
        assert_eq!(config.busy_timeout_ms, 2000);
        assert_eq!(config.worker_threads, 4);
        assert_eq!(config.include_patterns, vec!["*.access".to_string()]);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.store_config().busy_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_out_of_range_values_warn_and_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            r#"
[database]
busy_timeout_ms = 1

[ingest]
worker_threads = 1000
include_patterns = ["*.log", "[unclosed"]
max_depth = 0

[logging]
level = "loud"
"#,
        );
        let (config, warnings) = load_config(&path, true).unwrap();
        assert_eq!(warnings.len(), 5, "{warnings:?}");
        assert_eq!(config.busy_timeout_ms, constants::DEFAULT_BUSY_TIMEOUT_MS);
        assert_eq!(config.worker_threads, constants::DEFAULT_WORKER_THREADS);
        assert_eq!(config.include_patterns, vec!["*.log".to_string()]);
        assert_eq!(config.max_depth, constants::DEFAULT_MAX_DEPTH);
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[future]\nkey = 1\n[logging]\nlevel = \"warn\"\n");
        let (config, warnings) = load_config(&path, true).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(config.log_level.as_deref(), Some("warn"));
    }
}
