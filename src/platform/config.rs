// LogPilot - platform/config.rs
//
// Platform-specific configuration directory resolution and config.toml
// loading with startup validation.
//
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance.

use crate::util::constants;
use crate::util::error::ConfigError;
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolved platform paths for LogPilot configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Configuration directory (e.g. ~/.config/logpilot/ or %APPDATA%\LogPilot\config\)
    pub config_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// Falls back to the current directory if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            let config_dir = proj_dirs.config_dir().to_path_buf();
            tracing::debug!(config = %config_dir.display(), "Platform paths resolved");
            Self { config_dir }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            Self {
                config_dir: PathBuf::from("."),
            }
        }
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(constants::CONFIG_FILE_NAME)
    }
}

// =============================================================================
// config.toml loading and validation
// =============================================================================

/// Raw deserialisable shape of config.toml.
///
/// Unknown keys are silently ignored so a newer config file still loads in
/// an older binary.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct RawConfig {
    pub server: ServerSection,
    pub session: SessionSection,
    pub ui: UiSection,
    pub logging: LoggingSection,
}

/// `[server]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Log server base URL, e.g. `http://logs.internal:9995`.
    pub base_url: Option<String>,
    /// Host directory request timeout in milliseconds.
    pub request_timeout_ms: Option<u64>,
}

/// `[session]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Exclusive upper bound for drawn client identities.
    pub client_id_max: Option<u32>,
    /// Records kept per host panel before the oldest are dropped.
    pub max_records_per_host: Option<usize>,
}

/// `[ui]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct UiSection {
    /// Theme: "dark" or "light".
    pub theme: Option<String>,
    /// Body font size in points.
    pub font_size: Option<f32>,
}

/// `[logging]` config section.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub level: Option<String>,
    /// Log file path (empty = stderr only).
    pub file: Option<String>,
}

/// Validated application configuration derived from `config.toml`.
///
/// Invalid values produce warnings and fall back to defaults.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // -- Server --
    pub server_url: String,
    pub request_timeout: Duration,

    // -- Session --
    pub client_id_max: u32,
    pub max_records_per_host: usize,

    // -- UI --
    /// Dark mode (true) or light mode (false).
    pub dark_mode: bool,
    /// Body font size in points.
    pub font_size: f32,

    // -- Logging --
    /// Logging level string (for init before tracing is available).
    pub log_level: Option<String>,
    pub log_file: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: constants::DEFAULT_SERVER_URL.to_string(),
            request_timeout: Duration::from_millis(constants::DEFAULT_REQUEST_TIMEOUT_MS),
            client_id_max: constants::DEFAULT_CLIENT_ID_MAX,
            max_records_per_host: constants::DEFAULT_MAX_RECORDS_PER_HOST,
            dark_mode: true,
            font_size: constants::DEFAULT_FONT_SIZE,
            log_level: None,
            log_file: None,
        }
    }
}

fn out_of_range(field: &str, value: impl ToString, expected: String) -> String {
    let e = ConfigError::ValueOutOfRange {
        field: field.to_string(),
        value: value.to_string(),
        expected,
    };
    format!("{e}. Using default.")
}

/// Load and validate `config.toml` from `config_dir`.
///
/// Returns `AppConfig` with validated values and a list of non-fatal warnings.
/// A missing file yields defaults with no warnings (first run). An
/// unreadable or unparseable file yields defaults and one warning.
pub fn load_config(config_dir: &Path) -> (AppConfig, Vec<String>) {
    let config_path = config_dir.join(constants::CONFIG_FILE_NAME);
    let mut warnings: Vec<String> = Vec::new();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "No config.toml found; using defaults");
        return (AppConfig::default(), warnings);
    }

    let content = match std::fs::read_to_string(&config_path) {
        Ok(c) => c,
        Err(source) => {
            let e = ConfigError::Io {
                path: config_path.clone(),
                source,
            };
            tracing::warn!(error = %e, "Config unreadable");
            warnings.push(format!("{e}. Using defaults."));
            return (AppConfig::default(), warnings);
        }
    };

    let raw: RawConfig = match toml::from_str(&content) {
        Ok(r) => r,
        Err(source) => {
            let e = ConfigError::TomlParse {
                path: config_path.clone(),
                source,
            };
            tracing::warn!(error = %e, "Config unparseable");
            warnings.push(format!("{e}. Using defaults."));
            return (AppConfig::default(), warnings);
        }
    };

    tracing::info!(path = %config_path.display(), "Loaded config.toml");

    let mut config = AppConfig::default();

    // -- Server: base_url --
    if let Some(ref url) = raw.server.base_url {
        let url = url.trim();
        if url.starts_with("http://") || url.starts_with("https://") {
            config.server_url = url.to_string();
        } else {
            warnings.push(out_of_range(
                "server.base_url",
                url,
                "an http:// or https:// URL".to_string(),
            ));
        }
    }

    // -- Server: request_timeout_ms --
    if let Some(ms) = raw.server.request_timeout_ms {
        if (constants::MIN_REQUEST_TIMEOUT_MS..=constants::MAX_REQUEST_TIMEOUT_MS).contains(&ms) {
            config.request_timeout = Duration::from_millis(ms);
        } else {
            warnings.push(out_of_range(
                "server.request_timeout_ms",
                ms,
                format!(
                    "{}-{}",
                    constants::MIN_REQUEST_TIMEOUT_MS,
                    constants::MAX_REQUEST_TIMEOUT_MS
                ),
            ));
        }
    }

    // -- Session: client_id_max --
    if let Some(max) = raw.session.client_id_max {
        if (constants::MIN_CLIENT_ID_MAX..=constants::ABSOLUTE_MAX_CLIENT_ID_MAX).contains(&max) {
            config.client_id_max = max;
        } else {
            warnings.push(out_of_range(
                "session.client_id_max",
                max,
                format!(
                    "{}-{}",
                    constants::MIN_CLIENT_ID_MAX,
                    constants::ABSOLUTE_MAX_CLIENT_ID_MAX
                ),
            ));
        }
    }

    // -- Session: max_records_per_host --
    if let Some(n) = raw.session.max_records_per_host {
        if (constants::MIN_MAX_RECORDS_PER_HOST..=constants::ABSOLUTE_MAX_RECORDS_PER_HOST)
            .contains(&n)
        {
            config.max_records_per_host = n;
        } else {
            warnings.push(out_of_range(
                "session.max_records_per_host",
                n,
                format!(
                    "{}-{}",
                    constants::MIN_MAX_RECORDS_PER_HOST,
                    constants::ABSOLUTE_MAX_RECORDS_PER_HOST
                ),
            ));
        }
    }

    // -- UI: theme --
    if let Some(ref theme) = raw.ui.theme {
        match theme.to_lowercase().as_str() {
            "dark" => config.dark_mode = true,
            "light" => config.dark_mode = false,
            other => warnings.push(out_of_range(
                "ui.theme",
                other,
                "\"dark\" or \"light\"".to_string(),
            )),
        }
    }

    // -- UI: font_size --
    if let Some(size) = raw.ui.font_size {
        if (constants::MIN_FONT_SIZE..=constants::MAX_FONT_SIZE).contains(&size) {
            config.font_size = size;
        } else {
            warnings.push(out_of_range(
                "ui.font_size",
                size,
                format!("{}-{}", constants::MIN_FONT_SIZE, constants::MAX_FONT_SIZE),
            ));
        }
    }

    // -- Logging: level --
    if let Some(ref level) = raw.logging.level {
        let valid = ["error", "warn", "info", "debug", "trace"];
        if valid.contains(&level.to_lowercase().as_str()) {
            config.log_level = Some(level.to_lowercase());
        } else {
            warnings.push(out_of_range(
                "logging.level",
                level,
                "error, warn, info, debug or trace".to_string(),
            ));
        }
    }

    // -- Logging: file --
    if let Some(ref file) = raw.logging.file {
        if !file.is_empty() {
            config.log_file = Some(file.clone());
        }
    }

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), "Config validation produced warnings");
    }

    (config, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(dir: &Path, body: &str) {
        std::fs::write(dir.join(constants::CONFIG_FILE_NAME), body).unwrap();
    }

    #[test]
    fn test_missing_file_gives_defaults_without_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let (config, warnings) = load_config(dir.path());
        assert!(warnings.is_empty());
        assert_eq!(config.server_url, constants::DEFAULT_SERVER_URL);
        assert_eq!(config.client_id_max, constants::DEFAULT_CLIENT_ID_MAX);
        assert_eq!(
            config.request_timeout,
            Duration::from_millis(constants::DEFAULT_REQUEST_TIMEOUT_MS)
        );
    }

    #[test]
    fn test_valid_values_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
[server]
base_url = "https://logs.example.net"
request_timeout_ms = 2000

[session]
client_id_max = 50000
max_records_per_host = 1000

[ui]
theme = "light"
font_size = 16.0

[logging]
level = "DEBUG"
file = "/tmp/logpilot.log"
"#,
        );
        let (config, warnings) = load_config(dir.path());
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(config.server_url, "https://logs.example.net");
        assert_eq!(config.request_timeout, Duration::from_millis(2000));
        assert_eq!(config.client_id_max, 50_000);
        assert_eq!(config.max_records_per_host, 1000);
        assert!(!config.dark_mode);
        assert_eq!(config.font_size, 16.0);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.log_file.as_deref(), Some("/tmp/logpilot.log"));
    }

    #[test]
    fn test_out_of_range_values_fall_back_with_warnings() {
        let dir = tempfile::tempdir().unwrap();
        write_config(
            dir.path(),
            r#"
[server]
base_url = "logs.example.net"
request_timeout_ms = 1

[session]
client_id_max = 5

[ui]
theme = "neon"
"#,
        );
        let (config, warnings) = load_config(dir.path());
        assert_eq!(warnings.len(), 4);
        assert!(warnings[0].contains("server.base_url"));
        assert_eq!(config.server_url, constants::DEFAULT_SERVER_URL);
        assert_eq!(config.client_id_max, constants::DEFAULT_CLIENT_ID_MAX);
        assert!(config.dark_mode);
    }

    #[test]
    fn test_unparseable_file_gives_defaults_and_one_warning() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[server\nbase_url = ");
        let (config, warnings) = load_config(dir.path());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("parse error"));
        assert_eq!(config.max_records_per_host, constants::DEFAULT_MAX_RECORDS_PER_HOST);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        write_config(dir.path(), "[future]\nflag = true\n");
        let (_, warnings) = load_config(dir.path());
        assert!(warnings.is_empty());
    }
}
