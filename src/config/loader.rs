//! Configuration Loader
//!
//! Finds the YAML file, parses it, applies environment overrides, and
//! validates the result before anything else runs.

use super::error::{ConfigResult, ConfigurationError};
use super::BotConfig;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the configuration file
pub const CONFIG_PATH_ENV: &str = "REDACTION_BOT_CONFIG";

/// Environment variable overriding `api.token`
pub const API_TOKEN_ENV: &str = "REDACTION_BOT_API_TOKEN";

pub const DEFAULT_CONFIG_PATH: &str = "config/redaction-bot.yaml";

#[derive(Debug)]
pub struct ConfigManager {
    config: BotConfig,
    path: PathBuf,
}

impl ConfigManager {
    /// Load from an explicit path, else `$REDACTION_BOT_CONFIG`, else the default path
    pub fn load(explicit_path: Option<PathBuf>) -> ConfigResult<ConfigManager> {
        let path = explicit_path
            .or_else(|| env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from_path(&path)
    }

    pub fn load_from_path(path: &Path) -> ConfigResult<ConfigManager> {
        debug!("Loading configuration from: {}", path.display());

        let contents = Self::read_config_file_safely(path)?;
        let mut config: BotConfig = serde_yaml::from_str(&contents)
            .map_err(|e| ConfigurationError::parse_error(path.display().to_string(), e.to_string()))?;

        if let Ok(token) = env::var(API_TOKEN_ENV) {
            if !token.is_empty() {
                debug!("Using API token from {}", API_TOKEN_ENV);
                config.api.token = token;
            }
        }

        config.validate()?;

        let manager = ConfigManager {
            config,
            path: path.to_path_buf(),
        };

        debug!(path = %path.display(), "Configuration validated");
        Ok(manager)
    }

    /// Log the sanitized configuration. Call once the run log is set up,
    /// since loading happens before any subscriber exists.
    pub fn log_loaded(&self) {
        debug!(
            "Configuration loaded successfully: {}",
            serde_json::to_string_pretty(&self.debug_config())
                .unwrap_or_else(|_| "[serialization error]".to_string())
        );
        info!(
            path = %self.path.display(),
            api_site = %self.config.api.site,
            candidate_source = ?self.config.candidate_source,
            "Configuration loaded"
        );
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn into_config(self) -> BotConfig {
        self.config
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Configuration as JSON with credentials masked, for logging
    pub fn debug_config(&self) -> serde_json::Value {
        let mut value = serde_json::json!(self.config);
        sanitize_json_recursive(&mut value, &["password", "secret", "token", "url"]);
        value
    }

    fn read_config_file_safely(path: &Path) -> ConfigResult<String> {
        const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigurationError::FileNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(ConfigurationError::file_read_error(path.display().to_string(), e)),
        };

        if !metadata.is_file() {
            return Err(ConfigurationError::invalid_value(
                "config_path",
                path.display().to_string(),
                "configuration path must point to a regular file",
            ));
        }

        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                format!("configuration file larger than {MAX_CONFIG_FILE_SIZE} bytes"),
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }
}

/// Mask any string field whose key contains a sensitive pattern. Database
/// URLs count, since they may embed passwords.
fn sanitize_json_recursive(value: &mut serde_json::Value, sensitive_patterns: &[&str]) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key_lower = key.to_lowercase();
                let is_sensitive = sensitive_patterns
                    .iter()
                    .any(|pattern| key_lower.contains(pattern));

                if is_sensitive {
                    if let serde_json::Value::String(s) = val {
                        *val = if s.is_empty() {
                            serde_json::Value::String("[EMPTY]".to_string())
                        } else {
                            serde_json::Value::String("[MASKED]".to_string())
                        };
                    }
                } else {
                    sanitize_json_recursive(val, sensitive_patterns);
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                sanitize_json_recursive(item, sensitive_patterns);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl CapturedLog {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLog {
        type Writer = CapturedLog;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_from_path() {
        let file = write_config(
            r#"
tracker:
  url: postgres://tracker.internal/redactions
api:
  site: https://api.example.org
  token: abcdefgh
"#,
        );

        let manager = ConfigManager::load_from_path(file.path()).unwrap();
        assert_eq!(manager.config().tracker.url, "postgres://tracker.internal/redactions");
        assert_eq!(manager.path(), file.path());

        let sanitized = manager.debug_config();
        assert_eq!(sanitized["api"]["token"], "[MASKED]");
        assert_eq!(sanitized["tracker"]["url"], "[MASKED]");
        assert_eq!(sanitized["api"]["site"], "https://api.example.org");
    }

    #[test]
    fn test_log_loaded_reaches_subscriber_masked() {
        let file = write_config("api:\n  token: abcdefgh\n");
        let manager = ConfigManager::load_from_path(file.path()).unwrap();

        let log = CapturedLog::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(log.clone())
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, || manager.log_loaded());

        let output = log.contents();
        assert!(output.contains("Configuration loaded successfully"));
        assert!(output.contains("[MASKED]"));
        assert!(!output.contains("abcdefgh"));
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigManager::load_from_path(Path::new("/nonexistent/redaction-bot.yaml"))
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::FileNotFound { .. }));
    }

    #[test]
    fn test_invalid_yaml() {
        let file = write_config("limits: [not, a, map]");
        let err = ConfigManager::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::Parse { .. }));
    }

    #[test]
    fn test_validation_runs_on_load() {
        let file = write_config("limits:\n  max_changeset_elements: 0\n");
        let err = ConfigManager::load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ConfigManager::load_from_path(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { .. }));
    }
}
