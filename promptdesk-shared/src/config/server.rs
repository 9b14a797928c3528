use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::llm::{LlmConfig, PricingConfig};

/// Deployment profile. Selects the defaults a configuration starts from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Dev,
    Test,
    Prod,
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "dev" | "development" => Ok(Self::Dev),
            "test" => Ok(Self::Test),
            "prod" | "production" => Ok(Self::Prod),
            other => Err(ConfigError::InvalidEnv {
                name: "PROMPTDESK_PROFILE",
                value: other.to_string(),
            }),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::InvalidEnv {
                name: "PROMPTDESK_LOG_FORMAT",
                value: other.to_string(),
            }),
        }
    }
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unsupported configuration format for {0}; use yaml, json or toml")]
    UnsupportedFormat(PathBuf),
    #[error("failed to parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },
    #[error("failed to assemble configuration: {0}")]
    Assemble(#[from] serde_json::Error),
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// HTTP listener settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Header carrying the per-request correlation id.
    pub request_id_header: String,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_id_header: "x-request-id".to_string(),
            cors: CorsConfig::default(),
        }
    }
}

/// CORS policy. An empty origin list allows any origin.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allow_credentials: false,
            max_age_seconds: 600,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Store settings. Without a URL the server keeps data in memory.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub statement_timeout_ms: u64,
    /// Directory holding the `schema`, `indexes` and `seed` script stages.
    pub bootstrap_path: PathBuf,
    pub run_bootstrap: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
            statement_timeout_ms: 5_000,
            bootstrap_path: PathBuf::from("promptdesk-server/db"),
            run_bootstrap: true,
        }
    }
}

/// Streaming relay settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct SseConfig {
    /// Frames buffered between the provider task and the response body.
    pub channel_capacity: usize,
    pub keep_alive_seconds: u64,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 32,
            keep_alive_seconds: 15,
        }
    }
}

/// Admin surface settings.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AdminConfig {
    /// When set, admin routes require `Authorization: Bearer <token>`.
    pub api_token: Option<String>,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Number of chats listed in the stats overview.
    pub top_conversations: usize,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            default_page_size: 20,
            max_page_size: 100,
            top_conversations: 10,
        }
    }
}

/// The main configuration structure for the `PromptDesk` service.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub profile: Profile,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub db: DatabaseConfig,
    pub llm: LlmConfig,
    pub pricing: PricingConfig,
    pub sse: SseConfig,
    pub admin: AdminConfig,
}

impl Config {
    /// Defaults for the given profile.
    #[must_use]
    pub fn default_for_profile(profile: Profile) -> Self {
        let mut config = Self {
            profile,
            ..Self::default()
        };

        match profile {
            Profile::Dev => {
                config.logging.level = "debug".to_string();
            }
            Profile::Test => {
                config.logging.level = "warn".to_string();
                config.db.run_bootstrap = false;
            }
            Profile::Prod => {
                config.logging.format = LogFormat::Json;
            }
        }

        config
    }

    /// Loads the configuration from defaults, an optional file, environment
    /// variables and the command line, in that order of precedence.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to a `yaml`, `yml`, `json` or `toml` file.
    /// * `port_override` - Optional port number taking precedence over everything else.
    ///
    /// # Errors
    /// Returns a [`ConfigError`] if the file cannot be read or parsed, an
    /// environment override is malformed, or the result fails validation.
    pub fn load_config(
        config_path: Option<PathBuf>,
        port_override: Option<u16>,
    ) -> Result<Self, ConfigError> {
        let file_values = config_path.as_deref().map(read_config_file).transpose()?;

        let profile = match env_var("PROMPTDESK_PROFILE") {
            Some(value) => value.parse()?,
            None => file_values
                .as_ref()
                .and_then(|values| values.get("profile"))
                .and_then(Value::as_str)
                .map(str::parse)
                .transpose()?
                .unwrap_or_default(),
        };

        let mut merged = serde_json::to_value(Self::default_for_profile(profile))?;
        if let Some(values) = file_values.filter(|values| !values.is_null()) {
            merge_values(&mut merged, values);
        }
        let mut config: Self = serde_json::from_value(merged)?;
        config.profile = profile;

        config.apply_env_overrides()?;

        if let Some(port) = port_override {
            config.server.port = port;
        }

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = env_var("PROMPTDESK_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidEnv {
                name: "PROMPTDESK_PORT",
                value: port,
            })?;
        }
        if let Some(url) = env_var("PROMPTDESK_DATABASE_URL").or_else(|| env_var("DATABASE_URL"))
        {
            self.db.url = Some(url);
        }
        if let Some(level) = env_var("PROMPTDESK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env_var("PROMPTDESK_LOG_FORMAT") {
            self.logging.format = format.parse()?;
        }
        if let Some(key) = env_var("PROMPTDESK_LLM_API_KEY").or_else(|| env_var("OPENAI_API_KEY"))
        {
            self.llm.api_key = Some(key);
        }
        if let Some(base_url) = env_var("PROMPTDESK_LLM_BASE_URL") {
            self.llm.base_url = base_url;
        }
        if let Some(model) = env_var("PROMPTDESK_LLM_MODEL") {
            self.llm.default_model = model;
        }
        if let Some(token) = env_var("PROMPTDESK_ADMIN_TOKEN") {
            self.admin.api_token = Some(token);
        }
        Ok(())
    }

    /// Validates the resolved configuration.
    ///
    /// # Errors
    /// Returns every problem found, not just the first.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push("Invalid server port. Must be greater than 0.".to_string());
        }
        if self.server.request_id_header.trim().is_empty() {
            errors.push("Request id header must not be empty".to_string());
        }
        if self.db.max_connections == 0 {
            errors.push("Database max_connections must be greater than 0".to_string());
        }
        if self.sse.channel_capacity == 0 {
            errors.push("SSE channel_capacity must be greater than 0".to_string());
        }
        if self.admin.default_page_size == 0
            || self.admin.default_page_size > self.admin.max_page_size
        {
            errors.push(format!(
                "Admin default_page_size must be within 1..={}",
                self.admin.max_page_size
            ));
        }

        self.llm.validate(&mut errors);
        self.pricing.validate(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path) -> Result<Value, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("yaml" | "yml") => {
            serde_yml::from_str(&content).map_err(|err| parse_error(err.to_string()))
        }
        Some("json") => serde_json::from_str(&content).map_err(|err| parse_error(err.to_string())),
        Some("toml") => toml::from_str(&content).map_err(|err| parse_error(err.to_string())),
        _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Recursively overlays `overlay` onto `base`. Objects merge key by key;
/// every other value replaces what was there.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "PROMPTDESK_PROFILE",
        "PROMPTDESK_PORT",
        "PROMPTDESK_DATABASE_URL",
        "DATABASE_URL",
        "PROMPTDESK_LOG_LEVEL",
        "PROMPTDESK_LOG_FORMAT",
        "PROMPTDESK_LLM_API_KEY",
        "OPENAI_API_KEY",
        "PROMPTDESK_LLM_BASE_URL",
        "PROMPTDESK_LLM_MODEL",
        "PROMPTDESK_ADMIN_TOKEN",
    ];

    fn cleanup_env_vars() {
        for name in ENV_VARS {
            unsafe {
                std::env::remove_var(name);
            }
        }
    }

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn profile_defaults_differ_where_expected() {
        let dev = Config::default_for_profile(Profile::Dev);
        assert_eq!(dev.logging.level, "debug");
        assert_eq!(dev.logging.format, LogFormat::Text);

        let test = Config::default_for_profile(Profile::Test);
        assert!(!test.db.run_bootstrap);

        let prod = Config::default_for_profile(Profile::Prod);
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert_eq!(prod.server.port, 8080);
        assert_eq!(prod.admin.default_page_size, 20);
        assert_eq!(prod.pricing.default_model, "gpt-4o-mini");
    }

    #[test]
    #[serial]
    fn loads_defaults_without_file() {
        cleanup_env_vars();
        let config = Config::load_config(None, None).unwrap();
        assert_eq!(config.profile, Profile::Dev);
        assert_eq!(config.server.port, 8080);
        assert!(config.db.url.is_none());
        assert!(!config.llm.has_credentials());
    }

    #[test]
    #[serial]
    fn yaml_file_overlays_defaults() {
        cleanup_env_vars();
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "config.yaml",
            "server:\n  port: 9090\nadmin:\n  max_page_size: 50\npricing:\n  models:\n    local-model:\n      input_per_million: 0.0\n      output_per_million: 0.0\n",
        );

        let config = Config::load_config(Some(path), None).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.admin.max_page_size, 50);
        assert_eq!(config.admin.default_page_size, 20);
        assert!(config.pricing.models.contains_key("local-model"));
        assert!(config.pricing.models.contains_key("gpt-4o"));
    }

    #[test]
    #[serial]
    fn json_and_toml_files_are_supported() {
        cleanup_env_vars();
        let dir = TempDir::new().unwrap();

        let json = write_file(&dir, "config.json", r#"{"logging": {"level": "trace"}}"#);
        let config = Config::load_config(Some(json), None).unwrap();
        assert_eq!(config.logging.level, "trace");

        let toml = write_file(
            &dir,
            "config.toml",
            "profile = \"prod\"\n[sse]\nkeep_alive_seconds = 5\n",
        );
        let config = Config::load_config(Some(toml), None).unwrap();
        assert_eq!(config.profile, Profile::Prod);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.sse.keep_alive_seconds, 5);
    }

    #[test]
    #[serial]
    fn rejects_unknown_extension_and_missing_file() {
        cleanup_env_vars();
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "config.ini", "port=1");
        assert!(matches!(
            Config::load_config(Some(path), None),
            Err(ConfigError::UnsupportedFormat(_))
        ));

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            Config::load_config(Some(missing), None),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    #[serial]
    fn environment_overrides_file_and_cli_overrides_environment() {
        cleanup_env_vars();
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "config.yaml", "server:\n  port: 9000\n");

        unsafe {
            std::env::set_var("PROMPTDESK_PORT", "9100");
            std::env::set_var("DATABASE_URL", "postgres://localhost/promptdesk");
            std::env::set_var("OPENAI_API_KEY", "sk-env");
            std::env::set_var("PROMPTDESK_LOG_FORMAT", "json");
            std::env::set_var("PROMPTDESK_ADMIN_TOKEN", "admin-secret");
        }

        let config = Config::load_config(Some(path.clone()), None).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(
            config.db.url.as_deref(),
            Some("postgres://localhost/promptdesk")
        );
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.admin.api_token.as_deref(), Some("admin-secret"));

        let config = Config::load_config(Some(path), Some(9200)).unwrap();
        assert_eq!(config.server.port, 9200);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn malformed_environment_values_are_errors() {
        cleanup_env_vars();
        unsafe {
            std::env::set_var("PROMPTDESK_PORT", "not-a-port");
        }
        assert!(matches!(
            Config::load_config(None, None),
            Err(ConfigError::InvalidEnv {
                name: "PROMPTDESK_PORT",
                ..
            })
        ));
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn validation_collects_every_problem() {
        cleanup_env_vars();
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "config.yaml",
            "admin:\n  default_page_size: 0\nsse:\n  channel_capacity: 0\n",
        );

        match Config::load_config(Some(path), Some(0)) {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 3, "{errors:?}"),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn merge_values_replaces_scalars_and_merges_objects() {
        let mut base = serde_json::json!({"a": {"b": 1, "c": 2}, "d": [1]});
        merge_values(&mut base, serde_json::json!({"a": {"b": 5}, "d": [2, 3]}));
        assert_eq!(base, serde_json::json!({"a": {"b": 5, "c": 2}, "d": [2, 3]}));
    }
}
