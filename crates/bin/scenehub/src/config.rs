//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `scenehub.toml` in the working directory, or the file named by
//! `SCENEHUB_CONFIG`. Every field has a default so the file is optional,
//! but credentials and a space id must come from somewhere. Environment
//! variables take precedence over file values.

use serde::Deserialize;

use scenehub_adapter_tuya::{Secret, TuyaConfig};
use scenehub_app::coordinator::{DEFAULT_CONCURRENCY, WorkflowSettings};
use scenehub_domain::heuristic::HeuristicSpec;
use scenehub_domain::id::SpaceId;
use scenehub_domain::mapping::{MappingEntry, MappingRegistry};

const DEFAULT_PATH: &str = "scenehub.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Tuya cloud project and transport settings.
    pub tuya: TuyaConfig,
    pub workflow: WorkflowConfig,
    pub logging: LoggingConfig,
    /// Extra datapoint mappings, layered over the built-in table.
    pub mappings: Vec<MappingEntry>,
    /// Heuristic instances to evaluate.
    pub heuristics: Vec<HeuristicSpec>,
}

/// Coordinator settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Space (home) whose devices and rules are managed.
    pub space_id: String,
    /// Upper bound on concurrent cloud calls within a batch.
    pub concurrency: usize,
    /// Enable rules right after creating them.
    pub enable_after_create: bool,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            space_id: String::new(),
            concurrency: DEFAULT_CONCURRENCY,
            enable_after_create: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "scenehub=info,scenehub_app=info,scenehub_adapter_tuya=info".to_string(),
        }
    }
}

impl Config {
    /// Load the configuration file (if present), apply environment-variable
    /// overrides, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is malformed, or if the
    /// resulting configuration is incomplete.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("SCENEHUB_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed. A missing
    /// file yields the defaults.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("TUYA_CLIENT_ID") {
            self.tuya.client_id = val;
        }
        if let Some(val) = lookup("TUYA_CLIENT_SECRET") {
            self.tuya.client_secret = Secret::new(val);
        }
        if let Some(val) = lookup("TUYA_API_BASE_URL") {
            self.tuya.base_url = val;
        }
        if let Some(val) = lookup("TUYA_SPACE_ID") {
            self.workflow.space_id = val;
        }
        if let Some(val) = lookup("SCENEHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for missing credentials, a
    /// missing space id or a zero concurrency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tuya
            .validate()
            .map_err(|err| ConfigError::Validation(err.to_string()))?;
        self.space_id()?;
        if self.workflow.concurrency == 0 {
            return Err(ConfigError::Validation(
                "workflow.concurrency must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if no space id is configured.
    pub fn space_id(&self) -> Result<SpaceId, ConfigError> {
        SpaceId::new(&self.workflow.space_id).map_err(|_| {
            ConfigError::Validation(
                "workflow.space_id (or TUYA_SPACE_ID) is required".to_string(),
            )
        })
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if no space id is configured.
    pub fn workflow_settings(&self) -> Result<WorkflowSettings, ConfigError> {
        Ok(WorkflowSettings::new(self.space_id()?)
            .with_concurrency(self.workflow.concurrency)
            .with_enable_after_create(self.workflow.enable_after_create))
    }

    /// Built-in mappings with the configured entries layered on top.
    #[must_use]
    pub fn registry(&self) -> MappingRegistry {
        MappingRegistry::builder()
            .with_builtin()
            .extend(self.mappings.iter().cloned())
            .build()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
