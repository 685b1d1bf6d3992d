//! Configuration system
//!
//! Runtime settings for a [`World`](crate::ecs::World), loadable from TOML or
//! RON files.

pub use serde::{Serialize, Deserialize};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;

        Self::from_str_with_format(&contents, path)
    }

    /// Parse configuration text, picking the format from the file extension
    fn from_str_with_format(contents: &str, path: &str) -> Result<Self, ConfigError> {
        if path.ends_with(".toml") {
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values that parse but cannot be used
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # World Configuration
///
/// Scheduling and bookkeeping settings for a world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Update entities of one attachment wave on worker threads
    pub parallel_updates: bool,
    /// Worker thread count; `None` uses one less than the core count
    pub worker_threads: Option<usize>,
    /// Entity slots reserved up front
    pub initial_entity_capacity: usize,
    /// Log filter used by hosts that initialize logging from the config
    pub log_level: String,
}

impl WorldConfig {
    /// Create a new world configuration
    pub fn new() -> Self {
        Self {
            parallel_updates: true,
            worker_threads: None,
            initial_entity_capacity: 256,
            log_level: "info".to_string(),
        }
    }

    /// Single-threaded configuration, entities updated in wave order on the caller's thread
    pub fn sequential() -> Self {
        Self::new().with_parallel_updates(false)
    }

    /// Enable or disable parallel entity updates
    pub fn with_parallel_updates(mut self, enabled: bool) -> Self {
        self.parallel_updates = enabled;
        self
    }

    /// Set worker thread count
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = Some(threads);
        self
    }

    /// Set initial entity capacity
    pub fn with_initial_entity_capacity(mut self, capacity: usize) -> Self {
        self.initial_entity_capacity = capacity;
        self
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Worker threads to spawn, resolving the default
    pub fn resolved_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
                .max(1)
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == Some(0) {
            return Err(ConfigError::Invalid("worker_threads must be at least 1".to_string()));
        }
        if self.log_level.is_empty() {
            return Err(ConfigError::Invalid("log_level cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for WorldConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_roundtrip_keeps_values() {
        let config = WorldConfig::new()
            .with_parallel_updates(false)
            .with_worker_threads(3)
            .with_log_level("debug");

        let text = toml::to_string_pretty(&config).expect("serialize");
        let parsed = WorldConfig::from_str_with_format(&text, "world.toml").expect("parse");
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_ron_partial_uses_defaults() {
        let parsed = WorldConfig::from_str_with_format("(parallel_updates: false)", "world.ron")
            .expect("parse");
        assert!(!parsed.parallel_updates);
        assert_eq!(parsed.initial_entity_capacity, 256);
        assert_eq!(parsed.log_level, "info");
    }

    #[test]
    fn test_unsupported_format() {
        let result = WorldConfig::from_str_with_format("{}", "world.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let config = WorldConfig::new().with_worker_threads(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(WorldConfig::default().validate().is_ok());
        assert!(WorldConfig::default().resolved_worker_threads() >= 1);
    }

    #[test]
    fn test_save_and_load_file() {
        let path = std::env::temp_dir().join(format!("entity_core_config_{}.toml", std::process::id()));
        let path = path.to_string_lossy().into_owned();

        let config = WorldConfig::sequential().with_initial_entity_capacity(32);
        config.save_to_file(&path).expect("save");
        let loaded = WorldConfig::load_from_file(&path).expect("load");
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }
}
