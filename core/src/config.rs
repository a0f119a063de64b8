use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::dataset::DatasetKind;
use crate::errors::{ConfigError, IngestionError};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    pub version: u32,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    pub datasets: Vec<DatasetConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Create the destination tables when they are missing.
    #[serde(default = "default_true")]
    pub create_schema: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Compare the header line against the declared columns instead of skipping it blindly.
    #[serde(default)]
    pub validate_header: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatasetConfig {
    pub name: String,
    pub kind: DatasetKind,
    pub path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_chunk_size() -> usize {
    100
}

fn default_true() -> bool {
    true
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            validate_header: false,
        }
    }
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
            create_schema: true,
        }
    }
}

pub fn load_config(config_path: Option<&str>) -> Result<IngestConfig, IngestionError> {
    let config = match config_path {
        Some(path) => IngestConfig::from_file(path)?,
        None => IngestConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

impl IngestConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            origin: path.to_string(),
            error: Box::new(e),
        })?;
        Self::from_yaml(&content, path)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let config_str = std::env::var("INGEST_CONFIG").map_err(|_| ConfigError::MissingField {
            field: "INGEST_CONFIG".to_string(),
        })?;
        Self::from_yaml(&config_str, "INGEST_CONFIG")
    }

    pub fn from_yaml(content: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::LoadFailed {
            origin: origin.to_string(),
            error: Box::new(e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != SUPPORTED_CONFIG_VERSION {
            return Err(ConfigError::Invalid {
                message: format!(
                    "unsupported config version {} (expected {})",
                    self.version, SUPPORTED_CONFIG_VERSION
                ),
            });
        }
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "database.url".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "database.max_connections must be at least 1".to_string(),
            });
        }
        if self.processing.chunk_size == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "processing.chunk_size must be at least 1".to_string(),
            });
        }
        if self.datasets.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "At least one dataset must be configured".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for dataset in &self.datasets {
            if dataset.name.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: "datasets[].name".to_string(),
                });
            }
            if dataset.path.trim().is_empty() {
                return Err(ConfigError::MissingField {
                    field: format!("datasets[{}].path", dataset.name),
                });
            }
            if !seen.insert(dataset.name.as_str()) {
                return Err(ConfigError::ValidationFailed {
                    reason: format!("duplicate dataset name {}", dataset.name),
                });
            }
        }
        Ok(())
    }

    pub fn enabled_datasets(&self) -> impl Iterator<Item = &DatasetConfig> {
        self.datasets.iter().filter(|d| d.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version: 1
database:
  url: "sqlite://movielens.db?mode=rwc"
processing:
  chunk_size: 50
datasets:
  - name: movies
    kind: movies
    path: data/movies.csv
  - name: ratings
    kind: ratings
    path: data/ratings.csv
  - name: tags
    kind: tags
    path: data/tags.csv
    enabled: false
"#;

    #[test]
    fn test_parse_config_with_defaults() {
        let config = IngestConfig::from_yaml(SAMPLE, "inline").unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.database.busy_timeout_ms, 5000);
        assert!(config.database.create_schema);
        assert_eq!(config.processing.chunk_size, 50);
        assert!(!config.processing.validate_header);
        assert_eq!(config.datasets.len(), 3);
        assert_eq!(config.datasets[1].kind, DatasetKind::Ratings);

        let enabled: Vec<_> = config.enabled_datasets().map(|d| d.name.as_str()).collect();
        assert_eq!(enabled, vec!["movies", "ratings"]);

        config.validate().unwrap();
    }

    #[test]
    fn test_processing_defaults_to_chunks_of_one_hundred() {
        let yaml = r#"
version: 1
database:
  url: "sqlite::memory:"
datasets:
  - name: movies
    kind: movies
    path: movies.csv
"#;
        let config = IngestConfig::from_yaml(yaml, "inline").unwrap();
        assert_eq!(config.processing.chunk_size, 100);
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let mut config = IngestConfig::from_yaml(SAMPLE, "inline").unwrap();
        config.processing.chunk_size = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));

        let mut config = IngestConfig::from_yaml(SAMPLE, "inline").unwrap();
        config.datasets[1].name = "movies".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed { .. })
        ));

        let mut config = IngestConfig::from_yaml(SAMPLE, "inline").unwrap();
        config.version = 2;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let mut config = IngestConfig::from_yaml(SAMPLE, "inline").unwrap();
        config.datasets[0].path = " ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn test_unknown_dataset_kind_fails_to_load() {
        let yaml = SAMPLE.replace("kind: tags", "kind: links");
        let err = IngestConfig::from_yaml(&yaml, "inline").unwrap_err();
        assert!(matches!(err, ConfigError::LoadFailed { .. }));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ingest.yaml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = load_config(path.to_str()).unwrap();
        assert_eq!(config.datasets[0].path, "data/movies.csv");

        let missing = dir.path().join("missing.yaml");
        assert!(load_config(missing.to_str()).is_err());
    }
}
