//! Configuration management
//!
//! All tunables live in one explicit `Config` value resolved at startup;
//! the analysis code receives thresholds as plain parameters and never reads
//! ambient state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Override for the data directory (instincts + observation log)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Confidence decay settings
    #[serde(default)]
    pub decay: DecayConfig,
    /// Pattern detection settings
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Clustering/evolution settings
    #[serde(default)]
    pub evolution: EvolutionConfig,
    /// Retention settings
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            decay: DecayConfig::default(),
            detection: DetectionConfig::default(),
            evolution: EvolutionConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Weekly decay rate applied at read time
    #[serde(default = "default_decay_rate")]
    pub rate: f64,
}

fn default_decay_rate() -> f64 {
    crate::confidence::DEFAULT_DECAY_RATE
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            rate: default_decay_rate(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Occurrences before a tool sequence becomes a pattern
    #[serde(default = "default_min_occurrences")]
    pub min_occurrences: u32,
    /// Cap on new/updated instincts per analysis cycle
    #[serde(default = "default_max_patterns")]
    pub max_patterns_per_cycle: usize,
}

fn default_min_occurrences() -> u32 {
    crate::patterns::detector::DEFAULT_MIN_OCCURRENCES
}

fn default_max_patterns() -> usize {
    10
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_occurrences: default_min_occurrences(),
            max_patterns_per_cycle: default_max_patterns(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionConfig {
    /// Minimum instincts in a domain before clustering
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    /// Minimum mean confidence for cluster admission
    #[serde(default = "default_min_avg_confidence")]
    pub min_avg_confidence: f64,
}

fn default_min_cluster_size() -> usize {
    crate::clustering::MIN_INSTINCTS_FOR_CLUSTER
}

fn default_min_avg_confidence() -> f64 {
    crate::clustering::MIN_AVG_CONFIDENCE
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            min_cluster_size: default_min_cluster_size(),
            min_avg_confidence: default_min_avg_confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Instincts kept before pruning archives the rest
    #[serde(default = "default_max_instincts")]
    pub max_instincts: usize,
}

fn default_max_instincts() -> usize {
    100
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_instincts: default_max_instincts(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating defaults on first run.
    pub fn load() -> Result<Self> {
        let config_path = config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        let config_path = config_path()?;
        let parent = config_path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Resolve the data directory, honoring the configured override.
    pub fn resolved_data_dir(&self) -> Result<PathBuf> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => data_dir(),
        }
    }

    /// Set a dotted `section.key` to a value. Returns false for unknown keys.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        match key {
            "data_dir" => self.data_dir = Some(PathBuf::from(value)),
            "decay.rate" => self.decay.rate = value.parse().context("decay.rate must be a number")?,
            "detection.min_occurrences" => {
                self.detection.min_occurrences =
                    value.parse().context("detection.min_occurrences must be an integer")?
            }
            "detection.max_patterns_per_cycle" => {
                self.detection.max_patterns_per_cycle =
                    value.parse().context("detection.max_patterns_per_cycle must be an integer")?
            }
            "evolution.min_cluster_size" => {
                self.evolution.min_cluster_size =
                    value.parse().context("evolution.min_cluster_size must be an integer")?
            }
            "evolution.min_avg_confidence" => {
                self.evolution.min_avg_confidence =
                    value.parse().context("evolution.min_avg_confidence must be a number")?
            }
            "retention.max_instincts" => {
                self.retention.max_instincts =
                    value.parse().context("retention.max_instincts must be an integer")?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "instincts", "instincts")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "instincts", "instincts")
        .context("Failed to get project directories")?;
    Ok(base.data_dir().to_path_buf())
}
