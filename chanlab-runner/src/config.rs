//! TOML run files.
//!
//! A run file has three tables:
//!
//! ```toml
//! [engine]
//! max_window = 20
//! fixed_far_len = 10
//! fixed_near_len = 5
//! use_close_for_reversal_exit = false
//!
//! [data]
//! csv = "data/spy.csv"          # or: synthetic = { bars = 500, seed = 42 }
//!
//! [output]
//! dir = "runs"
//! ```
//!
//! Only `[engine]` is required. A missing `[data]` table means the caller
//! supplies bars some other way (the CLI's `--data` flag).

use std::path::{Path, PathBuf};

use chanlab_core::engine::{EngineConfig, ReversalExit};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from reading or validating a run file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read run file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse run file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid engine parameters: {0}")]
    Engine(#[from] chanlab_core::engine::ConfigError),
    #[error("[data] table must set exactly one of `csv` or `synthetic`")]
    AmbiguousData,
}

/// Top-level run file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFile {
    pub engine: EngineSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSection>,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    pub max_window: usize,
    pub fixed_far_len: usize,
    pub fixed_near_len: usize,
    #[serde(default)]
    pub use_close_for_reversal_exit: bool,
    #[serde(default = "default_far_len")]
    pub default_far_len: usize,
    #[serde(default = "default_near_len")]
    pub default_near_len: usize,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_far_len() -> usize {
    2
}

fn default_near_len() -> usize {
    1
}

fn default_parallel() -> bool {
    true
}

impl EngineSection {
    pub fn new(max_window: usize, fixed_far_len: usize, fixed_near_len: usize) -> Self {
        Self {
            max_window,
            fixed_far_len,
            fixed_near_len,
            use_close_for_reversal_exit: false,
            default_far_len: default_far_len(),
            default_near_len: default_near_len(),
            parallel: default_parallel(),
        }
    }

    /// Validate into the core engine configuration.
    pub fn to_engine_config(&self) -> Result<EngineConfig, ConfigError> {
        let config = EngineConfig::new(self.max_window, self.fixed_far_len, self.fixed_near_len)?
            .with_fallback(self.default_far_len, self.default_near_len)?
            .with_reversal_exit(ReversalExit::from_use_close(self.use_close_for_reversal_exit))
            .with_parallelism(self.parallel);
        Ok(config)
    }
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthetic: Option<SyntheticSpec>,
}

/// Parameters of a seeded random-walk series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticSpec {
    pub bars: usize,
    #[serde(default)]
    pub seed: u64,
}

/// Resolved bar source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Csv(PathBuf),
    Synthetic(SyntheticSpec),
}

impl DataSection {
    pub fn source(&self) -> Result<DataSource, ConfigError> {
        match (&self.csv, &self.synthetic) {
            (Some(path), None) => Ok(DataSource::Csv(path.clone())),
            (None, Some(spec)) => Ok(DataSource::Synthetic(*spec)),
            _ => Err(ConfigError::AmbiguousData),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSection {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("runs")
}

impl RunFile {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let file: RunFile = toml::from_str(content)?;
        file.engine.to_engine_config()?;
        if let Some(data) = &file.data {
            data.source()?;
        }
        Ok(file)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        self.engine.to_engine_config()
    }

    pub fn data_source(&self) -> Result<Option<DataSource>, ConfigError> {
        self.data.as_ref().map(DataSection::source).transpose()
    }
}

/// BLAKE3 hex digest of the canonical JSON form of `config`.
pub fn config_hash(config: &EngineConfig) -> String {
    // EngineConfig holds only plain numbers, bools and enums.
    let json = serde_json::to_string(config).unwrap_or_default();
    blake3::hash(json.as_bytes()).to_hex().to_string()
}
