use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "linescope.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config file at {}: {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

/// Contents of a `linescope.toml` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Apply the standard `COPY --link` transform before the job's script.
    #[serde(default = "default_copy_link")]
    pub copy_link: bool,

    #[serde(default, rename = "job")]
    pub jobs: Vec<JobConfig>,
}

/// One file to edit, as written in the config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    pub file: PathBuf,
    pub script: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_link: Option<bool>,
}

/// A job with its paths resolved against the config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub file: PathBuf,
    pub script: PathBuf,
    pub stamp: Option<PathBuf>,
    pub copy_link: bool,
}

fn default_copy_link() -> bool {
    true
}

impl Config {
    pub fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if config.jobs.is_empty() {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                message: "no [[job]] entries".to_string(),
            });
        }
        Ok(config)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }

    /// Jobs with every path expanded and made relative to `base`.
    pub fn jobs(&self, base: &Path) -> Vec<Job> {
        self.jobs
            .iter()
            .map(|job| Job {
                file: resolve(base, &job.file),
                script: resolve(base, &job.script),
                stamp: job.stamp.as_deref().map(|p| resolve(base, p)),
                copy_link: job.copy_link.unwrap_or(self.copy_link),
            })
            .collect()
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_path(path).unwrap_or_else(|| path.to_path_buf());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

fn expand_path(path: &Path) -> Option<PathBuf> {
    let path_str = path.to_string_lossy();
    match shellexpand::full(&path_str) {
        Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
        Err(_) => None,
    }
}
