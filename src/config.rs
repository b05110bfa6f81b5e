//! Source configuration.
//!
//! Describes a root folder and the naming conventions of its streams as a
//! JSON document:
//!
//! ```json
//! {
//!   "root": "/data/weather",
//!   "streams": {
//!     "temperature": [
//!       { "path_segments": ["yyyy-MM"], "file_template": "yyyy-MM-dd'.dat'", "file_period": "1.00:00:00" }
//!     ]
//!   }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::AvailabilityOptions;
use crate::source::ConventionMap;
use crate::{Error, Result};

/// Configuration for one structured file source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Root folder. Relative paths resolve against the config file.
    /// Default: the config file's folder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// Naming conventions per stream id.
    #[serde(default)]
    pub streams: ConventionMap,

    /// Worker threads for availability scoring.
    /// Default: 1
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
}

fn default_parallelism() -> usize {
    1
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: None,
            streams: ConventionMap::new(),
            parallelism: default_parallelism(),
        }
    }
}

impl SourceConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| Error::config(format!("invalid source config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, resolving a relative `root` against its folder.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut config = Self::from_json(&text)?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.root = Some(match config.root.take() {
            Some(root) if root.is_relative() => base.join(root),
            Some(root) => root,
            None => base.to_path_buf(),
        });
        Ok(config)
    }

    /// Root folder, or the current directory when none is set.
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn availability_options(&self) -> AvailabilityOptions {
        AvailabilityOptions {
            parallelism: self.parallelism,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(Error::config("parallelism must be at least 1"));
        }
        for (stream_id, conventions) in &self.streams {
            if stream_id.is_empty() {
                return Err(Error::config("stream ids must not be empty"));
            }
            for convention in conventions {
                convention.compile().map_err(|err| match err {
                    Error::Configuration(msg) => {
                        Error::Configuration(format!("stream '{stream_id}': {msg}"))
                    }
                    other => other,
                })?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use time::Duration;

    const SAMPLE: &str = r#"{
        "root": "data",
        "streams": {
            "temperature": [
                {
                    "path_segments": ["yyyy-MM", "yyyy-MM-dd"],
                    "file_template": "yyyy-MM-dd_HH-mm-ss'.dat'",
                    "file_period": "1.00:00:00"
                }
            ]
        }
    }"#;

    #[test]
    fn test_source_config_default() {
        let config = SourceConfig::default();
        assert!(config.root.is_none());
        assert!(config.streams.is_empty());
        assert_eq!(config.parallelism, 1);
    }

    #[test]
    fn test_from_json() {
        let config = SourceConfig::from_json(SAMPLE).unwrap();
        let conventions = &config.streams["temperature"];
        assert_eq!(conventions.len(), 1);
        assert_eq!(conventions[0].file_period, Duration::DAY);
        assert_eq!(config.availability_options().parallelism, 1);
    }

    #[test]
    fn test_invalid_template_is_rejected() {
        let text = r#"{
            "streams": {
                "bad": [{ "file_template": "hh-mm", "file_period": "01:00:00" }]
            }
        }"#;
        let err = SourceConfig::from_json(text).unwrap_err();
        assert!(err.to_string().contains("bad"));
    }

    #[test]
    fn test_load_resolves_relative_root() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("source.json");
        fs::write(&path, SAMPLE).unwrap();

        let config = SourceConfig::load(&path).unwrap();
        assert_eq!(config.root(), dir.path().join("data"));
    }
}
