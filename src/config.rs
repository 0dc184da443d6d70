//! Composer configuration via `mosaic.toml`
//!
//! Every field is optional; an empty file is the default configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "mosaic.toml";

/// What to do with configuration errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Refuse to build a container
    Fail,
    /// Log the errors and build from the parts that survived resolution
    Warn,
}

/// Composer configuration loaded from `mosaic.toml`.
///
/// # Example
///
/// ```toml
/// error_policy = "warn"
/// cache_file = "target/mosaic.cache"
/// verify_activators = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MosaicConfig {
    /// `"fail"` or `"warn"`
    #[serde(default = "default_error_policy")]
    pub error_policy: String,
    /// Where resolved compositions are cached between runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,
    /// Require an activator for every part up front
    #[serde(default = "default_verify_activators")]
    pub verify_activators: bool,
}

fn default_error_policy() -> String {
    "fail".to_string()
}

fn default_verify_activators() -> bool {
    true
}

impl Default for MosaicConfig {
    fn default() -> Self {
        Self {
            error_policy: default_error_policy(),
            cache_file: None,
            verify_activators: default_verify_activators(),
        }
    }
}

impl MosaicConfig {
    /// Parse the error policy string.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"fail"` or `"warn"`.
    pub fn error_policy(&self) -> Result<ErrorPolicy> {
        match self.error_policy.as_str() {
            "fail" => Ok(ErrorPolicy::Fail),
            "warn" => Ok(ErrorPolicy::Warn),
            other => Err(Error::Config(format!(
                "Invalid error_policy '{}' in mosaic.toml. Expected \"fail\" or \"warn\".",
                other
            ))),
        }
    }

    /// Same configuration with a cache file
    pub fn with_cache_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_file = Some(path.into());
        self
    }

    /// Default config file content with comments
    pub fn default_toml() -> &'static str {
        r#"# Mosaic composition configuration
#
# What to do when resolution reports configuration errors:
#   "fail" = refuse to build a container (default)
#   "warn" = log the errors and drop the rejected parts
error_policy = "fail"

# Cache the resolved composition here and reuse it while the catalog
# is unchanged.
# cache_file = "mosaic.cache"

# Fail up front when a part has no registered activator (default: true).
# When false, the failure happens on first request for that part.
verify_activators = true
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds an
    /// unknown error policy.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: MosaicConfig = toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.error_policy()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| Error::io(path, e))?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to `path`.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| Error::io(path, e))
    }
}
