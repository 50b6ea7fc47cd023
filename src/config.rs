//! Configuration for JsonStore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, StoreError};
use crate::options::SerializeOptions;

/// Main configuration for a store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Backing document. Temp files are created in the same directory so the
    /// final replace is a same-filesystem rename.
    pub path: PathBuf,

    // -------------------------------------------------------------------------
    // Serialization Configuration
    // -------------------------------------------------------------------------
    /// Options used by `sync()` when none are passed explicitly
    pub options: SerializeOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./store.json"),
            options: SerializeOptions::default(),
        }
    }
}

impl Config {
    /// Config for `path` with default serialization options
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: SerializeOptions::default(),
        }
    }

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the backing file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the default serialization options
    pub fn options(mut self, options: SerializeOptions) -> Self {
        self.config.options = options;
        self
    }

    /// Shorthand for pretty-printed output with `indent` spaces
    pub fn indent(mut self, indent: usize) -> Self {
        self.config.options.indent = Some(indent);
        self
    }

    pub fn sort_keys(mut self, sorted: bool) -> Self {
        self.config.options = self.config.options.sort_keys(sorted);
        self
    }

    pub fn ensure_ascii(mut self, escape: bool) -> Self {
        self.config.options.ensure_ascii = escape;
        self
    }

    pub fn build(self) -> Result<Config> {
        if self.config.path.as_os_str().is_empty() {
            return Err(StoreError::Config("store path must not be empty".to_string()));
        }
        Ok(self.config)
    }
}
