//! Configuration for gorseek
//!
//! Centralized configuration with sensible defaults.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeekError};
use crate::key::KeyLayout;

/// Main configuration shared by seek iterators and the cache registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Read Window Configuration
    // -------------------------------------------------------------------------
    /// Size of the first read window (in bytes)
    pub initial_window_size: usize,

    /// Cap for window doubling while narrowing a bracket (in bytes)
    pub max_window_size: usize,

    /// Longest line we are willing to buffer (in bytes)
    pub max_line_size: usize,

    // -------------------------------------------------------------------------
    // Position Cache Configuration
    // -------------------------------------------------------------------------
    /// Max number of distinct file identities held by a registry
    pub max_files_in_cache: usize,

    /// Cache entries allowed per GiB of data
    pub positions_per_gb: usize,

    /// Upper bound on the entry limit of any single cache
    pub max_positions_per_cache: usize,

    // -------------------------------------------------------------------------
    // File Layout Configuration
    // -------------------------------------------------------------------------
    /// Which tab-separated columns hold the chromosome and position
    pub layout: KeyLayout,

    /// Whether data files begin with a header line
    pub has_header: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            initial_window_size: 64 * 1024,     // 64 KB
            max_window_size: 4 * 1024 * 1024,   // 4 MB
            max_line_size: 32 * 1024 * 1024,    // 32 MB
            max_files_in_cache: 64,
            positions_per_gb: 256,
            max_positions_per_cache: 1 << 20,
            layout: KeyLayout::default(),
            has_header: true,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<()> {
        if self.initial_window_size == 0 {
            return Err(SeekError::Config(
                "initial_window_size must be positive".to_string(),
            ));
        }
        if self.max_window_size < self.initial_window_size {
            return Err(SeekError::Config(format!(
                "max_window_size ({}) is smaller than initial_window_size ({})",
                self.max_window_size, self.initial_window_size
            )));
        }
        if self.max_line_size < self.initial_window_size {
            return Err(SeekError::Config(format!(
                "max_line_size ({}) is smaller than initial_window_size ({})",
                self.max_line_size, self.initial_window_size
            )));
        }
        if self.max_files_in_cache == 0 {
            return Err(SeekError::Config(
                "max_files_in_cache must be positive".to_string(),
            ));
        }
        if self.positions_per_gb == 0 || self.max_positions_per_cache == 0 {
            return Err(SeekError::Config(
                "cache position limits must be positive".to_string(),
            ));
        }
        if self.layout.chrom_col == self.layout.pos_col {
            return Err(SeekError::Config(format!(
                "chromosome and position share column {}",
                self.layout.chrom_col
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the first read window size (in bytes)
    pub fn initial_window_size(mut self, size: usize) -> Self {
        self.config.initial_window_size = size;
        self
    }

    /// Set the cap for window growth while bracketing (in bytes)
    pub fn max_window_size(mut self, size: usize) -> Self {
        self.config.max_window_size = size;
        self
    }

    /// Set the maximum line size (in bytes)
    pub fn max_line_size(mut self, size: usize) -> Self {
        self.config.max_line_size = size;
        self
    }

    /// Set how many file identities a registry keeps
    pub fn max_files_in_cache(mut self, count: usize) -> Self {
        self.config.max_files_in_cache = count;
        self
    }

    /// Set the cache density per GiB of data
    pub fn positions_per_gb(mut self, count: usize) -> Self {
        self.config.positions_per_gb = count;
        self
    }

    /// Set the upper bound for a single cache
    pub fn max_positions_per_cache(mut self, count: usize) -> Self {
        self.config.max_positions_per_cache = count;
        self
    }

    /// Set the key columns
    pub fn layout(mut self, layout: KeyLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// Set whether files carry a header line
    pub fn has_header(mut self, has_header: bool) -> Self {
        self.config.has_header = has_header;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
