//! Reporter configuration types
//!
//! The converter needs very little configuration: the defaults reproduce the
//! standard TeamCity output exactly.

use crate::types::{Result, TapTeamCityError};
use serde::{Deserialize, Serialize};

/// Configuration for the TAP to TeamCity converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Value of `captureStandardOutput` on `testStarted` messages
    #[serde(default = "default_true")]
    pub capture_standard_output: bool,

    /// Size of each block read from the input by [`crate::transform`]
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_read_buffer_size() -> usize {
    8192
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            capture_standard_output: true,
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl ReporterConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set `captureStandardOutput` for started assertions
    pub fn with_capture_standard_output(mut self, enabled: bool) -> Self {
        self.capture_standard_output = enabled;
        self
    }

    /// Builder method: set the input read block size
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Reject settings the converter cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.read_buffer_size == 0 {
            return Err(TapTeamCityError::InvalidConfig(
                "read_buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
