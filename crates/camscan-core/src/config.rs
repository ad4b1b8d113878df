//! Scan configuration types.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Default cap on listing requests in flight against one camera.
pub const DEFAULT_MAX_CONCURRENT_LISTINGS: usize = 4;

/// How listing failures below the storage roots are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Skip the failing subtree, report it as a warning and keep scanning.
    #[default]
    Tolerant,
    /// Stop at the first failure and deliver it as the scan's result.
    FailFast,
}

/// Configuration for scanning operations.
#[derive(Debug, Clone, PartialEq, Eq, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[serde(default)]
pub struct ScanConfig {
    /// Handling of listing failures below the storage roots.
    #[builder(default)]
    pub error_policy: ErrorPolicy,

    /// Include folders the predicate matches in the results.
    ///
    /// Folders are traversed either way. Without a predicate no folder is
    /// ever included.
    #[builder(default = "false")]
    pub include_matching_folders: bool,

    /// Maximum folder depth to descend into (None = unlimited).
    ///
    /// Items directly in a storage root are at depth 1.
    #[builder(default)]
    pub max_depth: Option<u32>,

    /// Stop scanning once this many items matched (None = unlimited).
    #[builder(default)]
    pub max_results: Option<usize>,

    /// Number of listing requests allowed in flight (0 = unbounded).
    #[builder(default = "DEFAULT_MAX_CONCURRENT_LISTINGS")]
    pub max_concurrent_listings: usize,
}

impl ScanConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(Some(0)) = self.max_results {
            return Err("max_results must be greater than zero".to_string());
        }
        if let Some(Some(0)) = self.max_depth {
            return Err("max_depth must be greater than zero".to_string());
        }
        Ok(())
    }
}

impl ScanConfig {
    /// Create a new scan config builder.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder::default()
    }

    /// Create a config with default settings.
    pub fn new() -> Self {
        Self {
            error_policy: ErrorPolicy::Tolerant,
            include_matching_folders: false,
            max_depth: None,
            max_results: None,
            max_concurrent_listings: DEFAULT_MAX_CONCURRENT_LISTINGS,
        }
    }

    /// Check the config for values the builder would reject.
    ///
    /// Configs loaded through serde skip the builder, so callers should run
    /// this before scanning with them.
    pub fn validate(&self) -> Result<(), String> {
        ScanConfigBuilder {
            max_results: Some(self.max_results),
            max_depth: Some(self.max_depth),
            ..Default::default()
        }
        .validate()
    }

    /// Check if the folder at `depth` may be listed.
    pub fn should_descend(&self, depth: u32) -> bool {
        self.max_depth.is_none_or(|max| depth < max)
    }

    /// Check if `matched` results are enough to stop scanning.
    pub fn is_result_limit_reached(&self, matched: usize) -> bool {
        self.max_results.is_some_and(|max| matched >= max)
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}
