//! Instrumentation configuration.
//!
//! Decides how run-time hits are counted and which compiler-idiom filters
//! take part. Loading the configuration (agent arguments, files) is up to
//! the embedding tool; the types derive serde for that purpose.

use serde::{Deserialize, Serialize};

/// How run-time hits are counted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CoverageMode {
    /// Per-line records with jump and switch counters
    #[default]
    Tracing,
    /// Line hits only, counted in a per-class line mask and folded into the
    /// records when the report is saved
    Sampling,
}

/// Compiler-idiom filters to run while instrumenting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Retract lines made only of try-with-resources cleanup code
    pub try_with_resources: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            try_with_resources: true,
        }
    }
}

impl FilterConfig {
    /// Disable every filter
    #[must_use]
    pub fn none() -> Self {
        Self {
            try_with_resources: false,
        }
    }
}

/// Instrumentation configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentationConfig {
    /// Counting mode
    pub mode: CoverageMode,
    /// Register jumps and switches (tracing mode only)
    pub branch_coverage: bool,
    /// Filters
    pub filters: FilterConfig,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            mode: CoverageMode::Tracing,
            branch_coverage: true,
            filters: FilterConfig::default(),
        }
    }
}

impl InstrumentationConfig {
    /// Create a builder for instrumentation config
    #[must_use]
    pub fn builder() -> InstrumentationConfigBuilder {
        InstrumentationConfigBuilder::default()
    }

    /// Check if jumps and switches get registered
    #[must_use]
    pub fn tracks_branches(&self) -> bool {
        self.mode == CoverageMode::Tracing && self.branch_coverage
    }
}

/// Builder for instrumentation configuration
#[derive(Debug)]
pub struct InstrumentationConfigBuilder {
    mode: CoverageMode,
    branch_coverage: bool,
    filters: FilterConfig,
}

impl Default for InstrumentationConfigBuilder {
    fn default() -> Self {
        let config = InstrumentationConfig::default();
        Self {
            mode: config.mode,
            branch_coverage: config.branch_coverage,
            filters: config.filters,
        }
    }
}

impl InstrumentationConfigBuilder {
    /// Set the counting mode
    #[must_use]
    pub fn mode(mut self, mode: CoverageMode) -> Self {
        self.mode = mode;
        self
    }

    /// Enable jump and switch registration
    #[must_use]
    pub fn branch_coverage(mut self, enabled: bool) -> Self {
        self.branch_coverage = enabled;
        self
    }

    /// Enable the try-with-resources filter
    #[must_use]
    pub fn try_with_resources_filter(mut self, enabled: bool) -> Self {
        self.filters.try_with_resources = enabled;
        self
    }

    /// Replace the filter set
    #[must_use]
    pub fn filters(mut self, filters: FilterConfig) -> Self {
        self.filters = filters;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> InstrumentationConfig {
        InstrumentationConfig {
            mode: self.mode,
            branch_coverage: self.branch_coverage,
            filters: self.filters,
        }
    }
}
