//! Allocator configuration
//!
//! Values can be set programmatically through the builder methods or taken
//! from the environment:
//!
//! - `PLANFORGE_ARENA_ALIGNMENT`: allocation granularity in bytes (power of two)
//! - `PLANFORGE_ARENA_LABEL`: plan name used in logs and `info()` output

use crate::error::{PlanError, PlanResult};

/// Environment variable for the alignment override
const ALIGNMENT_ENV: &str = "PLANFORGE_ARENA_ALIGNMENT";

/// Environment variable for the label override
const LABEL_ENV: &str = "PLANFORGE_ARENA_LABEL";

/// Configuration for an [`ArenaAllocator`](crate::memory::ArenaAllocator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatorConfig {
    /// Allocation granularity in bytes. Every granted size and the arena
    /// peak are multiples of it.
    pub alignment: usize,
    /// Plan name for diagnostics
    pub label: String,
}

impl AllocatorConfig {
    /// One 64-bit word
    pub const DEFAULT_ALIGNMENT: usize = std::mem::size_of::<u64>();

    /// Default plan label
    pub const DEFAULT_LABEL: &'static str = "arena";

    pub fn new() -> Self {
        Self {
            alignment: Self::DEFAULT_ALIGNMENT,
            label: Self::DEFAULT_LABEL.to_string(),
        }
    }

    /// Set the allocation granularity
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Set the plan label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Build a configuration from defaults overridden by environment variables
    pub fn from_env() -> PlanResult<Self> {
        let mut config = Self::new();

        if let Ok(raw) = std::env::var(ALIGNMENT_ENV) {
            let alignment = raw.trim().parse::<usize>().map_err(|e| {
                PlanError::InvalidConfiguration(format!(
                    "{}='{}' is not a byte count: {}",
                    ALIGNMENT_ENV, raw, e
                ))
            })?;
            config = config.with_alignment(alignment);
        }

        if let Ok(label) = std::env::var(LABEL_ENV) {
            config = config.with_label(label);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the configuration is usable
    pub fn validate(&self) -> PlanResult<()> {
        if !self.alignment.is_power_of_two() {
            return Err(PlanError::InvalidAlignment(self.alignment));
        }
        if self.label.trim().is_empty() {
            return Err(PlanError::InvalidConfiguration(
                "label cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::new()
    }
}
