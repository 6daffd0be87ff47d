//! Processor configuration.
//!
//! Every field has a default, so a host can deserialize a partial
//! document (with the `serde` feature) and override only what it needs.

use crate::exceptions::FaultPolicy;
use crate::model::Model;

/// Settings fixed at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct ProcessorConfig {
    /// Processor family member. Default: 68000.
    pub model: Model,
    /// Bus and address error handling. Default: halt.
    pub fault_policy: FaultPolicy,
}

impl ProcessorConfig {
    #[must_use]
    pub const fn new(model: Model) -> Self {
        Self {
            model,
            fault_policy: FaultPolicy::Halt,
        }
    }

    #[must_use]
    pub const fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }
}
