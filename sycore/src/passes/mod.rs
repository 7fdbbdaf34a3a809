//! The rewriting stages, in the order the driver runs them.
use strum::EnumIs;

pub mod cdtors;
pub mod cleanup;
pub mod filter;
pub mod inline_mark;
pub mod inspire;
pub mod serialize;

/// Whether a stage mutated the module it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIs)]
pub enum PassOutcome {
    Changed,
    Unchanged,
}

impl PassOutcome {
    pub fn changed_if(changed: bool) -> Self {
        if changed {
            PassOutcome::Changed
        } else {
            PassOutcome::Unchanged
        }
    }
}
