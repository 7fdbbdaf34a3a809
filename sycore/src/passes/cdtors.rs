//! Empty ctor/dtor list removal.
//!
//! The partitioner leaves cleared initializer lists in place; some SPIR
//! consumers reject a present-but-empty list, so this stage deletes them.
//! Non-empty lists are left untouched.
use log::debug;
use syinstr::modules::Module;

use crate::passes::PassOutcome;

pub fn run(module: &mut Module) -> PassOutcome {
    let mut changed = false;
    if matches!(module.global_ctors.as_deref(), Some([])) {
        module.global_ctors = None;
        changed = true;
    }
    if matches!(module.global_dtors.as_deref(), Some([])) {
        module.global_dtors = None;
        changed = true;
    }
    if changed {
        debug!("dropped empty static initializer lists from `{}`", module.name);
    }
    PassOutcome::changed_if(changed)
}
