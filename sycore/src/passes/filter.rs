//! Visibility partitioner.
//!
//! Splits the module into the externally visible kernel root set and
//! everything else, so the external dead-code eliminator can strip the
//! host side: kernels get external linkage and their canonical short name,
//! every other definition goes internal. Globals outside the reserved
//! intrinsic namespace and all aliases are internalized too, since the
//! eliminator treats anything externally visible or aliased as a root.
//! Static ctor/dtor lists are cleared outright; kernels keep no
//! program-scope constructors.
use log::{debug, info};
use syinstr::modules::{Linkage, Module};

use crate::{kernel::KernelClassifier, passes::PassOutcome, registry::KernelRegistry};

/// Namespace of symbols the dead-code eliminator must never touch.
const RESERVED_PREFIX: &str = "llvm.";

pub fn run(
    module: &mut Module,
    classifier: &KernelClassifier<'_>,
    registry: &mut KernelRegistry,
) -> PassOutcome {
    let mut kernels = 0usize;
    for function in module.functions.values_mut() {
        // Declarations are owned by whichever module defines them.
        if function.is_declaration() {
            continue;
        }
        if classifier.is_kernel(function) {
            let short = registry.register_and_short_name(&function.name);
            debug!("kernel `{}` becomes root `{}`", function.name, short);
            function.name = short;
            function.linkage = Linkage::External;
            kernels += 1;
        } else {
            function.linkage = Linkage::Internal;
        }
    }

    for global in module.globals.values_mut() {
        if global.initializer.is_some() && !global.name.starts_with(RESERVED_PREFIX) {
            global.linkage = Linkage::Internal;
        }
    }
    for alias in module.aliases.values_mut() {
        alias.linkage = Linkage::Internal;
    }

    if let Some(ctors) = module.global_ctors.as_mut() {
        ctors.clear();
    }
    if let Some(dtors) = module.global_dtors.as_mut() {
        dtors.clear();
    }

    info!("visibility partition kept {} kernel roots", kernels);

    // The partition is recomputed from scratch every time; report changed
    // unconditionally.
    PassOutcome::Changed
}
