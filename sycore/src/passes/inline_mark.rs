//! In-kernel always-inline marking.
//!
//! Every internal definition with kernel context gets `ALWAYS_INLINE` so a
//! later inliner can flatten kernels into single functions before codegen.
//! Functions the front end pinned with `NO_INLINE` are respected.
use log::debug;
use syinstr::modules::{FnAttrs, Linkage, Module};

use crate::{ancestry::AncestrySet, passes::PassOutcome};

pub fn run(module: &mut Module, ancestry: &AncestrySet) -> PassOutcome {
    let mut marked = 0usize;
    for function in module.functions.values_mut() {
        if function.is_declaration()
            || function.linkage != Linkage::Internal
            || !ancestry.contains(function.uuid)
            || function.attrs.contains(FnAttrs::NO_INLINE)
            || function.attrs.contains(FnAttrs::ALWAYS_INLINE)
        {
            continue;
        }
        function.attrs.insert(FnAttrs::ALWAYS_INLINE);
        debug!("`{}` marked always-inline", function.name);
        marked += 1;
    }
    PassOutcome::changed_if(marked > 0)
}

#[cfg(test)]
mod tests {
    use syinstr::callgraph::CallGraph;

    use super::*;
    use crate::{
        kernel::KernelClassifier,
        tests_utils::{calling_function, kernel_demangler},
    };

    #[test]
    fn marks_internal_kernel_context_functions_only() {
        let mut module = Module::new("m");
        let helper = module.add_function(calling_function("helper", &[]));
        let pinned = module.add_function(calling_function("pinned", &[]));
        module.add_function(calling_function("_Z6kernelv", &[helper, pinned]));
        let stray = module.add_function(calling_function("stray", &[]));

        for uuid in [helper, pinned, stray] {
            module.functions.get_mut(&uuid).unwrap().linkage = Linkage::Internal;
        }
        module
            .functions
            .get_mut(&pinned)
            .unwrap()
            .attrs
            .insert(FnAttrs::NO_INLINE);

        let demangler = kernel_demangler(&["_Z6kernelv"]);
        let classifier = KernelClassifier::new(&demangler);
        let graph = CallGraph::build(&module);
        let ancestry = AncestrySet::compute(&module, &graph, &classifier);

        assert!(run(&mut module, &ancestry).is_changed());
        assert!(module.functions[&helper].attrs.contains(FnAttrs::ALWAYS_INLINE));
        assert!(!module.functions[&pinned].attrs.contains(FnAttrs::ALWAYS_INLINE));
        assert!(!module.functions[&stray].attrs.contains(FnAttrs::ALWAYS_INLINE));
        // The kernel itself kept external linkage, so it is not marked.
        assert!(run(&mut module, &ancestry).is_unchanged());
    }
}
