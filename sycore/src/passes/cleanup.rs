//! Symbol sanitizer.
//!
//! Downstream SPIR consumers reject symbols with characters outside
//! `[A-Za-z0-9_]` (C++ mangles template kernels with `$`-ridden names).
//! Every kernel-context function with such a name is renamed to a counter
//! suffix, and every basic block of those functions gets a positional
//! name. Purely cosmetic; runs after all other rewriting so it sees the
//! final membership.
use log::debug;
use syinstr::modules::Module;

use crate::{ancestry::AncestrySet, passes::PassOutcome};

const FUNC_PREFIX: &str = "sycl_func_";
const BLOCK_PREFIX: &str = "block_";

fn is_tool_safe(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub fn run(module: &mut Module, ancestry: &AncestrySet) -> PassOutcome {
    let mut changed = false;
    let mut renamed = 0u32;
    for function in module.functions.values_mut() {
        if !ancestry.contains(function.uuid) {
            continue;
        }

        if !is_tool_safe(&function.name) {
            let fresh = format!("{}{}", FUNC_PREFIX, renamed);
            debug!("`{}` renamed to `{}`", function.name, fresh);
            function.name = fresh;
            renamed += 1;
            changed = true;
        }

        for (position, block) in function.body.values_mut().enumerate() {
            let positional = format!("{}{}", BLOCK_PREFIX, position);
            if block.name.as_deref() != Some(&positional) {
                block.name = Some(positional);
                changed = true;
            }
        }
    }
    PassOutcome::changed_if(changed)
}

#[cfg(test)]
mod tests {
    use syinstr::callgraph::CallGraph;

    use super::*;
    use crate::{
        ancestry::AncestrySet,
        kernel::KernelClassifier,
        tests_utils::{calling_function, kernel_demangler},
    };

    fn run_on(names: &[&str], kernel: &str) -> Module {
        let mut module = Module::new("m");
        let callees: Vec<_> = names
            .iter()
            .map(|name| module.add_function(calling_function(name, &[])))
            .collect();
        module.add_function(calling_function(kernel, &callees));

        let demangler = kernel_demangler(&[kernel]);
        let classifier = KernelClassifier::new(&demangler);
        let graph = CallGraph::build(&module);
        let ancestry = AncestrySet::compute(&module, &graph, &classifier);
        run(&mut module, &ancestry);
        module
    }

    #[test]
    fn only_unsafe_kernel_context_names_are_rewritten() {
        let module = run_on(&["clean_name", "_ZTSZ4mainE$lambda$1"], "_Z6kernelv");
        assert!(module.function_by_name("clean_name").is_some());
        assert!(module.function_by_name("_ZTSZ4mainE$lambda$1").is_none());
        assert!(module.function_by_name("sycl_func_0").is_some());
    }

    #[test]
    fn renaming_is_deterministic() {
        let first = run_on(&["a$1", "b$2"], "_Z6kernelv");
        let second = run_on(&["a$1", "b$2"], "_Z6kernelv");
        let names = |m: &Module| -> Vec<String> {
            m.functions.values().map(|f| f.name.clone()).collect()
        };
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn blocks_of_kernel_context_functions_get_positional_names() {
        let module = run_on(&["helper"], "_Z6kernelv");
        let helper = module.function_by_name("helper").unwrap();
        let block_names: Vec<_> = helper
            .body
            .values()
            .map(|b| b.name.clone().unwrap())
            .collect();
        assert_eq!(block_names, vec!["block_0"]);
    }

    #[test]
    fn functions_without_kernel_context_are_left_alone() {
        let mut module = Module::new("m");
        module.add_function(calling_function("dirty$name", &[]));
        let demangler = kernel_demangler(&[]);
        let classifier = KernelClassifier::new(&demangler);
        let graph = CallGraph::build(&module);
        let ancestry = AncestrySet::compute(&module, &graph, &classifier);

        assert!(run(&mut module, &ancestry).is_unchanged());
        assert!(module.function_by_name("dirty$name").is_some());
    }
}
