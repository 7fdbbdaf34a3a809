//! Kernel reachability analysis.
//!
//! Computes the set of functions that are kernels or are transitively
//! invoked from one. The traversal walks strongly connected components of
//! the direct call graph with callers before callees, so a single pass
//! classifies every component even under mutual recursion: a whole SCC is
//! in the set as soon as one member is a kernel or one member has a caller
//! already known to be in the set.
//!
//! Indirect call edges are not modeled by the call graph and therefore not
//! followed; this is a documented property of the source graph, not
//! something this analysis can recover.
use std::collections::BTreeSet;

use log::debug;
use syinstr::{callgraph::CallGraph, modules::Module};
use uuid::Uuid;

use crate::kernel::KernelClassifier;

/// The set of kernel-context functions of one module.
///
/// Computed fresh per traversal; never persisted across modules.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AncestrySet {
    members: BTreeSet<Uuid>,
}

impl AncestrySet {
    /// Classify every function of `module`.
    pub fn compute(
        module: &Module,
        graph: &CallGraph,
        classifier: &KernelClassifier<'_>,
    ) -> Self {
        let mut members = BTreeSet::new();

        // tarjan_scc emits components callees-first; reversed, every caller
        // of a component is classified before the component itself.
        let sccs = graph.sccs_callees_first();
        for scc in sccs.iter().rev() {
            let reachable = scc.iter().any(|uuid| {
                let is_kernel = module
                    .functions
                    .get(uuid)
                    .is_some_and(|f| classifier.is_kernel(f));
                is_kernel
                    || graph
                        .callers_of(*uuid)
                        .any(|caller| members.contains(&caller) && !scc.contains(&caller))
            });
            if reachable {
                members.extend(scc.iter().copied());
            }
        }

        debug!(
            "{} of {} functions have kernel context",
            members.len(),
            module.functions.len()
        );
        AncestrySet { members }
    }

    pub fn contains(&self, function: Uuid) -> bool {
        self.members.contains(&function)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.members.iter().copied()
    }

    /// Incremental membership update for a function synthesized after the
    /// full traversal ran.
    ///
    /// Checks every caller of `function` against the computed set; one
    /// caller in the set is enough. Returns true if the set changed.
    pub fn reclassify(&mut self, graph: &CallGraph, function: Uuid) -> bool {
        if self.members.contains(&function) {
            return false;
        }
        if graph
            .callers_of(function)
            .any(|caller| self.members.contains(&caller))
        {
            self.members.insert(function);
            return true;
        }
        false
    }
}
