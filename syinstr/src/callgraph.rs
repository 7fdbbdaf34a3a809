//! Direct call graph of a module.
//!
//! Nodes are function identities, edges point from caller to callee. Only
//! direct calls contribute edges; indirect calls are invisible here, which
//! keeps every classification built on top of this graph an
//! over-approximation on the caller side only.
use petgraph::{algo::tarjan_scc, prelude::DiGraphMap};
use uuid::Uuid;

use crate::modules::Module;

/// The direct call graph of one module.
pub struct CallGraph {
    graph: DiGraphMap<Uuid, ()>,
}

impl CallGraph {
    /// Build the call graph of `module`. Every function is a node, even
    /// declarations and functions that never call or get called.
    pub fn build(module: &Module) -> Self {
        let mut graph = DiGraphMap::new();
        for function in module.functions.values() {
            graph.add_node(function.uuid);
        }
        for function in module.functions.values() {
            for callee in function.direct_callees() {
                graph.add_edge(function.uuid, callee, ());
            }
        }
        CallGraph { graph }
    }

    /// Strongly connected components in reverse topological order of the
    /// condensation: within the returned list, every component appears
    /// before any component that calls into it... i.e. callees first.
    ///
    /// Iterate the result in reverse to visit callers before callees.
    pub fn sccs_callees_first(&self) -> Vec<Vec<Uuid>> {
        tarjan_scc(&self.graph)
    }

    /// Functions that directly call `function`.
    pub fn callers_of(&self, function: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.graph
            .neighbors_directed(function, petgraph::Direction::Incoming)
    }

    /// Functions directly called by `function`.
    pub fn callees_of(&self, function: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.graph
            .neighbors_directed(function, petgraph::Direction::Outgoing)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::modules::{
        BasicBlock, CallingConvention, FnAttrs, Function, Linkage,
        call::Call,
        operand::Label,
        terminator::Terminator,
    };

    fn function_calling(name: &str, callees: &[Uuid]) -> Function {
        let mut body = BTreeMap::new();
        body.insert(
            Label::NIL,
            BasicBlock {
                label: Label::NIL,
                name: None,
                instructions: callees
                    .iter()
                    .map(|c| Call::direct_void(*c, vec![]).into())
                    .collect(),
                terminator: Terminator::ret_void(),
            },
        );
        Function {
            uuid: Uuid::nil(),
            name: name.to_string(),
            linkage: Linkage::External,
            cconv: CallingConvention::C,
            params: vec![],
            return_type: None,
            body,
            attrs: FnAttrs::empty(),
            personality: None,
            metadata: BTreeMap::new(),
        }
    }

    #[test]
    fn sccs_place_callees_before_callers() {
        let mut module = Module::new("m");
        let leaf = module.add_function(function_calling("leaf", &[]));
        let mid = module.add_function(function_calling("mid", &[leaf]));
        let root = module.add_function(function_calling("root", &[mid]));

        let graph = CallGraph::build(&module);
        let sccs = graph.sccs_callees_first();
        let position =
            |uuid| sccs.iter().position(|scc| scc.contains(&uuid)).unwrap();
        assert!(position(leaf) < position(mid));
        assert!(position(mid) < position(root));
    }

    #[test]
    fn mutual_recursion_collapses_to_one_component() {
        let mut module = Module::new("m");
        // Identities are name-derived, so both edges can be wired up front.
        let even = Module::function_uuid("even");
        let odd = Module::function_uuid("odd");
        module.add_function(function_calling("even", &[odd]));
        module.add_function(function_calling("odd", &[even]));

        let graph = CallGraph::build(&module);
        let sccs = graph.sccs_callees_first();
        assert!(sccs.iter().any(|scc| scc.len() == 2));
    }

    #[test]
    fn callers_of_sees_every_direct_caller() {
        let mut module = Module::new("m");
        let shared = module.add_function(function_calling("shared", &[]));
        let a = module.add_function(function_calling("a", &[shared]));
        let b = module.add_function(function_calling("b", &[shared]));

        let graph = CallGraph::build(&module);
        let mut callers: Vec<_> = graph.callers_of(shared).collect();
        callers.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(callers, expected);
    }
}
