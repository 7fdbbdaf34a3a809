//! Shared fixtures for unit and integration tests.
use std::collections::BTreeMap;

use syinstr::modules::{
    BasicBlock, CallingConvention, FnAttrs, Function, Linkage, Module, Parameter,
    call::Call,
    operand::Label,
    terminator::Terminator,
};
use uuid::Uuid;

use crate::{
    kernel::{Demangler, KERNEL_MARKER},
    passes::serialize::runtime,
};

/// Table-backed demangler. Symbols absent from the table fail to demangle.
pub struct MapDemangler {
    map: BTreeMap<String, String>,
}

impl MapDemangler {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        MapDemangler {
            map: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Demangler for MapDemangler {
    fn demangle(&self, mangled: &str) -> Option<String> {
        self.map.get(mangled).cloned()
    }
}

/// A demangler that classifies exactly `names` as kernel instantiations.
pub fn kernel_demangler(names: &[&str]) -> MapDemangler {
    let entries: Vec<(String, String)> = names
        .iter()
        .map(|name| (name.to_string(), format!("{}lambda>()", KERNEL_MARKER)))
        .collect();
    MapDemangler {
        map: entries.into_iter().collect(),
    }
}

/// A body-less external function.
pub fn plain_function(name: &str) -> Function {
    Function {
        uuid: Uuid::nil(),
        name: name.to_string(),
        linkage: Linkage::External,
        cconv: CallingConvention::C,
        params: vec![],
        return_type: None,
        body: BTreeMap::new(),
        attrs: FnAttrs::empty(),
        personality: None,
        metadata: BTreeMap::new(),
    }
}

/// A defined function whose entry block calls each of `callees` in order.
pub fn calling_function(name: &str, callees: &[Uuid]) -> Function {
    let mut function = plain_function(name);
    function.body.insert(
        Label::NIL,
        BasicBlock {
            label: Label::NIL,
            name: None,
            instructions: callees
                .iter()
                .map(|callee| Call::direct_void(*callee, vec![]).into())
                .collect(),
            terminator: Terminator::ret_void(),
        },
    );
    function
}

/// A defined function with the given formal parameters and an empty body
/// block.
pub fn function_with_params(name: &str, params: Vec<Parameter>) -> Function {
    let mut function = plain_function(name);
    function.params = params;
    function.body.insert(
        Label::NIL,
        BasicBlock {
            label: Label::NIL,
            name: None,
            instructions: vec![],
            terminator: Terminator::ret_void(),
        },
    );
    function
}

/// Declare the four device-runtime entry points the lowering calls into.
pub fn declare_runtime_symbols(module: &mut Module) {
    for symbol in [
        runtime::SERIALIZE_ARG,
        runtime::LAUNCH_KERNEL,
        runtime::SET_KERNEL,
        runtime::BIND_TASK_MARKER,
    ] {
        module.declare_function(symbol, vec![], None);
    }
}
