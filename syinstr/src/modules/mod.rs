//! Instruction IR modules
//!
//! This module groups the instruction kinds and containers exposed by the
//! offload IR. Each instruction is represented as a small data structure
//! with public fields, making it easy to construct and inspect. Submodules
//! contain families of operations:
//!
//! - `call`: direct and indirect function calls
//! - `mem`: stack allocation, loads, stores and pointer casts
//! - `terminator`: control flow terminators
//! - `operand`: shared operand and SSA name types
//!
//! You typically manipulate instructions via the `Instr` enum which is a
//! tagged union of all concrete instruction forms.
use std::collections::BTreeMap;

use bitflags::bitflags;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    modules::{
        instructions::Instr,
        operand::{Const, Label, Name, Operand},
        terminator::Terminator,
    },
    types::Typeref,
    utils::Error,
};

pub mod call;
pub mod instructions;
pub mod mem;
pub mod operand;
pub mod terminator;

/// Common interface implemented by every instruction node.
///
/// This trait provides lightweight, zero-allocation iteration over an
/// instruction's input operands and exposes its optional destination SSA
/// name when present.
pub trait Instruction {
    /// Iterate over all input operands for this instruction.
    fn operands(&self) -> impl Iterator<Item = &Operand>;

    /// Return the destination SSA name if the instruction produces a result.
    fn destination(&self) -> Option<Name> {
        None
    }

    /// Update the destination SSA name for this instruction. No-op if the
    /// instruction does not produce a result.
    fn set_destination(&mut self, _name: Name) {}

    /// Mutably iterate over all input operands for this instruction.
    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand>;

    /// Convenience iterator over referenced SSA names (i.e., register
    /// operands). Immediates are ignored.
    fn name_dependencies(&self) -> impl Iterator<Item = Name> {
        self.operands().filter_map(|op| match op {
            Operand::Reg(reg) => Some(*reg),
            _ => None,
        })
    }
}

/// All global variables and functions have one of the following linkages.
///
/// The visibility partition only ever needs to distinguish "reachable from
/// outside this translation unit" from "not".
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Linkage {
    /// May be referenced by, and defined in, other modules.
    #[default]
    External,

    /// Only accessible within the current module. Shows as a local symbol
    /// (STB_LOCAL in the case of ELF) in the object file; corresponds to
    /// the notion of the `static` keyword in C.
    Internal,
}

/// Calling convention attached to functions and calls.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CallingConvention {
    /// The target's C calling convention, the default when nothing else is
    /// specified.
    #[default]
    C,

    /// SPIR non-kernel device function convention.
    SpirFunc,

    /// SPIR kernel entry point convention. Only functions with this
    /// convention are enumerated by an OpenCL-style runtime.
    SpirKernel,
}

bitflags! {
    /// Function-level attributes.
    #[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct FnAttrs: u8 {
        const ALWAYS_INLINE = 1 << 0;
        const NO_INLINE = 1 << 1;
    }
}

bitflags! {
    /// Parameter-level attributes.
    #[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub struct ParamAttrs: u8 {
        /// The callee never writes through this pointer parameter.
        const READ_ONLY = 1 << 0;
        /// The pointer does not alias any other parameter.
        const NO_ALIAS = 1 << 1;
    }
}

/// One value of a metadata node.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetaValue {
    Int(u64),
    Str(String),
}

/// An ordered metadata node, one entry per function parameter for the
/// per-argument kinds.
pub type MetaNode = Vec<MetaValue>;

/// A formal parameter of a function.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Parameter {
    pub name: Name,
    pub ty: Typeref,
    pub attrs: ParamAttrs,
}

impl Parameter {
    pub fn new(name: Name, ty: Typeref) -> Self {
        Parameter {
            name,
            ty,
            attrs: ParamAttrs::empty(),
        }
    }
}

/// A basic block within a function, containing a sequence of instructions
/// and ending with a control flow terminator.
///
/// Blocks optionally carry a source-level name; the symbol sanitizer
/// discards those in favor of positional names.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    pub label: Label,
    pub name: Option<String>,
    pub instructions: Vec<Instr>,
    pub terminator: Terminator,
}

/// A function made of basic blocks and parameter metadata.
///
/// A `Function` owns its control-flow graph (`body`); a function with an
/// empty body is a declaration, resolved by the final link. By convention
/// the entrypoint is the basic block with the [`Label::NIL`] label.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Function {
    pub uuid: Uuid,
    pub name: String,
    pub linkage: Linkage,
    pub cconv: CallingConvention,
    pub params: Vec<Parameter>,
    pub return_type: Option<Typeref>,
    pub body: BTreeMap<Label, BasicBlock>,
    pub attrs: FnAttrs,

    /// Exception personality routine, when the front end attached one.
    pub personality: Option<Uuid>,

    /// Named metadata nodes attached to the function, keyed by kind
    /// (e.g. `kernel_arg_addr_space`).
    pub metadata: BTreeMap<String, MetaNode>,
}

impl Function {
    /// True if this function carries no body and is resolved externally.
    pub fn is_declaration(&self) -> bool {
        self.body.is_empty()
    }

    /// The entry block, if the function has a body.
    pub fn entry_block(&self) -> Result<&BasicBlock, Error> {
        self.body.get(&Label::NIL).ok_or(Error::MissingEntryBlock {
            function: self.name.clone(),
        })
    }

    /// Find the next available [`Name`] for a fresh SSA value.
    pub fn next_available_name(&self) -> Name {
        let mut max_index = 0;
        for param in &self.params {
            max_index = max_index.max(param.name);
        }

        for bb in self.body.values() {
            for instr in &bb.instructions {
                if let Some(dest) = instr.destination() {
                    max_index = max_index.max(dest);
                }
                for name in instr.name_dependencies() {
                    max_index = max_index.max(name);
                }
            }
        }

        max_index + 1
    }

    /// Find the next available [`Label`] for a fresh basic block.
    pub fn next_available_label(&self) -> Label {
        match self.body.keys().next_back() {
            Some(label) => Label(label.0 + 1),
            None => Label::NIL,
        }
    }

    /// Iterate over every instruction of the body, in deterministic
    /// block-then-position order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instr> {
        self.body.values().flat_map(|bb| bb.instructions.iter())
    }

    /// Identities of every function this body calls directly.
    pub fn direct_callees(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.instructions()
            .filter_map(|instr| instr.as_direct_call())
    }
}

/// A global variable definition or declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalVariable {
    pub uuid: Uuid,
    pub name: String,
    pub ty: Typeref,
    pub linkage: Linkage,
    pub is_constant: bool,
    pub initializer: Option<Const>,
    pub addr_space: u32,
}

/// An alias naming another global value of the module.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalAlias {
    pub uuid: Uuid,
    pub name: String,
    pub linkage: Linkage,
    pub aliasee: Uuid,
}

/// A module containing functions, globals and aliases.
///
/// `Module` acts as the compilation unit boundary for symbol visibility.
/// Contents are keyed by UUID in `BTreeMap`s, so iteration order is always
/// deterministic for a given input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Module {
    pub name: String,
    pub target_triple: Option<String>,

    pub functions: BTreeMap<Uuid, Function>,
    pub globals: BTreeMap<Uuid, GlobalVariable>,
    pub aliases: BTreeMap<Uuid, GlobalAlias>,

    /// Static initializer list, in execution order. `None` when the module
    /// carries no such list at all.
    pub global_ctors: Option<Vec<Uuid>>,
    /// Static finalizer list, mirror of `global_ctors`.
    pub global_dtors: Option<Vec<Uuid>>,

    /// Module-level named metadata, e.g. `opencl.spir.version`.
    pub metadata: BTreeMap<String, Vec<MetaNode>>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Mint the identity a value named `name` of the given namespace gets.
    ///
    /// Identities are derived from the symbol name so that two runs over
    /// the same input produce byte-identical modules, including every
    /// UUID-keyed iteration order.
    fn mint_uuid(kind: &str, name: &str) -> Uuid {
        let mut scratch = String::with_capacity(kind.len() + 1 + name.len());
        scratch.push_str(kind);
        scratch.push(':');
        scratch.push_str(name);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, scratch.as_bytes())
    }

    /// The identity a function named `name` has (or would get) in any
    /// module. Useful for wiring call edges before the callee is inserted.
    pub fn function_uuid(name: &str) -> Uuid {
        Self::mint_uuid("fn", name)
    }

    /// Insert `function`, assigning it a name-derived identity.
    ///
    /// Returns the assigned identity. Inserting a second function with the
    /// same name replaces the first.
    pub fn add_function(&mut self, mut function: Function) -> Uuid {
        let uuid = Self::mint_uuid("fn", &function.name);
        function.uuid = uuid;
        self.functions.insert(uuid, function);
        uuid
    }

    /// Insert a body-less function, the shape every runtime entry point
    /// takes before the final link.
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        params: Vec<Parameter>,
        return_type: Option<Typeref>,
    ) -> Uuid {
        self.add_function(Function {
            uuid: Uuid::nil(),
            name: name.into(),
            linkage: Linkage::External,
            cconv: CallingConvention::C,
            params,
            return_type,
            body: BTreeMap::new(),
            attrs: FnAttrs::empty(),
            personality: None,
            metadata: BTreeMap::new(),
        })
    }

    pub fn add_global(&mut self, mut global: GlobalVariable) -> Uuid {
        let uuid = Self::mint_uuid("global", &global.name);
        global.uuid = uuid;
        self.globals.insert(uuid, global);
        uuid
    }

    pub fn add_alias(&mut self, mut alias: GlobalAlias) -> Uuid {
        let uuid = Self::mint_uuid("alias", &alias.name);
        alias.uuid = uuid;
        self.aliases.insert(uuid, alias);
        uuid
    }

    pub fn function_by_name(&self, name: &str) -> Option<&Function> {
        self.functions.values().find(|f| f.name == name)
    }

    pub fn function_by_name_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.values_mut().find(|f| f.name == name)
    }

    /// Check structural well-formedness: every definition has an entry
    /// block, every branch target names a block of its function, every
    /// direct callee and aliasee is part of the module.
    pub fn verify(&self) -> Result<(), Error> {
        for function in self.functions.values() {
            if !function.is_declaration() {
                function.entry_block()?;
            }
            for block in function.body.values() {
                for target in block.terminator.iter_targets() {
                    if !function.body.contains_key(&target) {
                        return Err(Error::UndefinedLabel {
                            function: function.name.clone(),
                            label: target,
                        });
                    }
                }
            }
            for callee in function.direct_callees() {
                if !self.functions.contains_key(&callee) {
                    return Err(Error::UndefinedFunction {
                        function: function.name.clone(),
                        undefined: callee,
                    });
                }
            }
        }
        for alias in self.aliases.values() {
            if !self.functions.contains_key(&alias.aliasee)
                && !self.globals.contains_key(&alias.aliasee)
            {
                return Err(Error::UndefinedAliasee {
                    alias: alias.name.clone(),
                    undefined: alias.aliasee,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        modules::{
            call::Call,
            terminator::{Ret, Terminator},
        },
        types::TypeRegistry,
    };

    fn empty_function(name: &str) -> Function {
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

    fn with_entry(mut function: Function) -> Function {
        function.body.insert(
            Label::NIL,
            BasicBlock {
                label: Label::NIL,
                name: None,
                instructions: vec![],
                terminator: Terminator::Ret(Ret { value: None }),
            },
        );
        function
    }

    #[test]
    fn identities_are_stable_across_modules() {
        let mut a = Module::new("a");
        let mut b = Module::new("b");
        let ua = a.add_function(empty_function("work"));
        let ub = b.add_function(empty_function("work"));
        assert_eq!(ua, ub);

        // Different namespaces never collide on equal names.
        let ug = a.add_global(GlobalVariable {
            uuid: Uuid::nil(),
            name: "work".to_string(),
            ty: TypeRegistry::new().byte_pointer(),
            linkage: Linkage::External,
            is_constant: false,
            initializer: None,
            addr_space: 0,
        });
        assert_ne!(ua, ug);
    }

    #[test]
    fn verify_rejects_dangling_callees() {
        let mut module = Module::new("m");
        let ghost = Uuid::new_v4();
        let mut caller = with_entry(empty_function("caller"));
        caller
            .body
            .get_mut(&Label::NIL)
            .unwrap()
            .instructions
            .push(Call::direct_void(ghost, vec![]).into());
        module.add_function(caller);

        let err = module.verify().unwrap_err();
        assert!(err.is_undefined_function());
    }

    #[test]
    fn verify_rejects_dangling_branch_targets() {
        let mut module = Module::new("m");
        let mut function = with_entry(empty_function("f"));
        function.body.get_mut(&Label::NIL).unwrap().terminator =
            Terminator::Jump(crate::modules::terminator::Jump { target: Label(7) });
        module.add_function(function);

        let err = module.verify().unwrap_err();
        assert!(err.is_undefined_label());
    }

    #[test]
    fn next_available_name_skips_params_and_destinations() {
        let reg = TypeRegistry::new();
        let byte_ptr = reg.byte_pointer();
        let mut function = with_entry(empty_function("f"));
        function.params.push(Parameter::new(0, byte_ptr));
        function.params.push(Parameter::new(1, byte_ptr));
        assert_eq!(function.next_available_name(), 2);
    }

    #[test]
    fn next_available_label_follows_the_last_block() {
        let function = with_entry(empty_function("f"));
        assert_eq!(function.next_available_label(), Label(1));

        let empty = empty_function("g");
        assert_eq!(empty.next_available_label(), Label::NIL);
    }
}
