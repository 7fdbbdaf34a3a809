//! Function call instruction.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;
use uuid::Uuid;

use crate::{
    modules::{
        Instruction,
        operand::{Name, Operand},
    },
    types::Typeref,
};

/// The target of a call.
///
/// Direct calls reference the callee function by identity, so renaming a
/// function never dangles a call edge. Everything else is `Indirect` and is
/// conservatively skipped by call-graph construction and every rewriting
/// pass; the source call-graph model only covers direct calls.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Callee {
    /// Call of a function known to the module.
    Direct(Uuid),

    /// Call through a computed pointer. Opaque to analysis.
    Indirect(Operand),
}

impl Callee {
    /// The callee's identity for a direct call, [`None`] otherwise.
    pub fn as_direct(&self) -> Option<Uuid> {
        match self {
            Callee::Direct(uuid) => Some(*uuid),
            Callee::Indirect(_) => None,
        }
    }
}

/// Function call instruction.
///
/// Calls cannot raise exceptions; control always continues with the next
/// instruction of the block.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Call {
    pub callee: Callee,

    /// The argument operands to pass to the function.
    pub args: Vec<Operand>,

    /// The destination SSA name for the return value, if any.
    pub dest: Option<Name>,

    /// The return type of the function being called. `None` for `void`.
    pub ty: Option<Typeref>,
}

impl Call {
    /// A void direct call, the only shape the serialization protocol emits.
    pub fn direct_void(callee: Uuid, args: Vec<Operand>) -> Self {
        Call {
            callee: Callee::Direct(callee),
            args,
            dest: None,
            ty: None,
        }
    }
}

impl Instruction for Call {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        let callee = match &self.callee {
            Callee::Direct(_) => None,
            Callee::Indirect(op) => Some(op),
        };
        callee.into_iter().chain(self.args.iter())
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        let callee = match &mut self.callee {
            Callee::Direct(_) => None,
            Callee::Indirect(op) => Some(op),
        };
        callee.into_iter().chain(self.args.iter_mut())
    }

    fn destination(&self) -> Option<Name> {
        self.dest
    }

    fn set_destination(&mut self, name: Name) {
        // Cannot change a void return into a non-void return.
        if self.dest.is_some() {
            self.dest = Some(name);
        }
    }
}
