//! Shared operand types for instructions.
//!
//! An instruction operand can be a reference to another SSA value (`Reg`) or
//! an immediate constant (`Imm`). Constants are deliberately small: the
//! rewriting passes only ever materialize machine integers (argument indices
//! and byte sizes) and the kernel-name string handed to the launch call.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

use crate::types::primary::IType;

/// SSA value identifier used to name the destination or reference another
/// instruction's result.
pub type Name = u32;

/// Represents a code label identifying a basic block within a function.
///
/// Labels never cross function boundaries; they are only valid within the
/// function they are defined in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Label(pub u32);

impl Label {
    /// Reserved as the function entry label. It should always be present.
    pub const NIL: Label = Label(0);

    /// Returns true if this is the entry label.
    pub fn is_nil(&self) -> bool {
        self == &Label::NIL
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if f.alternate() {
            write!(f, "label %block_{}", self.0)
        } else {
            write!(f, "%block_{}", self.0)
        }
    }
}

/// Immediate constant.
#[derive(Clone, Debug, PartialEq, Eq, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Const {
    /// Typed integer literal.
    Int { ty: IType, value: u64 },

    /// String literal. Lowered as a pointer to a constant byte array; only
    /// used for the kernel-name argument of the launch protocol.
    Str(String),
}

impl Const {
    /// An `i64` literal, the index/size type of the serialization protocol.
    pub fn i64(value: u64) -> Self {
        Const::Int {
            ty: IType::I64,
            value,
        }
    }
}

impl std::fmt::Display for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Const::Int { ty, value } => write!(f, "{} {}", ty, value),
            Const::Str(s) => write!(f, "c{:?}", s),
        }
    }
}

/// Instruction operand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operand {
    /// Reference to a previously defined SSA value.
    Reg(Name),
    /// Immediate literal.
    Imm(Const),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(name) => write!(f, "%{}", name),
            Operand::Imm(constant) => write!(f, "{}", constant),
        }
    }
}
