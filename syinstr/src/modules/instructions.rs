use auto_enums::auto_enum;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumDiscriminants, EnumIs, EnumTryAs};

use crate::modules::{Instruction, call, mem, operand::Operand};

/// Discriminated union covering all public instruction kinds.
///
/// Use this enum to store heterogeneous instruction streams and to
/// pattern-match on specific operations. The generated `InstrKind`
/// discriminant (via `strum`) can be helpful for fast classification.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(InstrKind))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Instr {
    Call(call::Call),

    // Memory instructions
    Load(mem::Load),
    Store(mem::Store),
    Alloca(mem::Alloca),
    PtrCast(mem::PtrCast),
}

impl Instr {
    /// The callee identity if this is a direct call, [`None`] otherwise.
    pub fn as_direct_call(&self) -> Option<uuid::Uuid> {
        match self {
            Instr::Call(call) => call.callee.as_direct(),
            _ => None,
        }
    }
}

macro_rules! define_instr_any_instr {
    (
        $($variant:ident),*
    ) => {
        impl Instruction for Instr {
            #[auto_enum(Iterator)]
            fn operands(&self) -> impl Iterator<Item = &Operand> {
                match self {
                    $(
                        Instr::$variant(instr) => instr.operands(),
                    )*
                }
            }

            fn destination(&self) -> Option<super::operand::Name> {
                match self {
                    $(
                        Instr::$variant(instr) => instr.destination(),
                    )*
                }
            }

            #[auto_enum(Iterator)]
            fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
                match self {
                    $(
                        Instr::$variant(instr) => instr.operands_mut(),
                    )*
                }
            }

            fn set_destination(&mut self, name: super::operand::Name) {
                match self {
                    $(
                        Instr::$variant(instr) => instr.set_destination(name),
                    )*
                }
            }
        }
    };
}

define_instr_any_instr! {
    Call,
    Load,
    Store,
    Alloca,
    PtrCast
}

macro_rules! define_instr_from {
    ($typ:ty, $variant:ident) => {
        impl From<$typ> for Instr {
            fn from(inst: $typ) -> Self {
                Instr::$variant(inst)
            }
        }
    };
}

define_instr_from!(call::Call, Call);
define_instr_from!(mem::Load, Load);
define_instr_from!(mem::Store, Store);
define_instr_from!(mem::Alloca, Alloca);
define_instr_from!(mem::PtrCast, PtrCast);
