//! Memory operations
//!
//! Stack allocation, loads, stores and pointer casts. This is the minimal
//! set the argument serialization lowering needs: a value argument is
//! spilled with `Alloca` + `Store`, and the resulting slot (or a pointer
//! argument directly) is narrowed to the opaque byte pointer with `PtrCast`
//! before being handed to the runtime.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    modules::{
        Instruction,
        operand::{Name, Operand},
    },
    types::Typeref,
};

/// Reserve a fresh stack slot for one value of type `ty`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Alloca {
    pub dest: Name,
    pub ty: Typeref,
    pub alignment: Option<u32>,
}

impl Instruction for Alloca {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::empty()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::empty()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }
}

/// Load a value of type `ty` from memory into a destination SSA name.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Load {
    pub dest: Name,
    pub ty: Typeref,
    pub addr: Operand,
}

impl Instruction for Load {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.addr)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.addr)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }
}

/// Store a value to memory.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Store {
    pub addr: Operand,
    pub value: Operand,
}

impl Instruction for Store {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.addr, &self.value].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.addr, &mut self.value].into_iter()
    }
}

/// Reinterpret a pointer value as a pointer of another type.
///
/// Address-space changing casts are not representable; the lowering only
/// narrows typed pointers to the byte pointer of the same address space.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PtrCast {
    pub dest: Name,
    pub value: Operand,
    pub to: Typeref,
}

impl Instruction for PtrCast {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.value)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.value)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }

    fn set_destination(&mut self, name: Name) {
        self.dest = name;
    }
}
