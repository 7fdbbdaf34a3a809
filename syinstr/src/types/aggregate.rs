//! Aggregate types: fixed-size arrays and structures.
//!
//! Aggregates reference their element types through [`Typeref`] so they must
//! be rendered with access to the owning registry's storage.
use std::{collections::BTreeMap, ops::Deref};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::{AnyType, Typeref};

/// An array type: element typeref + element count.
///
/// The number of elements MUST be known at compile time; dynamically sized
/// arrays are not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArrayType {
    pub element: Typeref,
    pub count: u64,
}

impl ArrayType {
    pub(crate) fn internal_fmt<'a, U>(&'a self, ref_object: U) -> impl std::fmt::Display + 'a
    where
        U: Deref<Target = BTreeMap<u32, AnyType>> + 'a,
    {
        struct Fmt<'a, U> {
            ty: &'a ArrayType,
            ref_object: U,
        }

        impl<U: Deref<Target = BTreeMap<u32, AnyType>>> std::fmt::Display for Fmt<'_, U> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "[{} x ", self.ty.count)?;
                match self.ref_object.get(&self.ty.element.raw()) {
                    Some(elem) => elem.internal_fmt(self.ref_object.deref()).fmt(f)?,
                    None => write!(f, "<unknown type {}>", self.ty.element.raw())?,
                }
                write!(f, "]")
            }
        }

        Fmt {
            ty: self,
            ref_object,
        }
    }
}

/// A structure type: an ordered list of member typerefs.
///
/// Member layout (offsets, padding) is a property of the target data layout,
/// not of the type itself; see [`crate::layout::DataLayout`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StructType {
    pub members: Vec<Typeref>,
}

impl StructType {
    pub(crate) fn internal_fmt<'a, U>(&'a self, ref_object: U) -> impl std::fmt::Display + 'a
    where
        U: Deref<Target = BTreeMap<u32, AnyType>> + 'a,
    {
        struct Fmt<'a, U> {
            ty: &'a StructType,
            ref_object: U,
        }

        impl<U: Deref<Target = BTreeMap<u32, AnyType>>> std::fmt::Display for Fmt<'_, U> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{{ ")?;
                for (i, member) in self.ty.members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match self.ref_object.get(&member.raw()) {
                        Some(ty) => ty.internal_fmt(self.ref_object.deref()).fmt(f)?,
                        None => write!(f, "<unknown type {}>", member.raw())?,
                    }
                }
                write!(f, " }}")
            }
        }

        Fmt {
            ty: self,
            ref_object,
        }
    }
}
