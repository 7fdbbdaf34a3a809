//! Types module
//!
//! This module contains the canonical representation of types used by the
//! `syinstr` crate. It exposes a small type system built on three layers:
//!
//! - Primary types: integer and floating-point scalars (see `primary.rs`).
//! - Pointer types: a pointee typeref plus an explicit address-space
//!   qualifier, as required by the SPIR target.
//! - Aggregate types: arrays and structures (see `aggregate.rs`).
//!
//! A registry-backed [`AnyType`] wrapper and [`TypeRegistry`] deduplicate
//! types and provide stable [`Typeref`] identifiers. The formatting helpers
//! (e.g. [`AnyType::fmt`]) accept a reference to [`TypeRegistry`] so that
//! pointer and aggregate types can resolve their element types for
//! human-friendly printing.
use std::{
    collections::BTreeMap,
    hash::{DefaultHasher, Hash, Hasher},
    ops::Deref,
};

use log::debug;
use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};

use crate::types::{
    aggregate::{ArrayType, StructType},
    primary::{IType, PrimaryType},
};

pub mod aggregate;
pub mod primary;

/// A stable reference to a type stored inside a [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Typeref(u32);

impl Typeref {
    /// Raw registry index backing this reference.
    #[inline]
    pub const fn raw(&self) -> u32 {
        self.0
    }
}

/// A pointer type: a pointee plus an explicit address-space qualifier.
///
/// Unlike an opaque pointer model, the pointee is kept because the argument
/// serialization lowering needs the pointee's allocation size and the SPIR
/// metadata synthesis needs the address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PointerType {
    pub pointee: Typeref,
    pub addr_space: u32,
}

/// A sum-type representing any type that can be stored in the registry.
///
/// [`AnyType`] implements `Hash`/`Eq` so it can be deduplicated by the
/// [`TypeRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnyType {
    /// Scalar types (integers and floats).
    Primary(PrimaryType),

    /// Pointer to another registered type.
    Pointer(PointerType),

    /// An array type: element typeref + element count.
    Array(ArrayType),

    /// A structure type: an ordered list of member typerefs.
    Struct(StructType),
}

impl<S: Into<PrimaryType>> From<S> for AnyType {
    fn from(value: S) -> Self {
        AnyType::Primary(value.into())
    }
}

impl From<PointerType> for AnyType {
    fn from(value: PointerType) -> Self {
        AnyType::Pointer(value)
    }
}

impl From<ArrayType> for AnyType {
    fn from(value: ArrayType) -> Self {
        AnyType::Array(value)
    }
}

impl From<StructType> for AnyType {
    fn from(value: StructType) -> Self {
        AnyType::Struct(value)
    }
}

impl AnyType {
    pub(crate) fn internal_fmt<'a, U>(&'a self, ref_object: U) -> impl std::fmt::Display + 'a
    where
        U: Deref<Target = BTreeMap<u32, AnyType>> + 'a,
    {
        struct AnyTypeFmt<'a, U> {
            ty: &'a AnyType,
            ref_object: U,
        }

        impl<U: Deref<Target = BTreeMap<u32, AnyType>>> std::fmt::Display for AnyTypeFmt<'_, U> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.ty {
                    AnyType::Primary(primary_type) => primary_type.fmt(f),
                    AnyType::Pointer(ptr) => {
                        match self.ref_object.get(&ptr.pointee.raw()) {
                            Some(pointee) => {
                                pointee.internal_fmt(self.ref_object.deref()).fmt(f)?
                            }
                            None => write!(f, "<unknown type {}>", ptr.pointee.raw())?,
                        }
                        if ptr.addr_space != 0 {
                            write!(f, " addrspace({})", ptr.addr_space)?;
                        }
                        write!(f, "*")
                    }
                    AnyType::Array(array_type) => {
                        array_type.internal_fmt(self.ref_object.deref()).fmt(f)
                    }
                    AnyType::Struct(struct_type) => {
                        struct_type.internal_fmt(self.ref_object.deref()).fmt(f)
                    }
                }
            }
        }

        AnyTypeFmt {
            ty: self,
            ref_object,
        }
    }

    /// Build a formatting helper that renders this type using the provided
    /// registry to resolve referenced element types.
    ///
    /// Example:
    /// ```rust
    /// # use syinstr::types::{AnyType, TypeRegistry, primary::IType};
    /// let reg = TypeRegistry::new();
    /// let t = AnyType::from(IType::I32);
    /// assert_eq!(format!("{}", t.fmt(&reg)), "i32");
    /// ```
    pub fn fmt<'a>(&'a self, registry: &'a TypeRegistry) -> impl std::fmt::Display {
        self.internal_fmt(registry.array.read_recursive())
    }
}

/// A central registry that stores and deduplicates [`AnyType`] values.
///
/// The registry provides fast lookup by [`Typeref`] and ensures identical
/// type descriptions map to the same stable identifier. Identifiers are
/// assigned densely in first-seen order, so a module built in a fixed order
/// always produces the same typerefs; this keeps downstream renaming and
/// metadata output reproducible.
pub struct TypeRegistry {
    array: RwLock<BTreeMap<u32, AnyType>>,
    inverse_lookup: RwLock<BTreeMap<u64, SmallVec<[u32; 1]>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    fn hash_ty(ty: &AnyType) -> u64 {
        let mut hasher = DefaultHasher::new();
        ty.hash(&mut hasher);
        hasher.finish()
    }

    /// Create a new, empty [`TypeRegistry`].
    pub fn new() -> Self {
        Self {
            array: Default::default(),
            // INFO: Always lock array before inverse_lookup to avoid deadlock
            inverse_lookup: Default::default(),
        }
    }

    /// Retrieve a borrowed [`AnyType`] for the given `typeref`. Returns
    /// [`None`] if the given `typeref` is not present in the registry.
    ///
    /// The returned guard keeps a read lock held for its lifetime; release it
    /// before calling [`Self::search_or_insert`].
    pub fn get(&self, typeref: Typeref) -> Option<MappedRwLockReadGuard<'_, AnyType>> {
        let array_lock = self.array.read_recursive();
        RwLockReadGuard::try_map(array_lock, |map| map.get(&typeref.0)).ok()
    }

    /// Insert `ty` into the registry if an equivalent type doesn't already
    /// exist and return the [`Typeref`] for it.
    ///
    /// If an identical type is already present, its existing [`Typeref`] is
    /// returned; otherwise the next dense identifier is allocated and the
    /// type is inserted.
    pub fn search_or_insert(&self, ty: AnyType) -> Typeref {
        let h = Self::hash_ty(&ty);

        // Lock order is critical: always array first.
        let mut array_lock = self.array.upgradable_read();
        let mut inverse_lookup_lock = self.inverse_lookup.upgradable_read();

        if let Some(typerefs) = inverse_lookup_lock.get(&h) {
            for typeref in typerefs {
                if &array_lock[typeref] == &ty {
                    return Typeref(*typeref);
                }
            }
        }

        // NOTE: Ordering of upgrade is paramount to avoid deadlock
        array_lock.with_upgraded(|array_lock| {
            inverse_lookup_lock.with_upgraded(|inverse_lookup_lock| {
                let new_typeref = array_lock.len() as u32;

                if let Some(list) = inverse_lookup_lock.get_mut(&h) {
                    debug!(
                        "Hash collision on 0x{:016x} while inserting {} (existing: {:?})",
                        h,
                        ty.internal_fmt(&*array_lock),
                        list
                    );
                    list.push(new_typeref);
                } else {
                    debug!(
                        "New type encountered {}. Registered as typeref {}.",
                        ty.internal_fmt(&*array_lock),
                        new_typeref
                    );
                    inverse_lookup_lock.insert(h, smallvec![new_typeref]);
                }

                array_lock.insert(new_typeref, ty);
                Typeref(new_typeref)
            })
        })
    }

    /// Convenience: register a pointer to `pointee` in the given address
    /// space.
    pub fn pointer_to(&self, pointee: Typeref, addr_space: u32) -> Typeref {
        self.search_or_insert(AnyType::Pointer(PointerType {
            pointee,
            addr_space,
        }))
    }

    /// Convenience: the opaque byte pointer (`i8*` in address space 0) used
    /// by the serialization protocol.
    pub fn byte_pointer(&self) -> Typeref {
        let i8_ref = self.search_or_insert(IType::I8.into());
        self.pointer_to(i8_ref, 0)
    }

    /// If `typeref` names a pointer type, return its description.
    pub fn as_pointer(&self, typeref: Typeref) -> Option<PointerType> {
        match self.get(typeref).as_deref() {
            Some(AnyType::Pointer(ptr)) => Some(*ptr),
            _ => None,
        }
    }

    /// Format a given [`Typeref`] using this registry.
    pub fn fmt(&self, typeref: Typeref) -> impl std::fmt::Display {
        struct Fmt<'a> {
            registry: &'a TypeRegistry,
            typeref: Typeref,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self.registry.get(self.typeref) {
                    Some(ty_guard) => ty_guard.fmt(self.registry).fmt(f),
                    None => write!(f, "<unknown type {}>", self.typeref.0),
                }
            }
        }

        Fmt {
            registry: self,
            typeref,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::primary::FType;

    #[test]
    fn deduplicates_identical_types() {
        let reg = TypeRegistry::new();
        let a = reg.search_or_insert(IType::I32.into());
        let b = reg.search_or_insert(IType::I32.into());
        assert_eq!(a, b);
        assert_ne!(a, reg.search_or_insert(IType::I64.into()));
    }

    #[test]
    fn typerefs_are_dense_and_first_seen_ordered() {
        let reg = TypeRegistry::new();
        let a = reg.search_or_insert(IType::I8.into());
        let b = reg.search_or_insert(FType::Fp32.into());
        assert_eq!(a.raw(), 0);
        assert_eq!(b.raw(), 1);
    }

    #[test]
    fn pointer_formatting_carries_address_space() {
        let reg = TypeRegistry::new();
        let i32_ref = reg.search_or_insert(IType::I32.into());
        let plain = reg.pointer_to(i32_ref, 0);
        let global = reg.pointer_to(i32_ref, 1);
        assert_eq!(format!("{}", reg.fmt(plain)), "i32*");
        assert_eq!(format!("{}", reg.fmt(global)), "i32 addrspace(1)*");
    }

    #[test]
    fn aggregate_formatting_resolves_elements() {
        let reg = TypeRegistry::new();
        let i16_ref = reg.search_or_insert(IType::I16.into());
        let arr = reg.search_or_insert(
            ArrayType {
                element: i16_ref,
                count: 4,
            }
            .into(),
        );
        assert_eq!(format!("{}", reg.fmt(arr)), "[4 x i16]");

        let st = reg.search_or_insert(
            StructType {
                members: vec![i16_ref, arr],
            }
            .into(),
        );
        assert_eq!(format!("{}", reg.fmt(st)), "{ i16, [4 x i16] }");
    }
}
