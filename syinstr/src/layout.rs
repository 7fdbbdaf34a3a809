//! Target data layout oracle.
//!
//! Sizes and alignments are a property of the target, not of the types
//! themselves, so every pass that needs a byte size must go through a
//! [`DataLayout`] instead of guessing from the type description. The
//! defaults describe the portable 64-bit SPIR target (8-byte pointers).
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    types::{AnyType, TypeRegistry, Typeref, primary::PrimaryType},
    utils::Error,
};

/// Size/alignment oracle for one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DataLayout {
    pub pointer_size: u64,
    pub pointer_align: u64,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::spir64()
    }
}

impl DataLayout {
    /// The layout of the portable 64-bit SPIR kernel target.
    pub const fn spir64() -> Self {
        Self {
            pointer_size: 8,
            pointer_align: 8,
        }
    }

    /// ABI alignment of `typeref` in bytes.
    pub fn abi_align(&self, registry: &TypeRegistry, typeref: Typeref) -> Result<u64, Error> {
        let ty = registry
            .get(typeref)
            .ok_or_else(|| Error::unknown_type(typeref))?
            .clone();
        match ty {
            AnyType::Primary(primary) => {
                let size = match primary {
                    PrimaryType::Int(ity) => ity.byte_size() as u64,
                    PrimaryType::Float(fty) => fty.byte_size() as u64,
                };
                // Scalars are aligned to their size rounded up to a power of
                // two, capped at the pointer alignment.
                Ok(size.next_power_of_two().min(self.pointer_align))
            }
            AnyType::Pointer(_) => Ok(self.pointer_align),
            AnyType::Array(array) => self.abi_align(registry, array.element),
            AnyType::Struct(st) => {
                let mut align = 1;
                for member in &st.members {
                    align = align.max(self.abi_align(registry, *member)?);
                }
                Ok(align)
            }
        }
    }

    /// Allocation size of `typeref` in bytes: the number of bytes a value of
    /// the type occupies in memory, including tail padding.
    ///
    /// This is the size the serialization protocol hands to the runtime.
    pub fn alloc_size(&self, registry: &TypeRegistry, typeref: Typeref) -> Result<u64, Error> {
        let ty = registry
            .get(typeref)
            .ok_or_else(|| Error::unknown_type(typeref))?
            .clone();
        match ty {
            AnyType::Primary(primary) => {
                let size = match primary {
                    PrimaryType::Int(ity) => ity.byte_size() as u64,
                    PrimaryType::Float(fty) => fty.byte_size() as u64,
                };
                let align = self.abi_align(registry, typeref)?;
                Ok(round_up(size, align))
            }
            AnyType::Pointer(_) => Ok(self.pointer_size),
            AnyType::Array(array) => {
                let element = self.alloc_size(registry, array.element)?;
                Ok(element * array.count)
            }
            AnyType::Struct(st) => {
                let mut offset = 0;
                for member in &st.members {
                    let align = self.abi_align(registry, *member)?;
                    offset = round_up(offset, align);
                    offset += self.alloc_size(registry, *member)?;
                }
                let align = self.abi_align(registry, typeref)?;
                Ok(round_up(offset, align))
            }
        }
    }
}

fn round_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        aggregate::{ArrayType, StructType},
        primary::{FType, IType},
    };

    #[test]
    fn scalar_sizes_match_the_wire_contract() {
        let reg = TypeRegistry::new();
        let dl = DataLayout::spir64();

        let i8_ref = reg.search_or_insert(IType::I8.into());
        let i32_ref = reg.search_or_insert(IType::I32.into());
        let i64_ref = reg.search_or_insert(IType::I64.into());
        assert_eq!(dl.alloc_size(&reg, i8_ref).unwrap(), 1);
        assert_eq!(dl.alloc_size(&reg, i32_ref).unwrap(), 4);
        assert_eq!(dl.alloc_size(&reg, i64_ref).unwrap(), 8);
    }

    #[test]
    fn pointers_are_eight_bytes_regardless_of_pointee() {
        let reg = TypeRegistry::new();
        let dl = DataLayout::spir64();

        let i8_ref = reg.search_or_insert(IType::I8.into());
        let ptr = reg.pointer_to(i8_ref, 1);
        assert_eq!(dl.alloc_size(&reg, ptr).unwrap(), 8);
    }

    #[test]
    fn struct_size_includes_padding() {
        let reg = TypeRegistry::new();
        let dl = DataLayout::spir64();

        let i8_ref = reg.search_or_insert(IType::I8.into());
        let i32_ref = reg.search_or_insert(IType::I32.into());
        // { i8, i32 } pads the first member to the i32 alignment.
        let st = reg.search_or_insert(
            StructType {
                members: vec![i8_ref, i32_ref],
            }
            .into(),
        );
        assert_eq!(dl.alloc_size(&reg, st).unwrap(), 8);
        assert_eq!(dl.abi_align(&reg, st).unwrap(), 4);
    }

    #[test]
    fn array_size_is_element_count_times_alloc_size() {
        let reg = TypeRegistry::new();
        let dl = DataLayout::spir64();

        let f32_ref = reg.search_or_insert(FType::Fp32.into());
        let arr = reg.search_or_insert(
            ArrayType {
                element: f32_ref,
                count: 6,
            }
            .into(),
        );
        assert_eq!(dl.alloc_size(&reg, arr).unwrap(), 24);
    }

    #[test]
    fn unknown_typeref_is_an_error() {
        let reg = TypeRegistry::new();
        let other = TypeRegistry::new();
        let dl = DataLayout::spir64();

        let i32_ref = reg.search_or_insert(IType::I32.into());
        // Resolving against the wrong registry must not panic.
        assert!(dl.alloc_size(&other, i32_ref).is_err());
    }
}
