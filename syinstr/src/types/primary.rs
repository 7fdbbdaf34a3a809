#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::EnumIs;

/// Represents an integer type with a specific bit width.
///
/// Signedness is not represented here; all integer types are treated as raw
/// bit patterns. Instructions that operate on signed integers interpret the
/// bits accordingly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct IType {
    num_bits: u32,
}

impl IType {
    /// Common integer types of the SPIR target.
    pub const I1: Self = Self { num_bits: 1 };
    pub const I8: Self = Self { num_bits: 8 };
    pub const I16: Self = Self { num_bits: 16 };
    pub const I32: Self = Self { num_bits: 32 };
    pub const I64: Self = Self { num_bits: 64 };

    pub const MIN_BITS: u32 = 1;
    pub const MAX_BITS: u32 = 64;

    /// Creates a new integer type with the specified number of bits.
    #[inline]
    pub const fn new(num_bits: u32) -> Option<Self> {
        if num_bits >= Self::MIN_BITS && num_bits <= Self::MAX_BITS {
            Some(Self { num_bits })
        } else {
            None
        }
    }

    /// Returns the number of bits of the integer type.
    #[inline]
    pub const fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Returns the number of bytes required to store the integer type.
    #[inline]
    pub const fn byte_size(&self) -> u32 {
        self.num_bits.div_ceil(8)
    }
}

impl std::fmt::Display for IType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "i{}", self.num_bits)
    }
}

/// Represents a floating-point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FType {
    /// 16-bit floating point value (IEEE-754 binary16).
    Fp16,

    /// 32-bit floating point value (IEEE-754 binary32).
    /// Corresponds to Rust's `f32` type.
    Fp32,

    /// 64-bit floating point value (IEEE-754 binary64).
    /// Corresponds to Rust's `f64` type.
    Fp64,
}

impl FType {
    /// Returns the number of bytes required to store the floating-point type.
    #[inline]
    pub const fn byte_size(&self) -> u32 {
        match self {
            FType::Fp16 => 2,
            FType::Fp32 => 4,
            FType::Fp64 => 8,
        }
    }
}

impl std::fmt::Display for FType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FType::Fp16 => "half",
            FType::Fp32 => "float",
            FType::Fp64 => "double",
        };
        write!(f, "{}", s)
    }
}

/// Non-composite scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PrimaryType {
    Int(IType),
    Float(FType),
}

impl From<IType> for PrimaryType {
    fn from(value: IType) -> Self {
        PrimaryType::Int(value)
    }
}

impl From<FType> for PrimaryType {
    fn from(value: FType) -> Self {
        PrimaryType::Float(value)
    }
}

impl std::fmt::Display for PrimaryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrimaryType::Int(ity) => ity.fmt(f),
            PrimaryType::Float(fty) => fty.fmt(f),
        }
    }
}
