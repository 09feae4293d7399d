#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIs, EnumTryAs};

/// Represents an integer type with a specific bit width.
///
/// Signedness is not represented here; instructions interpret the bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(transparent)]
pub struct IType {
    num_bits: u32,
}

impl IType {
    pub const I1: Self = Self { num_bits: 1 };
    pub const I8: Self = Self { num_bits: 8 };
    pub const I16: Self = Self { num_bits: 16 };
    pub const I32: Self = Self { num_bits: 32 };
    pub const I64: Self = Self { num_bits: 64 };

    /// Creates a new `IType` with the specified number of bits (1 to 64).
    #[inline]
    pub const fn new(num_bits: u32) -> Option<Self> {
        if num_bits >= 1 && num_bits <= 64 {
            Some(Self { num_bits })
        } else {
            None
        }
    }

    #[inline]
    pub const fn num_bits(&self) -> u32 {
        self.num_bits
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
    /// 16-bit floating point value (IEEE-754 binary16)
    Fp16,
    /// 32-bit floating point value (IEEE-754 binary32)
    Fp32,
    /// 64-bit floating point value (IEEE-754 binary64)
    Fp64,
}

impl FType {
    pub const fn num_bits(&self) -> u32 {
        match self {
            FType::Fp16 => 16,
            FType::Fp32 => 32,
            FType::Fp64 => 64,
        }
    }
}

impl std::fmt::Display for FType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FType::Fp16 => write!(f, "half"),
            FType::Fp32 => write!(f, "float"),
            FType::Fp64 => write!(f, "double"),
        }
    }
}

/// Non-composite types.
///
/// Pointers are opaque: the pointee is carried by the instruction that
/// produces or consumes the pointer, never by the pointer type itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PrimaryType {
    Void,
    Int(IType),
    Float(FType),
    Ptr,
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
            PrimaryType::Void => write!(f, "void"),
            PrimaryType::Int(ity) => std::fmt::Display::fmt(ity, f),
            PrimaryType::Float(fty) => std::fmt::Display::fmt(fty, f),
            PrimaryType::Ptr => write!(f, "ptr"),
        }
    }
}
