//! Shared operand types for instructions.
//!
//! An instruction operand can be a reference to another SSA value (`Reg`),
//! an immediate constant (`Imm`), or the address of a module-level symbol
//! (`Global` / `Func`).
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{EnumIs, EnumTryAs};

use crate::{
    module::{FunctionId, GlobalId},
    types::Typeref,
};

/// SSA value identifier used to name the destination or reference another
/// instruction's result. Parameters share the same namespace.
pub type Name = u32;

/// Represents a basic block label within a function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Label(pub u32);

impl Label {
    /// The entry block of every defined function.
    pub const NIL: Label = Label(0);

    pub fn is_nil(&self) -> bool {
        self == &Label::NIL
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%block_{}", self.0)
    }
}

/// Immediate constant.
///
/// Floating-point immediates are stored as raw `f64` bits so that constants
/// remain `Eq`/`Hash` and compare bit-exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Constant {
    Int { ty: Typeref, value: u64 },
    Float { ty: Typeref, bits: u64 },
    Undef(Typeref),
}

impl Constant {
    pub fn float(ty: Typeref, value: f64) -> Self {
        Constant::Float {
            ty,
            bits: value.to_bits(),
        }
    }

    pub fn ty(&self) -> Typeref {
        match self {
            Constant::Int { ty, .. } | Constant::Float { ty, .. } | Constant::Undef(ty) => *ty,
        }
    }
}

/// Instruction operand.
#[derive(Clone, Debug, PartialEq, Eq, Hash, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Operand {
    /// Reference to a previously defined SSA value.
    Reg(Name),
    /// Immediate literal.
    Imm(Constant),
    /// Address of a module global variable.
    Global(GlobalId),
    /// Address of a module function.
    Func(FunctionId),
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Reg(name) => write!(f, "%{}", name),
            Operand::Imm(Constant::Int { value, .. }) => write!(f, "{}", value),
            Operand::Imm(Constant::Float { bits, .. }) => write!(f, "{:?}", f64::from_bits(*bits)),
            Operand::Imm(Constant::Undef(_)) => write!(f, "undef"),
            Operand::Global(id) => write!(f, "@{:?}", id),
            Operand::Func(id) => write!(f, "@{:?}", id),
        }
    }
}
