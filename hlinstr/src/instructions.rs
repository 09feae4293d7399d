//! Instruction set of the host IR.
//!
//! Only the handful of operations the shader layer needs to reason about are
//! modelled: stack slots, loads and stores through them, floating-point
//! arithmetic, and calls. Each instruction is a small structure with public
//! fields; [`HlInstr`] is the tagged union stored in basic blocks.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum::{Display, EnumDiscriminants, EnumIs, EnumTryAs};

use crate::{
    module::FunctionId,
    operand::{Label, Name, Operand},
    types::Typeref,
};

/// Common interface implemented by every instruction node.
pub trait Instruction {
    /// Iterate over all input operands for this instruction.
    fn operands(&self) -> impl Iterator<Item = &Operand>;

    /// Mutably iterate over all input operands for this instruction.
    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand>;

    /// Return the destination SSA name if the instruction produces a result.
    fn destination(&self) -> Option<Name> {
        None
    }

    /// Convenience iterator over referenced SSA names (i.e., register
    /// operands). Immediates and symbols are ignored.
    fn name_dependencies(&self) -> impl Iterator<Item = Name> {
        self.operands().filter_map(|op| match op {
            Operand::Reg(reg) => Some(*reg),
            _ => None,
        })
    }
}

/// Allocate a stack slot holding one value of type `ty`; produces a pointer.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MAlloca {
    pub dest: Name,
    pub ty: Typeref,
}

impl Instruction for MAlloca {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::empty()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::empty()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }
}

/// Load a value of type `ty` from `addr`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MLoad {
    pub dest: Name,
    pub ty: Typeref,
    pub addr: Operand,
}

impl Instruction for MLoad {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        std::iter::once(&self.addr)
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        std::iter::once(&mut self.addr)
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }
}

/// Store `value` to `addr`.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MStore {
    pub addr: Operand,
    pub value: Operand,
}

impl Instruction for MStore {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.addr, &self.value].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.addr, &mut self.value].into_iter()
    }
}

/// Floating-point binary operator.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[strum(serialize_all = "lowercase")]
pub enum FBinOp {
    FAdd,
    FSub,
    FMul,
    FDiv,
}

/// Floating-point binary arithmetic.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FBinary {
    pub dest: Name,
    pub ty: Typeref,
    pub op: FBinOp,
    pub lhs: Operand,
    pub rhs: Operand,
}

impl Instruction for FBinary {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        [&self.lhs, &self.rhs].into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        [&mut self.lhs, &mut self.rhs].into_iter()
    }

    fn destination(&self) -> Option<Name> {
        Some(self.dest)
    }
}

/// Direct call to a module function.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Call {
    /// `None` when the callee returns void.
    pub dest: Option<Name>,
    pub callee: FunctionId,
    pub args: Vec<Operand>,
}

impl Instruction for Call {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        self.args.iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        self.args.iter_mut()
    }

    fn destination(&self) -> Option<Name> {
        self.dest
    }
}

/// Discriminated union covering all instruction kinds.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs, EnumTryAs, EnumDiscriminants)]
#[strum_discriminants(name(HlInstrKind))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HlInstr {
    MAlloca(MAlloca),
    MLoad(MLoad),
    MStore(MStore),
    FBinary(FBinary),
    Call(Call),
}

impl HlInstr {
    /// The callee if this is a call instruction.
    pub fn callee(&self) -> Option<FunctionId> {
        match self {
            HlInstr::Call(call) => Some(call.callee),
            _ => None,
        }
    }
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            HlInstr::MAlloca($inner) => $body,
            HlInstr::MLoad($inner) => $body,
            HlInstr::MStore($inner) => $body,
            HlInstr::FBinary($inner) => $body,
            HlInstr::Call($inner) => $body,
        }
    };
}

impl Instruction for HlInstr {
    fn operands(&self) -> impl Iterator<Item = &Operand> {
        let ops: Vec<&Operand> = dispatch!(self, i => i.operands().collect());
        ops.into_iter()
    }

    fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        let ops: Vec<&mut Operand> = dispatch!(self, i => i.operands_mut().collect());
        ops.into_iter()
    }

    fn destination(&self) -> Option<Name> {
        dispatch!(self, i => i.destination())
    }
}

impl std::fmt::Display for HlInstr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HlInstr::MAlloca(a) => write!(f, "%{} = alloca {}", a.dest, a.ty),
            HlInstr::MLoad(l) => write!(f, "%{} = load {}, {}", l.dest, l.ty, l.addr),
            HlInstr::MStore(s) => write!(f, "store {}, {}", s.value, s.addr),
            HlInstr::FBinary(b) => write!(f, "%{} = {} {}, {}", b.dest, b.op, b.lhs, b.rhs),
            HlInstr::Call(c) => {
                if let Some(dest) = c.dest {
                    write!(f, "%{} = ", dest)?;
                }
                write!(f, "call @{:?}(", c.callee)?;
                for (i, arg) in c.args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Block terminator.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Terminator {
    Ret(Option<Operand>),
    Branch(Label),
    Unreachable,
}

impl Terminator {
    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        match self {
            Terminator::Ret(value) => value.as_mut(),
            Terminator::Branch(_) | Terminator::Unreachable => None,
        }
        .into_iter()
    }

    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        match self {
            Terminator::Ret(value) => value.as_ref(),
            Terminator::Branch(_) | Terminator::Unreachable => None,
        }
        .into_iter()
    }
}
