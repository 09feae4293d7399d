use strum::{EnumIs, EnumTryAs};
use thiserror::Error;

use crate::operand::{Label, Name};

#[derive(Debug, PartialEq, Eq, Hash, EnumIs, EnumTryAs, Error)]
pub enum Error {
    /// Two instructions (or a parameter and an instruction) define the same name.
    #[error(
        "Multiple operations with shared destination target violate SSA requirements. The name `{duplicate}` is defined more than once within function `{function}`."
    )]
    DuplicateSSAName { function: String, duplicate: Name },

    /// No basic block with the entrypoint label was found.
    #[error(
        "By convention, the entrypoint basic block of a function must have label `%block_0`. No such basic block was found in function `{function}`."
    )]
    MissingEntryBlock { function: String },

    /// An operand refers to an unresolved name.
    #[error("A operand of function `{function}` refers to an undefined name: `{undefined}`.")]
    UndefinedSSAName { function: String, undefined: Name },

    /// A call refers to a function that is not part of the module.
    #[error("An instruction of function `{function}` calls a function that is not defined within the module.")]
    UndefinedFunction { function: String },

    /// An operand refers to a global that is not part of the module.
    #[error("An instruction of function `{function}` refers to a global variable that is not defined within the module.")]
    UndefinedGlobal { function: String },

    /// The basic block referenced cannot be found within the function.
    #[error("The basic block `{label}` referenced in function `{function}` is not defined within the function.")]
    UndefinedBasicBlock { function: String, label: Label },

    /// A basic block with the given label already exists in the function.
    #[error("A basic block with label `{0}` already exists in the function.")]
    BlockLabelAlreadyExists(Label),
}
