//! Host SSA IR.
//!
//! A compact intermediate representation: modules own functions and global
//! variables, functions own basic blocks of instructions, and every entity can
//! carry untyped [`metadata::Metadata`] trees. Layers built on top of the IR use
//! metadata to persist facts the IR does not understand.

pub mod debug;
pub mod instructions;
pub mod metadata;
pub mod module;
pub mod operand;
pub mod types;
pub mod utils;
