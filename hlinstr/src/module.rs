//! Modules, functions, basic blocks and global variables.
//!
//! A [`Module`] is the compilation unit. Functions and globals live in slotmap
//! arenas: their handles ([`FunctionId`], [`GlobalId`]) stay valid while the
//! entity exists and are never reused after removal, which makes them safe to
//! store in side tables owned by other layers.
use std::collections::{BTreeMap, BTreeSet};

use log::debug;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use uuid::Uuid;

use crate::{
    debug::DebugInfo,
    instructions::{HlInstr, Instruction, Terminator},
    metadata::{Metadata, ValueRef},
    operand::{Label, Name, Operand},
    types::Typeref,
    utils::Error,
};

new_key_type! {
    /// Handle to a [`Function`] of a [`Module`].
    pub struct FunctionId;
    /// Handle to a [`GlobalVariable`] of a [`Module`].
    pub struct GlobalId;
}

/// All Global Variables and Functions have one of the following types of linkage:
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Linkage {
    /// Only directly accessible by objects in the current module; may be
    /// renamed freely.
    #[default]
    Private,

    /// Like `Private`, but shows as a local symbol in the object file.
    Internal,

    /// May be referenced by, and defined in, other modules.
    External,
}

/// Memory space a global variable lives in.
#[derive(Debug, Default, Clone, Copy, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AddressSpace {
    #[default]
    Default,
    /// Read-only constant memory.
    Constant,
    /// Memory shared by all threads of a thread group.
    GroupShared,
}

/// A module-level variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalVariable {
    pub name: String,
    pub ty: Typeref,
    pub linkage: Linkage,
    pub address_space: AddressSpace,
    pub is_constant: bool,
}

impl GlobalVariable {
    pub fn new(name: impl Into<String>, ty: Typeref) -> Self {
        Self {
            name: name.into(),
            ty,
            linkage: Linkage::default(),
            address_space: AddressSpace::default(),
            is_constant: false,
        }
    }

    pub fn with_address_space(mut self, address_space: AddressSpace) -> Self {
        self.address_space = address_space;
        self
    }
}

/// A basic block: a straight-line sequence of instructions ended by a terminator.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BasicBlock {
    pub label: Label,
    pub instructions: Vec<HlInstr>,
    pub terminator: Terminator,
}

/// Position of an instruction inside a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstructionRef {
    pub block: Label,
    pub index: usize,
}

/// A function made of basic blocks.
///
/// A function with no blocks is a declaration. By convention the entry block
/// of a definition is [`Label::NIL`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Function {
    pub uuid: Uuid,
    pub name: String,
    pub params: Vec<(Name, Typeref)>,
    pub return_type: Option<Typeref>,
    pub body: BTreeMap<Label, BasicBlock>,
    /// Function-level attachments, keyed by kind.
    pub metadata: BTreeMap<String, Metadata>,
    /// Attachments on the instruction defining an SSA value, keyed by kind.
    pub value_metadata: BTreeMap<Name, BTreeMap<String, Metadata>>,
}

impl Function {
    /// Create a definition with an empty entry block returning void.
    pub fn new(name: impl Into<String>, params: Vec<(Name, Typeref)>) -> Self {
        let mut function = Self::declaration(name, params, None);
        function.body.insert(
            Label::NIL,
            BasicBlock {
                label: Label::NIL,
                instructions: Vec::new(),
                terminator: Terminator::Ret(None),
            },
        );
        function
    }

    /// Create a function without a body.
    pub fn declaration(
        name: impl Into<String>,
        params: Vec<(Name, Typeref)>,
        return_type: Option<Typeref>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            params,
            return_type,
            body: BTreeMap::new(),
            metadata: BTreeMap::new(),
            value_metadata: BTreeMap::new(),
        }
    }

    pub fn is_declaration(&self) -> bool {
        self.body.is_empty()
    }

    /// Find next available [`Name`].
    pub fn next_available_name(&self) -> Name {
        let params = self.params.iter().map(|(name, _)| *name);
        let dests = self
            .body
            .values()
            .flat_map(|bb| bb.instructions.iter())
            .filter_map(|instr| instr.destination());
        params.chain(dests).max().map_or(0, |max| max + 1)
    }

    /// Find next available [`Label`].
    pub fn next_available_label(&self) -> Label {
        self.body
            .keys()
            .next_back()
            .map_or(Label::NIL, |label| Label(label.0 + 1))
    }

    /// Add an empty block ending in `terminator`.
    pub fn add_block(&mut self, label: Label, terminator: Terminator) -> Result<(), Error> {
        if self.body.contains_key(&label) {
            return Err(Error::BlockLabelAlreadyExists(label));
        }
        self.body.insert(
            label,
            BasicBlock {
                label,
                instructions: Vec::new(),
                terminator,
            },
        );
        Ok(())
    }

    /// Append `instr` at the end of block `label`.
    pub fn push(&mut self, label: Label, instr: HlInstr) -> Result<InstructionRef, Error> {
        let function = self.name.clone();
        let block = self
            .body
            .get_mut(&label)
            .ok_or(Error::UndefinedBasicBlock { function, label })?;
        block.instructions.push(instr);
        Ok(InstructionRef {
            block: label,
            index: block.instructions.len() - 1,
        })
    }

    /// Insert `instr` so that it ends up at `at`, shifting later instructions.
    pub fn insert(&mut self, at: InstructionRef, instr: HlInstr) -> Result<(), Error> {
        let function = self.name.clone();
        let block = self.body.get_mut(&at.block).ok_or(Error::UndefinedBasicBlock {
            function,
            label: at.block,
        })?;
        let index = at.index.min(block.instructions.len());
        block.instructions.insert(index, instr);
        Ok(())
    }

    pub fn get(&self, at: InstructionRef) -> Option<&HlInstr> {
        self.body.get(&at.block)?.instructions.get(at.index)
    }

    /// Iterate over every instruction together with its position.
    pub fn instructions(&self) -> impl Iterator<Item = (InstructionRef, &HlInstr)> {
        self.body.iter().flat_map(|(label, bb)| {
            bb.instructions.iter().enumerate().map(move |(index, instr)| {
                (
                    InstructionRef {
                        block: *label,
                        index,
                    },
                    instr,
                )
            })
        })
    }

    /// Locate the instruction defining `name`. Parameters have no defining
    /// instruction.
    pub fn find_definition(&self, name: Name) -> Option<InstructionRef> {
        self.instructions()
            .find(|(_, instr)| instr.destination() == Some(name))
            .map(|(at, _)| at)
    }

    /// Remove the instruction at `at`, dropping the metadata attached to the
    /// value it defined.
    pub fn erase(&mut self, at: InstructionRef) -> Option<HlInstr> {
        let block = self.body.get_mut(&at.block)?;
        if at.index >= block.instructions.len() {
            return None;
        }
        let instr = block.instructions.remove(at.index);
        if let Some(dest) = instr.destination() {
            self.value_metadata.remove(&dest);
        }
        Some(instr)
    }

    /// Remove every instruction for which `keep` returns false. Returns the
    /// number of removed instructions.
    pub fn retain(&mut self, mut keep: impl FnMut(&HlInstr) -> bool) -> usize {
        let mut removed_dests = Vec::new();
        for bb in self.body.values_mut() {
            bb.instructions.retain(|instr| {
                let kept = keep(instr);
                if !kept {
                    removed_dests.push(instr.destination());
                }
                kept
            });
        }
        for dest in removed_dests.iter().flatten() {
            self.value_metadata.remove(dest);
        }
        removed_dests.len()
    }

    /// Rewrite every use of `old` (instruction operands and terminators) to
    /// `new`. Attachments on `old` are *not* moved. Returns the number of
    /// rewritten operands.
    pub fn replace_all_uses_with(&mut self, old: Name, new: &Operand) -> usize {
        let mut count = 0;
        for bb in self.body.values_mut() {
            let ops = bb
                .instructions
                .iter_mut()
                .flat_map(|instr| instr.operands_mut())
                .chain(bb.terminator.operands_mut());
            for op in ops {
                if *op == Operand::Reg(old) {
                    *op = new.clone();
                    count += 1;
                }
            }
        }
        count
    }

    pub fn value_metadata(&self, name: Name, kind: &str) -> Option<&Metadata> {
        self.value_metadata.get(&name)?.get(kind)
    }

    pub fn set_value_metadata(&mut self, name: Name, kind: impl Into<String>, md: Metadata) {
        self.value_metadata
            .entry(name)
            .or_default()
            .insert(kind.into(), md);
    }

    pub fn remove_value_metadata(&mut self, name: Name, kind: &str) -> Option<Metadata> {
        let attachments = self.value_metadata.get_mut(&name)?;
        let removed = attachments.remove(kind);
        if attachments.is_empty() {
            self.value_metadata.remove(&name);
        }
        removed
    }

    /// Verify SSA form:
    /// 1) The entry block exists (definitions only).
    /// 2) Each name is defined exactly once.
    /// 3) Each register operand refers to a defined name.
    pub fn check_ssa(&self) -> Result<(), Error> {
        if self.is_declaration() {
            return Ok(());
        }

        if !self.body.contains_key(&Label::NIL) {
            return Err(Error::MissingEntryBlock {
                function: self.name.clone(),
            });
        }

        let mut defined_names = BTreeSet::new();
        let defs = self.params.iter().map(|(name, _)| *name).chain(
            self.body
                .values()
                .flat_map(|bb| bb.instructions.iter())
                .filter_map(|instr| instr.destination()),
        );
        for name in defs {
            if !defined_names.insert(name) {
                return Err(Error::DuplicateSSAName {
                    function: self.name.clone(),
                    duplicate: name,
                });
            }
        }

        for bb in self.body.values() {
            let uses = bb
                .instructions
                .iter()
                .flat_map(|instr| instr.operands())
                .chain(bb.terminator.operands());
            for op in uses {
                if let Operand::Reg(name) = op {
                    if !defined_names.contains(name) {
                        return Err(Error::UndefinedSSAName {
                            function: self.name.clone(),
                            undefined: *name,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

/// A module containing functions, globals, named metadata and debug info.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Module {
    pub uuid: Uuid,
    pub name: String,
    pub functions: SlotMap<FunctionId, Function>,
    pub globals: SlotMap<GlobalId, GlobalVariable>,
    pub named_metadata: BTreeMap<String, Vec<Metadata>>,
    pub debug_info: DebugInfo,
}

impl Default for Module {
    fn default() -> Self {
        Self::new("")
    }
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            functions: SlotMap::with_key(),
            globals: SlotMap::with_key(),
            named_metadata: BTreeMap::new(),
            debug_info: DebugInfo::default(),
        }
    }

    pub fn add_function(&mut self, function: Function) -> FunctionId {
        self.functions.insert(function)
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id)
    }

    pub fn function_mut(&mut self, id: FunctionId) -> Option<&mut Function> {
        self.functions.get_mut(id)
    }

    pub fn get_function_by_name(&self, name: &str) -> Option<FunctionId> {
        self.functions
            .iter()
            .find(|(_, f)| f.name == name)
            .map(|(id, _)| id)
    }

    /// Return the function called `name`, declaring it first if absent.
    pub fn get_or_insert_declaration(
        &mut self,
        name: &str,
        params: Vec<(Name, Typeref)>,
        return_type: Option<Typeref>,
    ) -> FunctionId {
        match self.get_function_by_name(name) {
            Some(id) => id,
            None => {
                debug!("Declaring function `{}` in module `{}`", name, self.name);
                self.add_function(Function::declaration(name, params, return_type))
            }
        }
    }

    /// Remove a function from the module. Dangling references in metadata are
    /// left for their owners to clean up.
    pub fn remove_function(&mut self, id: FunctionId) -> Option<Function> {
        self.functions.remove(id)
    }

    pub fn add_global(&mut self, global: GlobalVariable) -> GlobalId {
        self.globals.insert(global)
    }

    pub fn global(&self, id: GlobalId) -> Option<&GlobalVariable> {
        self.globals.get(id)
    }

    pub fn get_global_by_name(&self, name: &str) -> Option<GlobalId> {
        self.globals
            .iter()
            .find(|(_, g)| g.name == name)
            .map(|(id, _)| id)
    }

    /// Detach a global from the module.
    pub fn remove_global(&mut self, id: GlobalId) -> Option<GlobalVariable> {
        let removed = self.globals.remove(id);
        if let Some(gv) = &removed {
            debug!("Removed global `{}` from module `{}`", gv.name, self.name);
        }
        removed
    }

    /// Whether a metadata value reference still points at a live entity.
    /// Type references are always considered live.
    pub fn contains(&self, value: ValueRef) -> bool {
        match value {
            ValueRef::Function(id) => self.functions.contains_key(id),
            ValueRef::Global(id) => self.globals.contains_key(id),
            ValueRef::Undef(_) => true,
        }
    }

    pub fn named_metadata(&self, name: &str) -> Option<&[Metadata]> {
        self.named_metadata.get(name).map(Vec::as_slice)
    }

    /// Replace (or create) the named metadata `name`.
    pub fn set_named_metadata(&mut self, name: impl Into<String>, operands: Vec<Metadata>) {
        self.named_metadata.insert(name.into(), operands);
    }

    pub fn remove_named_metadata(&mut self, name: &str) -> Option<Vec<Metadata>> {
        self.named_metadata.remove(name)
    }

    /// Number of call instructions targeting `callee`, across all functions.
    pub fn count_calls_to(&self, callee: FunctionId) -> usize {
        self.functions
            .values()
            .flat_map(|f| f.body.values())
            .flat_map(|bb| bb.instructions.iter())
            .filter(|instr| instr.callee() == Some(callee))
            .count()
    }

    /// Verify every function is in SSA form and refers only to live symbols.
    pub fn verify(&self) -> Result<(), Error> {
        for function in self.functions.values() {
            function.check_ssa()?;

            for (_, instr) in function.instructions() {
                if let Some(callee) = instr.callee() {
                    if !self.functions.contains_key(callee) {
                        return Err(Error::UndefinedFunction {
                            function: function.name.clone(),
                        });
                    }
                }
                for op in instr.operands() {
                    match op {
                        Operand::Global(id) if !self.globals.contains_key(*id) => {
                            return Err(Error::UndefinedGlobal {
                                function: function.name.clone(),
                            });
                        }
                        Operand::Func(id) if !self.functions.contains_key(*id) => {
                            return Err(Error::UndefinedFunction {
                                function: function.name.clone(),
                            });
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }
}
