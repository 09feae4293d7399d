//! Precise (no-reassociation) marking of SSA values.
//!
//! A value is precise when the instruction defining it carries a `dx.precise`
//! attachment. Attachments do not survive register promotion: once a stack
//! slot is replaced by the values stored into it, nothing points back at the
//! tagged instruction anymore. Before such a transform, the front-end instead
//! records the mark as a call to the inert `dx.attribute.precise` function.
//! Calls are ordinary uses, so use-rewriting carries them along to whatever
//! value ends up replacing the marked one. [`resolve_marker_calls`] turns the
//! surviving calls back into attachments.
use hlinstr::{
    instructions::{Call, HlInstr, Instruction},
    metadata::Metadata,
    module::{Function, FunctionId, InstructionRef, Module},
    operand::{Label, Name, Operand},
};
use log::{debug, warn};

use crate::{
    magic::{MD_PRECISE, PRECISE_MARKER_FN_NAME},
    utils::error::{HlError, HlResult},
};

pub fn mark_via_tag(function: &mut Function, value: Name) {
    function.set_value_metadata(value, MD_PRECISE, Metadata::bool(true));
}

pub fn has_tag(function: &Function, value: Name) -> bool {
    function.value_metadata(value, MD_PRECISE).is_some()
}

pub fn clear_tag(function: &mut Function, value: Name) {
    function.remove_value_metadata(value, MD_PRECISE);
}

/// Mark every operation of `function` as precise.
pub fn mark_function(function: &mut Function) {
    function
        .metadata
        .insert(MD_PRECISE.to_string(), Metadata::bool(true));
}

pub fn has_function_level(function: &Function) -> bool {
    function.metadata.contains_key(MD_PRECISE)
}

/// Handle of the marker function, if it is declared.
pub fn marker_function(module: &Module) -> Option<FunctionId> {
    module.get_function_by_name(PRECISE_MARKER_FN_NAME)
}

/// Number of marker calls left in the module.
pub fn marker_call_count(module: &Module) -> usize {
    marker_function(module).map_or(0, |marker| module.count_calls_to(marker))
}

fn function_mut(module: &mut Module, id: FunctionId) -> HlResult<&mut Function> {
    module
        .function_mut(id)
        .ok_or_else(|| HlError::NotFound(format!("function {:?}", id)))
}

/// Where the marker call for `value` goes: right after its definition, or at
/// the start of the entry block for parameters.
fn marker_position(func: &Function, value: Name) -> HlResult<InstructionRef> {
    match func.find_definition(value) {
        Some(def) => Ok(InstructionRef {
            block: def.block,
            index: def.index + 1,
        }),
        None if func.params.iter().any(|(name, _)| *name == value) => Ok(InstructionRef {
            block: Label::NIL,
            index: 0,
        }),
        None => Err(HlError::NotFound(format!(
            "definition of %{} in `{}`",
            value, func.name
        ))),
    }
}

/// Record the precise mark on `value` as a marker call placed right after the
/// value's definition. Parameters are marked at the start of the entry block.
///
/// The marker is only declared once `value` is known to exist.
pub fn mark_via_call(module: &mut Module, function: FunctionId, value: Name) -> HlResult<()> {
    let at = {
        let func = module
            .function(function)
            .ok_or_else(|| HlError::NotFound(format!("function {:?}", function)))?;
        marker_position(func, value)?
    };

    let marker = module.get_or_insert_declaration(PRECISE_MARKER_FN_NAME, Vec::new(), None);
    let func = function_mut(module, function)?;
    let call = HlInstr::Call(Call {
        dest: None,
        callee: marker,
        args: vec![Operand::Reg(value)],
    });
    func.insert(at, call)
        .map_err(|err| HlError::NotFound(err.to_string()))?;
    debug!("Marked %{} of `{}` precise through a marker call", value, func.name);
    Ok(())
}

/// Mark every register value stored through `pointer` (typically a stack
/// slot about to be promoted). Returns the number of marked values.
pub fn mark_pointer_via_calls(
    module: &mut Module,
    function: FunctionId,
    pointer: Name,
) -> HlResult<usize> {
    let func = module
        .function(function)
        .ok_or_else(|| HlError::NotFound(format!("function {:?}", function)))?;

    let stored: Vec<Name> = func
        .instructions()
        .filter_map(|(_, instr)| match instr {
            HlInstr::MStore(store) if store.addr == Operand::Reg(pointer) => match store.value {
                Operand::Reg(value) => Some(value),
                _ => None,
            },
            _ => None,
        })
        .collect();

    for value in &stored {
        mark_via_call(module, function, *value)?;
    }
    Ok(stored.len())
}

/// Convert every surviving marker call into a `dx.precise` attachment on the
/// instruction defining its argument, erase the calls, then remove the marker
/// declaration. Returns the number of resolved calls.
pub fn resolve_marker_calls(module: &mut Module) -> usize {
    let Some(marker) = marker_function(module) else {
        return 0;
    };

    let mut resolved = 0;
    for func in module.functions.values_mut() {
        let args: Vec<Operand> = func
            .instructions()
            .filter(|(_, instr)| instr.callee() == Some(marker))
            .flat_map(|(_, instr)| instr.operands().cloned().collect::<Vec<_>>())
            .collect();
        if args.is_empty() {
            continue;
        }

        for arg in args {
            match arg {
                Operand::Reg(value) if func.find_definition(value).is_some() => {
                    mark_via_tag(func, value);
                }
                other => warn!(
                    "Dropping precise marker on `{}` in `{}`: no defining instruction",
                    other, func.name
                ),
            }
        }
        resolved += func.retain(|instr| instr.callee() != Some(marker));
    }

    module.remove_function(marker);
    debug!("Resolved {} precise marker calls", resolved);
    resolved
}
