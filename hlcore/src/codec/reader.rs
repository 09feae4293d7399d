//! Schema-checked access to metadata tuples.
use hlinstr::{
    metadata::{Metadata, ValueRef},
    module::{FunctionId, GlobalId, Module},
    types::Typeref,
};

use crate::utils::error::{HlError, HlResult};

/// A metadata tuple whose arity has been checked against the schema.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TupleReader<'a> {
    node: &'static str,
    items: &'a [Metadata],
}

impl<'a> TupleReader<'a> {
    /// `md` must be a tuple of exactly `arity` operands.
    pub fn exact(node: &'static str, md: &'a Metadata, arity: usize) -> HlResult<Self> {
        let reader = Self::any(node, md)?;
        if reader.items.len() != arity {
            return Err(HlError::malformed(
                node,
                format!("expected {} operands, found {}", arity, reader.items.len()),
            ));
        }
        Ok(reader)
    }

    /// `md` must be a tuple of at least `arity` operands.
    pub fn at_least(node: &'static str, md: &'a Metadata, arity: usize) -> HlResult<Self> {
        let reader = Self::any(node, md)?;
        if reader.items.len() < arity {
            return Err(HlError::malformed(
                node,
                format!(
                    "expected at least {} operands, found {}",
                    arity,
                    reader.items.len()
                ),
            ));
        }
        Ok(reader)
    }

    pub fn any(node: &'static str, md: &'a Metadata) -> HlResult<Self> {
        let items = md.as_tuple().ok_or_else(|| {
            HlError::malformed(node, format!("expected a tuple, found {}", md.kind_name()))
        })?;
        Ok(Self { node, items })
    }

    /// Operands already extracted from an enclosing tuple.
    pub fn from_slice(node: &'static str, items: &'a [Metadata]) -> Self {
        Self { node, items }
    }

    pub fn node(&self) -> &'static str {
        self.node
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn rest(&self, from: usize) -> &'a [Metadata] {
        self.items.get(from..).unwrap_or(&[])
    }

    pub fn error(&self, reason: impl Into<String>) -> HlError {
        HlError::malformed(self.node, reason)
    }

    fn item(&self, index: usize) -> HlResult<&'a Metadata> {
        self.items
            .get(index)
            .ok_or_else(|| self.error(format!("missing operand {}", index)))
    }

    fn mismatch(&self, index: usize, expected: &str, found: &Metadata) -> HlError {
        self.error(format!(
            "operand {} should be {}, found {}",
            index,
            expected,
            found.kind_name()
        ))
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.items.get(index), Some(Metadata::Null))
    }

    pub fn u32(&self, index: usize) -> HlResult<u32> {
        let md = self.item(index)?;
        let value = md
            .as_int()
            .ok_or_else(|| self.mismatch(index, "an integer", md))?;
        u32::try_from(value)
            .map_err(|_| self.error(format!("operand {} does not fit 32 bits", index)))
    }

    /// Signed values are stored as their 32-bit two's complement.
    pub fn i32(&self, index: usize) -> HlResult<i32> {
        self.u32(index).map(|value| value as i32)
    }

    pub fn bool(&self, index: usize) -> HlResult<bool> {
        match self.u32(index)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(self.error(format!("operand {} is not a boolean: {}", index, other))),
        }
    }

    pub fn f64(&self, index: usize) -> HlResult<f64> {
        let md = self.item(index)?;
        md.as_float()
            .ok_or_else(|| self.mismatch(index, "a float", md))
    }

    pub fn string(&self, index: usize) -> HlResult<&'a str> {
        let md = self.item(index)?;
        md.as_str()
            .ok_or_else(|| self.mismatch(index, "a string", md))
    }

    pub fn data(&self, index: usize) -> HlResult<&'a [u8]> {
        match self.item(index)? {
            Metadata::Data(bytes) => Ok(bytes),
            other => Err(self.mismatch(index, "a data blob", other)),
        }
    }

    /// Decode an enumeration value with `from_repr`.
    pub fn enumeration<T>(
        &self,
        index: usize,
        what: &str,
        from_repr: impl FnOnce(u32) -> Option<T>,
    ) -> HlResult<T> {
        let raw = self.u32(index)?;
        from_repr(raw).ok_or_else(|| self.error(format!("invalid {} value {}", what, raw)))
    }

    /// A nested tuple of exactly `arity` operands.
    pub fn tuple(&self, index: usize, arity: usize) -> HlResult<TupleReader<'a>> {
        TupleReader::exact(self.node, self.item(index)?, arity)
    }

    /// A nested tuple; `null` reads as an empty list.
    pub fn list(&self, index: usize) -> HlResult<&'a [Metadata]> {
        match self.item(index)? {
            Metadata::Null => Ok(&[]),
            Metadata::Tuple(items) => Ok(items),
            other => Err(self.mismatch(index, "a tuple", other)),
        }
    }

    fn value(&self, index: usize, module: &Module) -> HlResult<ValueRef> {
        let md = self.item(index)?;
        let value = md
            .as_value()
            .ok_or_else(|| self.mismatch(index, "a value reference", md))?;
        if !module.contains(value) {
            return Err(self.error(format!(
                "operand {} references {}, which is not in the module",
                index, value
            )));
        }
        Ok(value)
    }

    pub fn global(&self, index: usize, module: &Module) -> HlResult<GlobalId> {
        match self.value(index, module)? {
            ValueRef::Global(id) => Ok(id),
            other => Err(self.error(format!(
                "operand {} should reference a global, found {}",
                index, other
            ))),
        }
    }

    pub fn optional_global(&self, index: usize, module: &Module) -> HlResult<Option<GlobalId>> {
        if self.is_null(index) {
            Ok(None)
        } else {
            self.global(index, module).map(Some)
        }
    }

    pub fn function(&self, index: usize, module: &Module) -> HlResult<FunctionId> {
        match self.value(index, module)? {
            ValueRef::Function(id) => Ok(id),
            other => Err(self.error(format!(
                "operand {} should reference a function, found {}",
                index, other
            ))),
        }
    }

    pub fn optional_function(
        &self,
        index: usize,
        module: &Module,
    ) -> HlResult<Option<FunctionId>> {
        if self.is_null(index) {
            Ok(None)
        } else {
            self.function(index, module).map(Some)
        }
    }

    /// A type, named through an `undef` value of that type.
    pub fn typeref(&self, index: usize, module: &Module) -> HlResult<Typeref> {
        match self.value(index, module)? {
            ValueRef::Undef(ty) => Ok(ty),
            other => Err(self.error(format!(
                "operand {} should name a type, found {}",
                index, other
            ))),
        }
    }
}
