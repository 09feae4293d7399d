//! Input, output and patch-constant signatures.
use enum_map::{Enum, EnumMap};
use log::debug;
use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use crate::{
    dxil::{CompType, InterpolationMode, SemanticKind},
    utils::error::{HlError, HlResult},
};

/// Row or column of an element that has not been packed yet.
pub const UNALLOCATED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Display, IntoStaticStr)]
#[derive(Serialize, Deserialize)]
pub enum SignatureKind {
    #[strum(serialize = "input signature")]
    Input,
    #[strum(serialize = "output signature")]
    Output,
    #[strum(serialize = "patch constant signature")]
    PatchConstant,
}

/// One semantic of a signature, possibly spanning several rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureElement {
    pub id: u32,
    /// Semantic name without its index (`TEXCOORD` for `TEXCOORD3`).
    pub name: String,
    pub comp_type: CompType,
    pub kind: SemanticKind,
    /// One semantic index per row.
    pub semantic_indices: Vec<u32>,
    pub interpolation: InterpolationMode,
    pub rows: u32,
    pub cols: u8,
    pub start_row: i32,
    pub start_col: i32,
    /// Geometry shader output stream.
    pub output_stream: u32,
}

impl SignatureElement {
    pub fn new(
        name: impl Into<String>,
        kind: SemanticKind,
        comp_type: CompType,
        rows: u32,
        cols: u8,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            comp_type,
            kind,
            semantic_indices: (0..rows).collect(),
            interpolation: InterpolationMode::Undefined,
            rows,
            cols,
            start_row: UNALLOCATED,
            start_col: UNALLOCATED,
            output_stream: 0,
        }
    }

    pub fn is_allocated(&self) -> bool {
        self.start_row != UNALLOCATED && self.start_col != UNALLOCATED
    }

    pub fn set_location(&mut self, start_row: i32, start_col: i32) {
        self.start_row = start_row;
        self.start_col = start_col;
    }
}

/// An ordered list of elements. An element's position is its ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    kind: SignatureKind,
    elements: Vec<SignatureElement>,
}

impl Signature {
    pub fn new(kind: SignatureKind) -> Self {
        Self {
            kind,
            elements: Vec::new(),
        }
    }

    pub fn kind(&self) -> SignatureKind {
        self.kind
    }

    /// Append `element`, assigning it the next ID.
    pub fn append_element(&mut self, mut element: SignatureElement) -> u32 {
        let id = self.elements.len() as u32;
        element.id = id;
        debug!("Appended `{}` to the {} as #{}", element.name, self.kind, id);
        self.elements.push(element);
        id
    }

    pub fn element(&self, id: u32) -> HlResult<&SignatureElement> {
        self.elements
            .get(id as usize)
            .ok_or(HlError::IndexOutOfRange {
                what: self.kind.into(),
                index: id,
                len: self.elements.len(),
            })
    }

    pub fn element_mut(&mut self, id: u32) -> HlResult<&mut SignatureElement> {
        let len = self.elements.len();
        let what = self.kind.into();
        self.elements
            .get_mut(id as usize)
            .ok_or(HlError::IndexOutOfRange {
                what,
                index: id,
                len,
            })
    }

    pub fn elements(&self) -> &[SignatureElement] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// The three signatures of an entry point.
///
/// Each signature can be released to a downstream consumer exactly once.
/// Accessing a released signature fails with [`HlError::NullReference`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    signatures: EnumMap<SignatureKind, Option<Signature>>,
}

impl Default for SignatureSet {
    fn default() -> Self {
        Self {
            signatures: EnumMap::from_fn(|kind| Some(Signature::new(kind))),
        }
    }
}

impl SignatureSet {
    pub fn get(&self, kind: SignatureKind) -> HlResult<&Signature> {
        self.signatures[kind]
            .as_ref()
            .ok_or(HlError::NullReference(kind.into()))
    }

    pub fn get_mut(&mut self, kind: SignatureKind) -> HlResult<&mut Signature> {
        self.signatures[kind]
            .as_mut()
            .ok_or(HlError::NullReference(kind.into()))
    }

    pub fn input(&mut self) -> HlResult<&mut Signature> {
        self.get_mut(SignatureKind::Input)
    }

    pub fn output(&mut self) -> HlResult<&mut Signature> {
        self.get_mut(SignatureKind::Output)
    }

    pub fn patch_constant(&mut self) -> HlResult<&mut Signature> {
        self.get_mut(SignatureKind::PatchConstant)
    }

    pub fn is_released(&self, kind: SignatureKind) -> bool {
        self.signatures[kind].is_none()
    }

    /// Hand the signature over to the caller.
    pub fn release(&mut self, kind: SignatureKind) -> HlResult<Signature> {
        let signature = self.signatures[kind]
            .take()
            .ok_or(HlError::NullReference(kind.into()))?;
        debug!("Released the {}", kind);
        Ok(signature)
    }

    pub fn release_input(&mut self) -> HlResult<Signature> {
        self.release(SignatureKind::Input)
    }

    pub fn release_output(&mut self) -> HlResult<Signature> {
        self.release(SignatureKind::Output)
    }

    pub fn release_patch_constant(&mut self) -> HlResult<Signature> {
        self.release(SignatureKind::PatchConstant)
    }

    /// Put a signature in its slot, replacing whatever was there.
    pub(crate) fn install(&mut self, signature: Signature) {
        let kind = signature.kind();
        self.signatures[kind] = Some(signature);
    }

    /// Live signatures, in input, output, patch-constant order.
    pub fn iter(&self) -> impl Iterator<Item = (SignatureKind, Option<&Signature>)> {
        self.signatures.iter().map(|(kind, sig)| (kind, sig.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_are_numbered_in_creation_order() {
        let mut set = SignatureSet::default();
        let output = set.output().expect("not released");

        let pos = output.append_element(SignatureElement::new(
            "SV_Position",
            SemanticKind::Position,
            CompType::F32,
            1,
            4,
        ));
        let uv = output.append_element(SignatureElement::new(
            "TEXCOORD",
            SemanticKind::Arbitrary,
            CompType::F32,
            2,
            2,
        ));

        assert_eq!((pos, uv), (0, 1));
        let uv = output.element(1).expect("appended above");
        assert_eq!(uv.semantic_indices, vec![0, 1]);
        assert!(!uv.is_allocated());
    }

    #[test]
    fn release_happens_once() {
        let mut set = SignatureSet::default();
        set.input()
            .expect("not released")
            .append_element(SignatureElement::new(
                "SV_VertexID",
                SemanticKind::VertexID,
                CompType::U32,
                1,
                1,
            ));

        let released = set.release_input().expect("first release");
        assert_eq!(released.len(), 1);
        assert_eq!(
            set.release_input(),
            Err(HlError::NullReference("input signature"))
        );
        assert!(set.input().is_err());
        assert!(set.output().is_ok());
    }
}
