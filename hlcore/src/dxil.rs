//! Shader-level enumerations.
//!
//! Numeric values are part of the metadata wire format and must not be
//! reordered.
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIs, EnumString, FromRepr, IntoStaticStr};

pub const NUM_OUTPUT_STREAMS: usize = 4;
pub const NUM_CLIP_PLANES: usize = 6;

/// Pipeline stage a function is compiled for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display, EnumString, EnumIs,
)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum ShaderKind {
    #[strum(serialize = "ps")]
    Pixel = 0,
    #[strum(serialize = "vs")]
    Vertex = 1,
    #[strum(serialize = "gs")]
    Geometry = 2,
    #[strum(serialize = "hs")]
    Hull = 3,
    #[strum(serialize = "ds")]
    Domain = 4,
    #[strum(serialize = "cs")]
    Compute = 5,
    #[strum(serialize = "lib")]
    Library = 6,
    #[strum(serialize = "invalid")]
    Invalid = 7,
}

/// Binding category of a resource.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display, IntoStaticStr,
)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum ResourceClass {
    SRV = 0,
    UAV = 1,
    CBuffer = 2,
    Sampler = 3,
    Invalid = 4,
}

/// Shape of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum ResourceKind {
    Invalid = 0,
    Texture1D = 1,
    Texture2D = 2,
    Texture2DMS = 3,
    Texture3D = 4,
    TextureCube = 5,
    Texture1DArray = 6,
    Texture2DArray = 7,
    Texture2DMSArray = 8,
    TextureCubeArray = 9,
    TypedBuffer = 10,
    RawBuffer = 11,
    StructuredBuffer = 12,
    CBuffer = 13,
    Sampler = 14,
    TBuffer = 15,
}

impl ResourceKind {
    pub fn is_structured_buffer(&self) -> bool {
        matches!(self, ResourceKind::StructuredBuffer)
    }

    /// Typed buffers and textures carry an element component type.
    pub fn is_typed(&self) -> bool {
        matches!(
            self,
            ResourceKind::Texture1D
                | ResourceKind::Texture2D
                | ResourceKind::Texture2DMS
                | ResourceKind::Texture3D
                | ResourceKind::TextureCube
                | ResourceKind::Texture1DArray
                | ResourceKind::Texture2DArray
                | ResourceKind::Texture2DMSArray
                | ResourceKind::TextureCubeArray
                | ResourceKind::TypedBuffer
        )
    }
}

/// Scalar component type of a signature element or typed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum CompType {
    Invalid = 0,
    I1 = 1,
    I16 = 2,
    U16 = 3,
    I32 = 4,
    U32 = 5,
    I64 = 6,
    U64 = 7,
    F16 = 8,
    F32 = 9,
    F64 = 10,
    SNormF16 = 11,
    UNormF16 = 12,
    SNormF32 = 13,
    UNormF32 = 14,
    SNormF64 = 15,
    UNormF64 = 16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum SamplerKind {
    Default = 0,
    Comparison = 1,
    Mono = 2,
    Invalid = 3,
}

/// System-value semantic of a signature element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum SemanticKind {
    Arbitrary = 0,
    VertexID = 1,
    InstanceID = 2,
    Position = 3,
    RenderTargetArrayIndex = 4,
    ViewPortArrayIndex = 5,
    ClipDistance = 6,
    CullDistance = 7,
    OutputControlPointID = 8,
    DomainLocation = 9,
    PrimitiveID = 10,
    GSInstanceID = 11,
    SampleIndex = 12,
    IsFrontFace = 13,
    Coverage = 14,
    InnerCoverage = 15,
    Target = 16,
    Depth = 17,
    DepthLessEqual = 18,
    DepthGreaterEqual = 19,
    StencilRef = 20,
    DispatchThreadID = 21,
    GroupID = 22,
    GroupIndex = 23,
    GroupThreadID = 24,
    TessFactor = 25,
    InsideTessFactor = 26,
    Invalid = 27,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum InterpolationMode {
    Undefined = 0,
    Constant = 1,
    Linear = 2,
    LinearCentroid = 3,
    LinearNoperspective = 4,
    LinearNoperspectiveCentroid = 5,
    LinearSample = 6,
    LinearNoperspectiveSample = 7,
    Invalid = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum PrimitiveTopology {
    Undefined = 0,
    PointList = 1,
    LineList = 2,
    LineStrip = 3,
    TriangleList = 4,
    TriangleStrip = 5,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, FromRepr, Display,
)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum TessellatorDomain {
    #[default]
    Undefined = 0,
    IsoLine = 1,
    Tri = 2,
    Quad = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum TessellatorPartitioning {
    Undefined = 0,
    Integer = 1,
    Pow2 = 2,
    FractionalOdd = 3,
    FractionalEven = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, FromRepr, Display)]
#[derive(Serialize, Deserialize)]
#[repr(u32)]
pub enum TessellatorOutputPrimitive {
    Undefined = 0,
    Point = 1,
    Line = 2,
    TriangleCW = 3,
    TriangleCCW = 4,
}

/// Geometry shader input primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
#[derive(Serialize, Deserialize)]
pub enum InputPrimitive {
    Undefined,
    Point,
    Line,
    Triangle,
    LineWithAdjacency,
    TriangleWithAdjacency,
    /// Patch with 1 to 32 control points.
    ControlPointPatch(u8),
}

impl InputPrimitive {
    const CONTROL_POINT_PATCH_BASE: u32 = 7;

    pub fn from_repr(value: u32) -> Option<Self> {
        match value {
            0 => Some(InputPrimitive::Undefined),
            1 => Some(InputPrimitive::Point),
            2 => Some(InputPrimitive::Line),
            3 => Some(InputPrimitive::Triangle),
            6 => Some(InputPrimitive::LineWithAdjacency),
            7 => Some(InputPrimitive::TriangleWithAdjacency),
            8..=39 => Some(InputPrimitive::ControlPointPatch(
                (value - Self::CONTROL_POINT_PATCH_BASE) as u8,
            )),
            _ => None,
        }
    }

    pub fn to_repr(self) -> u32 {
        match self {
            InputPrimitive::Undefined => 0,
            InputPrimitive::Point => 1,
            InputPrimitive::Line => 2,
            InputPrimitive::Triangle => 3,
            InputPrimitive::LineWithAdjacency => 6,
            InputPrimitive::TriangleWithAdjacency => 7,
            InputPrimitive::ControlPointPatch(n) => Self::CONTROL_POINT_PATCH_BASE + n as u32,
        }
    }
}

/// Target shader model, written `vs_6_0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShaderModel {
    pub kind: ShaderKind,
    pub major: u32,
    pub minor: u32,
}

impl ShaderModel {
    pub fn new(kind: ShaderKind, major: u32, minor: u32) -> Self {
        Self { kind, major, minor }
    }
}

impl std::fmt::Display for ShaderModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}_{}", self.kind, self.major, self.minor)
    }
}

impl FromStr for ShaderModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        let (Some(kind), Some(major), Some(minor), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("`{}` is not of the form `<kind>_<major>_<minor>`", s));
        };
        let kind = ShaderKind::from_str(kind)
            .map_err(|_| format!("unknown shader kind `{}` in `{}`", kind, s))?;
        let major = major
            .parse()
            .map_err(|_| format!("invalid major version in `{}`", s))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("invalid minor version in `{}`", s))?;
        Ok(Self { kind, major, minor })
    }
}

impl TryFrom<String> for ShaderModel {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShaderModel> for String {
    fn from(value: ShaderModel) -> Self {
        value.to_string()
    }
}
