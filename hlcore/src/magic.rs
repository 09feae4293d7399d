/// Schema version written by this crate into `dx.version`.
pub const HL_SCHEMA_MAJOR: u32 = 1;
pub const HL_SCHEMA_MINOR: u32 = 0;

/// Named metadata holding the schema `{major, minor}` tuple.
pub const MD_VERSION: &str = "dx.version";
/// Named metadata holding the `{kind, major, minor}` shader model tuple.
pub const MD_SHADER_MODEL: &str = "dx.shaderModel";
/// Named metadata holding the entry point descriptor.
pub const MD_ENTRY_POINTS: &str = "dx.entryPoints";
/// Named metadata holding shader properties of non-entry functions.
pub const MD_FUNCTION_PROPS: &str = "dx.fnprops";
/// Named metadata holding the option bitset.
pub const MD_OPTIONS: &str = "dx.options";
/// Named metadata holding resource type annotations.
pub const MD_RESOURCE_TYPE_ANNOTATIONS: &str = "dx.resource.type.annotation";
/// Named metadata holding the opaque root signature blob.
pub const MD_ROOT_SIGNATURE: &str = "dx.rootSignature";
/// Named metadata listing globals that must survive dead-global elimination.
pub const MD_LLVM_USED: &str = "llvm.used";

/// Every tree owned by the high-level layer, in emission order.
pub const HL_NAMED_METADATA: [&str; 7] = [
    MD_VERSION,
    MD_SHADER_MODEL,
    MD_ENTRY_POINTS,
    MD_FUNCTION_PROPS,
    MD_OPTIONS,
    MD_RESOURCE_TYPE_ANNOTATIONS,
    MD_ROOT_SIGNATURE,
];

/// Attachment kind marking a value (or function) as precise.
pub const MD_PRECISE: &str = "dx.precise";

/// Reserved, inert function whose calls carry a precise mark across
/// register promotion.
pub const PRECISE_MARKER_FN_NAME: &str = "dx.attribute.precise";

/// Extended property tags for resource records.
pub const RESOURCE_TAG_ELEMENT_TYPE: u32 = 0;
pub const RESOURCE_TAG_STRUCTURED_STRIDE: u32 = 1;

/// Extended property tag for signature elements.
pub const SIGNATURE_TAG_OUTPUT_STREAM: u32 = 0;
