use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum HlError {
    #[error(
        "High-level metadata schema version {found} is not compatible with the supported version {supported}"
    )]
    SchemaVersionMismatch {
        found: semver::Version,
        supported: semver::Version,
    },

    #[error("Malformed high-level metadata in `{node}`: {reason}")]
    MalformedMetadata { node: String, reason: String },

    #[error("{what} index {index} is out of range (length {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: u32,
        len: usize,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    DuplicateEntry(String),

    #[error("{0} has been released")]
    NullReference(&'static str),

    #[error("Failed to parse module configuration: {0}")]
    ConfigParse(String),
}

impl HlError {
    pub(crate) fn malformed(node: impl Into<String>, reason: impl Into<String>) -> Self {
        HlError::MalformedMetadata {
            node: node.into(),
            reason: reason.into(),
        }
    }
}

pub type HlResult<T> = Result<T, HlError>;
