use std::path::Path;

use bitflags::bitflags;
use log::info;
use semver::{Comparator, Op, VersionReq};
use serde::{Deserialize, Serialize};

use crate::{
    dxil::ShaderModel,
    magic::{HL_SCHEMA_MAJOR, HL_SCHEMA_MINOR},
    utils::error::{HlError, HlResult},
};

bitflags! {
    /// Module-wide compilation options, persisted as one integer.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct HlOptions: u32 {
        const DEFAULT_ROW_MAJOR = 1 << 0;
        const IEEE_STRICT = 1 << 1;
        const ALL_RESOURCES_BOUND = 1 << 2;
        const DISABLE_OPTIMIZATIONS = 1 << 3;
        const LEGACY_CBUFFER_LOAD = 1 << 4;
    }
}

/// Version of the metadata schema.
///
/// Readers accept any minor version of their own major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    /// The version written by this crate.
    pub const CURRENT: Self = Self {
        major: HL_SCHEMA_MAJOR,
        minor: HL_SCHEMA_MINOR,
    };

    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Every version sharing our major version.
    pub fn requirement(&self) -> VersionReq {
        VersionReq {
            comparators: vec![Comparator {
                op: Op::Wildcard,
                major: self.major as u64,
                minor: None,
                patch: None,
                pre: semver::Prerelease::EMPTY,
            }],
        }
    }

    /// Whether a module written with `found` can be read.
    pub fn accepts(&self, found: SchemaVersion) -> bool {
        self.requirement().matches(&found.into())
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl Into<semver::Version> for SchemaVersion {
    fn into(self) -> semver::Version {
        semver::Version {
            major: self.major as u64,
            minor: self.minor as u64,
            patch: 0,
            pre: semver::Prerelease::EMPTY,
            build: semver::BuildMetadata::EMPTY,
        }
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Parameters used to create an [`HlModule`](crate::module::HlModule).
///
/// ```toml
/// entry_name = "main"
/// shader_model = "ps_6_0"
/// options = "DEFAULT_ROW_MAJOR | IEEE_STRICT"
///
/// [schema_version]
/// major = 1
/// minor = 0
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HlModuleCreateInfo {
    pub entry_name: Option<String>,
    pub shader_model: Option<ShaderModel>,
    pub schema_version: SchemaVersion,
    pub options: HlOptions,
}

impl HlModuleCreateInfo {
    pub fn from_toml_str(toml_str: &str) -> HlResult<Self> {
        toml::from_str(toml_str).map_err(|e| HlError::ConfigParse(e.to_string()))
    }

    /// Load module parameters from a TOML file.
    pub fn load_from_toml(path: &Path) -> HlResult<Self> {
        let toml_str = std::fs::read_to_string(path).map_err(|e| {
            HlError::ConfigParse(format!("cannot read `{}`: {}", path.display(), e))
        })?;
        let info = Self::from_toml_str(&toml_str)?;
        info!("Loaded module configuration from `{}`", path.display());
        Ok(info)
    }

    pub fn to_toml_string(&self) -> HlResult<String> {
        toml::to_string(self).map_err(|e| HlError::ConfigParse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use crate::dxil::ShaderKind;

    use super::*;

    #[test]
    fn minor_skew_is_accepted_major_is_not() {
        let current = SchemaVersion::CURRENT;
        assert!(current.accepts(SchemaVersion::new(1, 0)));
        assert!(current.accepts(SchemaVersion::new(1, 7)));
        assert!(!current.accepts(SchemaVersion::new(2, 0)));
        assert!(!current.accepts(SchemaVersion::new(0, 9)));
    }

    #[test]
    fn create_info_from_toml() {
        let info = HlModuleCreateInfo::from_toml_str(
            r#"
            entry_name = "main"
            shader_model = "cs_6_5"
            options = "DEFAULT_ROW_MAJOR | LEGACY_CBUFFER_LOAD"
            "#,
        )
        .expect("valid configuration");

        assert_eq!(info.entry_name.as_deref(), Some("main"));
        assert_eq!(
            info.shader_model,
            Some(ShaderModel::new(ShaderKind::Compute, 6, 5))
        );
        assert_eq!(
            info.options,
            HlOptions::DEFAULT_ROW_MAJOR | HlOptions::LEGACY_CBUFFER_LOAD
        );
        assert_eq!(info.schema_version, SchemaVersion::CURRENT);
    }

    #[test]
    fn bad_toml_is_a_config_error() {
        assert!(matches!(
            HlModuleCreateInfo::from_toml_str("shader_model = \"xx\""),
            Err(HlError::ConfigParse(_))
        ));
    }
}
