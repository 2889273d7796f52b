//! Run manifest parser
//!
//! A manifest is a YAML document naming the storage format, the binding slots
//! and the ordered list of views a run decodes.

use crate::device::BindingSlots;
use crate::format::TexelFormat;
use crate::harness::RunConfig;
use crate::registry::ViewSpec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Manifest with the UNORM, SNORM and sRGB views
pub const DEFAULT_MANIFEST: &str = include_str!("../manifests/default.yaml");

/// Default manifest plus a second UNORM view over the same store
pub const ALIASING_MANIFEST: &str = include_str!("../manifests/aliasing.yaml");

/// Errors raised while loading a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// The manifest file could not be read
    #[error("failed to read manifest {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The manifest is not valid YAML or has unknown fields or formats
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_norway::Error),
    /// The manifest lists no views
    #[error("manifest lists no views")]
    NoViews,
}

/// Binding slots as written in a manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestBinding {
    /// Slot of the sampled view
    pub view: u32,
    /// Slot of the result buffer
    pub result: u32,
}

/// One view entry of a manifest
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManifestView {
    /// Unique view name
    pub name: String,
    /// View format
    pub format: TexelFormat,
    /// Optional tolerance override
    #[serde(default)]
    pub tolerance: Option<f32>,
}

/// A parsed run manifest
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunManifest {
    /// Format of the backing texture
    #[serde(default = "default_storage_format")]
    pub storage_format: TexelFormat,
    /// Binding slots of the decode kernel
    #[serde(default)]
    pub binding: Option<ManifestBinding>,
    /// Views in processing order
    pub views: Vec<ManifestView>,
}

fn default_storage_format() -> TexelFormat {
    TexelFormat::Rgba8Unorm
}

impl RunManifest {
    /// Parses a manifest from YAML text
    pub fn from_yaml(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_norway::from_str(content)?;
        if manifest.views.is_empty() {
            return Err(ManifestError::NoViews);
        }
        Ok(manifest)
    }

    /// Reads and parses a manifest file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// The bundled manifest with one view per semantic
    pub fn default_views() -> Result<Self, ManifestError> {
        Self::from_yaml(DEFAULT_MANIFEST)
    }

    /// The bundled manifest with a duplicate UNORM view
    pub fn aliasing() -> Result<Self, ManifestError> {
        Self::from_yaml(ALIASING_MANIFEST)
    }

    /// View specs in manifest order
    pub fn view_specs(&self) -> Vec<ViewSpec> {
        self.views
            .iter()
            .map(|view| ViewSpec {
                name: view.name.clone(),
                format: view.format,
                tolerance: view.tolerance,
            })
            .collect()
    }

    /// Builds a run configuration using the bundled decode kernel
    pub fn into_config(self) -> RunConfig {
        let views = self.view_specs();
        RunConfig {
            storage_format: self.storage_format,
            views,
            slots: self
                .binding
                .map_or(BindingSlots::DEFAULT, |binding| BindingSlots {
                    view: binding.view,
                    result: binding.result,
                }),
            ..RunConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_manifests_parse() {
        let manifest = RunManifest::default_views().unwrap();
        assert_eq!(manifest.storage_format, TexelFormat::Rgba8Unorm);
        assert_eq!(manifest.view_specs(), ViewSpec::defaults());

        let aliasing = RunManifest::aliasing().unwrap();
        assert_eq!(aliasing.views.len(), 4);
        assert_eq!(aliasing.views[3].format, TexelFormat::Rgba8Unorm);
    }

    #[test]
    fn test_manifest_overrides() {
        let manifest = RunManifest::from_yaml(
            r#"
storage_format: r8unorm
binding:
  view: 2
  result: 3
views:
  - name: red
    format: r8snorm
    tolerance: 0.5
"#,
        )
        .unwrap();

        let config = manifest.into_config();
        assert_eq!(config.storage_format, TexelFormat::R8Unorm);
        assert_eq!(config.slots, BindingSlots { view: 2, result: 3 });
        assert_eq!(config.views, vec![ViewSpec::new("red", TexelFormat::R8Snorm).with_tolerance(0.5)]);
    }

    #[test]
    fn test_manifest_rejects_invalid_input() {
        assert!(matches!(RunManifest::from_yaml("views: []"), Err(ManifestError::NoViews)));
        assert!(matches!(
            RunManifest::from_yaml("views:\n  - name: x\n    format: bgra8unorm\n"),
            Err(ManifestError::Parse(_))
        ));
        assert!(matches!(
            RunManifest::from_yaml("views:\n  - name: x\n    format: r8unorm\n    swizzle: rgba\n"),
            Err(ManifestError::Parse(_))
        ));
        assert!(matches!(RunManifest::from_file("/nonexistent/manifest.yaml"), Err(ManifestError::Io { .. })));
    }
}
