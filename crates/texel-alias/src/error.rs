//! Fatal errors of a verification run
//!
//! Value mismatches are not errors: they are recorded in the report.

use crate::device::{DeviceError, ResourceKind};
use crate::format::TexelFormat;

/// A fatal error that aborts the whole run
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The decode kernel did not build
    #[error("decode kernel failed to build:\n{diagnostics}")]
    ShaderCompile { diagnostics: String },
    /// The device returned an invalid handle
    #[error("failed to create {resource}: {source}")]
    ResourceCreation {
        resource: ResourceKind,
        #[source]
        source: DeviceError,
    },
    /// A view cannot take part in the run
    #[error("view '{name}' ({format}) is invalid: {reason}")]
    InvalidView { name: String, format: TexelFormat, reason: &'static str },
    /// A dispatch, barrier or map call failed
    #[error("device operation `{operation}` failed: {source}")]
    Device {
        operation: &'static str,
        #[source]
        source: DeviceError,
    },
    /// The kernel could not sample every texel of the view
    #[error("decode kernel sampled only {sampled} of {texels} texels; the device exposes a narrower view than the store")]
    UnsampledTexels { sampled: usize, texels: usize },
    /// The mapped result buffer cannot be read as floats
    #[error("result readback is malformed: {0}")]
    Readback(String),
}
