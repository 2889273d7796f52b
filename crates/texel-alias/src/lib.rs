//! Texel format aliasing verification
//!
//! This crate checks how a graphics device decodes the same raw bytes when they
//! are viewed through different normalized pixel formats (UNORM, SNORM, sRGB).
//! A deterministic byte dataset is uploaded once, aliased by several views, decoded
//! on the device by a compute kernel, and compared against exact analytic formulas.
//!
//! The device itself is abstracted behind [`GraphicsDevice`], so the pipeline never
//! depends on a particular graphics API or platform.

pub mod dataset;
pub mod device;
pub mod error;
pub mod format;
pub mod harness;
pub mod manifest;
pub mod registry;
pub mod runner;
pub mod state;
pub mod validator;

pub use dataset::{BackingStore, TEXEL_COUNT, TexelStore};
pub use device::{AliasKind, BindingSlots, CompileOutput, DeviceError, GraphicsDevice, ResourceKind};
pub use error::HarnessError;
pub use format::{DecodeSemantic, TexelFormat};
pub use harness::{Harness, RunConfig};
pub use manifest::{ManifestError, RunManifest};
pub use registry::{ViewDescriptor, ViewRegistry, ViewSpec};
pub use runner::{DECODE_KERNEL_WGSL, DecodeKernelRunner, UNSAMPLED_TEXEL};
pub use state::RunState;
pub use validator::{ResultValidator, TexelRecord, ValidationReport, ViewReport};
