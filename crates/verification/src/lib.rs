//! wgpu bootstrap for texel-alias
//!
//! Provides a `GraphicsDevice` backed by wgpu and a console renderer for
//! validation reports.

pub mod table;
pub mod wgpu_device;
mod wgpu_helpers;

pub use table::ReportTable;
pub use wgpu_device::{BootstrapError, WgpuDevice, WgpuDeviceOptions, WgpuView};
