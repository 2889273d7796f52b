//! Graphics device capability surface
//!
//! The pipeline consumes a device only through [`GraphicsDevice`]. Bootstrap,
//! platform selection and debug wiring live in the implementations; the core
//! never branches on which device it is driving.

use crate::format::TexelFormat;
use serde::Serialize;
use std::fmt;
use std::ops::Deref;

/// Fixed binding slots of the decode kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSlots {
    /// Slot of the sampled view (read-only)
    pub view: u32,
    /// Slot of the result buffer (writable)
    pub result: u32,
}

impl BindingSlots {
    /// Slots used by the bundled decode kernel
    pub const DEFAULT: Self = Self { view: 0, result: 1 };
}

impl Default for BindingSlots {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Outcome of building a compute program
///
/// The log is kept even on success since compilers report warnings there.
#[derive(Debug)]
pub struct CompileOutput<P> {
    /// The program, if it built
    pub program: Option<P>,
    /// Full diagnostic text produced by the compiler and linker
    pub log: String,
}

impl<P> CompileOutput<P> {
    /// A successful build with its diagnostic log
    pub fn built(program: P, log: impl Into<String>) -> Self {
        Self {
            program: Some(program),
            log: log.into(),
        }
    }

    /// A failed build with its diagnostic log
    pub fn failed(log: impl Into<String>) -> Self {
        Self { program: None, log: log.into() }
    }
}

/// Kind of device resource, for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// The backing texture
    Texture,
    /// A format alias over the backing texture
    View,
    /// The result buffer
    Buffer,
    /// Resource bindings of a dispatch
    Bindings,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Texture => "texture",
            ResourceKind::View => "texture view",
            ResourceKind::Buffer => "buffer",
            ResourceKind::Bindings => "bindings",
        })
    }
}

/// How a device produced a view over the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasKind {
    /// The view reads the backing texture itself through another format
    #[default]
    Reinterpreted,
    /// The device copied the stored bytes into a texture of the view format
    Materialized,
}

impl fmt::Display for AliasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AliasKind::Reinterpreted => "reinterpreted",
            AliasKind::Materialized => "materialized",
        })
    }
}

/// Errors reported by a device
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// The device returned an invalid handle
    #[error("{resource} creation failed: {message}")]
    Creation { resource: ResourceKind, message: String },
    /// The device cannot view storage of one format as another
    #[error("cannot view {storage} storage as {view}")]
    IncompatibleViewFormat { storage: TexelFormat, view: TexelFormat },
    /// Uploaded data does not match the texture size
    #[error("upload of {actual} bytes does not match texture size of {expected} bytes")]
    UploadSize { expected: usize, actual: usize },
    /// Recording or submitting the dispatch failed
    #[error("dispatch failed: {0}")]
    Dispatch(String),
    /// Waiting for submitted work failed
    #[error("device synchronization failed: {0}")]
    Sync(String),
    /// Mapping the buffer for host access failed
    #[error("buffer mapping failed: {0}")]
    Map(String),
    /// The buffer was not created host readable
    #[error("buffer is not host readable")]
    NotHostReadable,
}

/// The operations the decode pipeline needs from a graphics device
///
/// Handles are owned by the caller and passed back explicitly; implementations
/// must not rely on any implicitly bound state between calls.
pub trait GraphicsDevice {
    /// A built compute program
    type Program;
    /// A device buffer
    type Buffer;
    /// A texture holding one row of texels
    type Texture;
    /// A format alias over a texture
    type View;
    /// Resources bound for one dispatch
    type Bindings;
    /// A buffer mapped for host reads; unmapped by [`GraphicsDevice::unmap`] after it is dropped
    type Mapped<'a>: Deref<Target = [u8]>
    where
        Self: 'a;

    /// Builds a compute program from source text
    fn compile_compute_program(&self, source: &str) -> CompileOutput<Self::Program>;

    /// Creates a buffer of `size_bytes`, mappable for reads if `host_readable`
    fn create_buffer(&self, size_bytes: u64, host_readable: bool) -> Result<Self::Buffer, DeviceError>;

    /// Creates a texture holding one row of `width` texels, sampled at `(i, 0)`
    fn create_texture_1d(&self, width: u32, format: TexelFormat) -> Result<Self::Texture, DeviceError>;

    /// Writes the full texel contents of a texture
    fn upload_texels(&self, texture: &Self::Texture, bytes: &[u8]) -> Result<(), DeviceError>;

    /// Creates a view reinterpreting the texture's storage as `format`
    fn create_view_alias(&self, base: &Self::Texture, format: TexelFormat) -> Result<Self::View, DeviceError>;

    /// How `view` was produced; devices that only create true aliases keep the default
    fn alias_kind(&self, _view: &Self::View) -> AliasKind {
        AliasKind::Reinterpreted
    }

    /// Binds a view and a buffer at the given slots for `program`
    fn bind_for_dispatch(&self, program: &Self::Program, view: &Self::View, view_slot: u32, buffer: &Self::Buffer, buffer_slot: u32) -> Result<Self::Bindings, DeviceError>;

    /// Issues a compute dispatch; may return before the work completes
    fn dispatch(&self, program: &Self::Program, bindings: &Self::Bindings, workgroups: [u32; 3]) -> Result<(), DeviceError>;

    /// Blocks until all writes of prior dispatches are visible to the host
    fn memory_barrier(&self) -> Result<(), DeviceError>;

    /// Maps a host-readable buffer
    fn map_for_read<'a>(&'a self, buffer: &'a Self::Buffer) -> Result<Self::Mapped<'a>, DeviceError>;

    /// Releases a mapping created by [`GraphicsDevice::map_for_read`]
    fn unmap(&self, buffer: &Self::Buffer);
}
