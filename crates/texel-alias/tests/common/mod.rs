//! Shared helpers for `texel-alias` integration tests.
//!
//! `SoftwareDevice` is a CPU stand-in for a graphics device. It decodes texels
//! the way conforming hardware does, records every call it receives, and can
//! inject the faults the harness must handle.

use std::cell::{Ref, RefCell};
use texel_alias::{AliasKind, CompileOutput, DeviceError, GraphicsDevice, ResourceKind, TexelFormat, UNSAMPLED_TEXEL};

/// Routes span and event output of the code under test to the test harness
pub fn init_tracing() {
    // Another test in the same binary may have installed it already
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// A device call, as observed by the test double
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    Compile,
    CreateBuffer { size_bytes: u64, host_readable: bool },
    CreateTexture { width: u32, format: TexelFormat },
    Upload { texture: usize },
    CreateView { texture: usize, format: TexelFormat },
    Bind { view: usize, view_slot: u32, buffer_slot: u32 },
    Dispatch { view: usize, workgroups: [u32; 3] },
    Barrier,
    Map,
    Unmap,
}

/// Faults the double injects
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// Fail every kernel build with this log
    pub compile_failure: Option<String>,
    /// Reject views of this format
    pub rejected_view_format: Option<TexelFormat>,
    /// Write this value instead of the decoded one, for views of `format` at `index`
    pub corrupt_texel: Option<(TexelFormat, usize, f32)>,
    /// Expose views to the kernel as only this many texels wide
    pub view_width: Option<usize>,
    /// Produce views of this format by copying the store instead of aliasing it
    pub materialized_view_format: Option<TexelFormat>,
}

#[derive(Debug)]
struct Texture {
    format: TexelFormat,
    width: u32,
    bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct View {
    id: usize,
    texture: usize,
    format: TexelFormat,
    alias: AliasKind,
}

#[derive(Debug)]
pub struct Bindings {
    view: View,
    buffer: usize,
}

#[derive(Debug, Default)]
struct State {
    textures: Vec<Texture>,
    views: usize,
    host_readable: Vec<bool>,
    outstanding_dispatch: bool,
    mapped: bool,
}

/// CPU implementation of the device surface
#[derive(Debug, Default)]
pub struct SoftwareDevice {
    faults: Faults,
    state: RefCell<State>,
    buffers: RefCell<Vec<Vec<f32>>>,
    ops: RefCell<Vec<Op>>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_faults(faults: Faults) -> Self {
        Self {
            faults,
            ..Self::default()
        }
    }

    /// Every call received so far
    pub fn ops(&self) -> Vec<Op> {
        self.ops.borrow().clone()
    }

    /// Current bytes of every texture
    pub fn texture_bytes(&self) -> Vec<Vec<u8>> {
        self.state.borrow().textures.iter().map(|texture| texture.bytes.clone()).collect()
    }

    fn record(&self, op: Op) {
        self.ops.borrow_mut().push(op);
    }

    fn decode(format: TexelFormat, raw: u8) -> f32 {
        match format {
            TexelFormat::Rgba8Unorm | TexelFormat::R8Unorm => raw as f32 / 255.0,
            TexelFormat::Rgba8Snorm | TexelFormat::R8Snorm => (raw as i8 as f32 / 127.0).max(-1.0),
            TexelFormat::Rgba8UnormSrgb => {
                let c = raw as f32 / 255.0;
                if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) }
            }
            TexelFormat::Rgba8Uint => raw as f32,
        }
    }
}

impl GraphicsDevice for SoftwareDevice {
    type Program = ();
    type Buffer = usize;
    type Texture = usize;
    type View = View;
    type Bindings = Bindings;
    type Mapped<'a> = Ref<'a, [u8]>;

    fn compile_compute_program(&self, _source: &str) -> CompileOutput<()> {
        self.record(Op::Compile);
        match &self.faults.compile_failure {
            Some(log) => CompileOutput::failed(log.clone()),
            None => CompileOutput::built((), ""),
        }
    }

    fn create_buffer(&self, size_bytes: u64, host_readable: bool) -> Result<usize, DeviceError> {
        self.record(Op::CreateBuffer { size_bytes, host_readable });
        let mut buffers = self.buffers.borrow_mut();
        buffers.push(vec![0.0; size_bytes as usize / size_of::<f32>()]);
        self.state.borrow_mut().host_readable.push(host_readable);
        Ok(buffers.len() - 1)
    }

    fn create_texture_1d(&self, width: u32, format: TexelFormat) -> Result<usize, DeviceError> {
        self.record(Op::CreateTexture { width, format });
        let mut state = self.state.borrow_mut();
        state.textures.push(Texture {
            format,
            width,
            bytes: vec![0; width as usize * format.bytes_per_texel()],
        });
        Ok(state.textures.len() - 1)
    }

    fn upload_texels(&self, texture: &usize, bytes: &[u8]) -> Result<(), DeviceError> {
        self.record(Op::Upload { texture: *texture });
        let mut state = self.state.borrow_mut();
        let target = &mut state.textures[*texture];
        if target.bytes.len() != bytes.len() {
            return Err(DeviceError::UploadSize {
                expected: target.bytes.len(),
                actual: bytes.len(),
            });
        }
        target.bytes.copy_from_slice(bytes);
        Ok(())
    }

    fn create_view_alias(&self, base: &usize, format: TexelFormat) -> Result<View, DeviceError> {
        self.record(Op::CreateView { texture: *base, format });
        let mut state = self.state.borrow_mut();
        let storage = state.textures[*base].format;
        if self.faults.rejected_view_format == Some(format) || !storage.is_size_compatible(format) {
            return Err(DeviceError::IncompatibleViewFormat { storage, view: format });
        }
        state.views += 1;
        let alias = if self.faults.materialized_view_format == Some(format) {
            AliasKind::Materialized
        } else {
            AliasKind::Reinterpreted
        };
        Ok(View {
            id: state.views - 1,
            texture: *base,
            format,
            alias,
        })
    }

    fn alias_kind(&self, view: &View) -> AliasKind {
        view.alias
    }

    fn bind_for_dispatch(&self, _program: &(), view: &View, view_slot: u32, buffer: &usize, buffer_slot: u32) -> Result<Bindings, DeviceError> {
        self.record(Op::Bind {
            view: view.id,
            view_slot,
            buffer_slot,
        });
        if self.state.borrow().mapped {
            return Err(DeviceError::Creation {
                resource: ResourceKind::Bindings,
                message: "buffer is mapped".to_string(),
            });
        }
        Ok(Bindings { view: *view, buffer: *buffer })
    }

    fn dispatch(&self, _program: &(), bindings: &Bindings, workgroups: [u32; 3]) -> Result<(), DeviceError> {
        self.record(Op::Dispatch {
            view: bindings.view.id,
            workgroups,
        });
        let mut state = self.state.borrow_mut();
        let texture = &state.textures[bindings.view.texture];
        let channels = texture.format.channels();
        let mut buffers = self.buffers.borrow_mut();
        let results = &mut buffers[bindings.buffer];

        let width = self.faults.view_width.unwrap_or(texture.width as usize);
        results.fill(0.0);
        for (index, result) in results.iter_mut().enumerate() {
            if index >= width {
                *result = f32::from_bits(UNSAMPLED_TEXEL);
                continue;
            }
            let raw = texture.bytes[index * channels];
            *result = match self.faults.corrupt_texel {
                Some((format, corrupt_index, value)) if format == bindings.view.format && corrupt_index == index => value,
                _ => Self::decode(bindings.view.format, raw),
            };
        }
        state.outstanding_dispatch = true;
        Ok(())
    }

    fn memory_barrier(&self) -> Result<(), DeviceError> {
        self.record(Op::Barrier);
        self.state.borrow_mut().outstanding_dispatch = false;
        Ok(())
    }

    fn map_for_read<'a>(&'a self, buffer: &'a usize) -> Result<Ref<'a, [u8]>, DeviceError> {
        self.record(Op::Map);
        let mut state = self.state.borrow_mut();
        if state.outstanding_dispatch {
            return Err(DeviceError::Map("dispatch still outstanding".to_string()));
        }
        if !state.host_readable[*buffer] {
            return Err(DeviceError::NotHostReadable);
        }
        state.mapped = true;
        Ok(Ref::map(self.buffers.borrow(), |buffers| bytemuck::cast_slice(&buffers[*buffer])))
    }

    fn unmap(&self, _buffer: &usize) {
        self.record(Op::Unmap);
        self.state.borrow_mut().mapped = false;
    }
}
