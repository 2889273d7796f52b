//! wgpu implementation of the graphics device
//!
//! Resource creation runs inside wgpu error scopes, so an invalid handle is
//! reported as a `DeviceError` instead of reaching the uncaptured error
//! handler.

use crate::wgpu_helpers::*;
use texel_alias::{AliasKind, CompileOutput, DeviceError, GraphicsDevice, ResourceKind, TexelFormat};

/// Options for selecting and configuring the adapter
#[derive(Debug, Clone)]
pub struct WgpuDeviceOptions {
    /// Backends the instance may use
    pub backends: wgpu::Backends,
    /// Adapter power preference
    pub power_preference: wgpu::PowerPreference,
    /// Only accept a software fallback adapter
    pub force_fallback_adapter: bool,
    /// Copy the store into a texture of the view format when the format cannot
    /// be viewed directly; reject such views when false
    pub materialize_incompatible_aliases: bool,
}

impl Default for WgpuDeviceOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            materialize_incompatible_aliases: true,
        }
    }
}

/// Errors raised while acquiring a device
#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("no suitable adapter: {0}")]
    AdapterUnavailable(#[from] wgpu::RequestAdapterError),
    #[error("failed to create device: {0}")]
    DeviceUnavailable(#[from] wgpu::RequestDeviceError),
    #[error("adapter '{adapter}' does not support compute shaders")]
    ComputeUnsupported { adapter: String },
}

/// A compiled decode kernel
#[derive(Debug)]
pub struct WgpuProgram {
    pipeline: wgpu::ComputePipeline,
}

/// A single-row texture and the formats it may be viewed as directly
#[derive(Debug)]
pub struct WgpuTexture {
    texture: wgpu::Texture,
    format: TexelFormat,
    view_formats: Vec<wgpu::TextureFormat>,
}

/// A view the kernel samples, and whether it aliases the store or a copy of it
#[derive(Debug)]
pub struct WgpuView {
    view: wgpu::TextureView,
    alias: AliasKind,
}

/// Storage buffer written by the kernel, with an optional readback copy
#[derive(Debug, Clone)]
pub struct WgpuBuffer {
    storage: wgpu::Buffer,
    readback: Option<wgpu::Buffer>,
}

/// Bind group for one pass, plus the buffers the pass writes and copies
#[derive(Debug)]
pub struct WgpuBindings {
    bind_group: wgpu::BindGroup,
    buffer: WgpuBuffer,
}

/// Graphics device backed by wgpu
#[derive(Debug)]
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    view_formats_supported: bool,
    materialize_incompatible_aliases: bool,
}

impl WgpuDevice {
    /// Selects an adapter and creates a device
    ///
    /// # Errors
    /// Fails if no adapter matches the options, the device cannot be created,
    /// or the adapter cannot run compute shaders.
    pub async fn new(options: WgpuDeviceOptions) -> Result<Self, BootstrapError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference,
                compatible_surface: None,
                force_fallback_adapter: options.force_fallback_adapter,
            })
            .await?;

        let adapter_info = adapter.get_info();
        tracing::info!(
            name = %adapter_info.name,
            vendor = adapter_info.vendor,
            device = adapter_info.device,
            backend = ?adapter_info.backend,
            driver = %adapter_info.driver,
            driver_info = %adapter_info.driver_info,
            "adapter selected"
        );

        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return Err(BootstrapError::ComputeUnsupported { adapter: adapter_info.name });
        }
        let view_formats_supported = downlevel.flags.contains(wgpu::DownlevelFlags::VIEW_FORMATS);

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Texel Alias Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults().using_resolution(adapter.limits()),
                memory_hints: wgpu::MemoryHints::default(),
                trace: Default::default(),
            })
            .await?;

        device.on_uncaptured_error(Box::new(|error| {
            tracing::error!("uncaptured device error: {error}");
        }));

        tracing::debug!(view_formats_supported, materialize = options.materialize_incompatible_aliases, "device ready");

        Ok(Self {
            device,
            queue,
            adapter_info,
            view_formats_supported,
            materialize_incompatible_aliases: options.materialize_incompatible_aliases,
        })
    }

    /// Information about the selected adapter
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// Returns true if textures can declare sRGB partner view formats
    pub fn supports_view_formats(&self) -> bool {
        self.view_formats_supported
    }

    /// Runs `f` inside validation and out-of-memory error scopes
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match validation.or(out_of_memory) {
            Some(error) => Err(error.to_string()),
            None => Ok(value),
        }
    }

    fn creation_error(resource: ResourceKind) -> impl FnOnce(String) -> DeviceError {
        move |message| DeviceError::Creation { resource, message }
    }

    /// Copies the store bytes into a new texture of `format`
    ///
    /// The copy runs entirely on the device, from the backing texture through a
    /// staging buffer, so the alias holds exactly the uploaded bytes.
    fn materialize_alias(&self, base: &WgpuTexture, format: wgpu::TextureFormat) -> Result<wgpu::Texture, DeviceError> {
        let width = base.texture.width();
        let bytes_per_row = padded_bytes_per_row(width * base.format.bytes_per_texel() as u32);

        self.scoped(|device| {
            let staging = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Alias Staging Buffer"),
                size: bytes_per_row as u64,
                usage: BUFFER_USAGE_STAGING,
                mapped_at_creation: false,
            });
            let alias = create_row_texture(device, "Alias Texture", width, format, TEXTURE_USAGE_ALIAS, &[]);
            let layout = wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: None,
            };

            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Alias Copy Encoder") });
            encoder.copy_texture_to_buffer(texture_origin(&base.texture), wgpu::TexelCopyBufferInfo { buffer: &staging, layout }, row_extent(width));
            encoder.copy_buffer_to_texture(wgpu::TexelCopyBufferInfo { buffer: &staging, layout }, texture_origin(&alias), row_extent(width));
            self.queue.submit(std::iter::once(encoder.finish()));

            alias
        })
        .map_err(Self::creation_error(ResourceKind::View))
    }
}

impl GraphicsDevice for WgpuDevice {
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type Texture = WgpuTexture;
    type View = WgpuView;
    type Bindings = WgpuBindings;
    type Mapped<'a> = wgpu::BufferView<'a>;

    fn compile_compute_program(&self, source: &str) -> CompileOutput<WgpuProgram> {
        // naga gives the full annotated diagnostics that wgpu only summarizes
        let module = match naga::front::wgsl::parse_str(source) {
            Ok(module) => module,
            Err(err) => return CompileOutput::failed(err.emit_to_string(source)),
        };
        if let Err(err) = naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all()).validate(&module) {
            return CompileOutput::failed(err.emit_to_string(source));
        }

        let built = self.scoped(|device| {
            let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Decode Kernel"),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            });
            let info = pollster::block_on(module.get_compilation_info());
            let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some("Decode Pipeline"),
                layout: None,
                module: &module,
                entry_point: None,
                compilation_options: Default::default(),
                cache: None,
            });
            (pipeline, info)
        });

        match built {
            Ok((pipeline, info)) => {
                let log = info
                    .messages
                    .iter()
                    .map(|message| match &message.location {
                        Some(location) => format!("{:?} at {}:{}: {}", message.message_type, location.line_number, location.line_position, message.message),
                        None => format!("{:?}: {}", message.message_type, message.message),
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                CompileOutput::built(WgpuProgram { pipeline }, log)
            }
            Err(message) => CompileOutput::failed(message),
        }
    }

    fn create_buffer(&self, size_bytes: u64, host_readable: bool) -> Result<WgpuBuffer, DeviceError> {
        self.scoped(|device| {
            let storage = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Result Buffer"),
                size: size_bytes,
                usage: BUFFER_USAGE_RESULT,
                mapped_at_creation: false,
            });
            let readback = host_readable.then(|| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Readback Buffer"),
                    size: size_bytes,
                    usage: BUFFER_USAGE_READBACK,
                    mapped_at_creation: false,
                })
            });
            WgpuBuffer { storage, readback }
        })
        .map_err(Self::creation_error(ResourceKind::Buffer))
    }

    fn create_texture_1d(&self, width: u32, format: TexelFormat) -> Result<WgpuTexture, DeviceError> {
        let wgpu_format = texture_format(format);
        let view_formats: Vec<wgpu::TextureFormat> = if self.view_formats_supported {
            srgb_partner(wgpu_format).into_iter().collect()
        } else {
            Vec::new()
        };

        let texture = self
            .scoped(|device| create_row_texture(device, "Backing Store", width, wgpu_format, TEXTURE_USAGE_STORE, &view_formats))
            .map_err(Self::creation_error(ResourceKind::Texture))?;

        Ok(WgpuTexture { texture, format, view_formats })
    }

    fn upload_texels(&self, texture: &WgpuTexture, bytes: &[u8]) -> Result<(), DeviceError> {
        let width = texture.texture.width();
        let bytes_per_row = width * texture.format.bytes_per_texel() as u32;
        if bytes.len() != bytes_per_row as usize {
            return Err(DeviceError::UploadSize {
                expected: bytes_per_row as usize,
                actual: bytes.len(),
            });
        }

        self.scoped(|_| {
            self.queue.write_texture(
                texture_origin(&texture.texture),
                bytes,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: None,
                },
                row_extent(width),
            );
        })
        .map_err(Self::creation_error(ResourceKind::Texture))
    }

    fn create_view_alias(&self, base: &WgpuTexture, format: TexelFormat) -> Result<WgpuView, DeviceError> {
        let incompatible = DeviceError::IncompatibleViewFormat { storage: base.format, view: format };
        if !base.format.is_size_compatible(format) {
            return Err(incompatible);
        }

        let view_format = texture_format(format);
        let label = format!("{format} View");
        if view_format == base.texture.format() || base.view_formats.contains(&view_format) {
            let view = self
                .scoped(|_| create_row_view(&base.texture, &label, view_format))
                .map_err(Self::creation_error(ResourceKind::View))?;
            return Ok(WgpuView {
                view,
                alias: AliasKind::Reinterpreted,
            });
        }

        if !self.materialize_incompatible_aliases {
            return Err(incompatible);
        }

        tracing::info!(storage = %base.format, view = %format, "materializing view alias on the device");
        let alias = self.materialize_alias(base, view_format)?;
        let view = self
            .scoped(|_| create_row_view(&alias, &label, view_format))
            .map_err(Self::creation_error(ResourceKind::View))?;
        Ok(WgpuView {
            view,
            alias: AliasKind::Materialized,
        })
    }

    fn alias_kind(&self, view: &WgpuView) -> AliasKind {
        view.alias
    }

    fn bind_for_dispatch(&self, program: &WgpuProgram, view: &WgpuView, view_slot: u32, buffer: &WgpuBuffer, buffer_slot: u32) -> Result<WgpuBindings, DeviceError> {
        let bind_group = self
            .scoped(|device| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Decode Bind Group"),
                    layout: &program.pipeline.get_bind_group_layout(0),
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: view_slot,
                            resource: wgpu::BindingResource::TextureView(&view.view),
                        },
                        wgpu::BindGroupEntry {
                            binding: buffer_slot,
                            resource: buffer.storage.as_entire_binding(),
                        },
                    ],
                })
            })
            .map_err(Self::creation_error(ResourceKind::Bindings))?;

        Ok(WgpuBindings {
            bind_group,
            buffer: buffer.clone(),
        })
    }

    fn dispatch(&self, program: &WgpuProgram, bindings: &WgpuBindings, workgroups: [u32; 3]) -> Result<(), DeviceError> {
        let [x, y, z] = workgroups;

        self.scoped(|device| {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Decode Encoder") });
            // Stale values from the previous view must never be read back
            encoder.clear_buffer(&bindings.buffer.storage, 0, None);
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Decode Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&program.pipeline);
                pass.set_bind_group(0, &bindings.bind_group, &[]);
                pass.dispatch_workgroups(x, y, z);
            }
            if let Some(readback) = &bindings.buffer.readback {
                encoder.copy_buffer_to_buffer(&bindings.buffer.storage, 0, readback, 0, bindings.buffer.storage.size());
            }
            self.queue.submit(std::iter::once(encoder.finish()));
        })
        .map_err(DeviceError::Dispatch)
    }

    fn memory_barrier(&self) -> Result<(), DeviceError> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|e| DeviceError::Sync(e.to_string()))
    }

    fn map_for_read<'a>(&'a self, buffer: &'a WgpuBuffer) -> Result<wgpu::BufferView<'a>, DeviceError> {
        let readback = buffer.readback.as_ref().ok_or(DeviceError::NotHostReadable)?;
        map_buffer_blocking(&self.device, readback)?;
        Ok(readback.slice(..).get_mapped_range())
    }

    fn unmap(&self, buffer: &WgpuBuffer) {
        if let Some(readback) = &buffer.readback {
            readback.unmap();
        }
    }
}
