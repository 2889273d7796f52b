//! Decode kernel runner
//!
//! Drives one decode pass per view: bind the view and the result buffer, dispatch
//! the kernel, then wait on a barrier before the host may map the results.

use crate::device::{BindingSlots, GraphicsDevice, ResourceKind};
use crate::error::HarnessError;
use crate::registry::ViewDescriptor;
use crate::state::{RunState, RunTracker};

/// WGSL source of the bundled decode kernel
pub const DECODE_KERNEL_WGSL: &str = include_str!("shaders/decode_texels.wgsl");

/// Bit pattern the kernel writes for result indices the bound view does not cover
///
/// All-ones is a NaN no normalized decode can produce.
pub const UNSAMPLED_TEXEL: u32 = 0xffff_ffff;

/// Workgroups per dispatch: the kernel runs as a single invocation
pub const DISPATCH_SIZE: [u32; 3] = [1, 1, 1];

/// Compiled decode kernel together with the result buffer it writes
///
/// The result buffer is shared by every pass. A pass borrows the runner
/// mutably until its results are unmapped, so passes cannot overlap.
pub struct DecodeKernelRunner<'d, D: GraphicsDevice> {
    device: &'d D,
    program: D::Program,
    result_buffer: D::Buffer,
    slots: BindingSlots,
    texel_count: usize,
}

impl<'d, D: GraphicsDevice> DecodeKernelRunner<'d, D> {
    /// Builds the kernel and allocates the result buffer
    ///
    /// # Errors
    /// * `HarnessError::ShaderCompile` with the full diagnostic log if the kernel does not build
    /// * `HarnessError::ResourceCreation` if the result buffer cannot be created
    pub fn new(device: &'d D, kernel_source: &str, texel_count: usize, slots: BindingSlots) -> Result<Self, HarnessError> {
        let output = device.compile_compute_program(kernel_source);
        let Some(program) = output.program else {
            tracing::error!("decode kernel failed to build");
            return Err(HarnessError::ShaderCompile { diagnostics: output.log });
        };
        if !output.log.trim().is_empty() {
            tracing::warn!(log = %output.log.trim(), "decode kernel built with diagnostics");
        }

        let size_bytes = (texel_count * size_of::<f32>()) as u64;
        let result_buffer = device
            .create_buffer(size_bytes, true)
            .map_err(|source| HarnessError::ResourceCreation {
                resource: ResourceKind::Buffer,
                source,
            })?;

        tracing::debug!(texel_count, size_bytes, view_slot = slots.view, result_slot = slots.result, "decode kernel ready");

        Ok(Self {
            device,
            program,
            result_buffer,
            slots,
            texel_count,
        })
    }

    /// Number of results each pass produces
    pub fn texel_count(&self) -> usize {
        self.texel_count
    }

    /// Runs bind, dispatch and barrier for one view
    ///
    /// The returned readback holds the runner until it is dropped, which keeps
    /// the next pass from binding the shared buffer while results are read.
    ///
    /// # Errors
    /// * `HarnessError::ResourceCreation` if the bindings cannot be created
    /// * `HarnessError::Device` if the dispatch or the barrier fails
    pub fn run_pass(&mut self, view: &ViewDescriptor<'_, D::View>, tracker: &mut RunTracker) -> Result<PendingReadback<'_, D>, HarnessError> {
        let bindings = self
            .device
            .bind_for_dispatch(&self.program, view.handle(), self.slots.view, &self.result_buffer, self.slots.result)
            .map_err(|source| HarnessError::ResourceCreation {
                resource: ResourceKind::Bindings,
                source,
            })?;
        tracker.enter(RunState::Bound);

        self.device
            .dispatch(&self.program, &bindings, DISPATCH_SIZE)
            .map_err(|source| HarnessError::Device { operation: "dispatch", source })?;
        tracker.enter(RunState::Dispatched);

        self.device
            .memory_barrier()
            .map_err(|source| HarnessError::Device {
                operation: "memory_barrier",
                source,
            })?;
        tracker.enter(RunState::Barriered);

        Ok(PendingReadback {
            device: self.device,
            buffer: &self.result_buffer,
            texel_count: self.texel_count,
        })
    }
}

/// Results of a pass whose barrier completed, ready to be mapped
pub struct PendingReadback<'r, D: GraphicsDevice + 'r> {
    device: &'r D,
    buffer: &'r D::Buffer,
    texel_count: usize,
}

impl<'r, D: GraphicsDevice + 'r> PendingReadback<'r, D> {
    /// Maps the result buffer for reading
    ///
    /// # Errors
    /// Returns `HarnessError::Device` if the device cannot map the buffer.
    pub fn map(self) -> Result<MappedResults<'r, D>, HarnessError> {
        let mapped = self
            .device
            .map_for_read(self.buffer)
            .map_err(|source| HarnessError::Device {
                operation: "map_for_read",
                source,
            })?;

        Ok(MappedResults {
            device: self.device,
            buffer: self.buffer,
            mapped: Some(mapped),
            texel_count: self.texel_count,
        })
    }
}

/// A mapped result buffer; unmapped when dropped
pub struct MappedResults<'r, D: GraphicsDevice + 'r> {
    device: &'r D,
    buffer: &'r D::Buffer,
    mapped: Option<D::Mapped<'r>>,
    texel_count: usize,
}

impl<'r, D: GraphicsDevice + 'r> MappedResults<'r, D> {
    /// Decoded values, one per texel index
    ///
    /// # Errors
    /// * `HarnessError::Readback` if the mapping is misaligned or shorter than one float per texel
    /// * `HarnessError::UnsampledTexels` if the kernel saw a view narrower than the store
    pub fn values(&self) -> Result<&[f32], HarnessError> {
        let bytes = self.mapped.as_deref().unwrap_or_default();
        let values: &[f32] = bytemuck::try_cast_slice(bytes).map_err(|e| HarnessError::Readback(format!("{e:?}")))?;

        let values = values
            .get(..self.texel_count)
            .ok_or_else(|| HarnessError::Readback(format!("expected {} values, buffer holds {}", self.texel_count, values.len())))?;

        if let Some(sampled) = values.iter().position(|value| value.to_bits() == UNSAMPLED_TEXEL) {
            return Err(HarnessError::UnsampledTexels {
                sampled,
                texels: self.texel_count,
            });
        }
        Ok(values)
    }
}

impl<'r, D: GraphicsDevice + 'r> Drop for MappedResults<'r, D> {
    fn drop(&mut self) {
        // The mapped range must be released before the device unmaps the buffer
        if let Some(mapped) = self.mapped.take() {
            drop(mapped);
            self.device.unmap(self.buffer);
        }
    }
}
