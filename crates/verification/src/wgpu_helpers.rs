//! wgpu utility functions for the verification device
//!
//! Format mapping, usage flags and the small resource helpers the device
//! implementation is built from.

use texel_alias::{DeviceError, TexelFormat};

/// Usage flags of the backing store texture
///
/// Sampled by the kernel, written once by upload, copied out to materialize aliases
pub const TEXTURE_USAGE_STORE: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::COPY_DST)
    .union(wgpu::TextureUsages::COPY_SRC);

/// Usage flags of a materialized alias texture
pub const TEXTURE_USAGE_ALIAS: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING.union(wgpu::TextureUsages::COPY_DST);

/// Usage flags of the storage buffer the kernel writes
pub const BUFFER_USAGE_RESULT: wgpu::BufferUsages = wgpu::BufferUsages::STORAGE
    .union(wgpu::BufferUsages::COPY_SRC)
    .union(wgpu::BufferUsages::COPY_DST);

/// Usage flags of the host-readable copy of the result buffer
pub const BUFFER_USAGE_READBACK: wgpu::BufferUsages = wgpu::BufferUsages::MAP_READ.union(wgpu::BufferUsages::COPY_DST);

/// Usage flags of the staging buffer used to materialize an alias
pub const BUFFER_USAGE_STAGING: wgpu::BufferUsages = wgpu::BufferUsages::COPY_SRC.union(wgpu::BufferUsages::COPY_DST);

/// Maps a texel format to its wgpu equivalent
pub fn texture_format(format: TexelFormat) -> wgpu::TextureFormat {
    match format {
        TexelFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        TexelFormat::Rgba8Snorm => wgpu::TextureFormat::Rgba8Snorm,
        TexelFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
        TexelFormat::Rgba8Uint => wgpu::TextureFormat::Rgba8Uint,
        TexelFormat::R8Unorm => wgpu::TextureFormat::R8Unorm,
        TexelFormat::R8Snorm => wgpu::TextureFormat::R8Snorm,
    }
}

/// The sRGB (or linear) counterpart of `format`, if it has one
///
/// This is the only reinterpretation WebGPU allows through `view_formats`.
pub fn srgb_partner(format: wgpu::TextureFormat) -> Option<wgpu::TextureFormat> {
    let partner = if format.is_srgb() { format.remove_srgb_suffix() } else { format.add_srgb_suffix() };
    (partner != format).then_some(partner)
}

/// Row pitch of a single-row copy, padded to the copy alignment
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Extent of a single-row texture
pub fn row_extent(width: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height: 1,
        depth_or_array_layers: 1,
    }
}

/// Creates a `width` x 1 2D texture with a single mip level
///
/// 1D textures are not exposed at full width on every backend (GL reports a
/// width of one), so texel rows are stored as 2D textures.
pub fn create_row_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
    view_formats: &[wgpu::TextureFormat],
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: row_extent(width),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats,
    })
}

/// Creates a 2D view of a row texture interpreted as `format`
pub fn create_row_view(texture: &wgpu::Texture, label: &str, format: wgpu::TextureFormat) -> wgpu::TextureView {
    texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some(label),
        format: Some(format),
        dimension: Some(wgpu::TextureViewDimension::D2),
        ..Default::default()
    })
}

/// Copy location of mip 0 of a texture
pub fn texture_origin(texture: &wgpu::Texture) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d::ZERO,
        aspect: wgpu::TextureAspect::All,
    }
}

/// Maps `buffer` for reading and blocks until the mapping completes
pub fn map_buffer_blocking(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<(), DeviceError> {
    let (sender, receiver) = futures_intrusive::channel::shared::oneshot_channel();
    buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
        // The receiver only goes away if the wait below already failed
        let _ = sender.send(result);
    });

    device.poll(wgpu::PollType::Wait).map_err(|e| DeviceError::Sync(e.to_string()))?;
    pollster::block_on(receiver.receive())
        .ok_or_else(|| DeviceError::Map("map callback was dropped".to_string()))?
        .map_err(|e| DeviceError::Map(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_srgb_partner() {
        assert_eq!(srgb_partner(wgpu::TextureFormat::Rgba8Unorm), Some(wgpu::TextureFormat::Rgba8UnormSrgb));
        assert_eq!(srgb_partner(wgpu::TextureFormat::Rgba8UnormSrgb), Some(wgpu::TextureFormat::Rgba8Unorm));
        assert_eq!(srgb_partner(wgpu::TextureFormat::Rgba8Snorm), None);
        assert_eq!(srgb_partner(wgpu::TextureFormat::R8Unorm), None);
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(1024), 1024);
        assert_eq!(padded_bytes_per_row(1025), 1280);
    }

    #[test]
    fn test_texture_format_mapping() {
        for format in [
            TexelFormat::Rgba8Unorm,
            TexelFormat::Rgba8Snorm,
            TexelFormat::Rgba8UnormSrgb,
            TexelFormat::Rgba8Uint,
            TexelFormat::R8Unorm,
            TexelFormat::R8Snorm,
        ] {
            let mapped = texture_format(format);
            assert_eq!(mapped.block_copy_size(None), Some(format.bytes_per_texel() as u32));
        }
    }
}
