//! Deterministic texel dataset and its device-side backing store

use crate::device::{GraphicsDevice, ResourceKind};
use crate::error::HarnessError;
use crate::format::TexelFormat;

/// Number of texels in the dataset: one per 8-bit value
pub const TEXEL_COUNT: usize = 256;

/// The raw byte pattern under test
///
/// Texel `i` holds byte `i` in every channel, covering the full 8-bit domain
/// exactly once. The content is fixed at construction and there is no way to
/// modify it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexelStore {
    bytes: Box<[u8]>,
    channels: usize,
}

impl TexelStore {
    /// Generates the dataset with each byte replicated across `channels` channels
    pub fn generate(channels: usize) -> Self {
        let channels = channels.max(1);
        let bytes = (0..TEXEL_COUNT).flat_map(|i| std::iter::repeat_n(i as u8, channels)).collect();
        Self { bytes, channels }
    }

    /// Generates the dataset laid out for a storage format
    pub fn for_format(format: TexelFormat) -> Self {
        Self::generate(format.channels())
    }

    /// Number of texels
    pub fn texel_count(&self) -> usize {
        self.bytes.len() / self.channels
    }

    /// Number of channels each byte is replicated across
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Raw interleaved bytes, as uploaded to the device
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw byte of the first channel of texel `index`
    pub fn raw_byte(&self, index: usize) -> Option<u8> {
        self.bytes.get(index * self.channels).copied()
    }

    /// Iterates over the first-channel byte of every texel, in index order
    pub fn texels(&self) -> impl Iterator<Item = u8> + '_ {
        self.bytes.chunks_exact(self.channels).map(|texel| texel[0])
    }
}

/// A texel store uploaded into a device texture
///
/// Owns both the host copy of the bytes (the validator's source of raw values)
/// and the device texture every view aliases. It is created and written once;
/// no method uploads again, so the bytes are stable for every view's lifetime.
#[derive(Debug)]
pub struct BackingStore<T> {
    host: TexelStore,
    texture: T,
    format: TexelFormat,
}

impl<T> BackingStore<T> {
    /// Generates the dataset for `format` and uploads it into a new single-row texture
    ///
    /// # Errors
    /// Returns `HarnessError::ResourceCreation` if the device rejects the texture
    /// or the upload.
    pub fn create<D>(device: &D, format: TexelFormat) -> Result<Self, HarnessError>
    where
        D: GraphicsDevice<Texture = T>,
    {
        let host = TexelStore::for_format(format);
        let width = host.texel_count() as u32;

        let texture = device
            .create_texture_1d(width, format)
            .map_err(|source| HarnessError::ResourceCreation {
                resource: ResourceKind::Texture,
                source,
            })?;
        device
            .upload_texels(&texture, host.bytes())
            .map_err(|source| HarnessError::ResourceCreation {
                resource: ResourceKind::Texture,
                source,
            })?;

        tracing::debug!(%format, width, channels = host.channels(), "backing store uploaded");

        Ok(Self { host, texture, format })
    }

    /// Host copy of the uploaded bytes
    pub fn host(&self) -> &TexelStore {
        &self.host
    }

    /// Device texture holding the bytes
    pub fn texture(&self) -> &T {
        &self.texture
    }

    /// Storage format the texture was created with
    pub fn format(&self) -> TexelFormat {
        self.format
    }
}
