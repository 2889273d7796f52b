//! Result buffer reuse across passes, driven through the device surface

mod common;

use common::device;
use texel_alias::{BindingSlots, DECODE_KERNEL_WGSL, GraphicsDevice, TEXEL_COUNT, TexelFormat, TexelStore};
use texel_alias_verification::{WgpuDevice, WgpuDeviceOptions};

// Keeps both bindings in the auto layout without ever writing a result
const SILENT_KERNEL_WGSL: &str = r#"
@group(0) @binding(0)
var texels: texture_2d<f32>;

@group(0) @binding(1)
var<storage, read_write> results: array<u32>;

@compute @workgroup_size(1)
fn main() {
    if (arrayLength(&results) == 0u) {
        results[0] = bitcast<u32>(textureLoad(texels, vec2u(0u, 0u), 0).r);
    }
}
"#;

fn read_results(device: &WgpuDevice, buffer: &<WgpuDevice as GraphicsDevice>::Buffer) -> Vec<f32> {
    let values = {
        let mapped = device.map_for_read(buffer).unwrap();
        bytemuck::cast_slice::<u8, f32>(&mapped).to_vec()
    };
    device.unmap(buffer);
    values
}

#[test]
fn test_results_of_a_previous_pass_are_cleared() {
    let Some(device) = device(WgpuDeviceOptions::default()) else { return };
    let slots = BindingSlots::DEFAULT;
    let store = TexelStore::for_format(TexelFormat::Rgba8Unorm);

    let buffer = device.create_buffer((TEXEL_COUNT * size_of::<f32>()) as u64, true).unwrap();
    let texture = device.create_texture_1d(TEXEL_COUNT as u32, TexelFormat::Rgba8Unorm).unwrap();
    device.upload_texels(&texture, store.bytes()).unwrap();
    let view = device.create_view_alias(&texture, TexelFormat::Rgba8Unorm).unwrap();

    let decode = device.compile_compute_program(DECODE_KERNEL_WGSL).program.unwrap();
    let bindings = device.bind_for_dispatch(&decode, &view, slots.view, &buffer, slots.result).unwrap();
    device.dispatch(&decode, &bindings, [1, 1, 1]).unwrap();
    device.memory_barrier().unwrap();
    let decoded = read_results(&device, &buffer);
    assert_eq!(decoded.len(), TEXEL_COUNT);
    assert!((decoded[255] - 1.0).abs() <= 1e-4);
    assert!((decoded[128] - 128.0 / 255.0).abs() <= 1e-4);

    let silent = device.compile_compute_program(SILENT_KERNEL_WGSL);
    let silent = silent.program.unwrap_or_else(|| panic!("silent kernel failed to build: {}", silent.log));
    let bindings = device.bind_for_dispatch(&silent, &view, slots.view, &buffer, slots.result).unwrap();
    device.dispatch(&silent, &bindings, [1, 1, 1]).unwrap();
    device.memory_barrier().unwrap();
    let after = read_results(&device, &buffer);

    assert_eq!(after.len(), TEXEL_COUNT);
    assert!(after.iter().all(|value| value.to_bits() == 0), "stale values survived: {:?}", &after[..8]);
}
