//! Shared helpers for GPU integration tests
//!
//! Tests skip when no adapter is available, unless `TEXEL_ALIAS_REQUIRE_GPU=1`
//! is set.

use texel_alias_verification::{WgpuDevice, WgpuDeviceOptions};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn device(options: WgpuDeviceOptions) -> Option<WgpuDevice> {
    init_tracing();
    match pollster::block_on(WgpuDevice::new(options)) {
        Ok(device) => Some(device),
        Err(err) => {
            if std::env::var("TEXEL_ALIAS_REQUIRE_GPU").is_ok_and(|value| value == "1") {
                panic!("GPU required but unavailable: {err}");
            }
            eprintln!("skipping: {err}");
            None
        }
    }
}
