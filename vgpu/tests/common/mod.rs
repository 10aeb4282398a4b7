#![allow(dead_code)]

use vgpu::null::{self, NullConfig};
use vgpu::{Buffer, BufferDesc, BufferUsage, Device};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn device() -> Device<null::Api> {
    init_logger();
    Device::with_null(NullConfig::default()).unwrap()
}

pub fn manual_device() -> Device<null::Api> {
    init_logger();
    Device::with_null(NullConfig::manual()).unwrap()
}

pub fn buffer(device: &Device<null::Api>, size: u64, initial: Option<&[u8]>) -> Buffer<null::Api> {
    device
        .create_buffer(
            &BufferDesc {
                size,
                usage: BufferUsage::SHADER_READ,
                ..Default::default()
            },
            initial,
        )
        .unwrap()
}
