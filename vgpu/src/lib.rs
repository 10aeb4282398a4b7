//! vgpu: a backend-agnostic GPU device runtime.
//!
//! A [`Device`] owns descriptor heaps, command pools, upload contexts and a frame-paced
//! deletion queue on top of a native [`hal::Api`]. Resources are reference-counted handles;
//! dropping the last reference hands the native object to the deletion queue, which
//! destroys it once the GPU can no longer be using it.
//!
//! The crate ships the [`null`] backend, a headless software timeline that records every
//! command and destruction for inspection.

pub mod logging;

pub mod backend;
pub mod binding;
pub mod command;
pub mod config;
pub mod deletion;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod hal;
pub mod null;
pub mod resource;
pub mod swapchain;
pub mod types;
pub mod upload;

pub use backend::{is_backend_supported, select_adapter, select_backend, Backend};
pub use binding::{
    BindGroup, BindGroupDesc, BindGroupEntry, BindGroupLayout, BindGroupLayoutDesc, BindingResource, LayoutRange,
    PipelineLayout, PipelineLayoutDesc,
};
pub use command::{CommandBuffer, RenderPassColorAttachment, RenderPassDepthStencilAttachment, RenderPassDesc};
pub use config::{DeviceDesc, PowerPreference, ValidationMode};
pub use device::{create_device, AnyDevice, Device};
pub use error::{Error, HalError, Result};
pub use logging::{clear_log_callback, log_level, set_log_callback, set_log_level, LogLevel};
pub use resource::{Buffer, ComputePipelineDesc, Pipeline, QueryHeap, RenderPipelineDesc, Sampler, Texture};
pub use swapchain::SwapChain;
pub use types::*;

/// Frames the CPU may record ahead of the GPU.
pub const MAX_INFLIGHT_FRAMES: usize = 2;
pub const MAX_COLOR_ATTACHMENTS: usize = 8;
pub const MAX_BIND_GROUPS: usize = 8;
pub const MAX_VERTEX_ATTRIBUTES: usize = 16;
pub const MAX_VERTEX_BUFFERS: usize = 16;
/// Pending transitions are flushed once this many accumulate.
pub const MAX_BARRIERS: usize = 16;

/// Size meaning "from the offset to the end of the buffer".
pub const WHOLE_SIZE: u64 = u64::MAX;
pub const CONSTANT_BUFFER_ALIGNMENT: u64 = 256;

pub const RTV_HEAP_SIZE: u32 = 1024;
pub const DSV_HEAP_SIZE: u32 = 256;
pub const CBV_SRV_UAV_HEAP_SIZE: u32 = 1_000_000;
pub const SAMPLER_HEAP_SIZE: u32 = 2048;

pub fn is_depth_format(format: TextureFormat) -> bool {
    format.is_depth()
}

pub fn is_stencil_format(format: TextureFormat) -> bool {
    format.is_stencil()
}

/// True for any format that needs a depth-stencil view.
pub fn is_depth_stencil_format(format: TextureFormat) -> bool {
    format.is_depth_stencil()
}
