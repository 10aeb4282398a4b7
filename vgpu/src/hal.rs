//! Native backend capability.
//!
//! Everything the runtime needs from a graphics API goes through these traits. A backend
//! implements [`Api`] once, picking concrete native types for every associated type; the
//! runtime is generic over it and never branches on the backend itself. Native objects
//! release their handles in `Drop`, so "destroying" a native object is dropping it.

use std::ffi::c_void;
use std::fmt::Debug;
use std::ptr::NonNull;

use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::backend::Backend;
use crate::config::ValidationMode;
use crate::error::HalError;
use crate::types::{
    AdapterInfo, Color, CpuAccessMode, DeviceAddress, Features, IndexType, Limits, LoadAction,
    NativeObjectType, PrimitiveTopology, QueryHeapDesc, QueueType, Rect, ResourceId, ResourceState,
    SamplerDesc, ShaderStageDesc, ShaderStages, StoreAction, SwapChainDesc, TextureDesc, TextureFormat,
    VertexBufferLayout, Viewport, BlendState, DepthStencilState, RasterizerState,
};

pub type HalResult<T> = Result<T, HalError>;

/// One native graphics API.
pub trait Api: Sized + Send + Sync + 'static {
    const BACKEND: Backend;

    type Instance: Instance<Self>;
    type Adapter: Adapter<Self>;
    type Device: Device<Self>;
    type Queue: Queue<Self>;

    type CommandAllocator: Send + Sync + Debug;
    type CommandList: CommandList<Self>;
    type Fence: Send + Sync + Debug;

    type Buffer: NativeResource;
    type Texture: NativeResource;
    type Sampler: NativeResource;
    type PipelineLayout: NativeResource;
    type Pipeline: NativeResource;
    type QueryHeap: NativeResource;
    type DescriptorHeap: Send + Sync + Debug;

    type Surface: Send + Sync + Debug;
    type SwapChain: SwapChain<Self>;

    /// Whether the native API can be loaded in this process. May be expensive; callers
    /// go through the cached `backend::is_backend_supported`.
    fn is_supported() -> bool;
}

/// A labelled native object with a stable identity.
pub trait NativeResource: Send + Sync + Debug {
    fn id(&self) -> ResourceId;
    fn set_label(&self, label: &str);
}

#[derive(Debug, Clone, Default)]
pub struct InstanceDesc {
    pub label: Option<&'static str>,
    pub validation: ValidationMode,
}

pub trait Instance<A: Api>: Sized + Send + Sync {
    fn init(desc: &InstanceDesc) -> HalResult<Self>;
    fn enumerate_adapters(&self) -> Vec<A::Adapter>;
    fn create_surface(
        &self,
        display: RawDisplayHandle,
        window: RawWindowHandle,
    ) -> HalResult<A::Surface>;
}

/// Device plus one queue per [`QueueType`], indexed by `QueueType::index`.
pub struct OpenDevice<A: Api> {
    pub device: A::Device,
    pub queues: [A::Queue; QueueType::COUNT],
}

pub trait Adapter<A: Api>: Send + Sync {
    fn info(&self) -> AdapterInfo;
    fn open(&self, features: Features) -> HalResult<OpenDevice<A>>;
}

/// Where a buffer's memory lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryKind {
    #[default]
    Default,
    /// CPU-writable, persistently mapped.
    Upload,
    /// CPU-readable, persistently mapped.
    Readback,
}

impl From<CpuAccessMode> for MemoryKind {
    fn from(mode: CpuAccessMode) -> Self {
        match mode {
            CpuAccessMode::None => MemoryKind::Default,
            CpuAccessMode::Write => MemoryKind::Upload,
            CpuAccessMode::Read => MemoryKind::Readback,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BufferDesc<'a> {
    pub label: Option<&'a str>,
    pub size: u64,
    pub memory: MemoryKind,
    pub allow_unordered_access: bool,
    pub initial_state: ResourceState,
}

/// Placement of one texture subresource inside a linear staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubresourceFootprint {
    pub offset: u64,
    pub row_pitch: u32,
    pub num_rows: u32,
    pub row_size: u64,
    pub depth: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescriptorHeapKind {
    CbvSrvUav,
    Sampler,
    Rtv,
    Dsv,
}

impl DescriptorHeapKind {
    /// Kinds that get a shader-visible mirror.
    pub fn has_shader_visible(self) -> bool {
        matches!(self, DescriptorHeapKind::CbvSrvUav | DescriptorHeapKind::Sampler)
    }
}

/// Which kind of view a null descriptor stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ConstantBuffer,
    ShaderResource,
    UnorderedAccess,
    Sampler,
    RenderTarget,
    DepthStencil,
}

/// A view to write into a descriptor slot.
pub enum Descriptor<'a, A: Api> {
    Null(ViewKind),
    ConstantBuffer { buffer: &'a A::Buffer, offset: u64, size: u64 },
    BufferShaderResource { buffer: &'a A::Buffer, offset: u64, size: u64 },
    BufferUnorderedAccess { buffer: &'a A::Buffer, offset: u64, size: u64 },
    TextureShaderResource { texture: &'a A::Texture },
    TextureUnorderedAccess { texture: &'a A::Texture, mip_level: u32 },
    Sampler(&'a SamplerDesc),
    RenderTarget { texture: &'a A::Texture, mip_level: u32, slice: u32 },
    DepthStencil { texture: &'a A::Texture, mip_level: u32, slice: u32 },
}

/// Decoded contents of a descriptor slot, for backends that can read views back.
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorRecord {
    /// Never written.
    Empty,
    Null(ViewKind),
    ConstantBuffer { address: DeviceAddress, size: u64 },
    BufferShaderResource { address: DeviceAddress, size: u64 },
    BufferUnorderedAccess { address: DeviceAddress, size: u64 },
    TextureShaderResource { texture: ResourceId },
    TextureUnorderedAccess { texture: ResourceId, mip_level: u32 },
    Sampler(SamplerDesc),
    RenderTarget { texture: ResourceId, mip_level: u32, slice: u32 },
    DepthStencil { texture: ResourceId, mip_level: u32, slice: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeKind {
    Cbv,
    Srv,
    Uav,
    Sampler,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorRange {
    pub kind: RangeKind,
    pub base_register: u32,
    pub register_space: u32,
    pub count: u32,
    /// Slot offset from the start of the table.
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootParameter {
    DescriptorTable { ranges: Vec<DescriptorRange>, visibility: ShaderStages },
    Constants { shader_register: u32, register_space: u32, num_values: u32, visibility: ShaderStages },
}

#[derive(Debug, Clone)]
pub struct PipelineLayoutDesc<'a> {
    pub label: Option<&'a str>,
    pub parameters: &'a [RootParameter],
}

pub struct RenderPipelineDesc<'a, A: Api> {
    pub label: Option<&'a str>,
    pub layout: &'a A::PipelineLayout,
    pub shader_stages: &'a [ShaderStageDesc],
    pub vertex_layouts: &'a [VertexBufferLayout],
    pub blend: &'a BlendState,
    pub rasterizer: &'a RasterizerState,
    pub depth_stencil: &'a DepthStencilState,
    pub topology: PrimitiveTopology,
    pub patch_control_points: u32,
    pub color_formats: &'a [TextureFormat],
    pub depth_stencil_format: TextureFormat,
    pub sample_count: u32,
}

pub struct ComputePipelineDesc<'a, A: Api> {
    pub label: Option<&'a str>,
    pub layout: &'a A::PipelineLayout,
    pub shader: &'a ShaderStageDesc,
}

pub enum BarrierResource<'a, A: Api> {
    Buffer(&'a A::Buffer),
    Texture(&'a A::Texture),
}

pub enum Barrier<'a, A: Api> {
    Transition { resource: BarrierResource<'a, A>, before: ResourceState, after: ResourceState },
    /// Orders unordered-access work on a resource without changing its state.
    UnorderedAccess { resource: BarrierResource<'a, A> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferView {
    pub address: DeviceAddress,
    pub size: u32,
    pub stride: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferView {
    pub address: DeviceAddress,
    pub size: u32,
    pub index_type: IndexType,
}

pub struct ColorTarget<'a, A: Api> {
    pub heap: &'a A::DescriptorHeap,
    pub index: u32,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_color: Color,
}

pub struct DepthStencilTarget<'a, A: Api> {
    pub heap: &'a A::DescriptorHeap,
    pub index: u32,
    pub depth_load: LoadAction,
    pub depth_store: StoreAction,
    pub depth_clear: f32,
    pub stencil_load: LoadAction,
    pub stencil_store: StoreAction,
    pub stencil_clear: u32,
}

pub struct RenderPassDesc<'a, A: Api> {
    pub color: &'a [ColorTarget<'a, A>],
    pub depth_stencil: Option<DepthStencilTarget<'a, A>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndirectKind {
    Draw,
    DrawIndexed,
    Dispatch,
    DispatchMesh,
}

pub trait Device<A: Api>: Send + Sync {
    fn set_label(&self, label: &str);
    fn features(&self) -> Features;
    fn limits(&self) -> Limits;
    fn timestamp_frequency(&self) -> u64;
    /// Raw pointer to an underlying API object, for interop.
    fn native_object(&self, object: NativeObjectType) -> Option<NonNull<c_void>>;

    fn create_buffer(&self, desc: &BufferDesc<'_>) -> HalResult<A::Buffer>;
    fn buffer_device_address(&self, buffer: &A::Buffer) -> DeviceAddress;
    /// Copy into a persistently mapped (Upload) buffer.
    fn write_mapped(&self, buffer: &A::Buffer, offset: u64, data: &[u8]) -> HalResult<()>;
    /// Copy out of a persistently mapped (Upload or Readback) buffer.
    fn read_mapped(&self, buffer: &A::Buffer, offset: u64, out: &mut [u8]) -> HalResult<()>;

    fn create_texture(&self, desc: &TextureDesc, initial_state: ResourceState) -> HalResult<A::Texture>;
    /// Staging layout for every subresource plus the total staging size.
    fn copyable_footprints(&self, texture: &A::Texture) -> (Vec<SubresourceFootprint>, u64);

    fn create_sampler(&self, desc: &SamplerDesc) -> HalResult<A::Sampler>;

    fn create_descriptor_heap(
        &self,
        kind: DescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
    ) -> HalResult<A::DescriptorHeap>;
    fn write_descriptor(&self, heap: &A::DescriptorHeap, index: u32, descriptor: &Descriptor<'_, A>);
    fn copy_descriptors(
        &self,
        dst: &A::DescriptorHeap,
        dst_index: u32,
        src: &A::DescriptorHeap,
        src_index: u32,
        count: u32,
    );
    /// Native inspection of a slot; `None` when the backend cannot read views back.
    fn read_descriptor(&self, _heap: &A::DescriptorHeap, _index: u32) -> Option<DescriptorRecord> {
        None
    }

    fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc<'_>) -> HalResult<A::PipelineLayout>;
    fn create_render_pipeline(&self, desc: &RenderPipelineDesc<'_, A>) -> HalResult<A::Pipeline>;
    fn create_compute_pipeline(&self, desc: &ComputePipelineDesc<'_, A>) -> HalResult<A::Pipeline>;
    fn create_ray_tracing_pipeline(&self, layout: &A::PipelineLayout, label: Option<&str>) -> HalResult<A::Pipeline> {
        let _ = (layout, label);
        Err(HalError::Unsupported("ray tracing pipelines".into()))
    }
    fn create_query_heap(&self, desc: &QueryHeapDesc) -> HalResult<A::QueryHeap>;

    fn create_command_allocator(&self, queue: QueueType) -> HalResult<A::CommandAllocator>;
    fn create_command_list(&self, queue: QueueType, allocator: &A::CommandAllocator) -> HalResult<A::CommandList>;
    fn reset_command_allocator(&self, allocator: &A::CommandAllocator);

    fn create_fence(&self, initial_value: u64) -> HalResult<A::Fence>;
    fn fence_completed_value(&self, fence: &A::Fence) -> u64;
    /// Set the fence from the CPU side.
    fn signal_fence(&self, fence: &A::Fence, value: u64);
    /// Block the calling thread until the fence reaches `value`.
    fn wait_fence(&self, fence: &A::Fence, value: u64) -> HalResult<()>;

    fn surface_size(&self, surface: &A::Surface) -> (u32, u32);
    fn surface_supported(&self, queue: &A::Queue, surface: &A::Surface) -> bool;
    fn create_swapchain(
        &self,
        queue: &A::Queue,
        surface: &A::Surface,
        desc: &SwapChainDesc,
        buffer_count: u32,
    ) -> HalResult<A::SwapChain>;
    /// Resize in place, keeping the format. Existing backbuffer textures must be dropped first.
    fn resize_swapchain(&self, swapchain: &mut A::SwapChain, width: u32, height: u32) -> HalResult<()>;
    fn swapchain_buffers(&self, swapchain: &A::SwapChain) -> HalResult<Vec<A::Texture>>;
}

pub trait Queue<A: Api>: Send + Sync {
    fn execute(&self, lists: &[&A::CommandList]);
    /// GPU-side signal after all previously executed work.
    fn signal(&self, fence: &A::Fence, value: u64);
    /// GPU-side wait; later work on this queue starts once the fence reaches `value`.
    fn wait(&self, fence: &A::Fence, value: u64);
}

pub trait SwapChain<A: Api>: Send + Sync + Debug {
    fn current_backbuffer_index(&self) -> u32;
    fn present(&self, sync_interval: u32) -> HalResult<()>;
}

pub trait CommandList<A: Api>: Send + Debug {
    fn reset(&mut self, allocator: &A::CommandAllocator);
    fn close(&mut self);

    fn set_descriptor_heaps(&mut self, resource: &A::DescriptorHeap, sampler: &A::DescriptorHeap);
    fn resource_barriers(&mut self, barriers: &[Barrier<'_, A>]);

    fn set_pipeline(&mut self, pipeline: &A::Pipeline);
    fn set_primitive_topology(&mut self, topology: PrimitiveTopology);
    fn set_graphics_root_signature(&mut self, layout: &A::PipelineLayout);
    fn set_compute_root_signature(&mut self, layout: &A::PipelineLayout);
    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, heap: &A::DescriptorHeap, base: u32);
    fn set_compute_root_descriptor_table(&mut self, root_index: u32, heap: &A::DescriptorHeap, base: u32);
    fn set_graphics_root_constants(&mut self, root_index: u32, values: &[u32]);
    fn set_compute_root_constants(&mut self, root_index: u32, values: &[u32]);

    fn set_viewports(&mut self, viewports: &[Viewport]);
    fn set_scissor_rects(&mut self, rects: &[Rect]);
    fn set_blend_factor(&mut self, factor: [f32; 4]);
    fn set_stencil_reference(&mut self, reference: u32);
    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]);
    fn set_index_buffer(&mut self, view: &IndexBufferView);

    fn begin_render_pass(&mut self, desc: &RenderPassDesc<'_, A>);
    fn end_render_pass(&mut self);

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32);
    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    );
    fn dispatch(&mut self, x: u32, y: u32, z: u32);
    fn dispatch_mesh(&mut self, x: u32, y: u32, z: u32);
    /// Indirect draw/dispatch of up to `max_count` records, optionally bounded by a GPU count.
    fn execute_indirect(
        &mut self,
        kind: IndirectKind,
        buffer: &A::Buffer,
        offset: u64,
        max_count: u32,
        count: Option<(&A::Buffer, u64)>,
    );

    fn copy_buffer_region(&mut self, dst: &A::Buffer, dst_offset: u64, src: &A::Buffer, src_offset: u64, size: u64);
    fn copy_buffer_to_texture(
        &mut self,
        dst: &A::Texture,
        subresource: u32,
        src: &A::Buffer,
        footprint: &SubresourceFootprint,
    );
    fn clear_buffer(&mut self, buffer: &A::Buffer, offset: u64, size: u64);

    fn begin_query(&mut self, heap: &A::QueryHeap, index: u32);
    fn end_query(&mut self, heap: &A::QueryHeap, index: u32);
    fn resolve_query(&mut self, heap: &A::QueryHeap, index: u32, count: u32, dst: &A::Buffer, dst_offset: u64);
    fn reset_query(&mut self, heap: &A::QueryHeap, index: u32, count: u32);

    fn push_debug_group(&mut self, label: &str);
    fn pop_debug_group(&mut self);
    fn insert_debug_marker(&mut self, label: &str);
}
