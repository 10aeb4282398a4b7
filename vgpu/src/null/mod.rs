//! Headless backend.
//!
//! Implements every hal trait on plain memory: buffers and textures are byte vectors,
//! descriptor heaps are vectors of decoded [`DescriptorRecord`]s, command lists record
//! owned [`Command`]s and the three queues feed a single software timeline that executes
//! copies and honors fence signal/wait ordering. Every native destruction is logged so
//! tests can observe exactly when the runtime releases objects.

mod heap;
mod list;
mod timeline;

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::backend::Backend;
use crate::error::HalError;
use crate::hal::{self, DescriptorHeapKind, HalResult, MemoryKind, OpenDevice, RootParameter, SubresourceFootprint};
use crate::types::{
    AdapterInfo, AdapterType, DeviceAddress, Features, Limits, NativeObjectType, PipelineType, QueryHeapDesc,
    QueueType, ResourceId, ResourceState, SamplerDesc, SwapChainDesc, TextureDesc, TextureDimension,
    TextureFormat, TextureUsage,
};

pub use heap::DescriptorHeap;
pub use list::{BarrierRecord, BufferRef, Command, CommandAllocator, CommandList, TargetRecord, TextureRef};
pub use timeline::{Fence, GpuEvent, Queue};

use timeline::Timeline;

/// Kind tag used in the destroy log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Buffer,
    Texture,
    Sampler,
    PipelineLayout,
    Pipeline,
    QueryHeap,
    DescriptorHeap,
}

#[derive(Debug, Clone)]
pub struct NullConfig {
    /// Execute queued GPU work immediately. When false, work only runs on
    /// [`Device::advance`] or when the CPU waits on a fence.
    pub auto_complete: bool,
    pub adapters: Vec<AdapterInfo>,
    pub timestamp_frequency: u64,
}

impl Default for NullConfig {
    fn default() -> Self {
        Self {
            auto_complete: true,
            adapters: vec![default_adapter()],
            timestamp_frequency: 1_000_000_000,
        }
    }
}

impl NullConfig {
    pub fn manual() -> Self {
        Self {
            auto_complete: false,
            ..Self::default()
        }
    }
}

fn default_adapter() -> AdapterInfo {
    AdapterInfo {
        vendor_id: 0,
        device_id: 0,
        name: "vgpu null adapter".into(),
        driver_description: "headless software timeline".into(),
        adapter_type: AdapterType::Cpu,
        features: Features::all() - Features::RAY_TRACING - Features::RAY_TRACING_TIER2,
        limits: Limits::default(),
    }
}

/// The headless API.
#[derive(Debug, Clone, Copy)]
pub enum Api {}

impl hal::Api for Api {
    const BACKEND: Backend = Backend::Null;

    type Instance = Instance;
    type Adapter = Adapter;
    type Device = Device;
    type Queue = Queue;

    type CommandAllocator = CommandAllocator;
    type CommandList = CommandList;
    type Fence = Fence;

    type Buffer = Buffer;
    type Texture = Texture;
    type Sampler = Sampler;
    type PipelineLayout = PipelineLayout;
    type Pipeline = Pipeline;
    type QueryHeap = QueryHeap;
    type DescriptorHeap = DescriptorHeap;

    type Surface = Surface;
    type SwapChain = SwapChain;

    fn is_supported() -> bool {
        true
    }
}

/// State shared by every object created from one null device.
pub(crate) struct Shared {
    config: NullConfig,
    info: AdapterInfo,
    next_id: AtomicU64,
    destroyed: Mutex<Vec<(ObjectKind, ResourceId)>>,
    device_lost: AtomicBool,
    label: Mutex<String>,
    pub(crate) timeline: Mutex<Timeline>,
}

impl std::fmt::Debug for Shared {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shared").field("adapter", &self.info.name).finish_non_exhaustive()
    }
}

impl Shared {
    fn new(config: NullConfig, info: AdapterInfo) -> Arc<Self> {
        Arc::new(Self {
            config,
            info,
            next_id: AtomicU64::new(1),
            destroyed: Mutex::new(Vec::new()),
            device_lost: AtomicBool::new(false),
            label: Mutex::new(String::new()),
            timeline: Mutex::new(Timeline::default()),
        })
    }

    pub(crate) fn next_id(&self) -> ResourceId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn record_destroy(&self, kind: ObjectKind, id: ResourceId) {
        self.destroyed.lock().push((kind, id));
    }

    pub(crate) fn auto_complete(&self) -> bool {
        self.config.auto_complete
    }

    fn check_lost(&self) -> HalResult<()> {
        if self.device_lost.load(Ordering::Acquire) {
            Err(HalError::DeviceLost("null device removed".into()))
        } else {
            Ok(())
        }
    }
}

macro_rules! native_resource {
    ($ty:ident, $kind:expr) => {
        impl hal::NativeResource for $ty {
            fn id(&self) -> ResourceId {
                self.id
            }

            fn set_label(&self, label: &str) {
                *self.label.lock() = label.to_string();
            }
        }

        impl Drop for $ty {
            fn drop(&mut self) {
                self.shared.record_destroy($kind, self.id);
            }
        }

        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    .field("id", &self.id)
                    .field("label", &*self.label.lock())
                    .finish_non_exhaustive()
            }
        }

        impl $ty {
            pub fn label(&self) -> String {
                self.label.lock().clone()
            }
        }
    };
}

/// Byte storage behind a buffer, shared with recorded commands.
#[derive(Debug)]
pub(crate) struct BufferStore {
    pub(crate) id: ResourceId,
    pub(crate) data: Mutex<Vec<u8>>,
}

pub struct Buffer {
    id: ResourceId,
    shared: Arc<Shared>,
    label: Mutex<String>,
    memory: MemoryKind,
    address: DeviceAddress,
    pub(crate) store: Arc<BufferStore>,
}
native_resource!(Buffer, ObjectKind::Buffer);

impl Buffer {
    pub fn size(&self) -> u64 {
        self.store.data.lock().len() as u64
    }

    pub fn memory(&self) -> MemoryKind {
        self.memory
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }
}

/// Tightly packed subresource bytes behind a texture.
#[derive(Debug)]
pub(crate) struct TextureStore {
    pub(crate) id: ResourceId,
    pub(crate) subresources: Mutex<Vec<Vec<u8>>>,
    pub(crate) footprints: Vec<SubresourceFootprint>,
}

pub struct Texture {
    id: ResourceId,
    shared: Arc<Shared>,
    label: Mutex<String>,
    desc: TextureDesc,
    initial_state: ResourceState,
    pub(crate) store: Arc<TextureStore>,
}
native_resource!(Texture, ObjectKind::Texture);

impl Texture {
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn initial_state(&self) -> ResourceState {
        self.initial_state
    }
}

pub struct Sampler {
    id: ResourceId,
    shared: Arc<Shared>,
    label: Mutex<String>,
    pub desc: SamplerDesc,
}
native_resource!(Sampler, ObjectKind::Sampler);

pub struct PipelineLayout {
    id: ResourceId,
    shared: Arc<Shared>,
    label: Mutex<String>,
    pub parameters: Vec<RootParameter>,
}
native_resource!(PipelineLayout, ObjectKind::PipelineLayout);

pub struct Pipeline {
    id: ResourceId,
    shared: Arc<Shared>,
    label: Mutex<String>,
    pub pipeline_type: PipelineType,
}
native_resource!(Pipeline, ObjectKind::Pipeline);

pub struct QueryHeap {
    id: ResourceId,
    shared: Arc<Shared>,
    label: Mutex<String>,
    pub desc: QueryHeapDesc,
}
native_resource!(QueryHeap, ObjectKind::QueryHeap);

/// A fake presentation target with a size tests can change.
#[derive(Debug, Clone)]
pub struct Surface {
    id: ResourceId,
    size: Arc<Mutex<(u32, u32)>>,
    presentable: bool,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self {
            id: NEXT.fetch_add(1, Ordering::Relaxed),
            size: Arc::new(Mutex::new((width, height))),
            presentable: true,
        }
    }

    /// A surface no queue can present to.
    pub fn unpresentable(width: u32, height: u32) -> Self {
        Self {
            presentable: false,
            ..Self::new(width, height)
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        *self.size.lock()
    }

    /// Simulate a window resize (0x0 means minimized).
    pub fn set_size(&self, width: u32, height: u32) {
        *self.size.lock() = (width, height);
    }
}

#[derive(Debug)]
pub struct SwapChain {
    id: ResourceId,
    shared: Arc<Shared>,
    desc: SwapChainDesc,
    width: u32,
    height: u32,
    buffers: Vec<Arc<TextureStore>>,
    current: AtomicU32,
    presents: AtomicU64,
}

impl SwapChain {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffers.len() as u32
    }

    pub fn present_count(&self) -> u64 {
        self.presents.load(Ordering::Acquire)
    }
}

impl hal::SwapChain<Api> for SwapChain {
    fn current_backbuffer_index(&self) -> u32 {
        self.current.load(Ordering::Acquire)
    }

    fn present(&self, sync_interval: u32) -> HalResult<()> {
        self.shared.check_lost()?;
        let count = self.buffers.len().max(1) as u32;
        let index = self.current.load(Ordering::Acquire);
        self.current.store((index + 1) % count, Ordering::Release);
        self.presents.fetch_add(1, Ordering::AcqRel);
        timeline::enqueue_present(&self.shared, self.id, index, sync_interval);
        Ok(())
    }
}

pub struct Instance {
    config: NullConfig,
}

impl Instance {
    pub fn with_config(config: NullConfig) -> Self {
        Self { config }
    }
}

impl hal::Instance<Api> for Instance {
    fn init(_desc: &hal::InstanceDesc) -> HalResult<Self> {
        Ok(Self::with_config(NullConfig::default()))
    }

    fn enumerate_adapters(&self) -> Vec<Adapter> {
        self.config
            .adapters
            .iter()
            .map(|info| Adapter {
                info: info.clone(),
                config: self.config.clone(),
            })
            .collect()
    }

    fn create_surface(&self, _display: RawDisplayHandle, _window: RawWindowHandle) -> HalResult<Surface> {
        Ok(Surface::new(0, 0))
    }
}

pub struct Adapter {
    info: AdapterInfo,
    config: NullConfig,
}

impl hal::Adapter<Api> for Adapter {
    fn info(&self) -> AdapterInfo {
        self.info.clone()
    }

    fn open(&self, features: Features) -> HalResult<OpenDevice<Api>> {
        if !self.info.features.contains(features) {
            return Err(HalError::Unsupported(format!(
                "null adapter lacks {:?}",
                features - self.info.features
            )));
        }
        Ok(Device::open(self.config.clone(), self.info.clone()))
    }
}

pub struct Device {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NullDevice").field("adapter", &self.shared.info.name).finish()
    }
}

impl Device {
    fn open(config: NullConfig, info: AdapterInfo) -> OpenDevice<Api> {
        let shared = Shared::new(config, info);
        let queues = QueueType::ALL.map(|kind| Queue::new(kind, shared.clone()));
        OpenDevice {
            device: Device { shared },
            queues,
        }
    }

    /// A standalone device with the default configuration, for unit tests.
    pub fn headless() -> Self {
        Self::open(NullConfig::default(), default_adapter()).device
    }

    /// Run all queued GPU work that is not blocked on an unsignaled fence.
    pub fn advance(&self) {
        timeline::pump(&self.shared);
    }

    /// Number of queued, not yet executed queue operations.
    pub fn pending_operations(&self) -> usize {
        self.shared.timeline.lock().pending()
    }

    pub fn events(&self) -> Vec<GpuEvent> {
        self.shared.timeline.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.shared.timeline.lock().events.clear();
    }

    pub fn destroyed(&self) -> Vec<(ObjectKind, ResourceId)> {
        self.shared.destroyed.lock().clone()
    }

    pub fn destroy_count(&self, kind: ObjectKind, id: ResourceId) -> usize {
        self.shared
            .destroyed
            .lock()
            .iter()
            .filter(|(k, i)| *k == kind && *i == id)
            .count()
    }

    pub fn was_destroyed(&self, kind: ObjectKind, id: ResourceId) -> bool {
        self.destroy_count(kind, id) > 0
    }

    /// Make every later present and resize fail with device loss.
    pub fn simulate_device_lost(&self) {
        self.shared.device_lost.store(true, Ordering::Release);
    }

    pub fn label(&self) -> String {
        self.shared.label.lock().clone()
    }

    pub fn buffer_contents(&self, buffer: &Buffer) -> Vec<u8> {
        buffer.store.data.lock().clone()
    }

    pub fn texture_contents(&self, texture: &Texture, subresource: u32) -> Vec<u8> {
        texture
            .store
            .subresources
            .lock()
            .get(subresource as usize)
            .cloned()
            .unwrap_or_default()
    }

    fn new_texture_store(&self, id: ResourceId, desc: &TextureDesc) -> Arc<TextureStore> {
        let (layout, _) = footprints(desc);
        let subresources = layout
            .iter()
            .map(|f| vec![0u8; (f.row_size * f.num_rows as u64 * f.depth as u64) as usize])
            .collect();
        Arc::new(TextureStore {
            id,
            subresources: Mutex::new(subresources),
            footprints: layout,
        })
    }
}

/// (bytes per block, block width) for the null backend's staging layout.
fn block_layout(format: TextureFormat) -> (u64, u32) {
    use TextureFormat::*;
    match format {
        R8Unorm | R8Snorm | R8Uint | R8Sint | Stencil8 => (1, 1),
        R16Unorm | R16Snorm | R16Uint | R16Sint | R16Float | Rg8Unorm | Rg8Snorm | Rg8Uint | Rg8Sint
        | Bgra4Unorm | B5g6r5Unorm | B5g5r5a1Unorm | Depth16Unorm => (2, 1),
        Rg32Uint | Rg32Sint | Rg32Float | Rgba16Unorm | Rgba16Snorm | Rgba16Uint | Rgba16Sint
        | Rgba16Float | Depth32FloatStencil8 => (8, 1),
        Rgba32Uint | Rgba32Sint | Rgba32Float => (16, 1),
        Bc1RgbaUnorm | Bc1RgbaUnormSrgb | Bc4RUnorm | Bc4RSnorm => (8, 4),
        Bc2RgbaUnorm | Bc2RgbaUnormSrgb | Bc3RgbaUnorm | Bc3RgbaUnormSrgb | Bc5RgUnorm | Bc5RgSnorm
        | Bc6hRgbUfloat | Bc6hRgbSfloat | Bc7RgbaUnorm | Bc7RgbaUnormSrgb => (16, 4),
        _ => (4, 1),
    }
}

const ROW_PITCH_ALIGNMENT: u64 = 256;
const PLACEMENT_ALIGNMENT: u64 = 512;

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

fn footprints(desc: &TextureDesc) -> (Vec<SubresourceFootprint>, u64) {
    let (bytes, block) = block_layout(desc.format);
    let layers = match desc.dimension {
        TextureDimension::D3 => 1,
        _ => desc.depth_or_array_layers.max(1),
    };
    let mut out = Vec::new();
    let mut offset = 0u64;
    for _layer in 0..layers {
        for mip in 0..desc.mip_level_count.max(1) {
            let width = (desc.width >> mip).max(1);
            let height = match desc.dimension {
                TextureDimension::D1 => 1,
                _ => (desc.height >> mip).max(1),
            };
            let depth = match desc.dimension {
                TextureDimension::D3 => (desc.depth_or_array_layers >> mip).max(1),
                _ => 1,
            };
            let row_size = width.div_ceil(block) as u64 * bytes;
            let num_rows = height.div_ceil(block);
            let row_pitch = align_up(row_size, ROW_PITCH_ALIGNMENT);
            offset = align_up(offset, PLACEMENT_ALIGNMENT);
            out.push(SubresourceFootprint {
                offset,
                row_pitch: row_pitch as u32,
                num_rows,
                row_size,
                depth,
            });
            offset += row_pitch * num_rows as u64 * depth as u64;
        }
    }
    (out, offset)
}

impl hal::Device<Api> for Device {
    fn set_label(&self, label: &str) {
        *self.shared.label.lock() = label.to_string();
    }

    fn features(&self) -> Features {
        self.shared.info.features
    }

    fn limits(&self) -> Limits {
        self.shared.info.limits
    }

    fn timestamp_frequency(&self) -> u64 {
        self.shared.config.timestamp_frequency
    }

    fn native_object(&self, object: NativeObjectType) -> Option<NonNull<c_void>> {
        match object {
            NativeObjectType::NullDevice => Some(NonNull::from(self).cast()),
            _ => None,
        }
    }

    fn create_buffer(&self, desc: &hal::BufferDesc<'_>) -> HalResult<Buffer> {
        if desc.size > (1 << 32) {
            return Err(HalError::OutOfMemory);
        }
        let id = self.shared.next_id();
        Ok(Buffer {
            id,
            shared: self.shared.clone(),
            label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            memory: desc.memory,
            // Every buffer gets its own 4 GiB window of fake address space.
            address: id << 32,
            store: Arc::new(BufferStore {
                id,
                data: Mutex::new(vec![0u8; desc.size as usize]),
            }),
        })
    }

    fn buffer_device_address(&self, buffer: &Buffer) -> DeviceAddress {
        buffer.address
    }

    fn write_mapped(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> HalResult<()> {
        if buffer.memory != MemoryKind::Upload {
            return Err(HalError::Other("buffer is not CPU-writable".into()));
        }
        let mut bytes = buffer.store.data.lock();
        let start = offset as usize;
        let end = start + data.len();
        if end > bytes.len() {
            return Err(HalError::Other(format!("mapped write {}..{} out of range", start, end)));
        }
        bytes[start..end].copy_from_slice(data);
        Ok(())
    }

    fn read_mapped(&self, buffer: &Buffer, offset: u64, out: &mut [u8]) -> HalResult<()> {
        if buffer.memory == MemoryKind::Default {
            return Err(HalError::Other("buffer is not CPU-readable".into()));
        }
        let bytes = buffer.store.data.lock();
        let start = offset as usize;
        let end = start + out.len();
        if end > bytes.len() {
            return Err(HalError::Other(format!("mapped read {}..{} out of range", start, end)));
        }
        out.copy_from_slice(&bytes[start..end]);
        Ok(())
    }

    fn create_texture(&self, desc: &TextureDesc, initial_state: ResourceState) -> HalResult<Texture> {
        if desc.width == 0 || desc.height == 0 || desc.format == TextureFormat::Undefined {
            return Err(HalError::Other(format!("invalid texture {:?}", desc)));
        }
        let id = self.shared.next_id();
        Ok(Texture {
            id,
            shared: self.shared.clone(),
            label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            desc: desc.clone(),
            initial_state,
            store: self.new_texture_store(id, desc),
        })
    }

    fn copyable_footprints(&self, texture: &Texture) -> (Vec<SubresourceFootprint>, u64) {
        footprints(&texture.desc)
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> HalResult<Sampler> {
        Ok(Sampler {
            id: self.shared.next_id(),
            shared: self.shared.clone(),
            label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            desc: *desc,
        })
    }

    fn create_descriptor_heap(
        &self,
        kind: DescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
    ) -> HalResult<DescriptorHeap> {
        Ok(DescriptorHeap::new(self.shared.clone(), kind, capacity, shader_visible))
    }

    fn write_descriptor(&self, heap: &DescriptorHeap, index: u32, descriptor: &hal::Descriptor<'_, Api>) {
        heap.write(index, heap::record_of(descriptor));
    }

    fn copy_descriptors(&self, dst: &DescriptorHeap, dst_index: u32, src: &DescriptorHeap, src_index: u32, count: u32) {
        dst.copy_from(dst_index, src, src_index, count);
    }

    fn read_descriptor(&self, heap: &DescriptorHeap, index: u32) -> Option<hal::DescriptorRecord> {
        heap.read(index)
    }

    fn create_pipeline_layout(&self, desc: &hal::PipelineLayoutDesc<'_>) -> HalResult<PipelineLayout> {
        Ok(PipelineLayout {
            id: self.shared.next_id(),
            shared: self.shared.clone(),
            label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            parameters: desc.parameters.to_vec(),
        })
    }

    fn create_render_pipeline(&self, desc: &hal::RenderPipelineDesc<'_, Api>) -> HalResult<Pipeline> {
        if desc.shader_stages.is_empty() {
            return Err(HalError::Other("render pipeline without shader stages".into()));
        }
        Ok(Pipeline {
            id: self.shared.next_id(),
            shared: self.shared.clone(),
            label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            pipeline_type: PipelineType::Render,
        })
    }

    fn create_compute_pipeline(&self, desc: &hal::ComputePipelineDesc<'_, Api>) -> HalResult<Pipeline> {
        Ok(Pipeline {
            id: self.shared.next_id(),
            shared: self.shared.clone(),
            label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            pipeline_type: PipelineType::Compute,
        })
    }

    fn create_query_heap(&self, desc: &QueryHeapDesc) -> HalResult<QueryHeap> {
        if desc.count == 0 {
            return Err(HalError::Other("query heap with zero queries".into()));
        }
        Ok(QueryHeap {
            id: self.shared.next_id(),
            shared: self.shared.clone(),
            label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            desc: *desc,
        })
    }

    fn create_command_allocator(&self, queue: QueueType) -> HalResult<CommandAllocator> {
        Ok(CommandAllocator::new(self.shared.next_id(), queue))
    }

    fn create_command_list(&self, queue: QueueType, allocator: &CommandAllocator) -> HalResult<CommandList> {
        Ok(CommandList::new(self.shared.next_id(), queue, allocator))
    }

    fn reset_command_allocator(&self, allocator: &CommandAllocator) {
        allocator.reset();
    }

    fn create_fence(&self, initial_value: u64) -> HalResult<Fence> {
        Ok(Fence::new(self.shared.next_id(), initial_value))
    }

    fn fence_completed_value(&self, fence: &Fence) -> u64 {
        fence.value()
    }

    fn signal_fence(&self, fence: &Fence, value: u64) {
        fence.set(value);
        if self.shared.auto_complete() {
            timeline::pump(&self.shared);
        }
    }

    fn wait_fence(&self, fence: &Fence, value: u64) -> HalResult<()> {
        if fence.value() >= value {
            return Ok(());
        }
        timeline::pump(&self.shared);
        if fence.value() >= value {
            Ok(())
        } else {
            Err(HalError::Other(format!(
                "fence {} can never reach {} (stuck at {})",
                fence.id(),
                value,
                fence.value()
            )))
        }
    }

    fn surface_size(&self, surface: &Surface) -> (u32, u32) {
        surface.size()
    }

    fn surface_supported(&self, queue: &Queue, surface: &Surface) -> bool {
        queue.kind() == QueueType::Graphics && surface.presentable
    }

    fn create_swapchain(
        &self,
        _queue: &Queue,
        surface: &Surface,
        desc: &SwapChainDesc,
        buffer_count: u32,
    ) -> HalResult<SwapChain> {
        self.shared.check_lost()?;
        let (mut width, mut height) = surface.size();
        if width == 0 || height == 0 {
            width = desc.width.max(1);
            height = desc.height.max(1);
        }
        let texture_desc = backbuffer_desc(desc, width, height);
        let buffers = (0..buffer_count)
            .map(|_| self.new_texture_store(self.shared.next_id(), &texture_desc))
            .collect();
        Ok(SwapChain {
            id: self.shared.next_id(),
            shared: self.shared.clone(),
            desc: *desc,
            width,
            height,
            buffers,
            current: AtomicU32::new(0),
            presents: AtomicU64::new(0),
        })
    }

    fn resize_swapchain(&self, swapchain: &mut SwapChain, width: u32, height: u32) -> HalResult<()> {
        self.shared.check_lost()?;
        swapchain.width = width;
        swapchain.height = height;
        let count = swapchain.buffers.len();
        let desc = backbuffer_desc(&swapchain.desc, width, height);
        swapchain.buffers = (0..count)
            .map(|_| self.new_texture_store(self.shared.next_id(), &desc))
            .collect();
        swapchain.current.store(0, Ordering::Release);
        Ok(())
    }

    fn swapchain_buffers(&self, swapchain: &SwapChain) -> HalResult<Vec<Texture>> {
        let desc = backbuffer_desc(&swapchain.desc, swapchain.width, swapchain.height);
        Ok(swapchain
            .buffers
            .iter()
            .map(|store| Texture {
                id: store.id,
                shared: self.shared.clone(),
                label: Mutex::new(String::new()),
                desc: desc.clone(),
                initial_state: ResourceState::PRESENT,
                store: store.clone(),
            })
            .collect())
    }
}

fn backbuffer_desc(desc: &SwapChainDesc, width: u32, height: u32) -> TextureDesc {
    TextureDesc {
        label: desc.label,
        dimension: TextureDimension::D2,
        format: desc.format,
        usage: TextureUsage::SHADER_READ | TextureUsage::RENDER_TARGET,
        width,
        height,
        ..Default::default()
    }
}
