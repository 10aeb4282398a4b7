//! The device: adapter selection, object factories and frame submission.
//!
//! `Device<A>` is a cheap handle over shared state. Every resource keeps its own reference
//! to that state, so objects may outlive the last device handle; once the device is torn
//! down, releasing them destroys their native objects immediately.

use std::ffi::c_void;
use std::ptr::NonNull;
use std::sync::Arc;

use parking_lot::Mutex;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use smallvec::SmallVec;

use crate::backend::{select_adapter, select_backend, Backend};
use crate::binding::{BindGroup, BindGroupDesc, BindGroupLayout, BindGroupLayoutDesc, PipelineLayout, PipelineLayoutDesc};
use crate::command::{CommandBuffer, CommandPool};
use crate::config::DeviceDesc;
use crate::deletion::DeletionQueue;
use crate::descriptor::DescriptorAllocator;
use crate::error::{creation_failed, Error, Result};
use crate::hal::{
    self, Adapter as _, Api, DescriptorHeapKind, DescriptorRecord, Device as _, Instance as _, OpenDevice,
    Queue as _,
};
use crate::logging::{vgpu_error, vgpu_info};
use crate::null;
use crate::resource::{Buffer, ComputePipelineDesc, Pipeline, QueryHeap, RenderPipelineDesc, Sampler, Texture};
use crate::swapchain::SwapChain;
use crate::types::{
    AdapterInfo, BufferDesc, Features, Limits, NativeObjectType, QueryHeapDesc, QueueType, SamplerDesc,
    SwapChainDesc, TextureData, TextureDesc,
};
use crate::upload::UploadContextPool;
use crate::{
    CBV_SRV_UAV_HEAP_SIZE, DSV_HEAP_SIZE, MAX_INFLIGHT_FRAMES, RTV_HEAP_SIZE, SAMPLER_HEAP_SIZE,
};

/// State shared by a device and every object created from it.
///
/// Field order is drop order: deferred objects and descriptor heaps go before the queues,
/// the native device and finally the instance.
pub(crate) struct DeviceShared<A: Api> {
    pub(crate) deletion: DeletionQueue<A>,
    pub(crate) commands: CommandPool<A>,
    pub(crate) upload: UploadContextPool<A>,
    pub(crate) resource_heap: DescriptorAllocator<A>,
    pub(crate) sampler_heap: DescriptorAllocator<A>,
    pub(crate) rtv_heap: DescriptorAllocator<A>,
    pub(crate) dsv_heap: DescriptorAllocator<A>,
    pub(crate) default_sampler: SamplerDesc,

    pub(crate) adapter_info: AdapterInfo,
    pub(crate) features: Features,
    pub(crate) limits: Limits,
    pub(crate) timestamp_frequency: u64,
    pub(crate) label: Mutex<String>,

    /// `[queue][frame_index]`, signaled to 1 when that frame's work on the queue is done.
    frame_fences: Vec<Vec<A::Fence>>,
    /// One per queue, plus the last value signaled on them.
    idle_fences: Vec<A::Fence>,
    idle_value: Mutex<u64>,

    pub(crate) queues: [A::Queue; QueueType::COUNT],
    pub(crate) raw: A::Device,
    instance: A::Instance,
}

impl<A: Api> DeviceShared<A> {
    pub(crate) fn frame_count(&self) -> u64 {
        self.deletion.frame_count()
    }

    pub(crate) fn frame_index(&self) -> usize {
        (self.frame_count() % MAX_INFLIGHT_FRAMES as u64) as usize
    }

    /// Block until every queue has drained, then reclaim what became safe to destroy.
    pub(crate) fn wait_idle(&self) -> Result<()> {
        let mut value = self.idle_value.lock();
        *value += 1;
        for (queue, fence) in self.queues.iter().zip(&self.idle_fences) {
            queue.signal(fence, *value);
        }
        for fence in &self.idle_fences {
            self.raw.wait_fence(fence, *value)?;
        }
        drop(value);
        self.deletion.process();
        Ok(())
    }

    fn allocator(&self, kind: DescriptorHeapKind) -> &DescriptorAllocator<A> {
        match kind {
            DescriptorHeapKind::CbvSrvUav => &self.resource_heap,
            DescriptorHeapKind::Sampler => &self.sampler_heap,
            DescriptorHeapKind::Rtv => &self.rtv_heap,
            DescriptorHeapKind::Dsv => &self.dsv_heap,
        }
    }
}

impl<A: Api> std::fmt::Debug for DeviceShared<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceShared")
            .field("backend", &A::BACKEND)
            .field("adapter", &self.adapter_info.name)
            .field("frame_count", &self.frame_count())
            .field("deletion", &self.deletion)
            .finish_non_exhaustive()
    }
}

struct DeviceInner<A: Api> {
    shared: Arc<DeviceShared<A>>,
}

impl<A: Api> Drop for DeviceInner<A> {
    fn drop(&mut self) {
        let shared = &self.shared;
        if let Err(e) = shared.wait_idle() {
            vgpu_error!("failed to idle the device on teardown: {}", e);
        }
        shared.commands.clear();
        shared.deletion.flush_all();
        shared.deletion.begin_shutdown();
        vgpu_info!("{} device destroyed", A::BACKEND.name());
    }
}

pub struct Device<A: Api> {
    inner: Arc<DeviceInner<A>>,
}

impl<A: Api> Clone for Device<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: Api> Device<A> {
    /// Pick an adapter from `instance` and open it.
    pub fn new(instance: A::Instance, desc: &DeviceDesc) -> Result<Self> {
        let backend = select_backend(desc.preferred_backend)?;
        if backend != A::BACKEND {
            return Err(Error::BackendMismatch {
                requested: backend,
                compiled: A::BACKEND,
            });
        }

        let adapters = instance.enumerate_adapters();
        let infos: Vec<AdapterInfo> = adapters.iter().map(|a| a.info()).collect();
        let index = select_adapter(&infos, desc.required_features, desc.power_preference).ok_or_else(|| {
            vgpu_error!("none of {} adapters has {:?}", infos.len(), desc.required_features);
            Error::NoSuitableAdapter
        })?;
        let adapter_info = infos[index].clone();
        let OpenDevice { device: raw, queues } = adapters[index]
            .open(adapter_info.features)
            .map_err(creation_failed("device"))?;
        vgpu_info!(
            "{} device on {} ({:?})",
            backend.name(),
            adapter_info.name,
            adapter_info.adapter_type
        );
        if let Some(label) = desc.label {
            raw.set_label(label);
        }

        let frame_fences = QueueType::ALL
            .iter()
            .map(|_| {
                (0..MAX_INFLIGHT_FRAMES)
                    .map(|_| raw.create_fence(0))
                    .collect::<hal::HalResult<Vec<_>>>()
            })
            .collect::<hal::HalResult<Vec<_>>>()?;
        let idle_fences = QueueType::ALL
            .iter()
            .map(|_| raw.create_fence(0))
            .collect::<hal::HalResult<Vec<_>>>()?;

        let resource_heap = DescriptorAllocator::new(&raw, DescriptorHeapKind::CbvSrvUav, CBV_SRV_UAV_HEAP_SIZE)?;
        let sampler_heap = DescriptorAllocator::new(&raw, DescriptorHeapKind::Sampler, SAMPLER_HEAP_SIZE)?;
        let rtv_heap = DescriptorAllocator::new(&raw, DescriptorHeapKind::Rtv, RTV_HEAP_SIZE)?;
        let dsv_heap = DescriptorAllocator::new(&raw, DescriptorHeapKind::Dsv, DSV_HEAP_SIZE)?;

        let shared = DeviceShared {
            deletion: DeletionQueue::new(),
            commands: CommandPool::new(),
            upload: UploadContextPool::new(),
            resource_heap,
            sampler_heap,
            rtv_heap,
            dsv_heap,
            default_sampler: SamplerDesc::default(),
            features: raw.features(),
            limits: raw.limits(),
            timestamp_frequency: raw.timestamp_frequency(),
            adapter_info,
            label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            frame_fences,
            idle_fences,
            idle_value: Mutex::new(0),
            queues,
            raw,
            instance,
        };
        Ok(Self {
            inner: Arc::new(DeviceInner {
                shared: Arc::new(shared),
            }),
        })
    }

    pub(crate) fn shared(&self) -> &Arc<DeviceShared<A>> {
        &self.inner.shared
    }

    pub fn backend(&self) -> Backend {
        A::BACKEND
    }

    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.shared().adapter_info
    }

    pub fn features(&self) -> Features {
        self.shared().features
    }

    pub fn query_feature_support(&self, feature: Features) -> bool {
        self.shared().features.contains(feature)
    }

    pub fn limits(&self) -> Limits {
        self.shared().limits
    }

    /// Ticks per second of timestamp queries.
    pub fn timestamp_frequency(&self) -> u64 {
        self.shared().timestamp_frequency
    }

    pub fn native_object(&self, object: NativeObjectType) -> Option<NonNull<c_void>> {
        self.shared().raw.native_object(object)
    }

    /// The backend device.
    pub fn native(&self) -> &A::Device {
        &self.shared().raw
    }

    pub fn queue(&self, queue: QueueType) -> &A::Queue {
        &self.shared().queues[queue.index()]
    }

    /// Frames submitted so far.
    pub fn frame_count(&self) -> u64 {
        self.shared().frame_count()
    }

    /// Slot of the frame being recorded, in `0..MAX_INFLIGHT_FRAMES`.
    pub fn frame_index(&self) -> usize {
        self.shared().frame_index()
    }

    pub fn label(&self) -> String {
        self.shared().label.lock().clone()
    }

    pub fn set_label(&self, label: &str) {
        self.shared().raw.set_label(label);
        *self.shared().label.lock() = label.to_string();
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn create_buffer(&self, desc: &BufferDesc, initial: Option<&[u8]>) -> Result<Buffer<A>> {
        Buffer::create(self.shared(), desc, initial)
    }

    /// `initial` holds one entry per subresource, mip-major within each array slice.
    pub fn create_texture(&self, desc: &TextureDesc, initial: Option<&[TextureData<'_>]>) -> Result<Texture<A>> {
        Texture::create(self.shared(), desc, initial)
    }

    pub fn create_sampler(&self, desc: &SamplerDesc) -> Result<Sampler<A>> {
        Sampler::create(self.shared(), desc)
    }

    pub fn create_bind_group_layout(&self, desc: &BindGroupLayoutDesc<'_>) -> Result<BindGroupLayout> {
        BindGroupLayout::new(desc)
    }

    pub fn create_pipeline_layout(&self, desc: &PipelineLayoutDesc<'_>) -> Result<PipelineLayout<A>> {
        PipelineLayout::create(self.shared(), desc)
    }

    pub fn create_bind_group(&self, layout: &BindGroupLayout, desc: &BindGroupDesc<'_, A>) -> Result<BindGroup<A>> {
        BindGroup::create(self.shared(), layout, desc)
    }

    pub fn create_render_pipeline(&self, desc: &RenderPipelineDesc<'_, A>) -> Result<Pipeline<A>> {
        Pipeline::create_render(self.shared(), desc)
    }

    pub fn create_compute_pipeline(&self, desc: &ComputePipelineDesc<'_, A>) -> Result<Pipeline<A>> {
        Pipeline::create_compute(self.shared(), desc)
    }

    pub fn create_ray_tracing_pipeline(&self, layout: &PipelineLayout<A>, label: Option<&str>) -> Result<Pipeline<A>> {
        Pipeline::create_ray_tracing(self.shared(), layout, label)
    }

    pub fn create_query_heap(&self, desc: &QueryHeapDesc) -> Result<QueryHeap<A>> {
        QueryHeap::create(self.shared(), desc)
    }

    pub fn create_surface(&self, display: RawDisplayHandle, window: RawWindowHandle) -> Result<A::Surface> {
        let surface = self
            .shared()
            .instance
            .create_surface(display, window)
            .map_err(creation_failed("surface"))?;
        Ok(surface)
    }

    pub fn create_swapchain(&self, surface: A::Surface, desc: &SwapChainDesc) -> Result<SwapChain<A>> {
        SwapChain::create(self.shared(), surface, desc)
    }

    pub fn begin_command_buffer(&self, queue: QueueType, label: Option<&str>) -> Result<CommandBuffer<A>> {
        CommandBuffer::begin(self.shared(), queue, label)
    }

    /// Execute `command_buffers`, present every swapchain they acquired and advance the
    /// frame. Blocks only when the GPU is `MAX_INFLIGHT_FRAMES` behind. Returns the number
    /// of the frame just submitted.
    ///
    /// A failed present returns before the frame advances, although the lists have already
    /// executed and signaled this frame's fences. Present only
    /// fails on device loss, after which the device must be recreated, so that partial state
    /// is never observed by a later submit.
    pub fn submit(&self, command_buffers: Vec<CommandBuffer<A>>) -> Result<u64> {
        let shared = self.shared();
        let frame_index = shared.frame_index();

        let mut recorders: Vec<_> = command_buffers.into_iter().map(CommandBuffer::into_recorder).collect();
        let mut present: SmallVec<[SwapChain<A>; 2]> = SmallVec::new();
        for recorder in recorders.iter_mut() {
            for swapchain in recorder.finish() {
                if !present.contains(&swapchain) {
                    present.push(swapchain);
                }
            }
        }

        {
            let mut batches: [Vec<&A::CommandList>; QueueType::COUNT] = Default::default();
            for recorder in &recorders {
                batches[recorder.queue().index()].push(recorder.list());
            }
            for (q, queue) in shared.queues.iter().enumerate() {
                if !batches[q].is_empty() {
                    queue.execute(&batches[q]);
                }
                queue.signal(&shared.frame_fences[q][frame_index], 1);
            }
        }
        for recorder in recorders.iter_mut() {
            recorder.clear_bindings();
        }
        drop(recorders);
        shared.commands.reset();

        for swapchain in &present {
            swapchain.present()?;
        }
        drop(present);

        let frame_count = shared.deletion.advance_frame();
        let next_index = shared.frame_index();
        if frame_count >= MAX_INFLIGHT_FRAMES as u64 {
            for fences in &shared.frame_fences {
                let fence = &fences[next_index];
                if shared.raw.fence_completed_value(fence) < 1 {
                    shared.raw.wait_fence(fence, 1)?;
                }
                shared.raw.signal_fence(fence, 0);
            }
        }
        shared.deletion.process();
        Ok(frame_count - 1)
    }

    /// Block until all submitted work has finished.
    pub fn wait_idle(&self) -> Result<()> {
        self.shared().wait_idle()
    }

    /// Read a descriptor slot back, on backends that support it.
    pub fn inspect_descriptor(
        &self,
        kind: DescriptorHeapKind,
        index: u32,
        shader_visible: bool,
    ) -> Option<DescriptorRecord> {
        let shared = self.shared();
        let allocator = shared.allocator(kind);
        if shader_visible {
            allocator.read_shader_visible(&shared.raw, index)
        } else {
            allocator.read(&shared.raw, index)
        }
    }
}

impl Device<null::Api> {
    /// A device on the headless backend.
    pub fn with_null(config: null::NullConfig) -> Result<Self> {
        let desc = DeviceDesc {
            preferred_backend: Some(Backend::Null),
            ..DeviceDesc::default()
        };
        Self::new(null::Instance::with_config(config), &desc)
    }

    pub fn null_device(&self) -> &null::Device {
        &self.shared().raw
    }
}

impl<A: Api> std::fmt::Debug for Device<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("backend", &A::BACKEND)
            .field("adapter", &self.shared().adapter_info.name)
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

/// A device on whichever backend was selected at runtime.
#[derive(Debug, Clone)]
pub enum AnyDevice {
    Null(Device<null::Api>),
}

impl AnyDevice {
    pub fn backend(&self) -> Backend {
        match self {
            AnyDevice::Null(device) => device.backend(),
        }
    }
}

/// Resolve the backend for `desc` and create a device on it.
pub fn create_device(desc: &DeviceDesc) -> Result<AnyDevice> {
    let backend = select_backend(desc.preferred_backend)?;
    match backend {
        Backend::Null => {
            let instance = <null::Instance as hal::Instance<null::Api>>::init(&hal::InstanceDesc {
                label: desc.label,
                validation: desc.validation,
            })?;
            Ok(AnyDevice::Null(Device::<null::Api>::new(instance, desc)?))
        }
        other => Err(Error::Unsupported(format!("{} backend is not compiled in", other.name()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::null::{GpuEvent, NullConfig};

    #[test]
    fn frame_index_wraps() {
        let device = Device::with_null(NullConfig::default()).unwrap();
        for frame in 0..5u64 {
            assert_eq!(device.frame_index(), (frame % MAX_INFLIGHT_FRAMES as u64) as usize);
            assert_eq!(device.submit(Vec::new()).unwrap(), frame);
        }
        assert_eq!(device.frame_count(), 5);
    }

    #[test]
    fn every_queue_signals_its_frame_fence() {
        let device = Device::with_null(NullConfig::default()).unwrap();
        let null = device.null_device();
        null.clear_events();
        device.submit(Vec::new()).unwrap();
        let signaled: Vec<QueueType> = null
            .events()
            .iter()
            .filter_map(|e| match e {
                GpuEvent::Signaled { queue, value: 1, .. } => Some(*queue),
                _ => None,
            })
            .collect();
        assert_eq!(signaled, QueueType::ALL.to_vec());
    }

    #[test]
    fn submit_blocks_on_the_oldest_frame() {
        let device = Device::with_null(NullConfig::manual()).unwrap();
        let null = device.null_device();
        device.submit(Vec::new()).unwrap();
        assert!(null.pending_operations() > 0);
        // The second submit reuses frame slot 0 and drives the timeline to free it.
        device.submit(Vec::new()).unwrap();
        for fences in &device.shared().frame_fences {
            assert_eq!(fences[0].value(), 0);
        }
    }

    #[test]
    fn missing_features_mean_no_adapter() {
        let desc = DeviceDesc {
            preferred_backend: Some(Backend::Null),
            required_features: Features::RAY_TRACING,
            ..Default::default()
        };
        let result = Device::<null::Api>::new(null::Instance::with_config(NullConfig::default()), &desc);
        assert!(matches!(result, Err(Error::NoSuitableAdapter)));
    }

    #[test]
    fn create_device_resolves_to_null() {
        let device = create_device(&DeviceDesc::default()).unwrap();
        assert_eq!(device.backend(), Backend::Null);
        let AnyDevice::Null(device) = device;
        assert!(device.query_feature_support(Features::TIMESTAMP_QUERY));
        assert!(!device.query_feature_support(Features::RAY_TRACING));
    }

    #[test]
    fn labels_reach_the_native_device() {
        let device = Device::with_null(NullConfig::default()).unwrap();
        device.set_label("main");
        assert_eq!(device.label(), "main");
        assert_eq!(device.null_device().label(), "main");
    }
}
