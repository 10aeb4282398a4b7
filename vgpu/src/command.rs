//! Command buffer recording.
//!
//! Recorders are pooled per queue type and handed out locked: a [`CommandBuffer`] owns the
//! recorder's guard until it is submitted, so recording is single-threaded per buffer
//! without any device-wide lock. Resource state transitions are batched and flushed when
//! the batch fills up, before work that depends on them, or at submit.

use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use smallvec::SmallVec;

use crate::binding::BindGroup;
use crate::device::DeviceShared;
use crate::error::Result;
use crate::hal::{
    self, Api, Barrier, BarrierResource, CommandList as _, DescriptorHeapKind, Device as _, IndexBufferView,
    IndirectKind, VertexBufferView,
};
use crate::logging::{vgpu_debug, vgpu_warn};
use crate::resource::{Buffer, Pipeline, QueryHeap, Texture, TrackedState};
use crate::swapchain::SwapChain;
use crate::types::{
    Color, IndexType, LoadAction, PipelineType, QueueType, Rect, ResourceState, StoreAction, TextureDimension,
    Viewport,
};
use crate::{MAX_BARRIERS, MAX_BIND_GROUPS, MAX_COLOR_ATTACHMENTS, MAX_INFLIGHT_FRAMES, MAX_VERTEX_BUFFERS};

const MAX_VIEWPORTS: usize = 16;
/// Largest coordinate a scissor rectangle may reach.
const VIEWPORT_BOUNDS_MAX: i32 = 32767;

/// A resource whose state the recorder tracks.
enum Tracked<A: Api> {
    Buffer(Buffer<A>),
    Texture(Texture<A>),
}

impl<A: Api> Tracked<A> {
    fn state(&self) -> &TrackedState {
        match self {
            Tracked::Buffer(buffer) => buffer.state(),
            Tracked::Texture(texture) => texture.state(),
        }
    }

    fn native(&self) -> BarrierResource<'_, A> {
        match self {
            Tracked::Buffer(buffer) => BarrierResource::Buffer(buffer.native()),
            Tracked::Texture(texture) => BarrierResource::Texture(texture.native()),
        }
    }
}

struct PendingBarrier<A: Api> {
    resource: Tracked<A>,
    /// `None` is an unordered-access barrier.
    transition: Option<(ResourceState, ResourceState)>,
}

pub(crate) struct Recorder<A: Api> {
    queue: QueueType,
    allocators: Vec<A::CommandAllocator>,
    list: A::CommandList,

    pipeline: Option<Pipeline<A>>,
    bind_groups: [Option<BindGroup<A>>; MAX_BIND_GROUPS],
    dirty_bind_groups: u32,
    num_bound_bind_groups: usize,

    barriers: SmallVec<[PendingBarrier<A>; MAX_BARRIERS]>,
    inside_render_pass: bool,
    pass_has_label: bool,

    vertex_views: [VertexBufferView; MAX_VERTEX_BUFFERS],
    num_vertex_buffers: usize,
    vertex_buffers_dirty: bool,

    swapchains: SmallVec<[SwapChain<A>; 1]>,

    resource_heap_generation: u64,
    sampler_heap_generation: u64,
    has_label: bool,
}

impl<A: Api> Recorder<A> {
    fn new(device: &A::Device, queue: QueueType) -> Result<Self> {
        let allocators = (0..MAX_INFLIGHT_FRAMES)
            .map(|_| device.create_command_allocator(queue))
            .collect::<hal::HalResult<Vec<_>>>()?;
        let mut list = device.create_command_list(queue, &allocators[0])?;
        list.close();
        Ok(Self {
            queue,
            allocators,
            list,
            pipeline: None,
            bind_groups: std::array::from_fn(|_| None),
            dirty_bind_groups: 0,
            num_bound_bind_groups: 0,
            barriers: SmallVec::new(),
            inside_render_pass: false,
            pass_has_label: false,
            vertex_views: [VertexBufferView {
                address: 0,
                size: 0,
                stride: 0,
            }; MAX_VERTEX_BUFFERS],
            num_vertex_buffers: 0,
            vertex_buffers_dirty: false,
            swapchains: SmallVec::new(),
            resource_heap_generation: 0,
            sampler_heap_generation: 0,
            has_label: false,
        })
    }

    pub(crate) fn queue(&self) -> QueueType {
        self.queue
    }

    pub(crate) fn list(&self) -> &A::CommandList {
        &self.list
    }

    /// Drop every reference taken while recording.
    pub(crate) fn clear_bindings(&mut self) {
        self.pipeline = None;
        self.bind_groups = std::array::from_fn(|_| None);
        self.dirty_bind_groups = 0;
        self.num_bound_bind_groups = 0;
        self.barriers.clear();
        self.inside_render_pass = false;
        self.pass_has_label = false;
        self.num_vertex_buffers = 0;
        self.vertex_buffers_dirty = false;
        self.swapchains.clear();
        self.has_label = false;
    }

    fn begin(&mut self, shared: &DeviceShared<A>, frame_index: usize, label: Option<&str>) {
        self.clear_bindings();

        let allocator = &self.allocators[frame_index];
        shared.raw.reset_command_allocator(allocator);
        self.list.reset(allocator);

        if self.queue != QueueType::Copy {
            self.bind_descriptor_heaps(shared);
        }
        if self.queue == QueueType::Graphics {
            let rect = Rect {
                x: 0,
                y: 0,
                width: VIEWPORT_BOUNDS_MAX,
                height: VIEWPORT_BOUNDS_MAX,
            };
            self.list.set_scissor_rects(&[rect; MAX_VIEWPORTS]);
            self.list.set_blend_factor([0.0; 4]);
            self.list.set_stencil_reference(0);
        }
        if let Some(label) = label {
            self.list.push_debug_group(label);
            self.has_label = true;
        }
    }

    fn bind_descriptor_heaps(&mut self, shared: &DeviceShared<A>) {
        // Generation first: a grow between the two reads just re-binds on the next flush.
        self.resource_heap_generation = shared.resource_heap.generation();
        self.sampler_heap_generation = shared.sampler_heap.generation();
        let resource = shared.resource_heap.shader_visible_heap();
        let sampler = shared.sampler_heap.shader_visible_heap();
        if let (Some(resource), Some(sampler)) = (resource, sampler) {
            self.list.set_descriptor_heaps(&resource, &sampler);
        }
    }

    fn transition(&mut self, resource: Tracked<A>, state: ResourceState, flush_immediate: bool) {
        let tracked = resource.state();
        if tracked.is_fixed() {
            return;
        }
        if self.queue == QueueType::Compute {
            debug_assert!(
                ResourceState::COMPUTE_LEGAL.contains(state),
                "{:?} is not a valid state on a compute queue",
                state
            );
        }

        let before = tracked.get();
        if before != state {
            tracked.set(state);
            self.barriers.push(PendingBarrier {
                resource,
                transition: Some((before, state)),
            });
        } else if state == ResourceState::UNORDERED_ACCESS {
            self.barriers.push(PendingBarrier {
                resource,
                transition: None,
            });
        }

        if flush_immediate || self.barriers.len() == MAX_BARRIERS {
            self.flush_barriers();
        }
    }

    pub(crate) fn flush_barriers(&mut self) {
        if self.barriers.is_empty() {
            return;
        }
        let barriers: SmallVec<[Barrier<'_, A>; MAX_BARRIERS]> = self
            .barriers
            .iter()
            .map(|pending| match pending.transition {
                Some((before, after)) => Barrier::Transition {
                    resource: pending.resource.native(),
                    before,
                    after,
                },
                None => Barrier::UnorderedAccess {
                    resource: pending.resource.native(),
                },
            })
            .collect();
        self.list.resource_barriers(&barriers);
        drop(barriers);
        self.barriers.clear();
    }

    fn flush_bind_groups(&mut self, shared: &DeviceShared<A>, graphics: bool) {
        if shared.resource_heap.generation() != self.resource_heap_generation
            || shared.sampler_heap.generation() != self.sampler_heap_generation
        {
            vgpu_debug!("descriptor heaps grew while recording, re-binding");
            self.bind_descriptor_heaps(shared);
            // Setting heaps invalidates every root table set so far.
            self.dirty_bind_groups = (1u32 << self.num_bound_bind_groups) - 1;
        }
        if self.dirty_bind_groups == 0 {
            return;
        }
        let Some(pipeline) = self.pipeline.clone() else {
            return;
        };
        let layout = pipeline.layout();
        let resource_heap = shared.resource_heap.shader_visible_heap();
        let sampler_heap = shared.sampler_heap.shader_visible_heap();

        for index in 0..self.num_bound_bind_groups {
            if self.dirty_bind_groups & (1 << index) == 0 {
                continue;
            }
            let Some(group) = &self.bind_groups[index] else {
                continue;
            };
            let tables = [
                (
                    layout.resource_root_index(index),
                    group.descriptor_table(DescriptorHeapKind::CbvSrvUav),
                    &resource_heap,
                ),
                (
                    layout.sampler_root_index(index),
                    group.descriptor_table(DescriptorHeapKind::Sampler),
                    &sampler_heap,
                ),
            ];
            for (root_index, base, heap) in tables {
                let (Some(root_index), Some(base), Some(heap)) = (root_index, base, heap) else {
                    continue;
                };
                if graphics {
                    self.list.set_graphics_root_descriptor_table(root_index, heap, base);
                } else {
                    self.list.set_compute_root_descriptor_table(root_index, heap, base);
                }
            }
        }
        self.dirty_bind_groups = 0;
    }

    fn apply_vertex_buffers(&mut self) {
        if !self.vertex_buffers_dirty {
            return;
        }
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        let strides = pipeline.vertex_strides();
        let count = strides.len().min(MAX_VERTEX_BUFFERS);
        for (view, stride) in self.vertex_views.iter_mut().zip(strides) {
            view.stride = *stride;
        }
        if count > 0 {
            self.list.set_vertex_buffers(0, &self.vertex_views[..count]);
        }
        self.vertex_buffers_dirty = false;
    }

    /// Transition registered backbuffers to Present, close the label group, flush and
    /// close the list. Returns the swapchains to present after execution.
    pub(crate) fn finish(&mut self) -> SmallVec<[SwapChain<A>; 1]> {
        if self.inside_render_pass {
            vgpu_warn!("command buffer submitted inside a render pass");
            self.list.end_render_pass();
            self.inside_render_pass = false;
        }
        let swapchains = std::mem::take(&mut self.swapchains);
        for swapchain in &swapchains {
            if let Some(backbuffer) = swapchain.current_backbuffer() {
                self.transition(Tracked::Texture(backbuffer), ResourceState::PRESENT, false);
            }
        }
        if self.has_label {
            self.list.pop_debug_group();
            self.has_label = false;
        }
        self.flush_barriers();
        self.list.close();
        swapchains
    }
}

struct PoolState<A: Api> {
    recorders: [Vec<Arc<Mutex<Recorder<A>>>>; QueueType::COUNT],
    acquired: [usize; QueueType::COUNT],
}

/// Recorders reused across frames. The acquisition counters go back to zero at submit,
/// so a frame that records N command buffers on a queue never builds more than N.
pub(crate) struct CommandPool<A: Api> {
    state: Mutex<PoolState<A>>,
}

impl<A: Api> CommandPool<A> {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(PoolState {
                recorders: Default::default(),
                acquired: [0; QueueType::COUNT],
            }),
        }
    }

    fn acquire(&self, device: &A::Device, queue: QueueType) -> Result<ArcMutexGuard<RawMutex, Recorder<A>>> {
        let mut state = self.state.lock();
        let q = queue.index();
        loop {
            let index = state.acquired[q];
            state.acquired[q] += 1;
            match state.recorders[q].get(index) {
                // Still owned by a command buffer that was never submitted.
                Some(recorder) => match recorder.try_lock_arc() {
                    Some(guard) => return Ok(guard),
                    None => continue,
                },
                None => {
                    let recorder = Arc::new(Mutex::new(Recorder::new(device, queue)?));
                    state.recorders[q].push(recorder.clone());
                    vgpu_debug!("new {:?} command recorder ({} total)", queue, state.recorders[q].len());
                    return Ok(recorder.lock_arc());
                }
            }
        }
    }

    pub(crate) fn reset(&self) {
        self.state.lock().acquired = [0; QueueType::COUNT];
    }

    /// Recorders built so far for `queue`.
    pub(crate) fn recorder_count(&self, queue: QueueType) -> usize {
        self.state.lock().recorders[queue.index()].len()
    }

    /// Release every reference held by idle recorders.
    pub(crate) fn clear(&self) {
        let state = self.state.lock();
        for recorder in state.recorders.iter().flatten() {
            if let Some(mut recorder) = recorder.try_lock() {
                recorder.clear_bindings();
            }
        }
    }
}

impl<A: Api> std::fmt::Debug for CommandPool<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CommandPool")
            .field("recorders", &state.recorders.iter().map(Vec::len).collect::<Vec<_>>())
            .field("acquired", &state.acquired)
            .finish()
    }
}

pub struct RenderPassColorAttachment<'a, A: Api> {
    pub texture: &'a Texture<A>,
    pub mip_level: u32,
    pub slice: u32,
    pub load: LoadAction,
    pub store: StoreAction,
    pub clear_color: Color,
}

impl<'a, A: Api> RenderPassColorAttachment<'a, A> {
    /// Mip 0, slice 0, cleared to `clear_color` and stored.
    pub fn clear(texture: &'a Texture<A>, clear_color: Color) -> Self {
        Self {
            texture,
            mip_level: 0,
            slice: 0,
            load: LoadAction::Clear,
            store: StoreAction::Store,
            clear_color,
        }
    }
}

pub struct RenderPassDepthStencilAttachment<'a, A: Api> {
    pub texture: &'a Texture<A>,
    pub mip_level: u32,
    pub slice: u32,
    pub depth_load: LoadAction,
    pub depth_store: StoreAction,
    pub depth_clear: f32,
    pub stencil_load: LoadAction,
    pub stencil_store: StoreAction,
    pub stencil_clear: u32,
}

impl<'a, A: Api> RenderPassDepthStencilAttachment<'a, A> {
    pub fn clear(texture: &'a Texture<A>, depth_clear: f32) -> Self {
        Self {
            texture,
            mip_level: 0,
            slice: 0,
            depth_load: LoadAction::Clear,
            depth_store: StoreAction::Store,
            depth_clear,
            stencil_load: LoadAction::Clear,
            stencil_store: StoreAction::DontCare,
            stencil_clear: 0,
        }
    }
}

pub struct RenderPassDesc<'a, A: Api> {
    pub label: Option<&'a str>,
    pub color_attachments: &'a [RenderPassColorAttachment<'a, A>],
    pub depth_stencil_attachment: Option<RenderPassDepthStencilAttachment<'a, A>>,
}

/// Bytes a vertex or index view covers from `offset`. Views are limited to 32-bit sizes,
/// so anything past 4 GiB is cut to `u32::MAX`.
fn view_size(buffer_size: u64, offset: u64) -> u32 {
    u32::try_from(buffer_size - offset).unwrap_or(u32::MAX)
}

/// An open recording on one queue. Consumed by `Device::submit`.
pub struct CommandBuffer<A: Api> {
    recorder: ArcMutexGuard<RawMutex, Recorder<A>>,
    shared: Arc<DeviceShared<A>>,
}

impl<A: Api> CommandBuffer<A> {
    pub(crate) fn begin(shared: &Arc<DeviceShared<A>>, queue: QueueType, label: Option<&str>) -> Result<Self> {
        let mut recorder = shared.commands.acquire(&shared.raw, queue)?;
        recorder.begin(shared, shared.frame_index(), label);
        Ok(Self {
            recorder,
            shared: shared.clone(),
        })
    }

    pub(crate) fn into_recorder(self) -> ArcMutexGuard<RawMutex, Recorder<A>> {
        self.recorder
    }

    pub fn queue(&self) -> QueueType {
        self.recorder.queue
    }

    /// The backend list being recorded into.
    pub fn native(&self) -> &A::CommandList {
        &self.recorder.list
    }

    pub fn push_debug_group(&mut self, label: &str) {
        self.recorder.list.push_debug_group(label);
    }

    pub fn pop_debug_group(&mut self) {
        self.recorder.list.pop_debug_group();
    }

    pub fn insert_debug_marker(&mut self, label: &str) {
        self.recorder.list.insert_debug_marker(label);
    }

    pub fn transition_buffer(&mut self, buffer: &Buffer<A>, state: ResourceState) {
        self.recorder.transition(Tracked::Buffer(buffer.clone()), state, false);
    }

    pub fn transition_texture(&mut self, texture: &Texture<A>, state: ResourceState) {
        self.recorder.transition(Tracked::Texture(texture.clone()), state, false);
    }

    /// Resolve the swapchain's current backbuffer, resizing first if the surface changed.
    /// `Ok(None)` means the surface is minimized and nothing should be drawn.
    pub fn acquire_swapchain_texture(&mut self, swapchain: &SwapChain<A>) -> Result<Option<Texture<A>>> {
        let Some(texture) = swapchain.acquire()? else {
            return Ok(None);
        };
        let recorder = &mut *self.recorder;
        recorder.transition(Tracked::Texture(texture.clone()), ResourceState::RENDER_TARGET, true);
        if !recorder.swapchains.iter().any(|s| s == swapchain) {
            recorder.swapchains.push(swapchain.clone());
        }
        Ok(Some(texture))
    }

    pub fn set_pipeline(&mut self, pipeline: &Pipeline<A>) {
        let recorder = &mut *self.recorder;
        if recorder.pipeline.as_ref() == Some(pipeline) {
            return;
        }
        recorder.list.set_pipeline(pipeline.native());
        let layout = pipeline.layout().native();
        match pipeline.pipeline_type() {
            PipelineType::Render => {
                recorder.list.set_primitive_topology(pipeline.topology());
                recorder.list.set_graphics_root_signature(layout);
            }
            PipelineType::Compute | PipelineType::RayTracing => {
                recorder.list.set_compute_root_signature(layout);
            }
        }
        recorder.pipeline = Some(pipeline.clone());
        // A new root signature invalidates every table bound so far.
        recorder.dirty_bind_groups = (1u32 << recorder.num_bound_bind_groups) - 1;
        recorder.vertex_buffers_dirty = true;
    }

    pub fn set_bind_group(&mut self, index: usize, group: &BindGroup<A>) {
        assert!(index < MAX_BIND_GROUPS, "bind group index {} out of range", index);
        let recorder = &mut *self.recorder;
        recorder.bind_groups[index] = Some(group.clone());
        recorder.dirty_bind_groups |= 1 << index;
        recorder.num_bound_bind_groups = recorder.num_bound_bind_groups.max(index + 1);
    }

    /// Write `data` as 32-bit root constants for push-constant range `index` of the
    /// current pipeline's layout.
    pub fn set_push_constants(&mut self, index: u32, data: &[u8]) {
        assert!(data.len() % 4 == 0, "push constant data must be whole 32-bit words");
        let recorder = &mut *self.recorder;
        let Some(pipeline) = &recorder.pipeline else {
            panic!("set_push_constants called without a pipeline");
        };
        let root_index = pipeline.layout().push_constants_base_index() + index;
        let values: SmallVec<[u32; 32]> = data.chunks_exact(4).map(bytemuck::pod_read_unaligned).collect();
        match pipeline.pipeline_type() {
            PipelineType::Render => recorder.list.set_graphics_root_constants(root_index, &values),
            PipelineType::Compute | PipelineType::RayTracing => {
                recorder.list.set_compute_root_constants(root_index, &values)
            }
        }
    }

    pub fn begin_render_pass(&mut self, desc: &RenderPassDesc<'_, A>) -> Result<()> {
        debug_assert!(
            desc.color_attachments.len() <= MAX_COLOR_ATTACHMENTS,
            "too many color attachments"
        );
        let recorder = &mut *self.recorder;
        if let Some(label) = desc.label {
            recorder.list.push_debug_group(label);
            recorder.pass_has_label = true;
        }
        recorder.flush_barriers();

        let mut width = u32::MAX;
        let mut height = u32::MAX;
        let mut extent = |texture: &Texture<A>, mip_level: u32| {
            width = width.min((texture.width() >> mip_level).max(1));
            height = height.min((texture.height() >> mip_level).max(1));
        };

        let mut color_indices: SmallVec<[u32; MAX_COLOR_ATTACHMENTS]> = SmallVec::new();
        for attachment in desc.color_attachments {
            recorder.transition(
                Tracked::Texture(attachment.texture.clone()),
                ResourceState::RENDER_TARGET,
                true,
            );
            color_indices.push(attachment.texture.rtv(attachment.mip_level, attachment.slice)?);
            extent(attachment.texture, attachment.mip_level);
        }

        let depth_index = match &desc.depth_stencil_attachment {
            Some(attachment) => {
                debug_assert!(
                    attachment.texture.dimension() != TextureDimension::D3,
                    "3D textures cannot be depth-stencil targets"
                );
                recorder.transition(
                    Tracked::Texture(attachment.texture.clone()),
                    ResourceState::DEPTH_WRITE,
                    true,
                );
                let index = attachment.texture.dsv(attachment.mip_level, attachment.slice)?;
                extent(attachment.texture, attachment.mip_level);
                Some(index)
            }
            None => None,
        };

        // Fetched after the views above: allocating one may have grown the heaps.
        let rtv_heap = self.shared.rtv_heap.cpu_heap();
        let dsv_heap = self.shared.dsv_heap.cpu_heap();
        let color: SmallVec<[hal::ColorTarget<'_, A>; MAX_COLOR_ATTACHMENTS]> = desc
            .color_attachments
            .iter()
            .zip(&color_indices)
            .map(|(attachment, &index)| hal::ColorTarget {
                heap: &*rtv_heap,
                index,
                load: attachment.load,
                store: attachment.store,
                clear_color: attachment.clear_color,
            })
            .collect();
        let depth_stencil = desc
            .depth_stencil_attachment
            .as_ref()
            .zip(depth_index)
            .map(|(attachment, index)| hal::DepthStencilTarget {
                heap: &*dsv_heap,
                index,
                depth_load: attachment.depth_load,
                depth_store: attachment.depth_store,
                depth_clear: attachment.depth_clear,
                stencil_load: attachment.stencil_load,
                stencil_store: attachment.stencil_store,
                stencil_clear: attachment.stencil_clear,
            });

        if width != u32::MAX {
            recorder.list.set_viewports(&[Viewport {
                x: 0.0,
                y: 0.0,
                width: width as f32,
                height: height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            }]);
            recorder.list.set_scissor_rects(&[Rect {
                x: 0,
                y: 0,
                width: width as i32,
                height: height as i32,
            }]);
        }
        recorder.list.begin_render_pass(&hal::RenderPassDesc {
            color: &color,
            depth_stencil,
        });
        recorder.inside_render_pass = true;
        Ok(())
    }

    pub fn end_render_pass(&mut self) {
        let recorder = &mut *self.recorder;
        debug_assert!(recorder.inside_render_pass, "end_render_pass without begin_render_pass");
        recorder.list.end_render_pass();
        recorder.inside_render_pass = false;
        if recorder.pass_has_label {
            recorder.list.pop_debug_group();
            recorder.pass_has_label = false;
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.recorder.list.set_viewports(&[viewport]);
    }

    pub fn set_viewports(&mut self, viewports: &[Viewport]) {
        assert!(viewports.len() <= MAX_VIEWPORTS, "at most {} viewports", MAX_VIEWPORTS);
        self.recorder.list.set_viewports(viewports);
    }

    pub fn set_scissor_rect(&mut self, rect: Rect) {
        self.recorder.list.set_scissor_rects(&[rect]);
    }

    pub fn set_scissor_rects(&mut self, rects: &[Rect]) {
        assert!(rects.len() <= MAX_VIEWPORTS, "at most {} scissor rects", MAX_VIEWPORTS);
        self.recorder.list.set_scissor_rects(rects);
    }

    pub fn set_stencil_reference(&mut self, reference: u32) {
        self.recorder.list.set_stencil_reference(reference);
    }

    /// Bind `buffer` from `offset` to slot `index`. The stride comes from the pipeline.
    pub fn set_vertex_buffer(&mut self, index: usize, buffer: &Buffer<A>, offset: u64) {
        assert!(index < MAX_VERTEX_BUFFERS, "vertex buffer slot {} out of range", index);
        let recorder = &mut *self.recorder;
        let offset = offset.min(buffer.size());
        recorder.vertex_views[index] = VertexBufferView {
            address: buffer.device_address() + offset,
            size: view_size(buffer.size(), offset),
            stride: 0,
        };
        recorder.num_vertex_buffers = recorder.num_vertex_buffers.max(index + 1);
        recorder.vertex_buffers_dirty = true;
    }

    pub fn set_index_buffer(&mut self, buffer: &Buffer<A>, index_type: IndexType, offset: u64) {
        let offset = offset.min(buffer.size());
        self.recorder.list.set_index_buffer(&IndexBufferView {
            address: buffer.device_address() + offset,
            size: view_size(buffer.size(), offset),
            index_type,
        });
    }

    fn prepare_draw(&mut self) {
        let recorder = &mut *self.recorder;
        assert!(recorder.inside_render_pass, "draws must be recorded inside a render pass");
        recorder.apply_vertex_buffers();
        recorder.flush_bind_groups(&self.shared, true);
    }

    fn prepare_dispatch(&mut self) {
        let recorder = &mut *self.recorder;
        assert!(!recorder.inside_render_pass, "dispatches cannot be recorded inside a render pass");
        recorder.flush_barriers();
        recorder.flush_bind_groups(&self.shared, false);
    }

    pub fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.prepare_draw();
        self.recorder
            .list
            .draw(vertex_count, instance_count, first_vertex, first_instance);
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        self.prepare_draw();
        self.recorder
            .list
            .draw_indexed(index_count, instance_count, first_index, base_vertex, first_instance);
    }

    pub fn draw_indirect(&mut self, buffer: &Buffer<A>, offset: u64) {
        self.prepare_draw();
        self.recorder
            .list
            .execute_indirect(IndirectKind::Draw, buffer.native(), offset, 1, None);
    }

    pub fn draw_indirect_count(
        &mut self,
        buffer: &Buffer<A>,
        offset: u64,
        count_buffer: &Buffer<A>,
        count_offset: u64,
        max_count: u32,
    ) {
        self.prepare_draw();
        self.recorder.list.execute_indirect(
            IndirectKind::Draw,
            buffer.native(),
            offset,
            max_count,
            Some((count_buffer.native(), count_offset)),
        );
    }

    pub fn draw_indexed_indirect(&mut self, buffer: &Buffer<A>, offset: u64) {
        self.prepare_draw();
        self.recorder
            .list
            .execute_indirect(IndirectKind::DrawIndexed, buffer.native(), offset, 1, None);
    }

    pub fn draw_indexed_indirect_count(
        &mut self,
        buffer: &Buffer<A>,
        offset: u64,
        count_buffer: &Buffer<A>,
        count_offset: u64,
        max_count: u32,
    ) {
        self.prepare_draw();
        self.recorder.list.execute_indirect(
            IndirectKind::DrawIndexed,
            buffer.native(),
            offset,
            max_count,
            Some((count_buffer.native(), count_offset)),
        );
    }

    pub fn dispatch_mesh(&mut self, x: u32, y: u32, z: u32) {
        self.prepare_draw();
        self.recorder.list.dispatch_mesh(x, y, z);
    }

    pub fn dispatch_mesh_indirect(&mut self, buffer: &Buffer<A>, offset: u64) {
        self.prepare_draw();
        self.recorder
            .list
            .execute_indirect(IndirectKind::DispatchMesh, buffer.native(), offset, 1, None);
    }

    pub fn dispatch_mesh_indirect_count(
        &mut self,
        buffer: &Buffer<A>,
        offset: u64,
        count_buffer: &Buffer<A>,
        count_offset: u64,
        max_count: u32,
    ) {
        self.prepare_draw();
        self.recorder.list.execute_indirect(
            IndirectKind::DispatchMesh,
            buffer.native(),
            offset,
            max_count,
            Some((count_buffer.native(), count_offset)),
        );
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.prepare_dispatch();
        self.recorder.list.dispatch(x, y, z);
    }

    pub fn dispatch_indirect(&mut self, buffer: &Buffer<A>, offset: u64) {
        self.prepare_dispatch();
        self.recorder
            .list
            .execute_indirect(IndirectKind::Dispatch, buffer.native(), offset, 1, None);
    }

    pub fn copy_buffer_to_buffer(
        &mut self,
        src: &Buffer<A>,
        src_offset: u64,
        dst: &Buffer<A>,
        dst_offset: u64,
        size: u64,
    ) {
        let recorder = &mut *self.recorder;
        recorder.transition(Tracked::Buffer(src.clone()), ResourceState::COPY_SOURCE, false);
        recorder.transition(Tracked::Buffer(dst.clone()), ResourceState::COPY_DEST, true);
        recorder
            .list
            .copy_buffer_region(dst.native(), dst_offset, src.native(), src_offset, size);
    }

    /// Zero `size` bytes of `buffer` from `offset`; `WHOLE_SIZE` clears to the end.
    pub fn clear_buffer(&mut self, buffer: &Buffer<A>, offset: u64, size: u64) {
        let offset = offset.min(buffer.size());
        let size = size.min(buffer.size() - offset);
        let recorder = &mut *self.recorder;
        recorder.transition(Tracked::Buffer(buffer.clone()), ResourceState::UNORDERED_ACCESS, true);
        recorder.list.clear_buffer(buffer.native(), offset, size);
    }

    pub fn begin_query(&mut self, heap: &QueryHeap<A>, index: u32) {
        debug_assert!(index < heap.count(), "query {} out of range", index);
        self.recorder.list.begin_query(heap.native(), index);
    }

    pub fn end_query(&mut self, heap: &QueryHeap<A>, index: u32) {
        debug_assert!(index < heap.count(), "query {} out of range", index);
        self.recorder.list.end_query(heap.native(), index);
    }

    /// Copy `count` results starting at `index` into `dst` as 64-bit values.
    pub fn resolve_query(&mut self, heap: &QueryHeap<A>, index: u32, count: u32, dst: &Buffer<A>, dst_offset: u64) {
        debug_assert!(index + count <= heap.count(), "query range out of bounds");
        let recorder = &mut *self.recorder;
        recorder.transition(Tracked::Buffer(dst.clone()), ResourceState::COPY_DEST, true);
        recorder
            .list
            .resolve_query(heap.native(), index, count, dst.native(), dst_offset);
    }

    pub fn reset_query(&mut self, heap: &QueryHeap<A>, index: u32, count: u32) {
        debug_assert!(index + count <= heap.count(), "query range out of bounds");
        self.recorder.list.reset_query(heap.native(), index, count);
    }
}

impl<A: Api> std::fmt::Debug for CommandBuffer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandBuffer")
            .field("queue", &self.recorder.queue)
            .field("inside_render_pass", &self.recorder.inside_render_pass)
            .field("pending_barriers", &self.recorder.barriers.len())
            .finish()
    }
}
