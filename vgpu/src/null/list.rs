//! Command recording. Lists store owned commands; copies keep the byte stores alive so
//! the timeline can execute them after the recording handles are gone.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::{Api, Buffer, BufferStore, DescriptorHeap, Pipeline, PipelineLayout, QueryHeap, Texture, TextureStore};
use crate::hal::{self, Barrier, BarrierResource, IndexBufferView, IndirectKind, NativeResource, SubresourceFootprint, VertexBufferView};
use crate::logging::vgpu_warn;
use crate::types::{Color, LoadAction, PrimitiveTopology, QueueType, Rect, ResourceId, ResourceState, Viewport};

#[derive(Debug)]
pub struct CommandAllocator {
    id: ResourceId,
    queue: QueueType,
    resets: AtomicU64,
}

impl CommandAllocator {
    pub(crate) fn new(id: ResourceId, queue: QueueType) -> Self {
        Self {
            id,
            queue,
            resets: AtomicU64::new(0),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn queue(&self) -> QueueType {
        self.queue
    }

    pub fn reset_count(&self) -> u64 {
        self.resets.load(Ordering::Acquire)
    }

    pub(crate) fn reset(&self) {
        self.resets.fetch_add(1, Ordering::AcqRel);
    }
}

/// A buffer referenced by a recorded command.
#[derive(Clone)]
pub struct BufferRef {
    pub id: ResourceId,
    store: Arc<BufferStore>,
}

impl std::fmt::Debug for BufferRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Buffer#{}", self.id)
    }
}

impl From<&Buffer> for BufferRef {
    fn from(buffer: &Buffer) -> Self {
        Self {
            id: buffer.id(),
            store: buffer.store.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TextureRef {
    pub id: ResourceId,
    store: Arc<TextureStore>,
}

impl std::fmt::Debug for TextureRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Texture#{}", self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierRecord {
    Transition {
        resource: ResourceId,
        before: ResourceState,
        after: ResourceState,
    },
    UnorderedAccess {
        resource: ResourceId,
    },
}

impl BarrierRecord {
    pub fn resource(&self) -> ResourceId {
        match self {
            BarrierRecord::Transition { resource, .. } | BarrierRecord::UnorderedAccess { resource } => *resource,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetRecord {
    pub heap: ResourceId,
    pub index: u32,
    pub load: LoadAction,
    pub clear_color: Color,
}

#[derive(Debug, Clone)]
pub enum Command {
    SetDescriptorHeaps { resource: ResourceId, sampler: ResourceId },
    Barriers(Vec<BarrierRecord>),
    SetPipeline(ResourceId),
    SetPrimitiveTopology(PrimitiveTopology),
    SetRootSignature { compute: bool, layout: ResourceId },
    SetRootTable { compute: bool, root_index: u32, heap: ResourceId, base: u32 },
    SetRootConstants { compute: bool, root_index: u32, values: Vec<u32> },
    SetViewports(Vec<Viewport>),
    SetScissorRects(Vec<Rect>),
    SetBlendFactor([f32; 4]),
    SetStencilReference(u32),
    SetVertexBuffers { start_slot: u32, views: Vec<VertexBufferView> },
    SetIndexBuffer(IndexBufferView),
    BeginRenderPass { color: Vec<TargetRecord>, depth_stencil: Option<(ResourceId, u32)> },
    EndRenderPass,
    Draw { vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32 },
    DrawIndexed { index_count: u32, instance_count: u32, first_index: u32, base_vertex: i32, first_instance: u32 },
    Dispatch { x: u32, y: u32, z: u32 },
    DispatchMesh { x: u32, y: u32, z: u32 },
    ExecuteIndirect { kind: IndirectKind, buffer: ResourceId, offset: u64, max_count: u32, count: Option<(ResourceId, u64)> },
    CopyBuffer { dst: BufferRef, dst_offset: u64, src: BufferRef, src_offset: u64, size: u64 },
    CopyBufferToTexture { dst: TextureRef, subresource: u32, src: BufferRef, footprint: SubresourceFootprint },
    ClearBuffer { dst: BufferRef, offset: u64, size: u64 },
    BeginQuery { heap: ResourceId, index: u32 },
    EndQuery { heap: ResourceId, index: u32 },
    ResolveQuery { heap: ResourceId, index: u32, count: u32, dst: BufferRef, dst_offset: u64 },
    ResetQuery { heap: ResourceId, index: u32, count: u32 },
    PushDebugGroup(String),
    PopDebugGroup,
    InsertDebugMarker(String),
}

#[derive(Debug)]
pub struct CommandList {
    id: ResourceId,
    queue: QueueType,
    commands: Vec<Command>,
    open: bool,
    allocator: ResourceId,
}

impl CommandList {
    pub(crate) fn new(id: ResourceId, queue: QueueType, allocator: &CommandAllocator) -> Self {
        Self {
            id,
            queue,
            commands: Vec::new(),
            open: true,
            allocator: allocator.id,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn queue(&self) -> QueueType {
        self.queue
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Allocator the current recording was reset against.
    pub fn allocator(&self) -> ResourceId {
        self.allocator
    }

    pub(crate) fn snapshot(&self) -> Arc<Vec<Command>> {
        if self.open {
            vgpu_warn!("command list {} executed while still recording", self.id);
        }
        Arc::new(self.commands.clone())
    }

    fn record(&mut self, command: Command) {
        if !self.open {
            vgpu_warn!("command list {} is closed, dropping {:?}", self.id, command);
            return;
        }
        self.commands.push(command);
    }
}

fn barrier_id(resource: &BarrierResource<'_, Api>) -> ResourceId {
    match resource {
        BarrierResource::Buffer(b) => b.id(),
        BarrierResource::Texture(t) => t.id(),
    }
}

impl hal::CommandList<Api> for CommandList {
    fn reset(&mut self, allocator: &CommandAllocator) {
        self.commands.clear();
        self.allocator = allocator.id;
        self.open = true;
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn set_descriptor_heaps(&mut self, resource: &DescriptorHeap, sampler: &DescriptorHeap) {
        self.record(Command::SetDescriptorHeaps {
            resource: resource.id(),
            sampler: sampler.id(),
        });
    }

    fn resource_barriers(&mut self, barriers: &[Barrier<'_, Api>]) {
        let records = barriers
            .iter()
            .map(|b| match b {
                Barrier::Transition { resource, before, after } => BarrierRecord::Transition {
                    resource: barrier_id(resource),
                    before: *before,
                    after: *after,
                },
                Barrier::UnorderedAccess { resource } => BarrierRecord::UnorderedAccess {
                    resource: barrier_id(resource),
                },
            })
            .collect();
        self.record(Command::Barriers(records));
    }

    fn set_pipeline(&mut self, pipeline: &Pipeline) {
        self.record(Command::SetPipeline(pipeline.id()));
    }

    fn set_primitive_topology(&mut self, topology: PrimitiveTopology) {
        self.record(Command::SetPrimitiveTopology(topology));
    }

    fn set_graphics_root_signature(&mut self, layout: &PipelineLayout) {
        self.record(Command::SetRootSignature {
            compute: false,
            layout: layout.id(),
        });
    }

    fn set_compute_root_signature(&mut self, layout: &PipelineLayout) {
        self.record(Command::SetRootSignature {
            compute: true,
            layout: layout.id(),
        });
    }

    fn set_graphics_root_descriptor_table(&mut self, root_index: u32, heap: &DescriptorHeap, base: u32) {
        self.record(Command::SetRootTable {
            compute: false,
            root_index,
            heap: heap.id(),
            base,
        });
    }

    fn set_compute_root_descriptor_table(&mut self, root_index: u32, heap: &DescriptorHeap, base: u32) {
        self.record(Command::SetRootTable {
            compute: true,
            root_index,
            heap: heap.id(),
            base,
        });
    }

    fn set_graphics_root_constants(&mut self, root_index: u32, values: &[u32]) {
        self.record(Command::SetRootConstants {
            compute: false,
            root_index,
            values: values.to_vec(),
        });
    }

    fn set_compute_root_constants(&mut self, root_index: u32, values: &[u32]) {
        self.record(Command::SetRootConstants {
            compute: true,
            root_index,
            values: values.to_vec(),
        });
    }

    fn set_viewports(&mut self, viewports: &[Viewport]) {
        self.record(Command::SetViewports(viewports.to_vec()));
    }

    fn set_scissor_rects(&mut self, rects: &[Rect]) {
        self.record(Command::SetScissorRects(rects.to_vec()));
    }

    fn set_blend_factor(&mut self, factor: [f32; 4]) {
        self.record(Command::SetBlendFactor(factor));
    }

    fn set_stencil_reference(&mut self, reference: u32) {
        self.record(Command::SetStencilReference(reference));
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, views: &[VertexBufferView]) {
        self.record(Command::SetVertexBuffers {
            start_slot,
            views: views.to_vec(),
        });
    }

    fn set_index_buffer(&mut self, view: &IndexBufferView) {
        self.record(Command::SetIndexBuffer(*view));
    }

    fn begin_render_pass(&mut self, desc: &hal::RenderPassDesc<'_, Api>) {
        let color = desc
            .color
            .iter()
            .map(|c| TargetRecord {
                heap: c.heap.id(),
                index: c.index,
                load: c.load,
                clear_color: c.clear_color,
            })
            .collect();
        let depth_stencil = desc.depth_stencil.as_ref().map(|d| (d.heap.id(), d.index));
        self.record(Command::BeginRenderPass { color, depth_stencil });
    }

    fn end_render_pass(&mut self) {
        self.record(Command::EndRenderPass);
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, first_vertex: u32, first_instance: u32) {
        self.record(Command::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) {
        self.record(Command::DrawIndexed {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.record(Command::Dispatch { x, y, z });
    }

    fn dispatch_mesh(&mut self, x: u32, y: u32, z: u32) {
        self.record(Command::DispatchMesh { x, y, z });
    }

    fn execute_indirect(
        &mut self,
        kind: IndirectKind,
        buffer: &Buffer,
        offset: u64,
        max_count: u32,
        count: Option<(&Buffer, u64)>,
    ) {
        self.record(Command::ExecuteIndirect {
            kind,
            buffer: buffer.id(),
            offset,
            max_count,
            count: count.map(|(b, o)| (b.id(), o)),
        });
    }

    fn copy_buffer_region(&mut self, dst: &Buffer, dst_offset: u64, src: &Buffer, src_offset: u64, size: u64) {
        self.record(Command::CopyBuffer {
            dst: dst.into(),
            dst_offset,
            src: src.into(),
            src_offset,
            size,
        });
    }

    fn copy_buffer_to_texture(
        &mut self,
        dst: &Texture,
        subresource: u32,
        src: &Buffer,
        footprint: &SubresourceFootprint,
    ) {
        self.record(Command::CopyBufferToTexture {
            dst: TextureRef {
                id: dst.id(),
                store: dst.store.clone(),
            },
            subresource,
            src: src.into(),
            footprint: *footprint,
        });
    }

    fn clear_buffer(&mut self, buffer: &Buffer, offset: u64, size: u64) {
        self.record(Command::ClearBuffer {
            dst: buffer.into(),
            offset,
            size,
        });
    }

    fn begin_query(&mut self, heap: &QueryHeap, index: u32) {
        self.record(Command::BeginQuery { heap: heap.id(), index });
    }

    fn end_query(&mut self, heap: &QueryHeap, index: u32) {
        self.record(Command::EndQuery { heap: heap.id(), index });
    }

    fn resolve_query(&mut self, heap: &QueryHeap, index: u32, count: u32, dst: &Buffer, dst_offset: u64) {
        self.record(Command::ResolveQuery {
            heap: heap.id(),
            index,
            count,
            dst: dst.into(),
            dst_offset,
        });
    }

    fn reset_query(&mut self, heap: &QueryHeap, index: u32, count: u32) {
        self.record(Command::ResetQuery {
            heap: heap.id(),
            index,
            count,
        });
    }

    fn push_debug_group(&mut self, label: &str) {
        self.record(Command::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.record(Command::PopDebugGroup);
    }

    fn insert_debug_marker(&mut self, label: &str) {
        self.record(Command::InsertDebugMarker(label.to_string()));
    }
}

fn write_bytes(dst: &BufferRef, offset: u64, bytes: &[u8]) {
    let mut data = dst.store.data.lock();
    let start = offset as usize;
    match data.get_mut(start..start + bytes.len()) {
        Some(range) => range.copy_from_slice(bytes),
        None => vgpu_warn!("write of {} bytes at {} overruns {:?}", bytes.len(), offset, dst),
    }
}

fn read_bytes(src: &BufferRef, offset: u64, size: u64) -> Option<Vec<u8>> {
    let data = src.store.data.lock();
    let start = offset as usize;
    data.get(start..start + size as usize).map(<[u8]>::to_vec)
}

/// Apply the memory effects of executed commands.
pub(crate) fn execute(commands: &[Command]) {
    for command in commands {
        match command {
            Command::CopyBuffer {
                dst,
                dst_offset,
                src,
                src_offset,
                size,
            } => match read_bytes(src, *src_offset, *size) {
                Some(bytes) => write_bytes(dst, *dst_offset, &bytes),
                None => vgpu_warn!("copy of {} bytes at {} overruns {:?}", size, src_offset, src),
            },
            Command::CopyBufferToTexture {
                dst,
                subresource,
                src,
                footprint,
            } => copy_to_texture(dst, *subresource, src, footprint),
            Command::ClearBuffer { dst, offset, size } => {
                let len = (*size).min((dst.store.data.lock().len() as u64).saturating_sub(*offset));
                write_bytes(dst, *offset, &vec![0u8; len as usize]);
            }
            Command::ResolveQuery {
                count, dst, dst_offset, ..
            } => {
                // Queries never produce samples here; results resolve to zero.
                write_bytes(dst, *dst_offset, &vec![0u8; *count as usize * 8]);
            }
            _ => {}
        }
    }
}

fn copy_to_texture(dst: &TextureRef, subresource: u32, src: &BufferRef, footprint: &SubresourceFootprint) {
    let Some(layout) = dst.store.footprints.get(subresource as usize) else {
        vgpu_warn!("{:?} has no subresource {}", dst, subresource);
        return;
    };
    let row_size = layout.row_size.min(footprint.row_size) as usize;
    let rows = layout.num_rows.min(footprint.num_rows) * layout.depth.min(footprint.depth);
    let source = src.store.data.lock();
    let mut subresources = dst.store.subresources.lock();
    let Some(target) = subresources.get_mut(subresource as usize) else {
        return;
    };
    for row in 0..rows as usize {
        let from = footprint.offset as usize + row * footprint.row_pitch as usize;
        let to = row * layout.row_size as usize;
        match (source.get(from..from + row_size), target.get_mut(to..to + row_size)) {
            (Some(s), Some(t)) => t.copy_from_slice(s),
            _ => {
                vgpu_warn!("texture upload row {} out of range for {:?}", row, dst);
                return;
            }
        }
    }
}
