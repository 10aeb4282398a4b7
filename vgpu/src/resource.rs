//! Reference-counted resource handles.
//!
//! Every handle is a clone of an `Arc`. Cloning adds a reference and dropping releases
//! one; when the last handle goes away the native object moves into the device's
//! deletion queue, because command lists already submitted may still read it.

use std::mem::ManuallyDrop;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::binding::PipelineLayout;
use crate::deletion::NativeObject;
use crate::device::DeviceShared;
use crate::error::{creation_failed, invalid_descriptor, Error, Result};
use crate::hal::{self, Api, Descriptor, Device as _, MemoryKind};
use crate::types::{
    BlendState, BufferDesc, BufferUsage, CpuAccessMode, DepthStencilState, DeviceAddress, Features,
    PipelineType, PrimitiveTopology, QueryHeapDesc, QueryType, RasterizerState, ResourceState, SamplerDesc,
    ShaderStageDesc, TextureData, TextureDesc, TextureDimension, TextureFormat, TextureUsage,
    VertexBufferLayout,
};
use crate::{CONSTANT_BUFFER_ALIGNMENT, MAX_COLOR_ATTACHMENTS, MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_BUFFERS};

/// Last GPU state a resource was transitioned to. Fixed states never change.
#[derive(Debug)]
pub(crate) struct TrackedState {
    bits: AtomicU32,
    fixed: bool,
}

impl TrackedState {
    fn new(state: ResourceState, fixed: bool) -> Self {
        Self {
            bits: AtomicU32::new(state.bits()),
            fixed,
        }
    }

    pub(crate) fn get(&self) -> ResourceState {
        ResourceState::from_bits_retain(self.bits.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ResourceState) {
        self.bits.store(state.bits(), Ordering::Release);
    }

    pub(crate) fn is_fixed(&self) -> bool {
        self.fixed
    }
}

macro_rules! shared_handle {
    ($handle:ident, $native:ident) => {
        impl<A: $crate::hal::Api> Clone for $handle<A> {
            fn clone(&self) -> Self {
                Self {
                    inner: self.inner.clone(),
                }
            }
        }

        impl<A: $crate::hal::Api> PartialEq for $handle<A> {
            fn eq(&self, other: &Self) -> bool {
                std::sync::Arc::ptr_eq(&self.inner, &other.inner)
            }
        }

        impl<A: $crate::hal::Api> Eq for $handle<A> {}

        impl<A: $crate::hal::Api> $handle<A> {
            /// Number of live references, including the ones held by bind groups and
            /// command buffers.
            pub fn ref_count(&self) -> usize {
                std::sync::Arc::strong_count(&self.inner)
            }

            pub fn label(&self) -> String {
                self.inner.label.lock().clone()
            }

            pub fn set_label(&self, label: &str) {
                $crate::hal::NativeResource::set_label(&*self.inner.raw, label);
                *self.inner.label.lock() = label.to_string();
            }

            /// The backend object behind this handle.
            pub fn native(&self) -> &A::$native {
                &self.inner.raw
            }
        }
    };
}

macro_rules! defer_on_drop {
    ($inner:ident, $variant:ident) => {
        impl<A: $crate::hal::Api> Drop for $inner<A> {
            fn drop(&mut self) {
                // SAFETY: `raw` is not touched again once the inner value is dropping.
                let raw = unsafe { std::mem::ManuallyDrop::take(&mut self.raw) };
                self.shared.deletion.defer($crate::deletion::NativeObject::$variant(raw));
            }
        }
    };
}

pub(crate) use {defer_on_drop, shared_handle};

pub struct Buffer<A: Api> {
    inner: Arc<BufferInner<A>>,
}

struct BufferInner<A: Api> {
    raw: ManuallyDrop<A::Buffer>,
    size: u64,
    usage: BufferUsage,
    cpu_access: CpuAccessMode,
    address: DeviceAddress,
    state: TrackedState,
    label: Mutex<String>,
    shared: Arc<DeviceShared<A>>,
}

shared_handle!(Buffer, Buffer);
defer_on_drop!(BufferInner, Buffer);

impl<A: Api> Buffer<A> {
    pub(crate) fn create(shared: &Arc<DeviceShared<A>>, desc: &BufferDesc, initial: Option<&[u8]>) -> Result<Self> {
        if desc.size == 0 {
            return Err(invalid_descriptor("buffer size is zero"));
        }
        let size = if desc.usage.contains(BufferUsage::CONSTANT) {
            desc.size.next_multiple_of(CONSTANT_BUFFER_ALIGNMENT)
        } else {
            desc.size
        };
        if let Some(data) = initial {
            if desc.cpu_access == CpuAccessMode::Read {
                return Err(invalid_descriptor("read-back buffers cannot take initial data"));
            }
            if data.len() as u64 > size {
                return Err(invalid_descriptor(format!(
                    "{} bytes of initial data for a {} byte buffer",
                    data.len(),
                    size
                )));
            }
        }

        let (state, fixed) = match desc.cpu_access {
            CpuAccessMode::Write => (ResourceState::GENERIC_READ, true),
            CpuAccessMode::Read => (ResourceState::COPY_DEST, true),
            CpuAccessMode::None => (ResourceState::empty(), false),
        };
        let raw = shared
            .raw
            .create_buffer(&hal::BufferDesc {
                label: desc.label,
                size,
                memory: MemoryKind::from(desc.cpu_access),
                allow_unordered_access: desc.usage.contains(BufferUsage::SHADER_WRITE),
                initial_state: state,
            })
            .map_err(creation_failed("buffer"))?;

        if let Some(data) = initial.filter(|d| !d.is_empty()) {
            if desc.cpu_access == CpuAccessMode::Write {
                shared.raw.write_mapped(&raw, 0, data)?;
            } else {
                let mut context = shared.upload.allocate(&shared.raw, data.len() as u64)?;
                context.write(&shared.raw, 0, data)?;
                context.copy_buffer(&raw, 0, 0, data.len() as u64);
                shared.upload.submit(&shared.queues, context);
            }
        }

        let address = shared.raw.buffer_device_address(&raw);
        Ok(Self {
            inner: Arc::new(BufferInner {
                raw: ManuallyDrop::new(raw),
                size,
                usage: desc.usage,
                cpu_access: desc.cpu_access,
                address,
                state: TrackedState::new(state, fixed),
                label: Mutex::new(desc.label.unwrap_or_default().to_string()),
                shared: shared.clone(),
            }),
        })
    }

    /// Allocated size; constant buffers are padded to 256 bytes.
    pub fn size(&self) -> u64 {
        self.inner.size
    }

    pub fn usage(&self) -> BufferUsage {
        self.inner.usage
    }

    pub fn cpu_access(&self) -> CpuAccessMode {
        self.inner.cpu_access
    }

    pub fn device_address(&self) -> DeviceAddress {
        self.inner.address
    }

    /// Copy `data` into a CPU-writable buffer.
    pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
        if self.inner.cpu_access != CpuAccessMode::Write {
            return Err(Error::InvalidDescriptor("buffer is not CPU-writable".into()));
        }
        self.check_range(offset, data.len())?;
        self.inner.shared.raw.write_mapped(&self.inner.raw, offset, data)?;
        Ok(())
    }

    /// Copy out of a mapped buffer.
    pub fn read(&self, offset: u64, out: &mut [u8]) -> Result<()> {
        if self.inner.cpu_access == CpuAccessMode::None {
            return Err(Error::InvalidDescriptor("buffer is not CPU-visible".into()));
        }
        self.check_range(offset, out.len())?;
        self.inner.shared.raw.read_mapped(&self.inner.raw, offset, out)?;
        Ok(())
    }

    fn check_range(&self, offset: u64, len: usize) -> Result<()> {
        match offset.checked_add(len as u64) {
            Some(end) if end <= self.inner.size => Ok(()),
            _ => Err(Error::InvalidDescriptor(format!(
                "range {}+{} outside {} byte buffer",
                offset, len, self.inner.size
            ))),
        }
    }

    pub(crate) fn state(&self) -> &TrackedState {
        &self.inner.state
    }
}

impl<A: Api> std::fmt::Debug for Buffer<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("label", &*self.inner.label.lock())
            .field("size", &self.inner.size)
            .field("usage", &self.inner.usage)
            .field("cpu_access", &self.inner.cpu_access)
            .finish()
    }
}

/// Lazily created render-target and depth-stencil views, keyed by (mip, slice).
#[derive(Debug, Default)]
struct ViewCache {
    rtv: SmallVec<[(u32, u32, u32); 4]>,
    dsv: SmallVec<[(u32, u32, u32); 2]>,
}

pub struct Texture<A: Api> {
    inner: Arc<TextureInner<A>>,
}

struct TextureInner<A: Api> {
    raw: ManuallyDrop<A::Texture>,
    desc: TextureDesc,
    state: TrackedState,
    views: Mutex<ViewCache>,
    label: Mutex<String>,
    // Set on swapchain images retired by a resize, which happens on an idle device.
    destroy_now: AtomicBool,
    shared: Arc<DeviceShared<A>>,
}

shared_handle!(Texture, Texture);

impl<A: Api> Drop for TextureInner<A> {
    fn drop(&mut self) {
        let views = self.views.get_mut();
        for &(_, _, index) in &views.rtv {
            self.shared.rtv_heap.release(index, 1);
        }
        for &(_, _, index) in &views.dsv {
            self.shared.dsv_heap.release(index, 1);
        }
        // SAFETY: `raw` is not touched again once the inner value is dropping.
        let raw = unsafe { ManuallyDrop::take(&mut self.raw) };
        if self.destroy_now.load(Ordering::Acquire) {
            drop(raw);
        } else {
            self.shared.deletion.defer(NativeObject::Texture(raw));
        }
    }
}

/// State a texture without initial data is created in.
fn initial_texture_state(desc: &TextureDesc) -> ResourceState {
    let mut state = ResourceState::empty();
    if desc.usage.contains(TextureUsage::RENDER_TARGET) {
        state |= if desc.format.is_depth_stencil() {
            ResourceState::DEPTH_WRITE
        } else {
            ResourceState::RENDER_TARGET
        };
    }
    if desc.usage.contains(TextureUsage::SHADER_READ) {
        state |= ResourceState::SHADER_RESOURCE;
    }
    if desc.usage.contains(TextureUsage::SHADER_WRITE) {
        state |= ResourceState::UNORDERED_ACCESS;
    }
    state
}

impl<A: Api> Texture<A> {
    pub(crate) fn create(
        shared: &Arc<DeviceShared<A>>,
        desc: &TextureDesc,
        initial: Option<&[TextureData<'_>]>,
    ) -> Result<Self> {
        if desc.width == 0 || desc.height == 0 || desc.depth_or_array_layers == 0 {
            return Err(invalid_descriptor(format!(
                "texture extent {}x{}x{}",
                desc.width, desc.height, desc.depth_or_array_layers
            )));
        }
        if desc.format == TextureFormat::Undefined {
            return Err(invalid_descriptor("texture format is undefined"));
        }
        let mut desc = desc.clone();
        if desc.mip_level_count == 0 {
            let depth = match desc.dimension {
                TextureDimension::D3 => desc.depth_or_array_layers,
                _ => 1,
            };
            desc.mip_level_count = crate::types::mip_level_count(desc.width, desc.height, depth, 1);
        }
        desc.sample_count = desc.sample_count.max(1);
        if let Some(data) = initial {
            if data.len() != desc.subresource_count() as usize {
                return Err(invalid_descriptor(format!(
                    "{} initial data entries for {} subresources",
                    data.len(),
                    desc.subresource_count()
                )));
            }
        }

        // Textures with initial data start common so the copy queue can write them.
        let state = match initial {
            Some(_) => ResourceState::empty(),
            None => initial_texture_state(&desc),
        };
        let raw = shared
            .raw
            .create_texture(&desc, state)
            .map_err(creation_failed("texture"))?;
        if let Some(data) = initial {
            stage_texture_data(shared, &raw, data)?;
        }
        Ok(Self::wrap(shared, raw, desc, state))
    }

    /// Wrap a swapchain image.
    pub(crate) fn from_backbuffer(shared: &Arc<DeviceShared<A>>, raw: A::Texture, desc: TextureDesc) -> Self {
        Self::wrap(shared, raw, desc, ResourceState::PRESENT)
    }

    fn wrap(shared: &Arc<DeviceShared<A>>, raw: A::Texture, desc: TextureDesc, state: ResourceState) -> Self {
        Self {
            inner: Arc::new(TextureInner {
                raw: ManuallyDrop::new(raw),
                label: Mutex::new(desc.label.unwrap_or_default().to_string()),
                desc,
                state: TrackedState::new(state, false),
                views: Mutex::new(ViewCache::default()),
                destroy_now: AtomicBool::new(false),
                shared: shared.clone(),
            }),
        }
    }

    /// Drop a swapchain image after the device went idle. The native texture is destroyed
    /// on the spot unless another handle still references it, in which case the last
    /// release defers it as usual.
    pub(crate) fn retire_backbuffer(self) {
        if Arc::strong_count(&self.inner) == 1 {
            self.inner.destroy_now.store(true, Ordering::Release);
        }
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.inner.desc
    }

    pub fn dimension(&self) -> TextureDimension {
        self.inner.desc.dimension
    }

    pub fn format(&self) -> TextureFormat {
        self.inner.desc.format
    }

    pub fn usage(&self) -> TextureUsage {
        self.inner.desc.usage
    }

    pub fn width(&self) -> u32 {
        self.inner.desc.width
    }

    pub fn height(&self) -> u32 {
        self.inner.desc.height
    }

    pub fn depth_or_array_layers(&self) -> u32 {
        self.inner.desc.depth_or_array_layers
    }

    pub fn mip_level_count(&self) -> u32 {
        self.inner.desc.mip_level_count
    }

    pub fn sample_count(&self) -> u32 {
        self.inner.desc.sample_count
    }

    pub(crate) fn state(&self) -> &TrackedState {
        &self.inner.state
    }

    /// Render-target view slot for (mip, slice), created on first use.
    pub(crate) fn rtv(&self, mip_level: u32, slice: u32) -> Result<u32> {
        let shared = &self.inner.shared;
        let mut views = self.inner.views.lock();
        if let Some(&(_, _, index)) = views.rtv.iter().find(|(m, s, _)| *m == mip_level && *s == slice) {
            return Ok(index);
        }
        let index = shared.rtv_heap.allocate(&shared.raw, &shared.deletion, 1)?;
        shared.rtv_heap.write(
            &shared.raw,
            index,
            &Descriptor::RenderTarget {
                texture: &self.inner.raw,
                mip_level,
                slice,
            },
        );
        views.rtv.push((mip_level, slice, index));
        Ok(index)
    }

    /// Depth-stencil view slot for (mip, slice), created on first use.
    pub(crate) fn dsv(&self, mip_level: u32, slice: u32) -> Result<u32> {
        debug_assert!(
            self.inner.desc.dimension != TextureDimension::D3,
            "3D textures cannot be depth-stencil targets"
        );
        let shared = &self.inner.shared;
        let mut views = self.inner.views.lock();
        if let Some(&(_, _, index)) = views.dsv.iter().find(|(m, s, _)| *m == mip_level && *s == slice) {
            return Ok(index);
        }
        let index = shared.dsv_heap.allocate(&shared.raw, &shared.deletion, 1)?;
        shared.dsv_heap.write(
            &shared.raw,
            index,
            &Descriptor::DepthStencil {
                texture: &self.inner.raw,
                mip_level,
                slice,
            },
        );
        views.dsv.push((mip_level, slice, index));
        Ok(index)
    }
}

impl<A: Api> std::fmt::Debug for Texture<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let desc = &self.inner.desc;
        f.debug_struct("Texture")
            .field("label", &*self.inner.label.lock())
            .field("format", &desc.format)
            .field("extent", &(desc.width, desc.height, desc.depth_or_array_layers))
            .field("mips", &desc.mip_level_count)
            .finish()
    }
}

/// Copy per-subresource data into one staging buffer laid out by the backend's
/// footprints, then record one copy per subresource.
fn stage_texture_data<A: Api>(shared: &DeviceShared<A>, raw: &A::Texture, data: &[TextureData<'_>]) -> Result<()> {
    let (footprints, total) = shared.raw.copyable_footprints(raw);
    let mut context = shared.upload.allocate(&shared.raw, total)?;
    for (subresource, (footprint, source)) in footprints.iter().zip(data).enumerate() {
        let rows = footprint.num_rows as u64;
        let row_pitch = match source.row_pitch {
            0 => footprint.row_size,
            pitch => pitch as u64,
        };
        let slice_pitch = match source.slice_pitch {
            0 => row_pitch * rows,
            pitch => pitch as u64,
        };
        for z in 0..footprint.depth as u64 {
            for row in 0..rows {
                let start = (z * slice_pitch + row * row_pitch) as usize;
                let end = start + footprint.row_size as usize;
                let bytes = source.data.get(start..end).ok_or_else(|| {
                    invalid_descriptor(format!(
                        "subresource {} data is {} bytes, row {} needs {}",
                        subresource,
                        source.data.len(),
                        row,
                        end
                    ))
                })?;
                let offset = footprint.offset + (z * rows + row) * footprint.row_pitch as u64;
                context.write(&shared.raw, offset, bytes)?;
            }
        }
        context.copy_buffer_to_texture(raw, subresource as u32, footprint);
    }
    shared.upload.submit(&shared.queues, context);
    Ok(())
}

pub struct Sampler<A: Api> {
    inner: Arc<SamplerInner<A>>,
}

struct SamplerInner<A: Api> {
    raw: ManuallyDrop<A::Sampler>,
    desc: SamplerDesc,
    label: Mutex<String>,
    shared: Arc<DeviceShared<A>>,
}

shared_handle!(Sampler, Sampler);
defer_on_drop!(SamplerInner, Sampler);

impl<A: Api> Sampler<A> {
    pub(crate) fn create(shared: &Arc<DeviceShared<A>>, desc: &SamplerDesc) -> Result<Self> {
        let raw = shared.raw.create_sampler(desc).map_err(creation_failed("sampler"))?;
        Ok(Self {
            inner: Arc::new(SamplerInner {
                raw: ManuallyDrop::new(raw),
                desc: *desc,
                label: Mutex::new(desc.label.unwrap_or_default().to_string()),
                shared: shared.clone(),
            }),
        })
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.inner.desc
    }
}

impl<A: Api> std::fmt::Debug for Sampler<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler").field("desc", &self.inner.desc).finish()
    }
}

pub struct QueryHeap<A: Api> {
    inner: Arc<QueryHeapInner<A>>,
}

struct QueryHeapInner<A: Api> {
    raw: ManuallyDrop<A::QueryHeap>,
    query_type: QueryType,
    count: u32,
    label: Mutex<String>,
    shared: Arc<DeviceShared<A>>,
}

shared_handle!(QueryHeap, QueryHeap);
defer_on_drop!(QueryHeapInner, QueryHeap);

impl<A: Api> QueryHeap<A> {
    pub(crate) fn create(shared: &Arc<DeviceShared<A>>, desc: &QueryHeapDesc) -> Result<Self> {
        if desc.count == 0 {
            return Err(invalid_descriptor("query heap with zero queries"));
        }
        let required = match desc.query_type {
            QueryType::Timestamp => Features::TIMESTAMP_QUERY,
            QueryType::PipelineStatistics => Features::PIPELINE_STATISTICS_QUERY,
            QueryType::Occlusion | QueryType::BinaryOcclusion => Features::empty(),
        };
        if !shared.features.contains(required) {
            return Err(Error::Unsupported(format!("{:?} queries", desc.query_type)));
        }
        let raw = shared
            .raw
            .create_query_heap(desc)
            .map_err(creation_failed("query heap"))?;
        Ok(Self {
            inner: Arc::new(QueryHeapInner {
                raw: ManuallyDrop::new(raw),
                query_type: desc.query_type,
                count: desc.count,
                label: Mutex::new(desc.label.unwrap_or_default().to_string()),
                shared: shared.clone(),
            }),
        })
    }

    pub fn query_type(&self) -> QueryType {
        self.inner.query_type
    }

    pub fn count(&self) -> u32 {
        self.inner.count
    }
}

impl<A: Api> std::fmt::Debug for QueryHeap<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryHeap")
            .field("query_type", &self.inner.query_type)
            .field("count", &self.inner.count)
            .finish()
    }
}

pub struct RenderPipelineDesc<'a, A: Api> {
    pub label: Option<&'a str>,
    pub layout: &'a PipelineLayout<A>,
    pub shader_stages: &'a [ShaderStageDesc],
    pub vertex_layouts: &'a [VertexBufferLayout],
    pub blend: BlendState,
    pub rasterizer: RasterizerState,
    pub depth_stencil: DepthStencilState,
    pub topology: PrimitiveTopology,
    pub patch_control_points: u32,
    pub color_formats: &'a [TextureFormat],
    pub depth_stencil_format: TextureFormat,
    pub sample_count: u32,
}

impl<'a, A: Api> RenderPipelineDesc<'a, A> {
    /// Triangle list, no vertex input, no attachments.
    pub fn new(layout: &'a PipelineLayout<A>) -> Self {
        Self {
            label: None,
            layout,
            shader_stages: &[],
            vertex_layouts: &[],
            blend: BlendState::default(),
            rasterizer: RasterizerState::default(),
            depth_stencil: DepthStencilState::default(),
            topology: PrimitiveTopology::TriangleList,
            patch_control_points: 0,
            color_formats: &[],
            depth_stencil_format: TextureFormat::Undefined,
            sample_count: 1,
        }
    }
}

pub struct ComputePipelineDesc<'a, A: Api> {
    pub label: Option<&'a str>,
    pub layout: &'a PipelineLayout<A>,
    pub shader: &'a ShaderStageDesc,
}

pub struct Pipeline<A: Api> {
    inner: Arc<PipelineInner<A>>,
}

struct PipelineInner<A: Api> {
    raw: ManuallyDrop<A::Pipeline>,
    pipeline_type: PipelineType,
    layout: PipelineLayout<A>,
    topology: PrimitiveTopology,
    strides: SmallVec<[u32; 4]>,
    label: Mutex<String>,
    shared: Arc<DeviceShared<A>>,
}

shared_handle!(Pipeline, Pipeline);
defer_on_drop!(PipelineInner, Pipeline);

impl<A: Api> Pipeline<A> {
    pub(crate) fn create_render(shared: &Arc<DeviceShared<A>>, desc: &RenderPipelineDesc<'_, A>) -> Result<Self> {
        if desc.vertex_layouts.len() > MAX_VERTEX_BUFFERS {
            return Err(invalid_descriptor(format!("{} vertex buffers", desc.vertex_layouts.len())));
        }
        let attributes: usize = desc.vertex_layouts.iter().map(|l| l.attributes.len()).sum();
        if attributes > MAX_VERTEX_ATTRIBUTES {
            return Err(invalid_descriptor(format!("{} vertex attributes", attributes)));
        }
        if desc.color_formats.len() > MAX_COLOR_ATTACHMENTS {
            return Err(invalid_descriptor(format!("{} color attachments", desc.color_formats.len())));
        }
        if desc.topology == PrimitiveTopology::PatchList && desc.patch_control_points == 0 {
            return Err(invalid_descriptor("patch list without control points"));
        }

        let raw = shared
            .raw
            .create_render_pipeline(&hal::RenderPipelineDesc {
                label: desc.label,
                layout: desc.layout.native(),
                shader_stages: desc.shader_stages,
                vertex_layouts: desc.vertex_layouts,
                blend: &desc.blend,
                rasterizer: &desc.rasterizer,
                depth_stencil: &desc.depth_stencil,
                topology: desc.topology,
                patch_control_points: desc.patch_control_points,
                color_formats: desc.color_formats,
                depth_stencil_format: desc.depth_stencil_format,
                sample_count: desc.sample_count.max(1),
            })
            .map_err(creation_failed("render pipeline"))?;
        let strides = desc.vertex_layouts.iter().map(|l| l.stride).collect();
        Ok(Self::wrap(
            shared,
            raw,
            PipelineType::Render,
            desc.layout,
            desc.topology,
            strides,
            desc.label,
        ))
    }

    pub(crate) fn create_compute(shared: &Arc<DeviceShared<A>>, desc: &ComputePipelineDesc<'_, A>) -> Result<Self> {
        let raw = shared
            .raw
            .create_compute_pipeline(&hal::ComputePipelineDesc {
                label: desc.label,
                layout: desc.layout.native(),
                shader: desc.shader,
            })
            .map_err(creation_failed("compute pipeline"))?;
        Ok(Self::wrap(
            shared,
            raw,
            PipelineType::Compute,
            desc.layout,
            PrimitiveTopology::default(),
            SmallVec::new(),
            desc.label,
        ))
    }

    pub(crate) fn create_ray_tracing(
        shared: &Arc<DeviceShared<A>>,
        layout: &PipelineLayout<A>,
        label: Option<&str>,
    ) -> Result<Self> {
        if !shared.features.contains(Features::RAY_TRACING) {
            return Err(Error::Unsupported("ray tracing pipelines".into()));
        }
        let raw = shared
            .raw
            .create_ray_tracing_pipeline(layout.native(), label)
            .map_err(creation_failed("ray tracing pipeline"))?;
        Ok(Self::wrap(
            shared,
            raw,
            PipelineType::RayTracing,
            layout,
            PrimitiveTopology::default(),
            SmallVec::new(),
            label,
        ))
    }

    fn wrap(
        shared: &Arc<DeviceShared<A>>,
        raw: A::Pipeline,
        pipeline_type: PipelineType,
        layout: &PipelineLayout<A>,
        topology: PrimitiveTopology,
        strides: SmallVec<[u32; 4]>,
        label: Option<&str>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                raw: ManuallyDrop::new(raw),
                pipeline_type,
                layout: layout.clone(),
                topology,
                strides,
                label: Mutex::new(label.unwrap_or_default().to_string()),
                shared: shared.clone(),
            }),
        }
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.inner.pipeline_type
    }

    pub fn layout(&self) -> &PipelineLayout<A> {
        &self.inner.layout
    }

    pub fn topology(&self) -> PrimitiveTopology {
        self.inner.topology
    }

    /// Stride of each vertex buffer slot the pipeline reads.
    pub fn vertex_strides(&self) -> &[u32] {
        &self.inner.strides
    }
}

impl<A: Api> std::fmt::Debug for Pipeline<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("label", &*self.inner.label.lock())
            .field("type", &self.inner.pipeline_type)
            .field("topology", &self.inner.topology)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::hal::NativeResource;
    use crate::null::{self, NullConfig, ObjectKind};
    use crate::types::TextureUsage;

    fn device() -> Device<null::Api> {
        Device::with_null(NullConfig::default()).unwrap()
    }

    #[test]
    fn initial_texture_states_follow_usage() {
        let color = TextureDesc {
            usage: TextureUsage::RENDER_TARGET | TextureUsage::SHADER_READ,
            ..Default::default()
        };
        assert_eq!(
            initial_texture_state(&color),
            ResourceState::RENDER_TARGET | ResourceState::SHADER_RESOURCE
        );
        let depth = TextureDesc {
            format: TextureFormat::Depth32Float,
            usage: TextureUsage::RENDER_TARGET,
            ..Default::default()
        };
        assert_eq!(initial_texture_state(&depth), ResourceState::DEPTH_WRITE);
        let storage = TextureDesc {
            usage: TextureUsage::SHADER_WRITE,
            ..Default::default()
        };
        assert_eq!(initial_texture_state(&storage), ResourceState::UNORDERED_ACCESS);
    }

    #[test]
    fn constant_buffers_are_padded() {
        let device = device();
        let buffer = device
            .create_buffer(
                &BufferDesc {
                    size: 100,
                    usage: BufferUsage::CONSTANT,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(buffer.size(), 256);
        assert_eq!(buffer.native().size(), 256);
    }

    #[test]
    fn cpu_access_fixes_the_state() {
        let device = device();
        let upload = device
            .create_buffer(
                &BufferDesc {
                    size: 16,
                    cpu_access: CpuAccessMode::Write,
                    ..Default::default()
                },
                Some(&[9; 16]),
            )
            .unwrap();
        assert!(upload.state().is_fixed());
        assert_eq!(upload.state().get(), ResourceState::GENERIC_READ);
        let mut out = [0u8; 4];
        upload.read(4, &mut out).unwrap();
        assert_eq!(out, [9; 4]);

        let readback = device
            .create_buffer(
                &BufferDesc {
                    size: 16,
                    cpu_access: CpuAccessMode::Read,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(readback.state().get(), ResourceState::COPY_DEST);
        assert!(readback.write(0, &[1]).is_err());
    }

    #[test]
    fn readback_rejects_initial_data() {
        let device = device();
        let result = device.create_buffer(
            &BufferDesc {
                size: 16,
                cpu_access: CpuAccessMode::Read,
                ..Default::default()
            },
            Some(&[0; 16]),
        );
        assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
    }

    #[test]
    fn clones_share_one_native_object() {
        let device = device();
        let buffer = device
            .create_buffer(
                &BufferDesc {
                    size: 64,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let id = buffer.native().id();
        let other = buffer.clone();
        assert_eq!(buffer.ref_count(), 2);
        assert_eq!(buffer, other);
        other.set_label("vertices");
        assert_eq!(buffer.label(), "vertices");
        assert_eq!(buffer.native().label(), "vertices");
        drop(other);
        drop(buffer);
        // Released objects wait for the in-flight window.
        assert!(!device.null_device().was_destroyed(ObjectKind::Buffer, id));
    }

    #[test]
    fn texture_views_are_cached_and_released() {
        let device = device();
        let texture = device
            .create_texture(
                &TextureDesc {
                    usage: TextureUsage::RENDER_TARGET,
                    width: 64,
                    height: 64,
                    mip_level_count: 2,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let a = texture.rtv(0, 0).unwrap();
        assert_eq!(texture.rtv(0, 0).unwrap(), a);
        let b = texture.rtv(1, 0).unwrap();
        assert_ne!(a, b);
        assert_eq!(device.shared().rtv_heap.num_allocated(), 2);
        drop(texture);
        assert_eq!(device.shared().rtv_heap.num_allocated(), 0);
    }

    #[test]
    fn zero_mip_count_means_full_chain() {
        let device = device();
        let texture = device
            .create_texture(
                &TextureDesc {
                    width: 256,
                    height: 64,
                    mip_level_count: 0,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(texture.mip_level_count(), 9);
    }

    #[test]
    fn texture_data_is_staged_per_subresource() {
        let device = device();
        let pixels: Vec<u8> = (0..16u8).collect();
        let small = [0xAAu8; 4];
        let texture = device
            .create_texture(
                &TextureDesc {
                    width: 2,
                    height: 2,
                    mip_level_count: 2,
                    ..Default::default()
                },
                Some(&[
                    TextureData {
                        data: &pixels,
                        row_pitch: 8,
                        slice_pitch: 16,
                    },
                    TextureData {
                        data: &small,
                        row_pitch: 4,
                        slice_pitch: 4,
                    },
                ]),
            )
            .unwrap();
        assert_eq!(texture.state().get(), ResourceState::empty());
        let null = device.null_device();
        assert_eq!(null.texture_contents(texture.native(), 0), pixels);
        assert_eq!(null.texture_contents(texture.native(), 1), small.to_vec());
    }

    #[test]
    fn short_texture_data_is_rejected() {
        let device = device();
        let result = device.create_texture(
            &TextureDesc {
                width: 4,
                height: 4,
                ..Default::default()
            },
            Some(&[TextureData {
                data: &[0; 8],
                row_pitch: 16,
                slice_pitch: 64,
            }]),
        );
        assert!(matches!(result, Err(Error::InvalidDescriptor(_))));
    }
}
