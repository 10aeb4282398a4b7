//! Bind group layouts, pipeline layouts and bind groups.
//!
//! A bind group layout splits its entries into descriptor ranges: one table for CBV/SRV/UAV
//! slots and one for samplers. A pipeline layout turns each group's tables into root
//! descriptor-table parameters, followed by the push constants. A bind group owns one
//! allocator run per non-empty table, filled from its entries.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptor::DescriptorAllocator;
use crate::device::DeviceShared;
use crate::error::{creation_failed, invalid_descriptor, Result};
use crate::hal::{self, Api, DescriptorHeapKind, DescriptorRange, Device as _, RangeKind, RootParameter, ViewKind};
use crate::logging::vgpu_warn;
use crate::resource::{defer_on_drop, shared_handle, Buffer, Sampler, Texture};
use crate::types::{BindGroupLayoutEntry, DescriptorType, PushConstantRange, ShaderStages};
use crate::{CONSTANT_BUFFER_ALIGNMENT, MAX_BIND_GROUPS, WHOLE_SIZE};

/// Range kind a descriptor type binds through.
pub fn range_kind(descriptor_type: DescriptorType) -> RangeKind {
    match descriptor_type {
        DescriptorType::Sampler => RangeKind::Sampler,
        DescriptorType::SampledTexture
        | DescriptorType::ReadOnlyStorageTexture
        | DescriptorType::ReadOnlyStorageBuffer => RangeKind::Srv,
        DescriptorType::StorageTexture | DescriptorType::StorageBuffer => RangeKind::Uav,
        DescriptorType::ConstantBuffer | DescriptorType::DynamicConstantBuffer => RangeKind::Cbv,
    }
}

fn null_view(kind: RangeKind) -> ViewKind {
    match kind {
        RangeKind::Cbv => ViewKind::ConstantBuffer,
        RangeKind::Srv => ViewKind::ShaderResource,
        RangeKind::Uav => ViewKind::UnorderedAccess,
        RangeKind::Sampler => ViewKind::Sampler,
    }
}

/// A run of consecutive bindings of one descriptor type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRange {
    pub kind: RangeKind,
    pub descriptor_type: DescriptorType,
    pub base_binding: u32,
    pub count: u32,
    /// Slot offset from the start of the table.
    pub offset: u32,
}

#[derive(Debug, Clone)]
pub struct BindGroupLayoutDesc<'a> {
    pub label: Option<&'a str>,
    pub entries: &'a [BindGroupLayoutEntry],
}

#[derive(Clone)]
pub struct BindGroupLayout {
    inner: Arc<BindGroupLayoutInner>,
}

struct BindGroupLayoutInner {
    entries: Vec<BindGroupLayoutEntry>,
    resource_ranges: Vec<LayoutRange>,
    sampler_ranges: Vec<LayoutRange>,
    resource_table_size: u32,
    sampler_table_size: u32,
    label: Mutex<String>,
}

fn push_entry(ranges: &mut Vec<LayoutRange>, total: &mut u32, entry: &BindGroupLayoutEntry) {
    match ranges.last_mut() {
        Some(last)
            if last.descriptor_type == entry.descriptor_type && last.base_binding + last.count == entry.binding =>
        {
            last.count += entry.count;
        }
        _ => ranges.push(LayoutRange {
            kind: range_kind(entry.descriptor_type),
            descriptor_type: entry.descriptor_type,
            base_binding: entry.binding,
            count: entry.count,
            offset: *total,
        }),
    }
    *total += entry.count;
}

impl BindGroupLayout {
    pub(crate) fn new(desc: &BindGroupLayoutDesc<'_>) -> Result<Self> {
        let mut resource_ranges = Vec::new();
        let mut sampler_ranges = Vec::new();
        let mut resource_table_size = 0;
        let mut sampler_table_size = 0;
        for entry in desc.entries {
            if entry.count == 0 {
                return Err(invalid_descriptor(format!("binding {} has zero descriptors", entry.binding)));
            }
            if entry.descriptor_type == DescriptorType::Sampler {
                push_entry(&mut sampler_ranges, &mut sampler_table_size, entry);
            } else {
                push_entry(&mut resource_ranges, &mut resource_table_size, entry);
            }
        }
        Ok(Self {
            inner: Arc::new(BindGroupLayoutInner {
                entries: desc.entries.to_vec(),
                resource_ranges,
                sampler_ranges,
                resource_table_size,
                sampler_table_size,
                label: Mutex::new(desc.label.unwrap_or_default().to_string()),
            }),
        })
    }

    pub fn entries(&self) -> &[BindGroupLayoutEntry] {
        &self.inner.entries
    }

    pub fn resource_ranges(&self) -> &[LayoutRange] {
        &self.inner.resource_ranges
    }

    pub fn sampler_ranges(&self) -> &[LayoutRange] {
        &self.inner.sampler_ranges
    }

    /// Slots in the CBV/SRV/UAV table.
    pub fn resource_table_size(&self) -> u32 {
        self.inner.resource_table_size
    }

    pub fn sampler_table_size(&self) -> u32 {
        self.inner.sampler_table_size
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn label(&self) -> String {
        self.inner.label.lock().clone()
    }

    pub fn set_label(&self, label: &str) {
        *self.inner.label.lock() = label.to_string();
    }
}

impl PartialEq for BindGroupLayout {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for BindGroupLayout {}

impl std::fmt::Debug for BindGroupLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindGroupLayout")
            .field("resource_ranges", &self.inner.resource_ranges)
            .field("sampler_ranges", &self.inner.sampler_ranges)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineLayoutDesc<'a> {
    pub label: Option<&'a str>,
    pub bind_group_layouts: &'a [BindGroupLayout],
    pub push_constant_ranges: &'a [PushConstantRange],
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RootSignature {
    parameters: Vec<RootParameter>,
    resource_root_index: Vec<Option<u32>>,
    sampler_root_index: Vec<Option<u32>>,
    push_constants_base_index: u32,
}

fn table(ranges: &[LayoutRange], space: u32) -> RootParameter {
    RootParameter::DescriptorTable {
        ranges: ranges
            .iter()
            .map(|r| DescriptorRange {
                kind: r.kind,
                base_register: r.base_binding,
                register_space: space,
                count: r.count,
                offset: r.offset,
            })
            .collect(),
        visibility: ShaderStages::empty(),
    }
}

fn root_signature(layouts: &[BindGroupLayout], push_constants: &[PushConstantRange]) -> RootSignature {
    let mut parameters = Vec::new();
    let mut resource_root_index = Vec::with_capacity(layouts.len());
    let mut sampler_root_index = Vec::with_capacity(layouts.len());
    for (group, layout) in layouts.iter().enumerate() {
        let space = group as u32;
        resource_root_index.push((layout.resource_table_size() > 0).then(|| {
            parameters.push(table(layout.resource_ranges(), space));
            parameters.len() as u32 - 1
        }));
        sampler_root_index.push((layout.sampler_table_size() > 0).then(|| {
            parameters.push(table(layout.sampler_ranges(), space));
            parameters.len() as u32 - 1
        }));
    }
    let push_constants_base_index = parameters.len() as u32;
    for range in push_constants {
        parameters.push(RootParameter::Constants {
            shader_register: range.shader_register,
            register_space: 0,
            num_values: range.size / 4,
            visibility: range.visibility,
        });
    }
    RootSignature {
        parameters,
        resource_root_index,
        sampler_root_index,
        push_constants_base_index,
    }
}

pub struct PipelineLayout<A: Api> {
    inner: Arc<PipelineLayoutInner<A>>,
}

struct PipelineLayoutInner<A: Api> {
    raw: ManuallyDrop<A::PipelineLayout>,
    bind_group_layouts: Vec<BindGroupLayout>,
    push_constant_ranges: Vec<PushConstantRange>,
    signature: RootSignature,
    label: Mutex<String>,
    shared: Arc<DeviceShared<A>>,
}

shared_handle!(PipelineLayout, PipelineLayout);
defer_on_drop!(PipelineLayoutInner, PipelineLayout);

impl<A: Api> PipelineLayout<A> {
    pub(crate) fn create(shared: &Arc<DeviceShared<A>>, desc: &PipelineLayoutDesc<'_>) -> Result<Self> {
        if desc.bind_group_layouts.len() > MAX_BIND_GROUPS {
            return Err(invalid_descriptor(format!(
                "{} bind group layouts, at most {} allowed",
                desc.bind_group_layouts.len(),
                MAX_BIND_GROUPS
            )));
        }
        if let Some(range) = desc.push_constant_ranges.iter().find(|r| r.size % 4 != 0) {
            return Err(invalid_descriptor(format!(
                "push constant size {} is not a multiple of 4",
                range.size
            )));
        }
        let signature = root_signature(desc.bind_group_layouts, desc.push_constant_ranges);
        let raw = shared
            .raw
            .create_pipeline_layout(&hal::PipelineLayoutDesc {
                label: desc.label,
                parameters: &signature.parameters,
            })
            .map_err(creation_failed("pipeline layout"))?;
        Ok(Self {
            inner: Arc::new(PipelineLayoutInner {
                raw: ManuallyDrop::new(raw),
                bind_group_layouts: desc.bind_group_layouts.to_vec(),
                push_constant_ranges: desc.push_constant_ranges.to_vec(),
                signature,
                label: Mutex::new(desc.label.unwrap_or_default().to_string()),
                shared: shared.clone(),
            }),
        })
    }

    pub fn bind_group_layouts(&self) -> &[BindGroupLayout] {
        &self.inner.bind_group_layouts
    }

    pub fn push_constant_ranges(&self) -> &[PushConstantRange] {
        &self.inner.push_constant_ranges
    }

    /// Root parameter of `group`'s CBV/SRV/UAV table, if it has one.
    pub fn resource_root_index(&self, group: usize) -> Option<u32> {
        self.inner.signature.resource_root_index.get(group).copied().flatten()
    }

    pub fn sampler_root_index(&self, group: usize) -> Option<u32> {
        self.inner.signature.sampler_root_index.get(group).copied().flatten()
    }

    /// Root parameter of the first push-constant range.
    pub fn push_constants_base_index(&self) -> u32 {
        self.inner.signature.push_constants_base_index
    }

    pub fn root_parameters(&self) -> &[RootParameter] {
        &self.inner.signature.parameters
    }
}

impl<A: Api> std::fmt::Debug for PipelineLayout<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayout")
            .field("label", &*self.inner.label.lock())
            .field("groups", &self.inner.bind_group_layouts.len())
            .field("push_constants_base_index", &self.inner.signature.push_constants_base_index)
            .finish()
    }
}

/// What a bind group entry points at.
pub enum BindingResource<A: Api> {
    /// `size` of 0 or [`WHOLE_SIZE`] binds the rest of the buffer.
    Buffer { buffer: Buffer<A>, offset: u64, size: u64 },
    Texture(Texture<A>),
    Sampler(Sampler<A>),
}

impl<A: Api> Clone for BindingResource<A> {
    fn clone(&self) -> Self {
        match self {
            BindingResource::Buffer { buffer, offset, size } => BindingResource::Buffer {
                buffer: buffer.clone(),
                offset: *offset,
                size: *size,
            },
            BindingResource::Texture(texture) => BindingResource::Texture(texture.clone()),
            BindingResource::Sampler(sampler) => BindingResource::Sampler(sampler.clone()),
        }
    }
}

impl<A: Api> std::fmt::Debug for BindingResource<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingResource::Buffer { buffer, offset, size } => f
                .debug_struct("Buffer")
                .field("buffer", buffer)
                .field("offset", offset)
                .field("size", size)
                .finish(),
            BindingResource::Texture(texture) => f.debug_tuple("Texture").field(texture).finish(),
            BindingResource::Sampler(sampler) => f.debug_tuple("Sampler").field(sampler).finish(),
        }
    }
}

pub struct BindGroupEntry<A: Api> {
    pub binding: u32,
    pub array_element: u32,
    pub resource: BindingResource<A>,
}

impl<A: Api> BindGroupEntry<A> {
    pub fn buffer(binding: u32, buffer: &Buffer<A>, offset: u64, size: u64) -> Self {
        Self {
            binding,
            array_element: 0,
            resource: BindingResource::Buffer {
                buffer: buffer.clone(),
                offset,
                size,
            },
        }
    }

    pub fn texture(binding: u32, texture: &Texture<A>) -> Self {
        Self {
            binding,
            array_element: 0,
            resource: BindingResource::Texture(texture.clone()),
        }
    }

    pub fn sampler(binding: u32, sampler: &Sampler<A>) -> Self {
        Self {
            binding,
            array_element: 0,
            resource: BindingResource::Sampler(sampler.clone()),
        }
    }

    /// Target element `index` of an array binding.
    pub fn at(mut self, index: u32) -> Self {
        self.array_element = index;
        self
    }

    fn register(&self) -> u32 {
        self.binding + self.array_element
    }
}

impl<A: Api> Clone for BindGroupEntry<A> {
    fn clone(&self) -> Self {
        Self {
            binding: self.binding,
            array_element: self.array_element,
            resource: self.resource.clone(),
        }
    }
}

impl<A: Api> std::fmt::Debug for BindGroupEntry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindGroupEntry")
            .field("binding", &self.binding)
            .field("array_element", &self.array_element)
            .field("resource", &self.resource)
            .finish()
    }
}

pub struct BindGroupDesc<'a, A: Api> {
    pub label: Option<&'a str>,
    pub entries: &'a [BindGroupEntry<A>],
}

/// Base slots of a group's tables plus the resources they reference.
struct Tables<A: Api> {
    resource_base: Option<u32>,
    sampler_base: Option<u32>,
    bound: Vec<BindGroupEntry<A>>,
}

pub struct BindGroup<A: Api> {
    inner: Arc<BindGroupInner<A>>,
}

struct BindGroupInner<A: Api> {
    layout: BindGroupLayout,
    tables: Mutex<Tables<A>>,
    label: Mutex<String>,
    shared: Arc<DeviceShared<A>>,
}

impl<A: Api> Drop for BindGroupInner<A> {
    fn drop(&mut self) {
        // Submitted work may still read the shader-visible slots.
        let shared = &self.shared;
        let tables = self.tables.get_mut();
        if let Some(base) = tables.resource_base.take() {
            shared
                .resource_heap
                .release_deferred(&shared.deletion, base, self.layout.resource_table_size());
        }
        if let Some(base) = tables.sampler_base.take() {
            shared
                .sampler_heap
                .release_deferred(&shared.deletion, base, self.layout.sampler_table_size());
        }
        tables.bound.clear();
    }
}

fn release_tables<A: Api>(shared: &DeviceShared<A>, layout: &BindGroupLayout, tables: &mut Tables<A>) {
    if let Some(base) = tables.resource_base.take() {
        shared.resource_heap.release(base, layout.resource_table_size());
    }
    if let Some(base) = tables.sampler_base.take() {
        shared.sampler_heap.release(base, layout.sampler_table_size());
    }
    tables.bound.clear();
}

/// Byte window a buffer entry covers: the offset is clamped to the buffer, a size of
/// 0 or `WHOLE_SIZE` takes the remainder and no size reaches past the end.
fn buffer_window<A: Api>(buffer: &Buffer<A>, offset: u64, size: u64) -> (u64, u64) {
    let offset = offset.min(buffer.size());
    let remainder = buffer.size() - offset;
    let size = if size == 0 || size == WHOLE_SIZE {
        remainder
    } else {
        size.min(remainder)
    };
    (offset, size)
}

fn resource_view<'a, A: Api>(kind: RangeKind, entry: &'a BindGroupEntry<A>) -> Option<hal::Descriptor<'a, A>> {
    let view = match (kind, &entry.resource) {
        (RangeKind::Cbv, BindingResource::Buffer { buffer, offset, size }) => {
            let (offset, size) = buffer_window(buffer, *offset, *size);
            hal::Descriptor::ConstantBuffer {
                buffer: buffer.native(),
                offset,
                size: size
                    .checked_next_multiple_of(CONSTANT_BUFFER_ALIGNMENT)
                    .unwrap_or(size),
            }
        }
        (RangeKind::Srv, BindingResource::Buffer { buffer, offset, size }) => {
            let (offset, size) = buffer_window(buffer, *offset, *size);
            hal::Descriptor::BufferShaderResource {
                buffer: buffer.native(),
                offset,
                size,
            }
        }
        (RangeKind::Uav, BindingResource::Buffer { buffer, offset, size }) => {
            let (offset, size) = buffer_window(buffer, *offset, *size);
            hal::Descriptor::BufferUnorderedAccess {
                buffer: buffer.native(),
                offset,
                size,
            }
        }
        (RangeKind::Srv, BindingResource::Texture(texture)) => hal::Descriptor::TextureShaderResource {
            texture: texture.native(),
        },
        (RangeKind::Uav, BindingResource::Texture(texture)) => hal::Descriptor::TextureUnorderedAccess {
            texture: texture.native(),
            mip_level: 0,
        },
        (RangeKind::Sampler, BindingResource::Sampler(sampler)) => hal::Descriptor::Sampler(sampler.desc()),
        (kind, resource) => {
            vgpu_warn!(
                "binding {} expects a {:?} view, got {:?}; writing a null view",
                entry.binding,
                kind,
                resource
            );
            return None;
        }
    };
    Some(view)
}

/// Allocate one run for `ranges` and write every slot.
fn populate<A: Api>(
    shared: &DeviceShared<A>,
    allocator: &DescriptorAllocator<A>,
    ranges: &[LayoutRange],
    table_size: u32,
    entries: &[BindGroupEntry<A>],
) -> Result<Option<u32>> {
    if table_size == 0 {
        return Ok(None);
    }
    let base = allocator.allocate(&shared.raw, &shared.deletion, table_size)?;
    for range in ranges {
        for i in 0..range.count {
            let register = range.base_binding + i;
            let slot = base + range.offset + i;
            let view = entries
                .iter()
                .find(|e| e.register() == register)
                .and_then(|e| resource_view(range.kind, e));
            let view = match view {
                Some(view) => view,
                None if range.kind == RangeKind::Sampler => hal::Descriptor::Sampler(&shared.default_sampler),
                None => hal::Descriptor::Null(null_view(range.kind)),
            };
            allocator.write(&shared.raw, slot, &view);
        }
    }
    allocator.copy_to_shader_visible(&shared.raw, base, table_size);
    Ok(Some(base))
}

impl<A: Api> BindGroup<A> {
    pub(crate) fn create(
        shared: &Arc<DeviceShared<A>>,
        layout: &BindGroupLayout,
        desc: &BindGroupDesc<'_, A>,
    ) -> Result<Self> {
        let group = Self {
            inner: Arc::new(BindGroupInner {
                layout: layout.clone(),
                tables: Mutex::new(Tables {
                    resource_base: None,
                    sampler_base: None,
                    bound: Vec::new(),
                }),
                label: Mutex::new(desc.label.unwrap_or_default().to_string()),
                shared: shared.clone(),
            }),
        };
        group.update(desc.entries)?;
        Ok(group)
    }

    /// Replace every binding. The old tables go back to the allocator at once and fresh
    /// ones are written, so command buffers recorded earlier against this group must be
    /// retired before it is updated. Dropping a group defers the release instead.
    pub fn update(&self, entries: &[BindGroupEntry<A>]) -> Result<()> {
        let shared = &self.inner.shared;
        let layout = &self.inner.layout;
        let mut tables = self.inner.tables.lock();
        release_tables(shared, layout, &mut tables);

        tables.resource_base = populate(
            shared,
            &shared.resource_heap,
            layout.resource_ranges(),
            layout.resource_table_size(),
            entries,
        )?;
        tables.sampler_base = populate(
            shared,
            &shared.sampler_heap,
            layout.sampler_ranges(),
            layout.sampler_table_size(),
            entries,
        )?;
        tables.bound = entries.to_vec();
        Ok(())
    }

    pub fn layout(&self) -> &BindGroupLayout {
        &self.inner.layout
    }

    /// Base slot of the group's table in the `kind` heap.
    pub fn descriptor_table(&self, kind: DescriptorHeapKind) -> Option<u32> {
        let tables = self.inner.tables.lock();
        match kind {
            DescriptorHeapKind::CbvSrvUav => tables.resource_base,
            DescriptorHeapKind::Sampler => tables.sampler_base,
            DescriptorHeapKind::Rtv | DescriptorHeapKind::Dsv => None,
        }
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn label(&self) -> String {
        self.inner.label.lock().clone()
    }

    pub fn set_label(&self, label: &str) {
        *self.inner.label.lock() = label.to_string();
    }
}

impl<A: Api> Clone for BindGroup<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: Api> PartialEq for BindGroup<A> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A: Api> Eq for BindGroup<A> {}

impl<A: Api> std::fmt::Debug for BindGroup<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tables = self.inner.tables.lock();
        f.debug_struct("BindGroup")
            .field("label", &*self.inner.label.lock())
            .field("resource_base", &tables.resource_base)
            .field("sampler_base", &tables.sampler_base)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Device;
    use crate::hal::DescriptorRecord;
    use crate::null::{self, NullConfig};
    use crate::types::{BufferDesc, BufferUsage, SamplerDesc, SamplerFilter};

    fn entry(binding: u32, descriptor_type: DescriptorType, count: u32) -> BindGroupLayoutEntry {
        BindGroupLayoutEntry {
            count,
            ..BindGroupLayoutEntry::new(binding, descriptor_type)
        }
    }

    fn layout(entries: &[BindGroupLayoutEntry]) -> BindGroupLayout {
        BindGroupLayout::new(&BindGroupLayoutDesc { label: None, entries }).unwrap()
    }

    #[test]
    fn contiguous_bindings_merge() {
        let layout = layout(&[
            entry(0, DescriptorType::ConstantBuffer, 1),
            entry(1, DescriptorType::ConstantBuffer, 2),
            entry(3, DescriptorType::SampledTexture, 1),
            entry(5, DescriptorType::SampledTexture, 1),
            entry(0, DescriptorType::Sampler, 1),
        ]);
        let ranges = layout.resource_ranges();
        assert_eq!(ranges.len(), 3);
        assert_eq!((ranges[0].kind, ranges[0].base_binding, ranges[0].count, ranges[0].offset), (RangeKind::Cbv, 0, 3, 0));
        assert_eq!((ranges[1].kind, ranges[1].base_binding, ranges[1].offset), (RangeKind::Srv, 3, 3));
        assert_eq!((ranges[2].base_binding, ranges[2].offset), (5, 4));
        assert_eq!(layout.resource_table_size(), 5);
        assert_eq!(layout.sampler_table_size(), 1);
        assert_eq!(layout.sampler_ranges()[0].offset, 0);
    }

    #[test]
    fn type_change_splits_ranges() {
        let layout = layout(&[
            entry(0, DescriptorType::StorageBuffer, 1),
            entry(1, DescriptorType::ReadOnlyStorageBuffer, 4),
        ]);
        let kinds: Vec<_> = layout.resource_ranges().iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![RangeKind::Uav, RangeKind::Srv]);
        assert_eq!(layout.resource_table_size(), 5);
    }

    #[test]
    fn root_indices_skip_empty_tables() {
        let textures = layout(&[entry(0, DescriptorType::SampledTexture, 1)]);
        let samplers = layout(&[entry(0, DescriptorType::Sampler, 1)]);
        let both = layout(&[entry(0, DescriptorType::ConstantBuffer, 1), entry(1, DescriptorType::Sampler, 1)]);
        let push = [PushConstantRange {
            shader_register: 8,
            size: 16,
            visibility: ShaderStages::VERTEX,
        }];
        let sig = root_signature(&[textures, samplers, both], &push);
        assert_eq!(sig.resource_root_index, vec![Some(0), None, Some(2)]);
        assert_eq!(sig.sampler_root_index, vec![None, Some(1), Some(3)]);
        assert_eq!(sig.push_constants_base_index, 4);
        assert_eq!(
            sig.parameters[4],
            RootParameter::Constants {
                shader_register: 8,
                register_space: 0,
                num_values: 4,
                visibility: ShaderStages::VERTEX,
            }
        );
        match &sig.parameters[2] {
            RootParameter::DescriptorTable { ranges, .. } => assert_eq!(ranges[0].register_space, 2),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn push_constants_must_be_whole_words() {
        let device = Device::with_null(NullConfig::default()).unwrap();
        let result = device.create_pipeline_layout(&PipelineLayoutDesc {
            label: None,
            bind_group_layouts: &[],
            push_constant_ranges: &[PushConstantRange {
                shader_register: 0,
                size: 6,
                visibility: ShaderStages::empty(),
            }],
        });
        assert!(result.is_err());
    }

    #[test]
    fn constant_buffer_views_clamp_and_align() {
        let device = Device::<null::Api>::with_null(NullConfig::default()).unwrap();
        let buffer = device
            .create_buffer(
                &BufferDesc {
                    size: 1024,
                    usage: BufferUsage::CONSTANT,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let layout = device
            .create_bind_group_layout(&BindGroupLayoutDesc {
                label: None,
                entries: &[entry(0, DescriptorType::ConstantBuffer, 3)],
            })
            .unwrap();
        let group = device
            .create_bind_group(
                &layout,
                &BindGroupDesc {
                    label: None,
                    entries: &[
                        BindGroupEntry::buffer(0, &buffer, 256, 0),
                        BindGroupEntry::buffer(0, &buffer, 4096, WHOLE_SIZE).at(1),
                        BindGroupEntry::buffer(2, &buffer, 0, 100),
                    ],
                },
            )
            .unwrap();
        let base = group.descriptor_table(DescriptorHeapKind::CbvSrvUav).unwrap();
        let read = |i| device.inspect_descriptor(DescriptorHeapKind::CbvSrvUav, base + i, true);
        let address = buffer.device_address();
        assert_eq!(read(0), Some(DescriptorRecord::ConstantBuffer { address: address + 256, size: 768 }));
        assert_eq!(read(1), Some(DescriptorRecord::ConstantBuffer { address: address + 1024, size: 0 }));
        assert_eq!(read(2), Some(DescriptorRecord::ConstantBuffer { address, size: 256 }));
    }

    #[test]
    fn oversized_buffer_entries_stop_at_the_end() {
        let device = Device::<null::Api>::with_null(NullConfig::default()).unwrap();
        let buffer = device
            .create_buffer(
                &BufferDesc {
                    size: 1024,
                    usage: BufferUsage::CONSTANT | BufferUsage::SHADER_READ,
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        let group = |ty, bound: BindGroupEntry<null::Api>| {
            let layout = device
                .create_bind_group_layout(&BindGroupLayoutDesc {
                    label: None,
                    entries: &[entry(0, ty, 1)],
                })
                .unwrap();
            device
                .create_bind_group(&layout, &BindGroupDesc { label: None, entries: &[bound] })
                .unwrap()
        };
        let address = buffer.device_address();

        let constants = group(DescriptorType::ConstantBuffer, BindGroupEntry::buffer(0, &buffer, 0, u64::MAX - 1));
        let base = constants.descriptor_table(DescriptorHeapKind::CbvSrvUav).unwrap();
        assert_eq!(
            device.inspect_descriptor(DescriptorHeapKind::CbvSrvUav, base, true),
            Some(DescriptorRecord::ConstantBuffer { address, size: 1024 })
        );

        let storage = group(
            DescriptorType::ReadOnlyStorageBuffer,
            BindGroupEntry::buffer(0, &buffer, 512, 4096),
        );
        let base = storage.descriptor_table(DescriptorHeapKind::CbvSrvUav).unwrap();
        assert_eq!(
            device.inspect_descriptor(DescriptorHeapKind::CbvSrvUav, base, true),
            Some(DescriptorRecord::BufferShaderResource {
                address: address + 512,
                size: 512,
            })
        );
    }

    #[test]
    fn unbound_samplers_use_the_default() {
        let device = Device::<null::Api>::with_null(NullConfig::default()).unwrap();
        let layout = device
            .create_bind_group_layout(&BindGroupLayoutDesc {
                label: None,
                entries: &[entry(0, DescriptorType::Sampler, 2)],
            })
            .unwrap();
        let desc = SamplerDesc {
            min_filter: SamplerFilter::Linear,
            ..Default::default()
        };
        let sampler = device.create_sampler(&desc).unwrap();
        let group = device
            .create_bind_group(
                &layout,
                &BindGroupDesc {
                    label: None,
                    entries: &[BindGroupEntry::sampler(1, &sampler)],
                },
            )
            .unwrap();
        let base = group.descriptor_table(DescriptorHeapKind::Sampler).unwrap();
        assert_eq!(
            device.inspect_descriptor(DescriptorHeapKind::Sampler, base, true),
            Some(DescriptorRecord::Sampler(SamplerDesc::default()))
        );
        assert_eq!(
            device.inspect_descriptor(DescriptorHeapKind::Sampler, base + 1, true),
            Some(DescriptorRecord::Sampler(desc))
        );
        assert_eq!(group.descriptor_table(DescriptorHeapKind::CbvSrvUav), None);
    }

    #[test]
    fn update_replaces_tables_and_references() {
        let device = Device::<null::Api>::with_null(NullConfig::default()).unwrap();
        let layout = device
            .create_bind_group_layout(&BindGroupLayoutDesc {
                label: None,
                entries: &[entry(0, DescriptorType::StorageBuffer, 1)],
            })
            .unwrap();
        let first = device.create_buffer(&BufferDesc { size: 64, ..Default::default() }, None).unwrap();
        let second = device.create_buffer(&BufferDesc { size: 64, ..Default::default() }, None).unwrap();
        let group = device
            .create_bind_group(
                &layout,
                &BindGroupDesc {
                    label: None,
                    entries: &[BindGroupEntry::buffer(0, &first, 0, WHOLE_SIZE)],
                },
            )
            .unwrap();
        assert_eq!(first.ref_count(), 2);
        let allocated = device.shared().resource_heap.num_allocated();

        group.update(&[BindGroupEntry::buffer(0, &second, 0, WHOLE_SIZE)]).unwrap();
        assert_eq!(first.ref_count(), 1);
        assert_eq!(second.ref_count(), 2);
        assert_eq!(device.shared().resource_heap.num_allocated(), allocated);

        let base = group.descriptor_table(DescriptorHeapKind::CbvSrvUav).unwrap();
        assert_eq!(
            device.inspect_descriptor(DescriptorHeapKind::CbvSrvUav, base, true),
            Some(DescriptorRecord::BufferUnorderedAccess {
                address: second.device_address(),
                size: 64,
            })
        );
        drop(group);
        assert_eq!(device.shared().resource_heap.num_allocated(), allocated);
        for _ in 0..=crate::MAX_INFLIGHT_FRAMES {
            device.submit(Vec::new()).unwrap();
        }
        assert_eq!(device.shared().resource_heap.num_allocated(), allocated - 1);
    }
}
