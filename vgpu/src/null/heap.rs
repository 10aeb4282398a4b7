use std::sync::Arc;

use parking_lot::Mutex;

use super::{Api, ObjectKind, Shared};
use crate::hal::{Descriptor, DescriptorHeapKind, DescriptorRecord, NativeResource};
use crate::logging::vgpu_warn;
use crate::types::ResourceId;

/// Descriptor slots stored as decoded records. Storage only grows as far as the highest
/// slot written; anything past it reads as `Empty`.
pub struct DescriptorHeap {
    id: ResourceId,
    shared: Arc<Shared>,
    kind: DescriptorHeapKind,
    capacity: u32,
    shader_visible: bool,
    slots: Mutex<Vec<DescriptorRecord>>,
}

impl std::fmt::Debug for DescriptorHeap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorHeap")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("capacity", &self.capacity())
            .field("shader_visible", &self.shader_visible)
            .finish()
    }
}

impl Drop for DescriptorHeap {
    fn drop(&mut self) {
        self.shared.record_destroy(ObjectKind::DescriptorHeap, self.id);
    }
}

impl DescriptorHeap {
    pub(crate) fn new(shared: Arc<Shared>, kind: DescriptorHeapKind, capacity: u32, shader_visible: bool) -> Self {
        Self {
            id: shared.next_id(),
            shared,
            kind,
            capacity,
            shader_visible,
            slots: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_shader_visible(&self) -> bool {
        self.shader_visible
    }

    pub(crate) fn write(&self, index: u32, record: DescriptorRecord) {
        if index >= self.capacity {
            vgpu_warn!("descriptor write to slot {} past heap {} capacity", index, self.id);
            return;
        }
        let mut slots = self.slots.lock();
        let index = index as usize;
        if index >= slots.len() {
            slots.resize(index + 1, DescriptorRecord::Empty);
        }
        slots[index] = record;
    }

    pub(crate) fn read(&self, index: u32) -> Option<DescriptorRecord> {
        if index >= self.capacity {
            return None;
        }
        let slots = self.slots.lock();
        Some(slots.get(index as usize).cloned().unwrap_or(DescriptorRecord::Empty))
    }

    pub(crate) fn copy_from(&self, dst_index: u32, src: &DescriptorHeap, src_index: u32, count: u32) {
        if src_index.saturating_add(count) > src.capacity {
            vgpu_warn!("descriptor copy {}..+{} past heap {}", src_index, count, src.id);
            return;
        }
        if dst_index.saturating_add(count) > self.capacity {
            vgpu_warn!("descriptor copy {}..+{} past heap {}", dst_index, count, self.id);
            return;
        }
        let records: Vec<DescriptorRecord> = (src_index..src_index + count)
            .map(|i| src.read(i).unwrap_or(DescriptorRecord::Empty))
            .collect();
        for (i, record) in records.into_iter().enumerate() {
            self.write(dst_index + i as u32, record);
        }
    }
}

pub(crate) fn record_of(descriptor: &Descriptor<'_, Api>) -> DescriptorRecord {
    match descriptor {
        Descriptor::Null(kind) => DescriptorRecord::Null(*kind),
        Descriptor::ConstantBuffer { buffer, offset, size } => DescriptorRecord::ConstantBuffer {
            address: buffer.address() + offset,
            size: *size,
        },
        Descriptor::BufferShaderResource { buffer, offset, size } => DescriptorRecord::BufferShaderResource {
            address: buffer.address() + offset,
            size: *size,
        },
        Descriptor::BufferUnorderedAccess { buffer, offset, size } => DescriptorRecord::BufferUnorderedAccess {
            address: buffer.address() + offset,
            size: *size,
        },
        Descriptor::TextureShaderResource { texture } => DescriptorRecord::TextureShaderResource { texture: texture.id() },
        Descriptor::TextureUnorderedAccess { texture, mip_level } => DescriptorRecord::TextureUnorderedAccess {
            texture: texture.id(),
            mip_level: *mip_level,
        },
        Descriptor::Sampler(desc) => DescriptorRecord::Sampler(**desc),
        Descriptor::RenderTarget { texture, mip_level, slice } => DescriptorRecord::RenderTarget {
            texture: texture.id(),
            mip_level: *mip_level,
            slice: *slice,
        },
        Descriptor::DepthStencil { texture, mip_level, slice } => DescriptorRecord::DepthStencil {
            texture: texture.id(),
            mip_level: *mip_level,
            slice: *slice,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{Device as _, ViewKind};
    use crate::null::Device;
    use crate::types::SamplerDesc;

    #[test]
    fn copies_between_heaps() {
        let device = Device::headless();
        let cpu = device.create_descriptor_heap(DescriptorHeapKind::Sampler, 4, false).unwrap();
        let gpu = device.create_descriptor_heap(DescriptorHeapKind::Sampler, 8, true).unwrap();
        let desc = SamplerDesc::default();
        device.write_descriptor(&cpu, 1, &Descriptor::Sampler(&desc));
        device.write_descriptor(&cpu, 2, &Descriptor::Null(ViewKind::Sampler));
        device.copy_descriptors(&gpu, 5, &cpu, 1, 2);

        assert_eq!(device.read_descriptor(&gpu, 5), Some(DescriptorRecord::Sampler(desc)));
        assert_eq!(device.read_descriptor(&gpu, 6), Some(DescriptorRecord::Null(ViewKind::Sampler)));
        assert_eq!(device.read_descriptor(&gpu, 7), Some(DescriptorRecord::Empty));
        assert_eq!(device.read_descriptor(&gpu, 8), None);
    }
}
