//! Growable descriptor index allocator.
//!
//! Each allocator owns one CPU-only native heap plus, for CBV/SRV/UAV and sampler kinds,
//! a shader-visible mirror. Indices are stable for the lifetime of an allocation: growing
//! copies every live slot to the same index in the new heaps.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::deletion::{DeletionQueue, NativeObject};
use crate::error::Result;
use crate::hal::{Api, Descriptor, DescriptorHeapKind, DescriptorRecord, Device as _};
use crate::logging::{vgpu_debug, vgpu_error};

struct Heaps<A: Api> {
    cpu: Arc<A::DescriptorHeap>,
    shader_visible: Option<Arc<A::DescriptorHeap>>,
    allocated: Vec<bool>,
    search_start: u32,
    num_allocated: u32,
}

impl<A: Api> Heaps<A> {
    fn capacity(&self) -> u32 {
        self.allocated.len() as u32
    }

    fn find_free_run(&self, count: u32) -> Option<u32> {
        let mut run = 0;
        for index in self.search_start..self.capacity() {
            if self.allocated[index as usize] {
                run = 0;
                continue;
            }
            run += 1;
            if run == count {
                return Some(index + 1 - count);
            }
        }
        None
    }

    /// Maximal runs of allocated slots, as (base, len).
    fn live_runs(&self) -> Vec<(u32, u32)> {
        let mut runs = Vec::new();
        let mut start = None;
        for (i, used) in self.allocated.iter().enumerate() {
            match (used, start) {
                (true, None) => start = Some(i as u32),
                (false, Some(s)) => {
                    runs.push((s, i as u32 - s));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push((s, self.capacity() - s));
        }
        runs
    }

    fn release(&mut self, kind: DescriptorHeapKind, base: u32, count: u32) {
        for index in base..base.saturating_add(count) {
            match self.allocated.get_mut(index as usize) {
                Some(slot) if *slot => {
                    *slot = false;
                    self.num_allocated -= 1;
                }
                _ => vgpu_error!("{:?} descriptor {} released but not allocated", kind, index),
            }
        }
        if base < self.search_start {
            self.search_start = base;
        }
    }
}

/// A run of slots whose release waits in the deletion queue. Dropping it frees the
/// slots for reuse.
pub struct DescriptorRun<A: Api> {
    kind: DescriptorHeapKind,
    heaps: Arc<Mutex<Heaps<A>>>,
    base: u32,
    count: u32,
}

impl<A: Api> DescriptorRun<A> {
    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl<A: Api> Drop for DescriptorRun<A> {
    fn drop(&mut self) {
        self.heaps.lock().release(self.kind, self.base, self.count);
    }
}

pub struct DescriptorAllocator<A: Api> {
    kind: DescriptorHeapKind,
    heaps: Arc<Mutex<Heaps<A>>>,
    generation: AtomicU64,
}

impl<A: Api> DescriptorAllocator<A> {
    pub fn new(device: &A::Device, kind: DescriptorHeapKind, capacity: u32) -> Result<Self> {
        let capacity = capacity.max(1);
        let cpu = Arc::new(device.create_descriptor_heap(kind, capacity, false)?);
        let shader_visible = if kind.has_shader_visible() {
            Some(Arc::new(device.create_descriptor_heap(kind, capacity, true)?))
        } else {
            None
        };
        Ok(Self {
            kind,
            heaps: Arc::new(Mutex::new(Heaps {
                cpu,
                shader_visible,
                allocated: vec![false; capacity as usize],
                search_start: 0,
                num_allocated: 0,
            })),
            generation: AtomicU64::new(0),
        })
    }

    pub fn kind(&self) -> DescriptorHeapKind {
        self.kind
    }

    pub fn capacity(&self) -> u32 {
        self.heaps.lock().capacity()
    }

    pub fn num_allocated(&self) -> u32 {
        self.heaps.lock().num_allocated
    }

    /// Bumped every time the native heaps are replaced.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Current CPU-only heap. Views written there are consumed at record time, so a
    /// clone only has to outlive the recording call that uses it.
    pub fn cpu_heap(&self) -> Arc<A::DescriptorHeap> {
        self.heaps.lock().cpu.clone()
    }

    /// Current shader-visible heap, if this kind has one.
    pub fn shader_visible_heap(&self) -> Option<Arc<A::DescriptorHeap>> {
        self.heaps.lock().shader_visible.clone()
    }

    /// Reserve `count` contiguous slots and return the first index. Never fails for lack
    /// of space: a full heap grows.
    pub fn allocate(&self, device: &A::Device, deletion: &DeletionQueue<A>, count: u32) -> Result<u32> {
        debug_assert!(count > 0, "empty descriptor allocation");
        let mut heaps = self.heaps.lock();
        let base = match heaps.find_free_run(count) {
            Some(base) => base,
            None => {
                let base = heaps.capacity();
                let new_capacity = (heaps.capacity() + count).next_power_of_two();
                self.grow(device, deletion, &mut heaps, new_capacity)?;
                base
            }
        };
        for slot in &mut heaps.allocated[base as usize..(base + count) as usize] {
            *slot = true;
        }
        heaps.num_allocated += count;
        heaps.search_start = base + count;
        Ok(base)
    }

    fn grow(
        &self,
        device: &A::Device,
        deletion: &DeletionQueue<A>,
        heaps: &mut Heaps<A>,
        new_capacity: u32,
    ) -> Result<()> {
        vgpu_debug!("growing {:?} descriptor heap {} -> {}", self.kind, heaps.capacity(), new_capacity);
        let cpu = Arc::new(device.create_descriptor_heap(self.kind, new_capacity, false)?);
        let shader_visible = match heaps.shader_visible {
            Some(_) => Some(Arc::new(device.create_descriptor_heap(self.kind, new_capacity, true)?)),
            None => None,
        };

        for (base, count) in heaps.live_runs() {
            device.copy_descriptors(&cpu, base, &heaps.cpu, base, count);
            if let Some(gpu) = &shader_visible {
                // Shader-visible heaps are write-only; mirror from the fresh CPU copy.
                device.copy_descriptors(gpu, base, &cpu, base, count);
            }
        }

        // The old CPU heap is never referenced by GPU work.
        drop(std::mem::replace(&mut heaps.cpu, cpu));
        if let Some(old) = std::mem::replace(&mut heaps.shader_visible, shader_visible) {
            deletion.defer(NativeObject::DescriptorHeap(old));
        }
        heaps.allocated.resize(new_capacity as usize, false);
        self.generation.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn release(&self, base: u32, count: u32) {
        self.heaps.lock().release(self.kind, base, count);
    }

    /// Hand `count` slots at `base` to the deletion queue. They become reusable once
    /// the frames that may read them have retired.
    pub fn release_deferred(&self, deletion: &DeletionQueue<A>, base: u32, count: u32) {
        deletion.defer(NativeObject::DescriptorRun(DescriptorRun {
            kind: self.kind,
            heaps: self.heaps.clone(),
            base,
            count,
        }));
    }

    /// Write a view into the CPU slot `index`.
    pub fn write(&self, device: &A::Device, index: u32, descriptor: &Descriptor<'_, A>) {
        let heaps = self.heaps.lock();
        device.write_descriptor(&heaps.cpu, index, descriptor);
    }

    pub fn copy_to_shader_visible(&self, device: &A::Device, base: u32, count: u32) {
        let heaps = self.heaps.lock();
        if let Some(gpu) = &heaps.shader_visible {
            device.copy_descriptors(gpu, base, &heaps.cpu, base, count);
        }
    }

    pub fn read(&self, device: &A::Device, index: u32) -> Option<DescriptorRecord> {
        let heaps = self.heaps.lock();
        device.read_descriptor(&heaps.cpu, index)
    }

    pub fn read_shader_visible(&self, device: &A::Device, index: u32) -> Option<DescriptorRecord> {
        let heaps = self.heaps.lock();
        let gpu = heaps.shader_visible.as_ref()?;
        device.read_descriptor(gpu, index)
    }
}

impl<A: Api> std::fmt::Debug for DescriptorAllocator<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let heaps = self.heaps.lock();
        f.debug_struct("DescriptorAllocator")
            .field("kind", &self.kind)
            .field("capacity", &heaps.capacity())
            .field("allocated", &heaps.num_allocated)
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::ViewKind;
    use crate::null::{self, ObjectKind};
    use crate::types::SamplerDesc;

    fn setup(kind: DescriptorHeapKind, capacity: u32) -> (null::Device, DeletionQueue<null::Api>, DescriptorAllocator<null::Api>) {
        let device = null::Device::headless();
        let alloc = DescriptorAllocator::new(&device, kind, capacity).unwrap();
        (device, DeletionQueue::new(), alloc)
    }

    #[test]
    fn runs_never_overlap_and_are_reused() {
        let (device, deletion, alloc) = setup(DescriptorHeapKind::Rtv, 16);
        let a = alloc.allocate(&device, &deletion, 4).unwrap();
        let b = alloc.allocate(&device, &deletion, 4).unwrap();
        assert_eq!((a, b), (0, 4));
        alloc.release(a, 4);
        let c = alloc.allocate(&device, &deletion, 2).unwrap();
        assert_eq!(c, 0);
        let d = alloc.allocate(&device, &deletion, 2).unwrap();
        assert_eq!(d, 2);
        assert_eq!(alloc.num_allocated(), 8);
    }

    #[test]
    fn deferred_release_waits_for_the_window() {
        let (device, deletion, alloc) = setup(DescriptorHeapKind::Sampler, 8);
        let a = alloc.allocate(&device, &deletion, 2).unwrap();
        alloc.release_deferred(&deletion, a, 2);
        assert_eq!(alloc.num_allocated(), 2);
        assert_eq!(alloc.allocate(&device, &deletion, 2).unwrap(), 2);

        for _ in 0..=crate::MAX_INFLIGHT_FRAMES {
            deletion.advance_frame();
        }
        assert_eq!(deletion.process(), 1);
        assert_eq!(alloc.num_allocated(), 2);
        assert_eq!(alloc.allocate(&device, &deletion, 2).unwrap(), 0);
    }

    #[test]
    fn double_release_is_ignored() {
        let (device, deletion, alloc) = setup(DescriptorHeapKind::Dsv, 4);
        let a = alloc.allocate(&device, &deletion, 1).unwrap();
        alloc.release(a, 1);
        alloc.release(a, 1);
        assert_eq!(alloc.num_allocated(), 0);
    }

    #[test]
    fn growth_preserves_live_slots() {
        let (device, deletion, alloc) = setup(DescriptorHeapKind::Sampler, 4);
        let desc = SamplerDesc {
            max_anisotropy: 8,
            ..Default::default()
        };
        let a = alloc.allocate(&device, &deletion, 3).unwrap();
        alloc.write(&device, a + 1, &Descriptor::Sampler(&desc));
        alloc.write(&device, a + 2, &Descriptor::Null(ViewKind::Sampler));
        alloc.copy_to_shader_visible(&device, a, 3);
        let old_gpu = alloc.shader_visible_heap().unwrap();
        let old_id = old_gpu.id();
        drop(old_gpu);

        let b = alloc.allocate(&device, &deletion, 3).unwrap();
        assert_eq!(b, 4);
        assert_eq!(alloc.capacity(), 8);
        assert_eq!(alloc.generation(), 1);
        assert_eq!(alloc.read(&device, a + 1), Some(DescriptorRecord::Sampler(desc)));
        assert_eq!(alloc.read_shader_visible(&device, a + 1), Some(DescriptorRecord::Sampler(desc)));
        assert_eq!(
            alloc.read_shader_visible(&device, a + 2),
            Some(DescriptorRecord::Null(ViewKind::Sampler))
        );

        // The old shader-visible heap waits for the in-flight window.
        assert!(!device.was_destroyed(ObjectKind::DescriptorHeap, old_id));
        assert_eq!(deletion.len(), 1);
        deletion.flush_all();
        assert!(device.was_destroyed(ObjectKind::DescriptorHeap, old_id));
    }

    #[test]
    fn oversized_request_grows_to_power_of_two() {
        let (device, deletion, alloc) = setup(DescriptorHeapKind::CbvSrvUav, 4);
        alloc.allocate(&device, &deletion, 1).unwrap();
        let base = alloc.allocate(&device, &deletion, 9).unwrap();
        assert_eq!(base, 4);
        assert_eq!(alloc.capacity(), 16);
    }
}
