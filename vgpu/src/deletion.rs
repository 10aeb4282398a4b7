//! Frame-stamped deferred destruction of native objects.
//!
//! Released objects stay alive until the GPU can no longer reference them: an entry
//! stamped at frame F is destroyed by the first `process()` that sees
//! `F + MAX_INFLIGHT_FRAMES < frame_count`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::descriptor::DescriptorRun;
use crate::hal::Api;
use crate::MAX_INFLIGHT_FRAMES;

/// One owned native object awaiting destruction.
pub enum NativeObject<A: Api> {
    Buffer(A::Buffer),
    Texture(A::Texture),
    Sampler(A::Sampler),
    PipelineLayout(A::PipelineLayout),
    Pipeline(A::Pipeline),
    QueryHeap(A::QueryHeap),
    DescriptorHeap(Arc<A::DescriptorHeap>),
    /// Descriptor slots a dropped bind group was using.
    DescriptorRun(DescriptorRun<A>),
}

impl<A: Api> std::fmt::Debug for NativeObject<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            NativeObject::Buffer(_) => "Buffer",
            NativeObject::Texture(_) => "Texture",
            NativeObject::Sampler(_) => "Sampler",
            NativeObject::PipelineLayout(_) => "PipelineLayout",
            NativeObject::Pipeline(_) => "Pipeline",
            NativeObject::QueryHeap(_) => "QueryHeap",
            NativeObject::DescriptorHeap(_) => "DescriptorHeap",
            NativeObject::DescriptorRun(_) => "DescriptorRun",
        };
        f.debug_tuple("NativeObject").field(&kind).finish()
    }
}

pub struct DeletionQueue<A: Api> {
    entries: Mutex<VecDeque<(NativeObject<A>, u64)>>,
    frame_count: AtomicU64,
    shutting_down: AtomicBool,
}

impl<A: Api> Default for DeletionQueue<A> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            frame_count: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }
}

impl<A: Api> DeletionQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Device frame counter; the stamp given to newly deferred objects.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Acquire)
    }

    /// Advance the frame counter, returning the new count.
    pub fn advance_frame(&self) -> u64 {
        self.frame_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue `object` for destruction once it is safely out of flight. After shutdown
    /// there is no GPU work left to wait for, so the object is dropped right away.
    pub fn defer(&self, object: NativeObject<A>) {
        if self.shutting_down.load(Ordering::Acquire) {
            drop(object);
            return;
        }
        let mut entries = self.entries.lock();
        // Stamp under the lock so the queue stays ordered by frame.
        let stamp = self.frame_count();
        entries.push_back((object, stamp));
    }

    /// Destroy every head entry that is past the in-flight window.
    pub fn process(&self) -> usize {
        let frame_count = self.frame_count();
        let mut reclaimed = Vec::new();
        {
            let mut entries = self.entries.lock();
            while let Some((_, stamp)) = entries.front() {
                if stamp.saturating_add(MAX_INFLIGHT_FRAMES as u64) >= frame_count {
                    break;
                }
                if let Some((object, _)) = entries.pop_front() {
                    reclaimed.push(object);
                }
            }
        }
        // Native destructors run outside the lock.
        let count = reclaimed.len();
        drop(reclaimed);
        count
    }

    /// Destroy everything regardless of stamp. The device must be idle.
    pub fn flush_all(&self) -> usize {
        let saved = self.frame_count.swap(u64::MAX, Ordering::AcqRel);
        let count = self.process();
        self.frame_count.store(saved, Ordering::Release);
        count
    }

    /// From now on `defer` destroys immediately.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
    }
}

impl<A: Api> std::fmt::Debug for DeletionQueue<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionQueue")
            .field("pending", &self.len())
            .field("frame_count", &self.frame_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{BufferDesc, Device as _, MemoryKind, NativeResource};
    use crate::null::{self, ObjectKind};
    use crate::types::ResourceState;

    fn buffer(device: &null::Device) -> null::Buffer {
        device
            .create_buffer(&BufferDesc {
                label: None,
                size: 64,
                memory: MemoryKind::Default,
                allow_unordered_access: false,
                initial_state: ResourceState::empty(),
            })
            .unwrap()
    }

    #[test]
    fn entries_survive_the_inflight_window() {
        let device = null::Device::headless();
        let queue = DeletionQueue::<null::Api>::new();
        let b = buffer(&device);
        let id = b.id();
        queue.defer(NativeObject::Buffer(b));

        for _ in 0..MAX_INFLIGHT_FRAMES {
            queue.advance_frame();
            assert_eq!(queue.process(), 0);
            assert!(!device.was_destroyed(ObjectKind::Buffer, id));
        }
        queue.advance_frame();
        assert_eq!(queue.process(), 1);
        assert!(device.was_destroyed(ObjectKind::Buffer, id));
        assert_eq!(device.destroy_count(ObjectKind::Buffer, id), 1);
    }

    #[test]
    fn processing_stops_at_first_young_entry() {
        let device = null::Device::headless();
        let queue = DeletionQueue::<null::Api>::new();
        queue.defer(NativeObject::Buffer(buffer(&device)));
        queue.advance_frame();
        queue.defer(NativeObject::Buffer(buffer(&device)));
        queue.advance_frame();
        queue.advance_frame();
        assert_eq!(queue.process(), 1);
        assert_eq!(queue.len(), 1);
        queue.advance_frame();
        assert_eq!(queue.process(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn flush_all_restores_the_frame_counter() {
        let device = null::Device::headless();
        let queue = DeletionQueue::<null::Api>::new();
        queue.advance_frame();
        queue.defer(NativeObject::Buffer(buffer(&device)));
        assert_eq!(queue.flush_all(), 1);
        assert_eq!(queue.frame_count(), 1);
    }

    #[test]
    fn shutdown_destroys_immediately() {
        let device = null::Device::headless();
        let queue = DeletionQueue::<null::Api>::new();
        queue.begin_shutdown();
        let b = buffer(&device);
        let id = b.id();
        queue.defer(NativeObject::Buffer(b));
        assert!(queue.is_empty());
        assert!(device.was_destroyed(ObjectKind::Buffer, id));
    }
}
