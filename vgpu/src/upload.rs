//! Pooled staging contexts for initial-data transfers on the copy queue.
//!
//! A context is handed out exclusively, filled through its mapped staging buffer,
//! recorded with copies and submitted. Submission makes every queue wait for the copy on
//! the GPU, so the CPU never blocks on uploads.

use parking_lot::Mutex;

use crate::error::Result;
use crate::hal::{self, Api, CommandList as _, Device as _, MemoryKind, Queue as _, SubresourceFootprint};
use crate::logging::vgpu_debug;
use crate::types::{QueueType, ResourceState};

pub struct UploadContext<A: Api> {
    allocator: A::CommandAllocator,
    list: A::CommandList,
    fence: A::Fence,
    fence_value_signaled: u64,
    staging: A::Buffer,
    staging_size: u64,
}

impl<A: Api> UploadContext<A> {
    fn new(device: &A::Device, size: u64) -> Result<Self> {
        let staging_size = size.max(1).next_power_of_two();
        let allocator = device.create_command_allocator(QueueType::Copy)?;
        let mut list = device.create_command_list(QueueType::Copy, &allocator)?;
        list.close();
        let fence = device.create_fence(0)?;
        let staging = device.create_buffer(&hal::BufferDesc {
            label: Some("vgpu upload staging"),
            size: staging_size,
            memory: MemoryKind::Upload,
            allow_unordered_access: false,
            initial_state: ResourceState::GENERIC_READ,
        })?;
        vgpu_debug!("new upload context with {} byte staging buffer", staging_size);
        Ok(Self {
            allocator,
            list,
            fence,
            fence_value_signaled: 0,
            staging,
            staging_size,
        })
    }

    pub fn staging_size(&self) -> u64 {
        self.staging_size
    }

    pub fn staging_buffer(&self) -> &A::Buffer {
        &self.staging
    }

    /// Copy `bytes` into the staging buffer at `offset`.
    pub fn write(&self, device: &A::Device, offset: u64, bytes: &[u8]) -> Result<()> {
        device.write_mapped(&self.staging, offset, bytes)?;
        Ok(())
    }

    pub fn copy_buffer(&mut self, dst: &A::Buffer, dst_offset: u64, src_offset: u64, size: u64) {
        self.list.copy_buffer_region(dst, dst_offset, &self.staging, src_offset, size);
    }

    pub fn copy_buffer_to_texture(&mut self, dst: &A::Texture, subresource: u32, footprint: &SubresourceFootprint) {
        self.list.copy_buffer_to_texture(dst, subresource, &self.staging, footprint);
    }

    fn is_idle(&self, device: &A::Device) -> bool {
        device.fence_completed_value(&self.fence) >= self.fence_value_signaled
    }
}

impl<A: Api> std::fmt::Debug for UploadContext<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadContext")
            .field("staging_size", &self.staging_size)
            .field("fence_value_signaled", &self.fence_value_signaled)
            .finish_non_exhaustive()
    }
}

pub struct UploadContextPool<A: Api> {
    free: Mutex<Vec<UploadContext<A>>>,
}

impl<A: Api> Default for UploadContextPool<A> {
    fn default() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }
}

impl<A: Api> UploadContextPool<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contexts waiting in the free list.
    pub fn len(&self) -> usize {
        self.free.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take an idle context with at least `size` staging bytes, or build a new one.
    pub fn allocate(&self, device: &A::Device, size: u64) -> Result<UploadContext<A>> {
        let reused = {
            let mut free = self.free.lock();
            let found = free
                .iter()
                .position(|ctx| ctx.staging_size >= size && ctx.is_idle(device));
            found.map(|i| free.swap_remove(i))
        };

        let mut context = match reused {
            Some(mut ctx) => {
                device.signal_fence(&ctx.fence, 0);
                ctx.fence_value_signaled = 0;
                ctx
            }
            None => UploadContext::new(device, size)?,
        };

        device.reset_command_allocator(&context.allocator);
        context.list.reset(&context.allocator);
        Ok(context)
    }

    /// Submit the recorded copies on the copy queue and make every queue wait for them.
    pub fn submit(&self, queues: &[A::Queue; QueueType::COUNT], mut context: UploadContext<A>) {
        context.fence_value_signaled += 1;
        let value = context.fence_value_signaled;

        context.list.close();
        let copy = &queues[QueueType::Copy.index()];
        copy.execute(&[&context.list]);
        copy.signal(&context.fence, value);
        for queue in queues {
            queue.wait(&context.fence, value);
        }

        self.free.lock().push(context);
    }
}

impl<A: Api> std::fmt::Debug for UploadContextPool<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadContextPool").field("free", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::{Adapter as _, Instance as _, OpenDevice};
    use crate::null::{self, NullConfig};

    fn open(config: NullConfig) -> OpenDevice<null::Api> {
        let instance = null::Instance::with_config(config);
        let adapters = instance.enumerate_adapters();
        adapters[0].open(crate::types::Features::empty()).unwrap()
    }

    fn target(device: &null::Device, size: u64) -> null::Buffer {
        device
            .create_buffer(&hal::BufferDesc {
                label: None,
                size,
                memory: MemoryKind::Default,
                allow_unordered_access: false,
                initial_state: ResourceState::empty(),
            })
            .unwrap()
    }

    #[test]
    fn staging_is_rounded_up() {
        let open = open(NullConfig::default());
        let pool = UploadContextPool::<null::Api>::new();
        let ctx = pool.allocate(&open.device, 300).unwrap();
        assert_eq!(ctx.staging_size(), 512);
    }

    #[test]
    fn busy_contexts_are_not_reused() {
        let open = open(NullConfig::manual());
        let device = &open.device;
        let pool = UploadContextPool::<null::Api>::new();
        let dst = target(device, 16);

        let mut ctx = pool.allocate(device, 16).unwrap();
        ctx.write(device, 0, &[7; 16]).unwrap();
        ctx.copy_buffer(&dst, 0, 0, 16);
        let first = hal::NativeResource::id(ctx.staging_buffer());
        pool.submit(&open.queues, ctx);

        // The copy has not run yet, so a second request builds a new context.
        let ctx = pool.allocate(device, 16).unwrap();
        assert_ne!(hal::NativeResource::id(ctx.staging_buffer()), first);
        pool.submit(&open.queues, ctx);
        assert_eq!(pool.len(), 2);

        device.advance();
        assert_eq!(device.buffer_contents(&dst), vec![7; 16]);
        let ctx = pool.allocate(device, 8).unwrap();
        assert_eq!(pool.len(), 1);
        drop(ctx);
    }

    #[test]
    fn every_queue_waits_for_the_copy() {
        let open = open(NullConfig::manual());
        let device = &open.device;
        let pool = UploadContextPool::<null::Api>::new();
        let dst = target(device, 4);
        let mut ctx = pool.allocate(device, 4).unwrap();
        ctx.write(device, 0, &[1, 2, 3, 4]).unwrap();
        ctx.copy_buffer(&dst, 0, 0, 4);
        pool.submit(&open.queues, ctx);
        device.advance();

        let events = device.events();
        let signaled = events
            .iter()
            .position(|e| matches!(e, null::GpuEvent::Signaled { queue: QueueType::Copy, .. }))
            .unwrap();
        for queue in [QueueType::Graphics, QueueType::Compute] {
            let waited = events
                .iter()
                .position(|e| matches!(e, null::GpuEvent::Waited { queue: q, .. } if *q == queue))
                .unwrap();
            assert!(waited > signaled);
        }
    }
}
