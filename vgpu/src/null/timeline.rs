//! Software GPU timeline shared by the three null queues.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::list::{self, Command, CommandList};
use super::{Api, Shared};
use crate::hal;
use crate::types::{QueueType, ResourceId};

#[derive(Debug)]
struct FenceInner {
    id: ResourceId,
    value: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct Fence(Arc<FenceInner>);

impl Fence {
    pub(crate) fn new(id: ResourceId, initial_value: u64) -> Self {
        Self(Arc::new(FenceInner {
            id,
            value: AtomicU64::new(initial_value),
        }))
    }

    pub fn id(&self) -> ResourceId {
        self.0.id
    }

    pub fn value(&self) -> u64 {
        self.0.value.load(Ordering::Acquire)
    }

    pub(crate) fn set(&self, value: u64) {
        self.0.value.store(value, Ordering::Release);
    }
}

/// Something that happened on the timeline, in execution order.
#[derive(Debug, Clone)]
pub enum GpuEvent {
    Executed {
        queue: QueueType,
        list: ResourceId,
        commands: Arc<Vec<Command>>,
    },
    Signaled {
        queue: QueueType,
        fence: ResourceId,
        value: u64,
    },
    Waited {
        queue: QueueType,
        fence: ResourceId,
        value: u64,
    },
    Presented {
        swapchain: ResourceId,
        backbuffer: u32,
        sync_interval: u32,
    },
}

impl GpuEvent {
    pub fn queue(&self) -> QueueType {
        match self {
            GpuEvent::Executed { queue, .. } | GpuEvent::Signaled { queue, .. } | GpuEvent::Waited { queue, .. } => {
                *queue
            }
            GpuEvent::Presented { .. } => QueueType::Graphics,
        }
    }
}

#[derive(Debug)]
enum Op {
    Execute {
        list: ResourceId,
        commands: Arc<Vec<Command>>,
    },
    Signal(Fence, u64),
    Wait(Fence, u64),
    Present {
        swapchain: ResourceId,
        backbuffer: u32,
        sync_interval: u32,
    },
}

#[derive(Debug, Default)]
pub(crate) struct Timeline {
    queues: [VecDeque<Op>; QueueType::COUNT],
    pub(crate) events: Vec<GpuEvent>,
}

impl Timeline {
    pub(crate) fn pending(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    fn push(&mut self, queue: QueueType, op: Op) {
        self.queues[queue.index()].push_back(op);
    }

    /// Run every op whose queue is not blocked, until nothing moves.
    fn run(&mut self) {
        loop {
            let mut progressed = false;
            for queue in QueueType::ALL {
                while let Some(op) = self.queues[queue.index()].front() {
                    if let Op::Wait(fence, value) = op {
                        if fence.value() < *value {
                            break;
                        }
                    }
                    let Some(op) = self.queues[queue.index()].pop_front() else {
                        break;
                    };
                    self.retire(queue, op);
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
    }

    fn retire(&mut self, queue: QueueType, op: Op) {
        let event = match op {
            Op::Execute { list, commands } => {
                list::execute(&commands);
                GpuEvent::Executed { queue, list, commands }
            }
            Op::Signal(fence, value) => {
                fence.set(value);
                GpuEvent::Signaled {
                    queue,
                    fence: fence.id(),
                    value,
                }
            }
            Op::Wait(fence, value) => GpuEvent::Waited {
                queue,
                fence: fence.id(),
                value,
            },
            Op::Present {
                swapchain,
                backbuffer,
                sync_interval,
            } => GpuEvent::Presented {
                swapchain,
                backbuffer,
                sync_interval,
            },
        };
        self.events.push(event);
    }
}

pub(crate) fn pump(shared: &Shared) {
    shared.timeline.lock().run();
}

fn enqueue(shared: &Shared, queue: QueueType, op: Op) {
    let mut timeline = shared.timeline.lock();
    timeline.push(queue, op);
    if shared.auto_complete() {
        timeline.run();
    }
}

pub(crate) fn enqueue_present(shared: &Shared, swapchain: ResourceId, backbuffer: u32, sync_interval: u32) {
    enqueue(
        shared,
        QueueType::Graphics,
        Op::Present {
            swapchain,
            backbuffer,
            sync_interval,
        },
    );
}

pub struct Queue {
    kind: QueueType,
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Queue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").field("kind", &self.kind).finish()
    }
}

impl Queue {
    pub(crate) fn new(kind: QueueType, shared: Arc<Shared>) -> Self {
        Self { kind, shared }
    }

    pub fn kind(&self) -> QueueType {
        self.kind
    }
}

impl hal::Queue<Api> for Queue {
    fn execute(&self, lists: &[&CommandList]) {
        for list in lists {
            enqueue(
                &self.shared,
                self.kind,
                Op::Execute {
                    list: list.id(),
                    commands: list.snapshot(),
                },
            );
        }
    }

    fn signal(&self, fence: &Fence, value: u64) {
        enqueue(&self.shared, self.kind, Op::Signal(fence.clone(), value));
    }

    fn wait(&self, fence: &Fence, value: u64) {
        enqueue(&self.shared, self.kind, Op::Wait(fence.clone(), value));
    }
}
