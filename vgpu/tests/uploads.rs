mod common;

use vgpu::hal::NativeResource;
use vgpu::null::GpuEvent;
use vgpu::{BufferDesc, CpuAccessMode, QueueType};

fn executed_on(events: &[GpuEvent], queue: QueueType) -> Vec<usize> {
    events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            GpuEvent::Executed { queue: q, .. } if *q == queue => Some(i),
            _ => None,
        })
        .collect()
}

#[test]
fn dependent_work_runs_after_the_copy() {
    let device = common::manual_device();
    let null = device.null_device();
    let data: Vec<u8> = (0..64u32).flat_map(|v| v.to_le_bytes()).collect();
    let source = common::buffer(&device, data.len() as u64, Some(&data));
    let target = common::buffer(&device, data.len() as u64, None);
    assert!(null.buffer_contents(source.native()).iter().all(|&b| b == 0));

    let mut cmd = device.begin_command_buffer(QueueType::Graphics, None).unwrap();
    cmd.copy_buffer_to_buffer(&source, 0, &target, 0, data.len() as u64);
    device.submit(vec![cmd]).unwrap();
    null.advance();

    let events = null.events();
    let copy = executed_on(&events, QueueType::Copy);
    let graphics = executed_on(&events, QueueType::Graphics);
    assert_eq!(copy.len(), 1);
    assert_eq!(graphics.len(), 1);
    assert!(copy[0] < graphics[0]);
    assert!(events[..graphics[0]]
        .iter()
        .any(|e| matches!(e, GpuEvent::Waited { queue: QueueType::Graphics, .. })));
    assert_eq!(null.buffer_contents(target.native()), data);
}

#[test]
fn every_queue_waits_for_initial_data() {
    let device = common::device();
    let null = device.null_device();
    null.clear_events();
    let _buffer = common::buffer(&device, 16, Some(&[1u8; 16]));
    let waited: Vec<QueueType> = null
        .events()
        .iter()
        .filter_map(|e| match e {
            GpuEvent::Waited { queue, .. } => Some(*queue),
            _ => None,
        })
        .collect();
    assert_eq!(waited.len(), QueueType::COUNT);
    for queue in QueueType::ALL {
        assert!(waited.contains(&queue));
    }
}

#[test]
fn upload_memory_is_written_directly() {
    let device = common::device();
    let null = device.null_device();
    null.clear_events();
    let buffer = device
        .create_buffer(
            &BufferDesc {
                size: 8,
                cpu_access: CpuAccessMode::Write,
                ..Default::default()
            },
            Some(bytemuck::cast_slice(&[3u32, 4u32])),
        )
        .unwrap();
    assert!(null.events().is_empty());
    assert_eq!(null.buffer_contents(buffer.native()), bytemuck::cast_slice::<u32, u8>(&[3, 4]));
}
