mod common;

use vgpu::hal::{DescriptorHeapKind, DescriptorRecord};
use vgpu::null::{self, Command};
use vgpu::{
    BindGroup, BindGroupDesc, BindGroupEntry, BindGroupLayout, BindGroupLayoutDesc, BindGroupLayoutEntry, CommandBuffer,
    ComputePipelineDesc, DescriptorType, Device, Pipeline, PipelineLayout, PipelineLayoutDesc, QueueType, Sampler,
    SamplerDesc, ShaderStageDesc, ShaderStages,
};

struct Scene {
    buffers: BindGroupLayout,
    samplers: BindGroupLayout,
    layout: PipelineLayout<null::Api>,
    sampler: Sampler<null::Api>,
}

impl Scene {
    fn new(device: &Device<null::Api>) -> Self {
        let buffers = device
            .create_bind_group_layout(&BindGroupLayoutDesc {
                label: Some("buffers"),
                entries: &[BindGroupLayoutEntry::new(0, DescriptorType::ReadOnlyStorageBuffer)],
            })
            .unwrap();
        let samplers = device
            .create_bind_group_layout(&BindGroupLayoutDesc {
                label: Some("samplers"),
                entries: &[BindGroupLayoutEntry::new(0, DescriptorType::Sampler)],
            })
            .unwrap();
        let layout = device
            .create_pipeline_layout(&PipelineLayoutDesc {
                label: None,
                bind_group_layouts: &[buffers.clone(), samplers.clone()],
                push_constant_ranges: &[],
            })
            .unwrap();
        let sampler = device.create_sampler(&SamplerDesc::default()).unwrap();
        Self {
            buffers,
            samplers,
            layout,
            sampler,
        }
    }

    fn pipeline(&self, device: &Device<null::Api>) -> Pipeline<null::Api> {
        let shader = ShaderStageDesc {
            stage: ShaderStages::COMPUTE,
            bytecode: Vec::new(),
            entry_point: "main".into(),
        };
        device
            .create_compute_pipeline(&ComputePipelineDesc {
                label: None,
                layout: &self.layout,
                shader: &shader,
            })
            .unwrap()
    }

    fn buffer_group(&self, device: &Device<null::Api>, size: u64) -> BindGroup<null::Api> {
        let buffer = common::buffer(device, size, None);
        device
            .create_bind_group(
                &self.buffers,
                &BindGroupDesc {
                    label: None,
                    entries: &[BindGroupEntry::buffer(0, &buffer, 0, vgpu::WHOLE_SIZE)],
                },
            )
            .unwrap()
    }

    fn sampler_group(&self, device: &Device<null::Api>) -> BindGroup<null::Api> {
        device
            .create_bind_group(
                &self.samplers,
                &BindGroupDesc {
                    label: None,
                    entries: &[BindGroupEntry::sampler(0, &self.sampler)],
                },
            )
            .unwrap()
    }
}

/// (root index, table base) of every root table set from command `from` on.
fn root_tables(cmd: &CommandBuffer<null::Api>, from: usize) -> Vec<(u32, u32)> {
    cmd.native().commands()[from..]
        .iter()
        .filter_map(|c| match c {
            Command::SetRootTable {
                compute: true,
                root_index,
                base,
                ..
            } => Some((*root_index, *base)),
            _ => None,
        })
        .collect()
}

fn recorded(cmd: &CommandBuffer<null::Api>) -> usize {
    cmd.native().commands().len()
}

#[test]
fn dirty_groups_bind_at_their_root_indices() {
    let device = common::device();
    let scene = Scene::new(&device);
    let pipeline = scene.pipeline(&device);
    let buffers = scene.buffer_group(&device, 64);
    let samplers = scene.sampler_group(&device);
    let buffer_base = buffers.descriptor_table(DescriptorHeapKind::CbvSrvUav).unwrap();
    let sampler_base = samplers.descriptor_table(DescriptorHeapKind::Sampler).unwrap();

    let mut cmd = device.begin_command_buffer(QueueType::Compute, None).unwrap();
    cmd.set_pipeline(&pipeline);
    cmd.set_bind_group(0, &buffers);
    cmd.set_bind_group(1, &samplers);
    cmd.dispatch(1, 1, 1);
    assert_eq!(
        root_tables(&cmd, 0),
        vec![
            (scene.layout.resource_root_index(0).unwrap(), buffer_base),
            (scene.layout.sampler_root_index(1).unwrap(), sampler_base),
        ]
    );

    // Nothing changed, nothing is re-bound.
    let mark = recorded(&cmd);
    cmd.dispatch(1, 1, 1);
    assert!(root_tables(&cmd, mark).is_empty());

    // Only the replaced group is re-bound.
    let other = scene.sampler_group(&device);
    let other_base = other.descriptor_table(DescriptorHeapKind::Sampler).unwrap();
    let mark = recorded(&cmd);
    cmd.set_bind_group(1, &other);
    cmd.dispatch(1, 1, 1);
    assert_eq!(root_tables(&cmd, mark), vec![(1, other_base)]);
    device.submit(vec![cmd]).unwrap();
}

#[test]
fn new_pipeline_rebinds_every_group() {
    let device = common::device();
    let scene = Scene::new(&device);
    let first = scene.pipeline(&device);
    let second = scene.pipeline(&device);
    let buffers = scene.buffer_group(&device, 64);
    let samplers = scene.sampler_group(&device);

    let mut cmd = device.begin_command_buffer(QueueType::Compute, None).unwrap();
    cmd.set_pipeline(&first);
    cmd.set_bind_group(0, &buffers);
    cmd.set_bind_group(1, &samplers);
    cmd.dispatch(1, 1, 1);

    let mark = recorded(&cmd);
    cmd.set_pipeline(&first);
    cmd.dispatch(1, 1, 1);
    assert!(root_tables(&cmd, mark).is_empty());

    let mark = recorded(&cmd);
    cmd.set_pipeline(&second);
    cmd.dispatch(1, 1, 1);
    let rebound: Vec<u32> = root_tables(&cmd, mark).into_iter().map(|(root, _)| root).collect();
    assert_eq!(rebound, vec![0, 1]);
    device.submit(vec![cmd]).unwrap();
}

#[test]
fn heap_growth_rebinds_heaps_and_tables() {
    let device = common::device();
    let scene = Scene::new(&device);
    let pipeline = scene.pipeline(&device);
    let buffers = scene.buffer_group(&device, 64);
    let samplers = scene.sampler_group(&device);
    let sampler_base = samplers.descriptor_table(DescriptorHeapKind::Sampler).unwrap();

    let mut cmd = device.begin_command_buffer(QueueType::Compute, None).unwrap();
    cmd.set_pipeline(&pipeline);
    cmd.set_bind_group(0, &buffers);
    cmd.set_bind_group(1, &samplers);
    cmd.dispatch(1, 1, 1);

    // Fills the sampler heap past its capacity, which replaces the native heaps.
    let large = device
        .create_bind_group_layout(&BindGroupLayoutDesc {
            label: None,
            entries: &[BindGroupLayoutEntry {
                count: vgpu::SAMPLER_HEAP_SIZE,
                ..BindGroupLayoutEntry::new(0, DescriptorType::Sampler)
            }],
        })
        .unwrap();
    let _filler = device
        .create_bind_group(&large, &BindGroupDesc { label: None, entries: &[] })
        .unwrap();

    let mark = recorded(&cmd);
    cmd.dispatch(1, 1, 1);
    let commands = &cmd.native().commands()[mark..];
    let heaps_at = commands
        .iter()
        .position(|c| matches!(c, Command::SetDescriptorHeaps { .. }))
        .expect("heaps re-bound after growth");
    let tables = root_tables(&cmd, mark + heaps_at);
    assert_eq!(tables.len(), 2);
    assert!(tables.contains(&(1, sampler_base)));
    assert!(matches!(commands.last(), Some(Command::Dispatch { .. })));
    device.submit(vec![cmd]).unwrap();
}

#[test]
fn dropped_group_slots_wait_for_the_gpu() {
    let device = common::manual_device();
    let scene = Scene::new(&device);
    let pipeline = scene.pipeline(&device);
    let first = scene.buffer_group(&device, 64);
    let base = first.descriptor_table(DescriptorHeapKind::CbvSrvUav).unwrap();
    let before = device.inspect_descriptor(DescriptorHeapKind::CbvSrvUav, base, true);
    assert!(matches!(before, Some(DescriptorRecord::BufferShaderResource { size: 64, .. })));

    let mut cmd = device.begin_command_buffer(QueueType::Compute, None).unwrap();
    cmd.set_pipeline(&pipeline);
    cmd.set_bind_group(0, &first);
    cmd.dispatch(1, 1, 1);
    device.submit(vec![cmd]).unwrap();
    assert!(device.null_device().pending_operations() > 0);

    drop(first);
    let second = scene.buffer_group(&device, 128);
    assert_ne!(second.descriptor_table(DescriptorHeapKind::CbvSrvUav), Some(base));
    assert_eq!(device.inspect_descriptor(DescriptorHeapKind::CbvSrvUav, base, true), before);

    // Once the frame has retired the slots are handed out again.
    for _ in 0..=vgpu::MAX_INFLIGHT_FRAMES {
        device.submit(Vec::new()).unwrap();
    }
    let third = scene.buffer_group(&device, 256);
    assert_eq!(third.descriptor_table(DescriptorHeapKind::CbvSrvUav), Some(base));
}
