mod common;

use vgpu::hal::{DescriptorHeapKind, DescriptorRecord, NativeResource, ViewKind};
use vgpu::{
    BindGroupDesc, BindGroupEntry, BindGroupLayoutDesc, BindGroupLayoutEntry, DescriptorType, PipelineLayoutDesc,
    SamplerAddressMode, SamplerDesc, SamplerFilter, TextureDesc, TextureUsage,
};

#[test]
fn missing_constant_buffer_reads_as_null_view() {
    let device = common::device();
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDesc {
            label: Some("material"),
            entries: &[
                BindGroupLayoutEntry::new(0, DescriptorType::ConstantBuffer),
                BindGroupLayoutEntry::new(1, DescriptorType::Sampler),
            ],
        })
        .unwrap();
    let desc = SamplerDesc {
        min_filter: SamplerFilter::Linear,
        mag_filter: SamplerFilter::Linear,
        address_u: SamplerAddressMode::Clamp,
        max_anisotropy: 4,
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

    let resources = group.descriptor_table(DescriptorHeapKind::CbvSrvUav).unwrap();
    let samplers = group.descriptor_table(DescriptorHeapKind::Sampler).unwrap();
    assert_eq!(
        device.inspect_descriptor(DescriptorHeapKind::CbvSrvUav, resources, true),
        Some(DescriptorRecord::Null(ViewKind::ConstantBuffer))
    );
    assert_eq!(
        device.inspect_descriptor(DescriptorHeapKind::Sampler, samplers, true),
        Some(DescriptorRecord::Sampler(desc))
    );
}

#[test]
fn populated_slots_carry_the_supplied_views() {
    let device = common::device();
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDesc {
            label: None,
            entries: &[
                BindGroupLayoutEntry::new(0, DescriptorType::SampledTexture),
                BindGroupLayoutEntry::new(1, DescriptorType::ReadOnlyStorageBuffer),
                BindGroupLayoutEntry::new(2, DescriptorType::StorageTexture),
            ],
        })
        .unwrap();
    let texture = device
        .create_texture(
            &TextureDesc {
                usage: TextureUsage::SHADER_READ | TextureUsage::SHADER_WRITE,
                width: 16,
                height: 16,
                ..Default::default()
            },
            None,
        )
        .unwrap();
    let buffer = common::buffer(&device, 128, None);
    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDesc {
                label: None,
                entries: &[
                    BindGroupEntry::texture(0, &texture),
                    BindGroupEntry::buffer(1, &buffer, 64, vgpu::WHOLE_SIZE),
                ],
            },
        )
        .unwrap();

    let base = group.descriptor_table(DescriptorHeapKind::CbvSrvUav).unwrap();
    let read = |i| device.inspect_descriptor(DescriptorHeapKind::CbvSrvUav, base + i, true);
    assert_eq!(
        read(0),
        Some(DescriptorRecord::TextureShaderResource {
            texture: texture.native().id()
        })
    );
    assert_eq!(
        read(1),
        Some(DescriptorRecord::BufferShaderResource {
            address: buffer.device_address() + 64,
            size: 64,
        })
    );
    assert_eq!(read(2), Some(DescriptorRecord::Null(ViewKind::UnorderedAccess)));
    assert_eq!(group.descriptor_table(DescriptorHeapKind::Sampler), None);
    // The group keeps what it references alive.
    assert_eq!(texture.ref_count(), 2);
}

#[test]
fn groups_survive_heap_growth() {
    let device = common::device();
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDesc {
            label: None,
            entries: &[BindGroupLayoutEntry::new(0, DescriptorType::Sampler)],
        })
        .unwrap();
    let desc = SamplerDesc {
        max_anisotropy: 16,
        ..Default::default()
    };
    let sampler = device.create_sampler(&desc).unwrap();
    let first = device
        .create_bind_group(
            &layout,
            &BindGroupDesc {
                label: None,
                entries: &[BindGroupEntry::sampler(0, &sampler)],
            },
        )
        .unwrap();
    let base = first.descriptor_table(DescriptorHeapKind::Sampler).unwrap();

    let groups: Vec<_> = (0..vgpu::SAMPLER_HEAP_SIZE)
        .map(|_| {
            device
                .create_bind_group(&layout, &BindGroupDesc { label: None, entries: &[] })
                .unwrap()
        })
        .collect();
    let last = groups.last().unwrap().descriptor_table(DescriptorHeapKind::Sampler).unwrap();
    assert!(last >= vgpu::SAMPLER_HEAP_SIZE);
    assert_eq!(
        device.inspect_descriptor(DescriptorHeapKind::Sampler, base, true),
        Some(DescriptorRecord::Sampler(desc))
    );
}

#[test]
fn pipeline_layouts_keep_group_order() {
    let device = common::device();
    let textures = device
        .create_bind_group_layout(&BindGroupLayoutDesc {
            label: None,
            entries: &[BindGroupLayoutEntry::new(0, DescriptorType::SampledTexture)],
        })
        .unwrap();
    let samplers = device
        .create_bind_group_layout(&BindGroupLayoutDesc {
            label: None,
            entries: &[BindGroupLayoutEntry::new(0, DescriptorType::Sampler)],
        })
        .unwrap();
    let layout = device
        .create_pipeline_layout(&PipelineLayoutDesc {
            label: Some("forward"),
            bind_group_layouts: &[textures.clone(), samplers.clone()],
            push_constant_ranges: &[],
        })
        .unwrap();
    assert_eq!(layout.bind_group_layouts(), &[textures, samplers]);
    assert_eq!(layout.resource_root_index(0), Some(0));
    assert_eq!(layout.resource_root_index(1), None);
    assert_eq!(layout.sampler_root_index(1), Some(1));
    assert_eq!(layout.label(), "forward");
}
