//! Builds a bind group with some bindings left empty and prints every descriptor slot
//! as the null backend stored it.
//! Run: cargo run --bin bind_group_dump

use vgpu::hal::DescriptorHeapKind;
use vgpu::null::NullConfig;
use vgpu::{
    BindGroupDesc, BindGroupEntry, BindGroupLayoutDesc, BindGroupLayoutEntry, BufferDesc, BufferUsage,
    DescriptorType, Device, LogLevel, SamplerDesc, SamplerFilter, TextureDesc, TextureUsage,
};

fn main() {
    env_logger::init();
    vgpu::set_log_level(LogLevel::Debug);
    vgpu::set_log_callback(|level, message| {
        if level <= LogLevel::Warn {
            eprintln!("[vgpu {:?}] {}", level, message);
        }
    });

    let device = Device::with_null(NullConfig::default()).expect("null device");
    let layout = device
        .create_bind_group_layout(&BindGroupLayoutDesc {
            label: Some("material"),
            entries: &[
                BindGroupLayoutEntry::new(0, DescriptorType::ConstantBuffer),
                BindGroupLayoutEntry {
                    count: 2,
                    ..BindGroupLayoutEntry::new(1, DescriptorType::SampledTexture)
                },
                BindGroupLayoutEntry::new(3, DescriptorType::StorageBuffer),
                BindGroupLayoutEntry {
                    count: 2,
                    ..BindGroupLayoutEntry::new(0, DescriptorType::Sampler)
                },
            ],
        })
        .expect("bind group layout");

    let constants = device
        .create_buffer(
            &BufferDesc {
                label: Some("constants"),
                size: 100,
                usage: BufferUsage::CONSTANT,
                ..Default::default()
            },
            None,
        )
        .expect("constant buffer");
    let albedo = device
        .create_texture(
            &TextureDesc {
                label: Some("albedo"),
                usage: TextureUsage::SHADER_READ,
                width: 64,
                height: 64,
                ..Default::default()
            },
            None,
        )
        .expect("texture");
    let linear = device
        .create_sampler(&SamplerDesc {
            min_filter: SamplerFilter::Linear,
            mag_filter: SamplerFilter::Linear,
            ..Default::default()
        })
        .expect("sampler");

    let group = device
        .create_bind_group(
            &layout,
            &BindGroupDesc {
                label: Some("material"),
                entries: &[
                    BindGroupEntry::buffer(0, &constants, 0, 0),
                    BindGroupEntry::texture(1, &albedo).at(1),
                    BindGroupEntry::sampler(0, &linear).at(1),
                ],
            },
        )
        .expect("bind group");

    for (kind, size) in [
        (DescriptorHeapKind::CbvSrvUav, layout.resource_table_size()),
        (DescriptorHeapKind::Sampler, layout.sampler_table_size()),
    ] {
        let Some(base) = group.descriptor_table(kind) else {
            continue;
        };
        println!("{:?} table at {}", kind, base);
        for slot in 0..size {
            let record = device.inspect_descriptor(kind, base + slot, true);
            println!("  [{}] {:?}", slot, record);
        }
    }

    vgpu::clear_log_callback();
    println!("vgpu bind group dump OK");
}
