//! Renders a few frames of a triangle into a null swapchain, resizing the surface half way.
//! Run: cargo run --bin headless_frames

use vgpu::null::{self, NullConfig};
use vgpu::{
    BindGroupDesc, BindGroupEntry, BindGroupLayoutDesc, BindGroupLayoutEntry, BufferDesc, BufferUsage, Color,
    DescriptorType, Device, PipelineLayoutDesc, QueryHeapDesc, QueryType, QueueType, RenderPassColorAttachment,
    RenderPassDesc, RenderPipelineDesc, ShaderStageDesc, ShaderStages, SwapChainDesc, TextureFormat,
    VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode, WHOLE_SIZE,
};

const FRAMES: u32 = 6;

fn main() {
    env_logger::init();

    let device = Device::with_null(NullConfig::default()).expect("null device");
    let surface = null::Surface::new(320, 240);
    let swapchain = device
        .create_swapchain(
            surface.clone(),
            &SwapChainDesc {
                label: Some("main"),
                width: 320,
                height: 240,
                format: TextureFormat::Bgra8Unorm,
                ..Default::default()
            },
        )
        .expect("create_swapchain");

    let vertices: [f32; 9] = [0.0, 0.6, 0.0, -0.6, -0.6, 0.0, 0.6, -0.6, 0.0];
    let vertex_buffer = device
        .create_buffer(
            &BufferDesc {
                label: Some("vertices"),
                size: std::mem::size_of_val(&vertices) as u64,
                usage: BufferUsage::VERTEX,
                ..Default::default()
            },
            Some(bytemuck::cast_slice(&vertices)),
        )
        .expect("create vertex buffer");

    let color: [f32; 4] = [0.2, 0.8, 0.2, 1.0];
    let uniforms = device
        .create_buffer(
            &BufferDesc {
                label: Some("color"),
                size: std::mem::size_of_val(&color) as u64,
                usage: BufferUsage::CONSTANT,
                ..Default::default()
            },
            Some(bytemuck::bytes_of(&color)),
        )
        .expect("create constant buffer");

    let group_layout = device
        .create_bind_group_layout(&BindGroupLayoutDesc {
            label: Some("color"),
            entries: &[BindGroupLayoutEntry::new(0, DescriptorType::ConstantBuffer)],
        })
        .expect("bind group layout");
    let group = device
        .create_bind_group(
            &group_layout,
            &BindGroupDesc {
                label: Some("color"),
                entries: &[BindGroupEntry::buffer(0, &uniforms, 0, WHOLE_SIZE)],
            },
        )
        .expect("bind group");
    let layout = device
        .create_pipeline_layout(&PipelineLayoutDesc {
            label: Some("triangle"),
            bind_group_layouts: &[group_layout],
            push_constant_ranges: &[],
        })
        .expect("pipeline layout");

    // The null backend accepts any bytecode.
    let stages = [
        ShaderStageDesc {
            stage: ShaderStages::VERTEX,
            bytecode: Vec::new(),
            entry_point: "vs_main".into(),
        },
        ShaderStageDesc {
            stage: ShaderStages::FRAGMENT,
            bytecode: Vec::new(),
            entry_point: "fs_main".into(),
        },
    ];
    let vertex_layouts = [VertexBufferLayout {
        stride: 12,
        step_mode: VertexStepMode::Vertex,
        attributes: vec![VertexAttribute {
            format: VertexFormat::Float3,
            offset: 0,
            shader_location: 0,
        }],
    }];
    let color_formats = [TextureFormat::Bgra8Unorm];
    let pipeline = device
        .create_render_pipeline(&RenderPipelineDesc {
            label: Some("triangle"),
            shader_stages: &stages,
            vertex_layouts: &vertex_layouts,
            color_formats: &color_formats,
            ..RenderPipelineDesc::new(&layout)
        })
        .expect("render pipeline");

    let timestamps = device
        .create_query_heap(&QueryHeapDesc {
            label: Some("frame time"),
            query_type: QueryType::Timestamp,
            count: 2,
        })
        .expect("query heap");
    let resolve = device
        .create_buffer(
            &BufferDesc {
                label: Some("timestamps"),
                size: 16,
                ..Default::default()
            },
            None,
        )
        .expect("resolve buffer");

    for frame in 0..FRAMES {
        if frame == FRAMES / 2 {
            log::info!("resizing surface to 640x480");
            surface.set_size(640, 480);
        }
        let mut cmd = device
            .begin_command_buffer(QueueType::Graphics, Some("frame"))
            .expect("begin_command_buffer");
        let Some(backbuffer) = cmd.acquire_swapchain_texture(&swapchain).expect("acquire") else {
            device.submit(vec![cmd]).expect("submit");
            continue;
        };
        cmd.end_query(&timestamps, 0);
        let attachments = [RenderPassColorAttachment::clear(
            &backbuffer,
            Color {
                r: 0.1,
                g: 0.1,
                b: 0.1,
                a: 1.0,
            },
        )];
        cmd.begin_render_pass(&RenderPassDesc {
            label: Some("triangle"),
            color_attachments: &attachments,
            depth_stencil_attachment: None,
        })
        .expect("begin_render_pass");
        cmd.set_pipeline(&pipeline);
        cmd.set_bind_group(0, &group);
        cmd.set_vertex_buffer(0, &vertex_buffer, 0);
        cmd.draw(3, 1, 0, 0);
        cmd.end_render_pass();
        cmd.end_query(&timestamps, 1);
        cmd.resolve_query(&timestamps, 0, 2, &resolve, 0);

        let submitted = device.submit(vec![cmd]).expect("submit");
        let (width, height) = swapchain.size();
        println!("frame {} presented at {}x{}", submitted, width, height);
    }

    device.wait_idle().expect("wait_idle");
    let presents = swapchain.with_native(|raw| raw.present_count());
    assert_eq!(presents, FRAMES as u64);
    println!("vgpu headless frames OK ({} presents)", presents);
}
