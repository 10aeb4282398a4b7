mod common;

use vgpu::hal::NativeResource;
use vgpu::null::{self, BarrierRecord, Command, GpuEvent, ObjectKind};
use vgpu::{Device, Error, PresentMode, QueueType, ResourceState, SwapChain, SwapChainDesc, TextureFormat};

fn swapchain(device: &Device<null::Api>, surface: &null::Surface) -> SwapChain<null::Api> {
    device
        .create_swapchain(
            surface.clone(),
            &SwapChainDesc {
                width: 64,
                height: 64,
                format: TextureFormat::Bgra8Unorm,
                present_mode: PresentMode::Fifo,
                ..Default::default()
            },
        )
        .unwrap()
}

#[test]
fn frames_present_and_end_in_present_state() {
    let device = common::device();
    let surface = null::Surface::new(64, 64);
    let swapchain = swapchain(&device, &surface);
    assert_eq!(swapchain.buffer_count(), 2);
    assert_eq!(swapchain.size(), (64, 64));

    let mut cmd = device.begin_command_buffer(QueueType::Graphics, None).unwrap();
    let backbuffer = cmd.acquire_swapchain_texture(&swapchain).unwrap().unwrap();
    assert_eq!(backbuffer.format(), TextureFormat::Bgra8Unorm);
    let id = backbuffer.native().id();
    drop(backbuffer);
    device.submit(vec![cmd]).unwrap();

    let events = device.null_device().events();
    let commands = events
        .iter()
        .find_map(|e| match e {
            GpuEvent::Executed {
                queue: QueueType::Graphics,
                commands,
                ..
            } => Some(commands.clone()),
            _ => None,
        })
        .unwrap();
    let barriers: Vec<BarrierRecord> = commands
        .iter()
        .filter_map(|c| match c {
            Command::Barriers(b) => Some(b.clone()),
            _ => None,
        })
        .flatten()
        .filter(|b| b.resource() == id)
        .collect();
    assert_eq!(
        barriers.last(),
        Some(&BarrierRecord::Transition {
            resource: id,
            before: ResourceState::RENDER_TARGET,
            after: ResourceState::PRESENT,
        })
    );
    assert!(events
        .iter()
        .any(|e| matches!(e, GpuEvent::Presented { backbuffer: 0, sync_interval: 1, .. })));
    assert_eq!(swapchain.with_native(|raw| raw.present_count()), 1);
}

#[test]
fn acquire_follows_the_surface_size() {
    let device = common::device();
    let surface = null::Surface::new(64, 64);
    let swapchain = swapchain(&device, &surface);

    let mut cmd = device.begin_command_buffer(QueueType::Graphics, None).unwrap();
    let old = cmd.acquire_swapchain_texture(&swapchain).unwrap().unwrap();
    let old_id = old.native().id();
    drop(old);
    device.submit(vec![cmd]).unwrap();

    surface.set_size(128, 96);
    let mut cmd = device.begin_command_buffer(QueueType::Graphics, None).unwrap();
    let resized = cmd.acquire_swapchain_texture(&swapchain).unwrap().unwrap();
    assert_eq!((resized.width(), resized.height()), (128, 96));
    assert_eq!(swapchain.size(), (128, 96));
    assert_eq!(swapchain.with_native(|raw| (raw.width(), raw.height())), (128, 96));
    assert!(device.null_device().was_destroyed(ObjectKind::Texture, old_id));
    drop(resized);
    device.submit(vec![cmd]).unwrap();
}

#[test]
fn resize_keeps_buffers_released_this_frame() {
    let device = common::device();
    let null = device.null_device();
    let surface = null::Surface::new(64, 64);
    let swapchain = swapchain(&device, &surface);
    let src = common::buffer(&device, 64, None);
    let dst = common::buffer(&device, 64, None);
    let src_id = src.native().id();

    let mut cmd = device.begin_command_buffer(QueueType::Graphics, None).unwrap();
    cmd.copy_buffer_to_buffer(&src, 0, &dst, 0, 64);
    drop(src);
    surface.set_size(128, 128);
    let backbuffer = cmd.acquire_swapchain_texture(&swapchain).unwrap().unwrap();
    assert_eq!(backbuffer.width(), 128);
    assert!(!null.was_destroyed(ObjectKind::Buffer, src_id));
    drop(backbuffer);

    device.submit(vec![cmd]).unwrap();
    assert!(!null.was_destroyed(ObjectKind::Buffer, src_id));
    for _ in 0..vgpu::MAX_INFLIGHT_FRAMES {
        device.submit(Vec::new()).unwrap();
    }
    assert_eq!(null.destroy_count(ObjectKind::Buffer, src_id), 1);
}

#[test]
fn minimized_surface_yields_no_texture() {
    let device = common::device();
    let surface = null::Surface::new(64, 64);
    let swapchain = swapchain(&device, &surface);
    surface.set_size(0, 0);

    let mut cmd = device.begin_command_buffer(QueueType::Graphics, None).unwrap();
    assert!(cmd.acquire_swapchain_texture(&swapchain).unwrap().is_none());
    device.submit(vec![cmd]).unwrap();
    assert_eq!(swapchain.with_native(|raw| raw.present_count()), 0);
    assert_eq!(swapchain.size(), (64, 64));
}

#[test]
fn device_loss_during_resize_is_an_error() {
    let device = common::device();
    let surface = null::Surface::new(64, 64);
    let swapchain = swapchain(&device, &surface);
    device.null_device().simulate_device_lost();
    surface.set_size(32, 32);

    let mut cmd = device.begin_command_buffer(QueueType::Graphics, None).unwrap();
    let result = cmd.acquire_swapchain_texture(&swapchain);
    assert!(matches!(result, Err(Error::DeviceLost(_))));
}

#[test]
fn device_loss_during_present_fails_the_submit() {
    let device = common::device();
    let surface = null::Surface::new(64, 64);
    let swapchain = swapchain(&device, &surface);

    let mut cmd = device.begin_command_buffer(QueueType::Graphics, None).unwrap();
    assert!(cmd.acquire_swapchain_texture(&swapchain).unwrap().is_some());
    device.null_device().simulate_device_lost();
    assert!(matches!(device.submit(vec![cmd]), Err(Error::DeviceLost(_))));
}

#[test]
fn surfaces_without_present_support_are_rejected() {
    let device = common::device();
    let result = device.create_swapchain(null::Surface::unpresentable(64, 64), &SwapChainDesc::default());
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn mailbox_uses_three_buffers() {
    let device = common::device();
    let swapchain = device
        .create_swapchain(
            null::Surface::new(16, 16),
            &SwapChainDesc {
                present_mode: PresentMode::Mailbox,
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(swapchain.buffer_count(), 3);
    assert_eq!(swapchain.present_mode(), PresentMode::Mailbox);
}
