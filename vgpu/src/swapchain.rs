//! Presentable swapchains.
//!
//! The runtime never resizes a swapchain on its own: the surface size is read when a
//! command buffer acquires the backbuffer, and a mismatch triggers an idle + resize
//! right there.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::device::DeviceShared;
use crate::error::{Error, Result};
use crate::hal::{Api, Device as _, SwapChain as _};
use crate::logging::{vgpu_error, vgpu_info, vgpu_warn};
use crate::resource::Texture;
use crate::types::{PresentMode, SwapChainDesc, TextureDesc, TextureDimension, TextureFormat, TextureUsage};

struct SwapState<A: Api> {
    raw: A::SwapChain,
    width: u32,
    height: u32,
    backbuffers: Vec<Texture<A>>,
}

pub struct SwapChain<A: Api> {
    inner: Arc<SwapChainInner<A>>,
}

struct SwapChainInner<A: Api> {
    state: Mutex<SwapState<A>>,
    surface: A::Surface,
    desc: SwapChainDesc,
    shared: Arc<DeviceShared<A>>,
}

impl<A: Api> Drop for SwapChainInner<A> {
    fn drop(&mut self) {
        // The native swap object is destroyed directly, so nothing may still present from it.
        if let Err(e) = self.shared.wait_idle() {
            vgpu_warn!("swapchain dropped without an idle device: {}", e);
        }
        self.state.get_mut().backbuffers.clear();
    }
}

fn wrap_backbuffers<A: Api>(
    shared: &Arc<DeviceShared<A>>,
    raw: &A::SwapChain,
    desc: &SwapChainDesc,
    width: u32,
    height: u32,
) -> Result<Vec<Texture<A>>> {
    let textures = shared.raw.swapchain_buffers(raw)?;
    Ok(textures
        .into_iter()
        .map(|texture| {
            Texture::from_backbuffer(
                shared,
                texture,
                TextureDesc {
                    label: desc.label,
                    dimension: TextureDimension::D2,
                    format: desc.format,
                    usage: TextureUsage::SHADER_READ | TextureUsage::RENDER_TARGET,
                    width,
                    height,
                    ..Default::default()
                },
            )
        })
        .collect())
}

impl<A: Api> SwapChain<A> {
    pub(crate) fn create(shared: &Arc<DeviceShared<A>>, surface: A::Surface, desc: &SwapChainDesc) -> Result<Self> {
        let graphics = &shared.queues[crate::types::QueueType::Graphics.index()];
        if !shared.raw.surface_supported(graphics, &surface) {
            return Err(Error::Unsupported("graphics queue cannot present to this surface".into()));
        }
        let buffer_count = desc.present_mode.buffer_count();
        let raw = shared
            .raw
            .create_swapchain(graphics, &surface, desc, buffer_count)
            .map_err(crate::error::creation_failed("swapchain"))?;

        let (mut width, mut height) = shared.raw.surface_size(&surface);
        if width == 0 || height == 0 {
            width = desc.width.max(1);
            height = desc.height.max(1);
        }
        let backbuffers = wrap_backbuffers(shared, &raw, desc, width, height)?;
        vgpu_info!(
            "created {}x{} {:?} swapchain with {} buffers",
            width,
            height,
            desc.format,
            backbuffers.len()
        );
        Ok(Self {
            inner: Arc::new(SwapChainInner {
                state: Mutex::new(SwapState {
                    raw,
                    width,
                    height,
                    backbuffers,
                }),
                surface,
                desc: *desc,
                shared: shared.clone(),
            }),
        })
    }

    pub fn format(&self) -> TextureFormat {
        self.inner.desc.format
    }

    pub fn present_mode(&self) -> PresentMode {
        self.inner.desc.present_mode
    }

    /// Size of the current backbuffers.
    pub fn size(&self) -> (u32, u32) {
        let state = self.inner.state.lock();
        (state.width, state.height)
    }

    pub fn buffer_count(&self) -> usize {
        self.inner.state.lock().backbuffers.len()
    }

    pub fn surface(&self) -> &A::Surface {
        &self.inner.surface
    }

    /// Run `f` against the backend swap object.
    pub fn with_native<R>(&self, f: impl FnOnce(&A::SwapChain) -> R) -> R {
        f(&self.inner.state.lock().raw)
    }

    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub(crate) fn current_backbuffer(&self) -> Option<Texture<A>> {
        let state = self.inner.state.lock();
        let index = state.raw.current_backbuffer_index() as usize;
        state.backbuffers.get(index).cloned()
    }

    /// Current backbuffer, after matching the surface size. `None` when minimized.
    pub(crate) fn acquire(&self) -> Result<Option<Texture<A>>> {
        let shared = &self.inner.shared;
        let (width, height) = shared.raw.surface_size(&self.inner.surface);
        if width == 0 || height == 0 {
            return Ok(None);
        }
        let mut state = self.inner.state.lock();
        if (width, height) != (state.width, state.height) {
            self.resize(&mut state, width, height)?;
        }
        let index = state.raw.current_backbuffer_index() as usize;
        Ok(state.backbuffers.get(index).cloned())
    }

    fn resize(&self, state: &mut SwapState<A>, width: u32, height: u32) -> Result<()> {
        let shared = &self.inner.shared;
        vgpu_info!("resizing swapchain {}x{} -> {}x{}", state.width, state.height, width, height);
        shared.wait_idle()?;

        if state.backbuffers.iter().any(|b| b.ref_count() > 1) {
            vgpu_warn!("backbuffer textures are still referenced across a swapchain resize");
        }
        // Only the old images skip the in-flight window. Anything else released this frame
        // may still be referenced by a command buffer being recorded.
        for backbuffer in state.backbuffers.drain(..) {
            backbuffer.retire_backbuffer();
        }

        shared
            .raw
            .resize_swapchain(&mut state.raw, width, height)
            .map_err(|e| {
                vgpu_error!("swapchain resize failed: {}", e);
                Error::from(e)
            })?;
        state.backbuffers = wrap_backbuffers(shared, &state.raw, &self.inner.desc, width, height)?;
        state.width = width;
        state.height = height;
        Ok(())
    }

    pub(crate) fn present(&self) -> Result<()> {
        let state = self.inner.state.lock();
        state
            .raw
            .present(self.inner.desc.present_mode.sync_interval())
            .map_err(|e| {
                vgpu_error!("present failed: {}", e);
                Error::from(e)
            })
    }
}

impl<A: Api> Clone for SwapChain<A> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<A: Api> PartialEq for SwapChain<A> {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A: Api> Eq for SwapChain<A> {}

impl<A: Api> std::fmt::Debug for SwapChain<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (width, height) = self.size();
        f.debug_struct("SwapChain")
            .field("size", &(width, height))
            .field("format", &self.inner.desc.format)
            .field("present_mode", &self.inner.desc.present_mode)
            .finish()
    }
}
