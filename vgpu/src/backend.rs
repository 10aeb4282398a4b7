//! Backend identification, availability and adapter selection.

use std::sync::OnceLock;

use crate::config::PowerPreference;
use crate::error::{Error, Result};
use crate::hal::Api;
use crate::logging::vgpu_warn;
use crate::types::{AdapterInfo, AdapterType, Features};

/// Native graphics API a device runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    /// Headless software timeline shipped with the crate.
    Null,
    Vulkan,
    D3D12,
    D3D11,
    OpenGL,
    WebGPU,
}

impl Backend {
    pub const ALL: [Backend; 6] = [
        Backend::Null,
        Backend::Vulkan,
        Backend::D3D12,
        Backend::D3D11,
        Backend::OpenGL,
        Backend::WebGPU,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Backend::Null => "null",
            Backend::Vulkan => "vulkan",
            Backend::D3D12 => "d3d12",
            Backend::D3D11 => "d3d11",
            Backend::OpenGL => "opengl",
            Backend::WebGPU => "webgpu",
        }
    }

    pub fn from_name(name: &str) -> Option<Backend> {
        let name = name.trim().to_ascii_lowercase();
        Backend::ALL.into_iter().find(|b| b.name() == name)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Entry of the compiled-in driver table.
#[derive(Debug, Clone, Copy)]
pub struct DriverInfo {
    pub backend: Backend,
    pub is_supported: fn() -> bool,
}

impl DriverInfo {
    pub const fn of<A: Api>() -> Self {
        Self {
            backend: A::BACKEND,
            is_supported: A::is_supported,
        }
    }
}

/// Drivers compiled into this build, in default-preference order.
pub static DRIVERS: &[DriverInfo] = &[DriverInfo::of::<crate::null::Api>()];

static AVAILABLE: [OnceLock<bool>; 6] = [
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
    OnceLock::new(),
];

/// Whether `backend` is compiled in and usable. Probed once per process.
pub fn is_backend_supported(backend: Backend) -> bool {
    *AVAILABLE[backend.slot()].get_or_init(|| probe(DRIVERS, backend))
}

fn probe(drivers: &[DriverInfo], backend: Backend) -> bool {
    drivers
        .iter()
        .find(|d| d.backend == backend)
        .is_some_and(|d| (d.is_supported)())
}

/// Resolve the backend a device will be created on.
pub fn select_backend(preferred: Option<Backend>) -> Result<Backend> {
    select_from(DRIVERS, preferred, is_backend_supported)
}

fn select_from(
    drivers: &[DriverInfo],
    preferred: Option<Backend>,
    supported: impl Fn(Backend) -> bool,
) -> Result<Backend> {
    if let Some(backend) = preferred {
        if supported(backend) {
            return Ok(backend);
        }
        vgpu_warn!("{} backend is not supported, fallback to default", backend.name());
    }
    drivers
        .iter()
        .map(|d| d.backend)
        .find(|b| supported(*b))
        .ok_or_else(|| Error::Unsupported("no supported backend in this build".into()))
}

fn type_score(adapter_type: AdapterType, preference: PowerPreference) -> u32 {
    match (preference, adapter_type) {
        (PowerPreference::LowPower, AdapterType::IntegratedGpu) => 4,
        (PowerPreference::LowPower, AdapterType::DiscreteGpu) => 3,
        (_, AdapterType::DiscreteGpu) => 4,
        (_, AdapterType::IntegratedGpu) => 3,
        (_, AdapterType::Unknown) => 2,
        (_, AdapterType::Cpu) => 1,
    }
}

/// Pick the best adapter: filter by required features, then score by adapter type
/// against the power preference, then by the largest 2D texture limit. Ties keep
/// enumeration order.
pub fn select_adapter(
    candidates: &[AdapterInfo],
    required: Features,
    preference: PowerPreference,
) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, info)| info.features.contains(required))
        .max_by(|(ia, a), (ib, b)| {
            let ka = (type_score(a.adapter_type, preference), a.limits.max_texture_dimension_2d);
            let kb = (type_score(b.adapter_type, preference), b.limits.max_texture_dimension_2d);
            // Reverse index order so the earliest adapter wins ties.
            ka.cmp(&kb).then(ib.cmp(ia))
        })
        .map(|(i, _)| i)
}
