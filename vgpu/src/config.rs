//! Device creation options.

use crate::backend::Backend;
use crate::types::Features;

/// Native validation layer mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    Disabled,
    Enabled,
    /// Validation plus info-level debug messages.
    Verbose,
    /// GPU-based validation where the backend supports it.
    Gpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    Undefined,
    LowPower,
    HighPerformance,
}

/// Options for `vgpu::create_device` / `Device::new`.
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub label: Option<&'static str>,
    /// Backend to try first; falls back to the first supported one.
    pub preferred_backend: Option<Backend>,
    pub validation: ValidationMode,
    pub power_preference: PowerPreference,
    /// Adapters missing any of these are never selected.
    pub required_features: Features,
}

impl Default for DeviceDesc {
    fn default() -> Self {
        Self {
            label: None,
            preferred_backend: None,
            validation: if cfg!(feature = "validation") {
                ValidationMode::Enabled
            } else {
                ValidationMode::Disabled
            },
            power_preference: PowerPreference::HighPerformance,
            required_features: Features::empty(),
        }
    }
}

impl DeviceDesc {
    /// Applies `VGPU_VALIDATION` and `VGPU_BACKEND` from the environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var("VGPU_VALIDATION").ok().as_deref(),
            std::env::var("VGPU_BACKEND").ok().as_deref(),
        )
    }

    fn with_overrides(mut self, validation: Option<&str>, backend: Option<&str>) -> Self {
        if let Some(v) = validation {
            match parse_validation(v) {
                Some(mode) => self.validation = mode,
                None => log::warn!(target: "vgpu", "ignoring VGPU_VALIDATION={:?}", v),
            }
        }
        if let Some(b) = backend {
            match Backend::from_name(b) {
                Some(backend) => self.preferred_backend = Some(backend),
                None => log::warn!(target: "vgpu", "ignoring unknown VGPU_BACKEND={:?}", b),
            }
        }
        self
    }
}

fn parse_validation(value: &str) -> Option<ValidationMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "0" | "off" | "false" => Some(ValidationMode::Disabled),
        "1" | "on" | "true" => Some(ValidationMode::Enabled),
        "verbose" => Some(ValidationMode::Verbose),
        "gpu" => Some(ValidationMode::Gpu),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_parse() {
        let desc = DeviceDesc::default().with_overrides(Some("verbose"), Some("null"));
        assert_eq!(desc.validation, ValidationMode::Verbose);
        assert_eq!(desc.preferred_backend, Some(Backend::Null));
    }

    #[test]
    fn bad_overrides_are_ignored() {
        let base = DeviceDesc {
            validation: ValidationMode::Disabled,
            ..Default::default()
        };
        let desc = base.with_overrides(Some("sometimes"), Some("metal"));
        assert_eq!(desc.validation, ValidationMode::Disabled);
        assert_eq!(desc.preferred_backend, None);
    }
}
