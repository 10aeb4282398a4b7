//! Error types for the runtime and the native layer beneath it.

use thiserror::Error;

use crate::backend::Backend;
use crate::logging::vgpu_error;

/// Failure reported by a native backend call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HalError {
    #[error("out of device memory")]
    OutOfMemory,
    #[error("device lost: {0}")]
    DeviceLost(String),
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("{0}")]
    Other(String),
}

/// Errors surfaced by the public API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("device was created for {requested:?} but this build resolves it to {compiled:?}")]
    BackendMismatch { requested: Backend, compiled: Backend },
    #[error("no adapter satisfies the requested features")]
    NoSuitableAdapter,
    #[error("out of device memory")]
    OutOfMemory,
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),
    /// Fatal; the device must be recreated.
    #[error("device lost: {0}")]
    DeviceLost(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<HalError> for Error {
    fn from(e: HalError) -> Self {
        match e {
            HalError::OutOfMemory => Error::OutOfMemory,
            HalError::DeviceLost(reason) => Error::DeviceLost(reason),
            HalError::Unsupported(what) => Error::Unsupported(what),
            HalError::Other(msg) => Error::Backend(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Log a rejected creation descriptor and build the matching error.
pub(crate) fn invalid_descriptor(msg: impl Into<String>) -> Error {
    let msg = msg.into();
    vgpu_error!("invalid descriptor: {}", msg);
    Error::InvalidDescriptor(msg)
}

/// Map a native creation failure, logging what could not be created.
pub(crate) fn creation_failed(what: &'static str) -> impl FnOnce(HalError) -> Error {
    move |e| {
        vgpu_error!("failed to create {}: {}", what, e);
        e.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_lost_keeps_reason() {
        let e: Error = HalError::DeviceLost("DXGI_ERROR_DEVICE_HUNG".into()).into();
        assert_eq!(e, Error::DeviceLost("DXGI_ERROR_DEVICE_HUNG".into()));
        assert!(e.to_string().contains("DEVICE_HUNG"));
    }
}
