//! Error type for renderer setup and the frame loop.

use thiserror::Error;

/// Failure anywhere in the renderer's public surface.
///
/// Both sources are fatal: the frame loop propagates them to the entry
/// point instead of attempting partial recovery.
#[derive(Error, Debug)]
pub enum RenderError {
    /// Failure in the Vulkan layer.
    #[error(transparent)]
    Rhi(#[from] deferred_rhi::RhiError),

    /// Failure in the windowing layer, e.g. surface creation.
    #[error(transparent)]
    Platform(#[from] deferred_core::Error),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_errors_keep_their_message() {
        let err: RenderError = deferred_rhi::RhiError::NoSuitableGpu.into();
        assert_eq!(err.to_string(), "no suitable GPU found");

        let err: RenderError = deferred_core::Error::Window("display handle lost".into()).into();
        assert_eq!(err.to_string(), "window error: display handle lost");
    }
}
