//! Platform-level error type.

use thiserror::Error;

/// Errors from windowing and surface setup.
///
/// These are fatal: they propagate out of initialization to the entry
/// point, which logs them and exits with a failure status.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Vulkan error: {0}")]
    Vulkan(String),

    #[error("window error: {0}")]
    Window(String),
}

pub type Result<T> = std::result::Result<T, Error>;
