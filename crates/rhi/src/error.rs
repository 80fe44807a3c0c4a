//! Error type shared by all RHI modules.

use thiserror::Error;

/// Failure in the Vulkan layer.
///
/// Setup failures (device selection, allocation, pipeline creation) are
/// fatal for the renderer: callers propagate them to the entry point
/// instead of attempting partial-initialization recovery.
#[derive(Error, Debug)]
pub enum RhiError {
    #[error("Vulkan error: {0}")]
    VulkanError(#[from] ash::vk::Result),

    #[error("failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    #[error("allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    #[error("no suitable GPU found")]
    NoSuitableGpu,

    #[error("shader error: {0}")]
    ShaderError(String),

    #[error("surface error: {0}")]
    SurfaceError(String),

    #[error("swapchain error: {0}")]
    SwapchainError(String),

    #[error("invalid handle: {0}")]
    InvalidHandle(String),

    #[error("pipeline error: {0}")]
    PipelineError(String),

    #[error("image error: {0}")]
    ImageError(String),
}

pub type RhiResult<T> = std::result::Result<T, RhiError>;
