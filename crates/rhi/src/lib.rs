//! Render hardware interface: safe wrappers over `ash`.
//!
//! Covers instance/device bring-up, swapchain lifetime, command recording,
//! buffers and images with gpu-allocator memory, graphics pipelines built
//! for dynamic rendering, and frame synchronization.

mod error;

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod instance;
pub mod physical_device;
pub mod pipeline;
pub mod rendering;
pub mod sampler;
pub mod shader;
pub mod swapchain;
pub mod sync;
pub mod texture;
pub mod vertex;

pub use error::{RhiError, RhiResult};

// Re-export ash types that users might need
pub use ash::vk;
