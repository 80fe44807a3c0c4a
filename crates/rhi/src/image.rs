//! GPU image management.
//!
//! This module handles VkImage creation, image views, mip-level math, and
//! image layout transitions.
//!
//! # Overview
//!
//! - [`ImageDesc`] describes the image to create (extent, format, usage,
//!   aspect, mip levels, array layers)
//! - [`Image`] bundles VkImage + allocation + VkImageView into one value with
//!   a single teardown, so attachments and textures never need parallel
//!   handle arrays
//! - [`barrier_masks`] maps an (old, new) layout pair onto the stage/access
//!   masks a transition barrier needs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use deferred_rhi::device::Device;
//! use deferred_rhi::image::{Image, ImageDesc};
//! use ash::vk;
//!
//! # fn example(device: Arc<Device>) -> Result<(), deferred_rhi::RhiError> {
//! let desc = ImageDesc::color_attachment(1920, 1080, vk::Format::R8G8B8A8_UNORM);
//! let image = Image::new(device, &desc)?;
//! let view = image.view();
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::command::CommandBuffer;
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Description of an image to create.
#[derive(Clone, Copy, Debug)]
pub struct ImageDesc {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: vk::Format,
    /// Usage flags.
    pub usage: vk::ImageUsageFlags,
    /// Aspect mask for the view (COLOR or DEPTH).
    pub aspect: vk::ImageAspectFlags,
    /// Number of mip levels.
    pub mip_levels: u32,
    /// Number of array layers (6 for cubemaps).
    pub array_layers: u32,
    /// Extra creation flags (CUBE_COMPATIBLE for cubemaps).
    pub flags: vk::ImageCreateFlags,
    /// Debug name for the allocation.
    pub name: &'static str,
}

impl ImageDesc {
    /// A single-mip color attachment that downstream passes can sample and
    /// transfer from/to. This is the G-buffer attachment shape.
    pub fn color_attachment(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            width,
            height,
            format,
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: 1,
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
            name: "color_attachment",
        }
    }

    /// A single-mip sampleable depth attachment.
    pub fn depth_attachment(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            width,
            height,
            format,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT
                | vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::DEPTH,
            mip_levels: 1,
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
            name: "depth_attachment",
        }
    }

    /// A sampled 2D texture with a full mip chain.
    pub fn texture(width: u32, height: u32, format: vk::Format) -> Self {
        Self {
            width,
            height,
            format,
            usage: vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: Image::max_mip_levels(width, height),
            array_layers: 1,
            flags: vk::ImageCreateFlags::empty(),
            name: "texture",
        }
    }

    /// A 6-layer cube-compatible sampled image with a full mip chain.
    pub fn cubemap(size: u32, format: vk::Format) -> Self {
        Self {
            width: size,
            height: size,
            format,
            usage: vk::ImageUsageFlags::SAMPLED
                | vk::ImageUsageFlags::TRANSFER_SRC
                | vk::ImageUsageFlags::TRANSFER_DST,
            aspect: vk::ImageAspectFlags::COLOR,
            mip_levels: Image::max_mip_levels(size, size),
            array_layers: 6,
            flags: vk::ImageCreateFlags::CUBE_COMPATIBLE,
            name: "cubemap",
        }
    }
}

/// GPU image with managed memory and a default view.
///
/// # Resource Destruction
///
/// On drop, resources are destroyed in order: image view, image, allocation.
pub struct Image {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan image handle.
    image: vk::Image,
    /// Default image view covering all mips and layers.
    view: vk::ImageView,
    /// GPU memory allocation.
    allocation: Option<Allocation>,
    /// Pixel format.
    format: vk::Format,
    /// Image dimensions.
    extent: vk::Extent2D,
    /// Aspect mask of the default view.
    aspect: vk::ImageAspectFlags,
    /// Number of mip levels.
    mip_levels: u32,
    /// Number of array layers.
    array_layers: u32,
}

impl Image {
    /// Creates a new image and its default view.
    ///
    /// # Errors
    ///
    /// Returns an error if image creation, memory allocation, or image view
    /// creation fails. All are fatal at startup.
    pub fn new(device: Arc<Device>, desc: &ImageDesc) -> RhiResult<Self> {
        if desc.width == 0 || desc.height == 0 {
            return Err(RhiError::ImageError(
                "Image dimensions must be greater than 0".to_string(),
            ));
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D {
                width: desc.width,
                height: desc.height,
                depth: 1,
            })
            .mip_levels(desc.mip_levels)
            .array_layers(desc.array_layers)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .flags(desc.flags);

        let image = unsafe { device.handle().create_image(&image_info, None)? };

        let requirements = unsafe { device.handle().get_image_memory_requirements(image) };

        let allocation = {
            let mut allocator = device.allocator().lock().unwrap();
            allocator.allocate(&AllocationCreateDesc {
                name: desc.name,
                requirements,
                location: MemoryLocation::GpuOnly,
                linear: false, // Optimal tiling is not linear
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })?
        };

        unsafe {
            device
                .handle()
                .bind_image_memory(image, allocation.memory(), allocation.offset())?;
        }

        let view_type = if desc.array_layers == 6 {
            vk::ImageViewType::CUBE
        } else {
            vk::ImageViewType::TYPE_2D
        };

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(view_type)
            .format(desc.format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(desc.aspect)
                    .base_mip_level(0)
                    .level_count(desc.mip_levels)
                    .base_array_layer(0)
                    .layer_count(desc.array_layers),
            );

        let view = unsafe { device.handle().create_image_view(&view_info, None)? };

        debug!(
            "Created image '{}': {}x{} ({:?}, {} mips, {} layers)",
            desc.name, desc.width, desc.height, desc.format, desc.mip_levels, desc.array_layers
        );

        Ok(Self {
            device,
            image,
            view,
            allocation: Some(allocation),
            format: desc.format,
            extent: vk::Extent2D {
                width: desc.width,
                height: desc.height,
            },
            aspect: desc.aspect,
            mip_levels: desc.mip_levels,
            array_layers: desc.array_layers,
        })
    }

    /// Returns the number of mip levels in a full chain for the given
    /// dimensions: `floor(log2(max(w, h))) + 1`.
    pub fn max_mip_levels(width: u32, height: u32) -> u32 {
        32 - width.max(height).max(1).leading_zeros()
    }

    /// Returns the extent of mip level `level` given a base extent.
    ///
    /// Each level is half the previous (floor division), clamped to 1.
    pub fn mip_extent(width: u32, height: u32, level: u32) -> (u32, u32) {
        ((width >> level).max(1), (height >> level).max(1))
    }

    /// Records a layout transition barrier covering all mips and layers.
    pub fn cmd_transition_layout(
        &self,
        cmd: &CommandBuffer,
        old_layout: vk::ImageLayout,
        new_layout: vk::ImageLayout,
    ) {
        cmd_transition_image_layout(
            cmd,
            self.image,
            self.aspect,
            old_layout,
            new_layout,
            0,
            self.mip_levels,
            self.array_layers,
        );
    }

    /// Returns the Vulkan image handle.
    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Returns the default image view.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Returns the pixel format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Returns the image extent.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Returns the aspect mask of the default view.
    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        self.aspect
    }

    /// Returns the number of mip levels.
    #[inline]
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Returns the number of array layers.
    #[inline]
    pub fn array_layers(&self) -> u32 {
        self.array_layers
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_image_view(self.view, None);
            self.device.handle().destroy_image(self.image, None);
        }

        if let Some(allocation) = self.allocation.take() {
            let mut allocator = self.device.allocator().lock().unwrap();
            if let Err(e) = allocator.free(allocation) {
                tracing::error!("Failed to free image allocation: {:?}", e);
            }
        }

        debug!(
            "Destroyed image: {}x{} ({:?})",
            self.extent.width, self.extent.height, self.format
        );
    }
}

/// Maps an (old, new) layout pair onto the stage/access masks for a
/// transition barrier.
///
/// # Panics
///
/// Panics on an unhandled pair: that is a missing case in the frame
/// graph's barrier logic, a programmer error rather than a runtime
/// condition, and guessing masks for it would hide a synchronization bug.
pub fn barrier_masks(
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) -> (
    vk::PipelineStageFlags,
    vk::AccessFlags,
    vk::PipelineStageFlags,
    vk::AccessFlags,
) {
    use vk::ImageLayout as L;

    match (old_layout, new_layout) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => (
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
        ),
        (L::UNDEFINED, L::COLOR_ATTACHMENT_OPTIMAL) => (
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => (
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        (L::UNDEFINED, L::SHADER_READ_ONLY_OPTIMAL) => (
            vk::PipelineStageFlags::TOP_OF_PIPE,
            vk::AccessFlags::empty(),
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => (
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_READ,
        ),
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL)
        | (L::TRANSFER_SRC_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        (L::TRANSFER_DST_OPTIMAL, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => (
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        (L::COLOR_ATTACHMENT_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            vk::AccessFlags::SHADER_READ,
        ),
        (L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, L::DEPTH_STENCIL_READ_ONLY_OPTIMAL) => (
            vk::PipelineStageFlags::LATE_FRAGMENT_TESTS,
            vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
        ),
        (L::DEPTH_STENCIL_READ_ONLY_OPTIMAL, L::TRANSFER_SRC_OPTIMAL) => (
            vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_READ,
        ),
        (L::TRANSFER_SRC_OPTIMAL, L::DEPTH_STENCIL_READ_ONLY_OPTIMAL) => (
            vk::PipelineStageFlags::TRANSFER,
            vk::AccessFlags::TRANSFER_READ,
            vk::PipelineStageFlags::FRAGMENT_SHADER | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
            vk::AccessFlags::SHADER_READ | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ,
        ),
        (L::UNDEFINED, L::PRESENT_SRC_KHR) | (L::COLOR_ATTACHMENT_OPTIMAL, L::PRESENT_SRC_KHR) => (
            vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags::COLOR_ATTACHMENT_WRITE,
            vk::PipelineStageFlags::BOTTOM_OF_PIPE,
            vk::AccessFlags::empty(),
        ),
        _ => panic!(
            "unhandled image layout transition: {:?} -> {:?}",
            old_layout, new_layout
        ),
    }
}

/// Records a layout transition barrier for a mip/layer range of an image.
#[allow(clippy::too_many_arguments)]
pub fn cmd_transition_image_layout(
    cmd: &CommandBuffer,
    image: vk::Image,
    aspect: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
    base_mip_level: u32,
    mip_level_count: u32,
    layer_count: u32,
) {
    let (src_stage, src_access, dst_stage, dst_access) = barrier_masks(old_layout, new_layout);

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect)
                .base_mip_level(base_mip_level)
                .level_count(mip_level_count)
                .base_array_layer(0)
                .layer_count(layer_count),
        );

    cmd.pipeline_barrier(src_stage, dst_stage, &[barrier]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_mip_levels() {
        assert_eq!(Image::max_mip_levels(1, 1), 1);
        assert_eq!(Image::max_mip_levels(2, 2), 2);
        assert_eq!(Image::max_mip_levels(256, 256), 9);
        assert_eq!(Image::max_mip_levels(512, 256), 10);
        assert_eq!(Image::max_mip_levels(1080, 720), 11); // floor(log2(1080)) + 1
    }

    #[test]
    fn test_mip_chain_halves_until_one() {
        let (w, h) = (640, 480);
        let levels = Image::max_mip_levels(w, h);
        let mut prev = Image::mip_extent(w, h, 0);
        assert_eq!(prev, (640, 480));
        for level in 1..levels {
            let cur = Image::mip_extent(w, h, level);
            assert_eq!(cur.0, (prev.0 / 2).max(1));
            assert_eq!(cur.1, (prev.1 / 2).max(1));
            prev = cur;
        }
        assert_eq!(Image::mip_extent(w, h, levels - 1), (1, 1));
    }

    #[test]
    fn test_attachment_descs() {
        let color = ImageDesc::color_attachment(1920, 1080, vk::Format::R8G8B8A8_UNORM);
        assert!(color.usage.contains(vk::ImageUsageFlags::COLOR_ATTACHMENT));
        assert!(color.usage.contains(vk::ImageUsageFlags::SAMPLED));
        assert_eq!(color.mip_levels, 1);

        let depth = ImageDesc::depth_attachment(1024, 1024, vk::Format::D32_SFLOAT);
        assert!(
            depth
                .usage
                .contains(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
        );
        assert_eq!(depth.aspect, vk::ImageAspectFlags::DEPTH);

        let cube = ImageDesc::cubemap(512, vk::Format::R8G8B8A8_UNORM);
        assert_eq!(cube.array_layers, 6);
        assert!(cube.flags.contains(vk::ImageCreateFlags::CUBE_COMPATIBLE));
        assert_eq!(cube.mip_levels, 10);
    }

    #[test]
    fn test_barrier_masks_known_pairs() {
        let (src_stage, src_access, dst_stage, dst_access) = barrier_masks(
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
        assert_eq!(src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(src_access, vk::AccessFlags::empty());
        assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(dst_access, vk::AccessFlags::TRANSFER_WRITE);

        let (_, _, dst_stage, dst_access) = barrier_masks(
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
        assert_eq!(dst_access, vk::AccessFlags::SHADER_READ);
    }

    #[test]
    #[should_panic(expected = "unhandled image layout transition")]
    fn test_barrier_masks_rejects_unhandled_pair() {
        barrier_masks(
            vk::ImageLayout::PRESENT_SRC_KHR,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        );
    }
}
