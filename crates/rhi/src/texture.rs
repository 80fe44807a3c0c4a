//! Sampled GPU textures.
//!
//! This module handles uploading decoded pixel data into device-local images
//! and generating full mip chains on the GPU.
//!
//! # Overview
//!
//! Upload follows the staging pattern: pixels are written into a host-visible
//! staging buffer, copied into mip level 0 of a device-local image, and the
//! remaining levels are produced by a chain of `vkCmdBlitImage` calls where
//! each level is blitted from the previous one at half resolution. All
//! transfer work runs on a transient one-shot command buffer and the staging
//! buffer is dropped once the queue has drained.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use deferred_rhi::command::CommandPool;
//! use deferred_rhi::device::Device;
//! use deferred_rhi::texture::Texture;
//!
//! # fn example(device: Arc<Device>, pool: &CommandPool) -> Result<(), deferred_rhi::RhiError> {
//! let pixels = vec![255u8; 256 * 256 * 4];
//! let texture = Texture::from_rgba8(device, pool, &pixels, 256, 256, true)?;
//! assert_eq!(texture.image().mip_levels(), 9);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandBuffer, CommandPool};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::image::{Image, ImageDesc, cmd_transition_image_layout};
use crate::sampler::{Sampler, SamplerDesc};

/// Bytes per pixel for RGBA8 data.
const RGBA8_BYTES_PER_PIXEL: usize = 4;

/// Sampled texture: device-local image with a full mip chain and a sampler.
pub struct Texture {
    image: Image,
    sampler: Sampler,
}

impl Texture {
    /// Creates a 2D texture from tightly packed RGBA8 pixel data.
    ///
    /// Mip levels below the base are generated on the GPU via a blit chain.
    /// Blocks until the upload has completed.
    ///
    /// # Errors
    ///
    /// Returns an error if `pixels` does not match `width * height` RGBA8
    /// texels, or if any Vulkan operation fails.
    pub fn from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        pixels: &[u8],
        width: u32,
        height: u32,
        srgb: bool,
    ) -> RhiResult<Self> {
        let format = if srgb {
            vk::Format::R8G8B8A8_SRGB
        } else {
            vk::Format::R8G8B8A8_UNORM
        };
        let desc = ImageDesc {
            name: "texture",
            ..ImageDesc::texture(width, height, format)
        };
        Self::upload(device, pool, pixels, &desc)
    }

    /// Creates a cubemap texture from tightly packed RGBA8 pixel data.
    ///
    /// `pixels` holds all six faces back to back (+X, -X, +Y, -Y, +Z, -Z),
    /// each `size * size` texels. Mips are generated the same way as for
    /// 2D textures, blitting all six layers per level.
    ///
    /// # Errors
    ///
    /// Returns an error if `pixels` does not match six `size * size` RGBA8
    /// faces, or if any Vulkan operation fails.
    pub fn cubemap_from_rgba8(
        device: Arc<Device>,
        pool: &CommandPool,
        pixels: &[u8],
        size: u32,
        srgb: bool,
    ) -> RhiResult<Self> {
        let format = if srgb {
            vk::Format::R8G8B8A8_SRGB
        } else {
            vk::Format::R8G8B8A8_UNORM
        };
        let desc = ImageDesc {
            name: "cubemap",
            ..ImageDesc::cubemap(size, format)
        };
        Self::upload(device, pool, pixels, &desc)
    }

    fn upload(
        device: Arc<Device>,
        pool: &CommandPool,
        pixels: &[u8],
        desc: &ImageDesc,
    ) -> RhiResult<Self> {
        let expected =
            desc.width as usize * desc.height as usize * desc.array_layers as usize
                * RGBA8_BYTES_PER_PIXEL;
        if pixels.len() != expected {
            return Err(RhiError::ImageError(format!(
                "Pixel data size mismatch: expected {} bytes for {}x{}x{}, got {}",
                expected,
                desc.width,
                desc.height,
                desc.array_layers,
                pixels.len()
            )));
        }

        let image = Image::new(device.clone(), desc)?;

        let staging = Buffer::new(
            device.clone(),
            BufferUsage::Staging,
            pixels.len() as vk::DeviceSize,
        )?;
        staging.write_data(0, pixels)?;

        pool.submit_one_shot(|cmd| {
            // All mips to TRANSFER_DST, then fill level 0 from staging.
            image.cmd_transition_layout(
                cmd,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            );

            let region = vk::BufferImageCopy::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(
                    vk::ImageSubresourceLayers::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .mip_level(0)
                        .base_array_layer(0)
                        .layer_count(desc.array_layers),
                )
                .image_extent(vk::Extent3D {
                    width: desc.width,
                    height: desc.height,
                    depth: 1,
                });

            cmd.copy_buffer_to_image(
                staging.handle(),
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[region],
            );

            generate_mipmaps(cmd, &image);
        })?;

        debug!(
            "Uploaded texture: {}x{} ({:?}, {} mips, {} layers)",
            desc.width, desc.height, desc.format, desc.mip_levels, desc.array_layers
        );

        let sampler = Sampler::new(device, &SamplerDesc::trilinear(desc.mip_levels))?;

        Ok(Self { image, sampler })
    }

    /// Returns the underlying image.
    #[inline]
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Returns the image view covering all mips.
    #[inline]
    pub fn view(&self) -> vk::ImageView {
        self.image.view()
    }

    /// Returns the sampler.
    #[inline]
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }
}

/// Records the blit chain that fills mips `1..n` from mip 0.
///
/// On entry every mip must be in TRANSFER_DST_OPTIMAL with level 0 already
/// filled. On exit the whole image is in SHADER_READ_ONLY_OPTIMAL.
fn generate_mipmaps(cmd: &CommandBuffer, image: &Image) {
    let extent = image.extent();
    let layers = image.array_layers();
    let mip_levels = image.mip_levels();

    for level in 1..mip_levels {
        let (src_w, src_h) = Image::mip_extent(extent.width, extent.height, level - 1);
        let (dst_w, dst_h) = Image::mip_extent(extent.width, extent.height, level);

        // Previous level becomes the blit source.
        cmd_transition_image_layout(
            cmd,
            image.handle(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            level - 1,
            1,
            layers,
        );

        let blit = vk::ImageBlit::default()
            .src_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(level - 1)
                    .base_array_layer(0)
                    .layer_count(layers),
            )
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: src_w as i32,
                    y: src_h as i32,
                    z: 1,
                },
            ])
            .dst_subresource(
                vk::ImageSubresourceLayers::default()
                    .aspect_mask(vk::ImageAspectFlags::COLOR)
                    .mip_level(level)
                    .base_array_layer(0)
                    .layer_count(layers),
            )
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D {
                    x: dst_w as i32,
                    y: dst_h as i32,
                    z: 1,
                },
            ]);

        cmd.blit_image(
            image.handle(),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            image.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[blit],
            vk::Filter::LINEAR,
        );

        cmd_transition_image_layout(
            cmd,
            image.handle(),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            level - 1,
            1,
            layers,
        );
    }

    // Last level never became a source.
    cmd_transition_image_layout(
        cmd,
        image.handle(),
        vk::ImageAspectFlags::COLOR,
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        mip_levels - 1,
        1,
        layers,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgba8_size_check() {
        assert_eq!(256 * 256 * RGBA8_BYTES_PER_PIXEL, 262144);
    }

    #[test]
    fn test_mip_chain_covers_every_level_once() {
        // 1 copy into level 0 plus one blit per remaining level
        let levels = Image::max_mip_levels(1024, 1024);
        assert_eq!(levels, 11);
        let blits = levels - 1;
        assert_eq!(blits, 10);
    }
}
