//! Geometry pass output attachments (the G-buffer).
//!
//! # Overview
//!
//! Six swap-extent-sized images written by the geometry pass in a single
//! render pass and sampled by the composition pass: depth, scene color,
//! encoded normal + shadow flag, material parameters + shading model id,
//! base color + ambient occlusion, and world position + object id.
//!
//! The bundle is destroyed and rebuilt whenever the swap extent changes;
//! formats and attachment count never change across a rebuild.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use deferred_rhi::RhiResult;
use deferred_rhi::device::Device;
use deferred_rhi::image::{Image, ImageDesc};
use deferred_rhi::sampler::{Sampler, SamplerDesc};

/// Depth attachment format.
pub const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
/// Scene color attachment format.
pub const SCENE_COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
/// Encoded normal + shadow flag attachment format.
pub const NORMAL_FORMAT: vk::Format = vk::Format::A2R10G10B10_UNORM_PACK32;
/// Material parameters + shading model id attachment format.
pub const MATERIAL_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
/// Base color + ambient occlusion attachment format.
pub const ALBEDO_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;
/// World position + object id attachment format.
pub const POSITION_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;

/// Number of color attachments (the depth attachment is separate).
pub const COLOR_ATTACHMENT_COUNT: usize = 5;

/// The geometry pass's output images, plus the sampler the composition
/// pass reads them through.
pub struct GBuffer {
    device: Arc<Device>,
    depth: Image,
    scene_color: Image,
    normal: Image,
    material: Image,
    albedo_ao: Image,
    position_id: Image,
    sampler: Sampler,
}

impl GBuffer {
    /// Creates the attachment bundle at the given extent.
    ///
    /// # Errors
    ///
    /// Returns an error if any image allocation fails; an unsupported
    /// format on the device is fatal for the renderer.
    pub fn new(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Self> {
        let (depth, scene_color, normal, material, albedo_ao, position_id) =
            Self::create_images(&device, width, height)?;

        // Attachments are sampled with clamp-to-edge and no mips.
        let sampler = Sampler::new(device.clone(), &SamplerDesc::attachment())?;

        debug!(width, height, "Created G-buffer");

        Ok(Self {
            device,
            depth,
            scene_color,
            normal,
            material,
            albedo_ao,
            position_id,
            sampler,
        })
    }

    fn create_images(
        device: &Arc<Device>,
        width: u32,
        height: u32,
    ) -> RhiResult<(Image, Image, Image, Image, Image, Image)> {
        let image = |desc: ImageDesc| Image::new(device.clone(), &desc);

        let depth = image(ImageDesc {
            name: "gbuffer_depth",
            ..ImageDesc::depth_attachment(width, height, DEPTH_FORMAT)
        })?;
        let scene_color = image(ImageDesc {
            name: "gbuffer_scene_color",
            ..ImageDesc::color_attachment(width, height, SCENE_COLOR_FORMAT)
        })?;
        let normal = image(ImageDesc {
            name: "gbuffer_normal",
            ..ImageDesc::color_attachment(width, height, NORMAL_FORMAT)
        })?;
        let material = image(ImageDesc {
            name: "gbuffer_material",
            ..ImageDesc::color_attachment(width, height, MATERIAL_FORMAT)
        })?;
        let albedo_ao = image(ImageDesc {
            name: "gbuffer_albedo_ao",
            ..ImageDesc::color_attachment(width, height, ALBEDO_FORMAT)
        })?;
        let position_id = image(ImageDesc {
            name: "gbuffer_position_id",
            ..ImageDesc::color_attachment(width, height, POSITION_FORMAT)
        })?;

        Ok((depth, scene_color, normal, material, albedo_ao, position_id))
    }

    /// Rebuilds all six images at a new extent.
    ///
    /// The caller must ensure the device is idle; the previous generation
    /// of images is dropped here.
    pub fn recreate(&mut self, width: u32, height: u32) -> RhiResult<()> {
        let (depth, scene_color, normal, material, albedo_ao, position_id) =
            Self::create_images(&self.device, width, height)?;
        self.depth = depth;
        self.scene_color = scene_color;
        self.normal = normal;
        self.material = material;
        self.albedo_ao = albedo_ao;
        self.position_id = position_id;

        debug!(width, height, "Recreated G-buffer");
        Ok(())
    }

    /// Color attachment formats in render-pass order.
    pub fn color_formats() -> [vk::Format; COLOR_ATTACHMENT_COUNT] {
        [
            SCENE_COLOR_FORMAT,
            NORMAL_FORMAT,
            MATERIAL_FORMAT,
            ALBEDO_FORMAT,
            POSITION_FORMAT,
        ]
    }

    /// Color attachment views in render-pass order.
    pub fn color_views(&self) -> [vk::ImageView; COLOR_ATTACHMENT_COUNT] {
        [
            self.scene_color.view(),
            self.normal.view(),
            self.material.view(),
            self.albedo_ao.view(),
            self.position_id.view(),
        ]
    }

    /// Color attachment images in render-pass order.
    pub fn color_images(&self) -> [&Image; COLOR_ATTACHMENT_COUNT] {
        [
            &self.scene_color,
            &self.normal,
            &self.material,
            &self.albedo_ao,
            &self.position_id,
        ]
    }

    /// The depth attachment.
    pub fn depth(&self) -> &Image {
        &self.depth
    }

    /// All six views in composition binding order: scene color, normal,
    /// material, albedo + AO, position + id, depth.
    pub fn sampled_views(&self) -> [vk::ImageView; COLOR_ATTACHMENT_COUNT + 1] {
        [
            self.scene_color.view(),
            self.normal.view(),
            self.material.view(),
            self.albedo_ao.view(),
            self.position_id.view(),
            self.depth.view(),
        ]
    }

    /// The sampler used for every attachment read.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// Current extent of the attachments.
    pub fn extent(&self) -> vk::Extent2D {
        self.depth.extent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_formats_are_stable() {
        let formats = GBuffer::color_formats();
        assert_eq!(formats.len(), COLOR_ATTACHMENT_COUNT);
        assert_eq!(formats[0], vk::Format::R8G8B8A8_UNORM);
        assert_eq!(formats[1], vk::Format::A2R10G10B10_UNORM_PACK32);
        assert_eq!(formats[4], vk::Format::R16G16B16A16_SFLOAT);
    }

    #[test]
    fn test_depth_format_has_no_stencil() {
        assert_eq!(DEPTH_FORMAT, vk::Format::D32_SFLOAT);
    }
}
