//! Texture samplers.
//!
//! Thin wrapper over VkSampler with the handful of configurations the
//! renderer actually uses: trilinear samplers for material textures and
//! clamped samplers for attachment reads.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Description of a sampler to create.
#[derive(Clone, Copy, Debug)]
pub struct SamplerDesc {
    /// Magnification/minification filter.
    pub filter: vk::Filter,
    /// Address mode applied to all three coordinates.
    pub address_mode: vk::SamplerAddressMode,
    /// Highest mip level the sampler may access.
    pub max_lod: f32,
    /// Whether to enable anisotropic filtering.
    pub anisotropy: bool,
}

impl SamplerDesc {
    /// Trilinear repeat sampler covering a full mip chain.
    pub fn trilinear(mip_levels: u32) -> Self {
        Self {
            filter: vk::Filter::LINEAR,
            address_mode: vk::SamplerAddressMode::REPEAT,
            max_lod: mip_levels as f32,
            anisotropy: true,
        }
    }

    /// Clamped single-mip sampler for reading render attachments.
    pub fn attachment() -> Self {
        Self {
            filter: vk::Filter::NEAREST,
            address_mode: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            max_lod: 0.0,
            anisotropy: false,
        }
    }
}

/// GPU sampler object.
pub struct Sampler {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan sampler handle.
    sampler: vk::Sampler,
}

impl Sampler {
    /// Creates a new sampler.
    ///
    /// # Errors
    ///
    /// Returns an error if sampler creation fails.
    pub fn new(device: Arc<Device>, desc: &SamplerDesc) -> RhiResult<Self> {
        let max_anisotropy = if desc.anisotropy {
            device.max_sampler_anisotropy()
        } else {
            1.0
        };

        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(desc.filter)
            .min_filter(desc.filter)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .address_mode_u(desc.address_mode)
            .address_mode_v(desc.address_mode)
            .address_mode_w(desc.address_mode)
            .anisotropy_enable(desc.anisotropy)
            .max_anisotropy(max_anisotropy)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .min_lod(0.0)
            .max_lod(desc.max_lod);

        let sampler = unsafe { device.handle().create_sampler(&sampler_info, None)? };

        debug!(
            "Created sampler: {:?}, {:?}, max_lod {}",
            desc.filter, desc.address_mode, desc.max_lod
        );

        Ok(Self { device, sampler })
    }

    /// Returns the Vulkan sampler handle.
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_sampler(self.sampler, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sampler_descs() {
        let tri = SamplerDesc::trilinear(10);
        assert_eq!(tri.filter, vk::Filter::LINEAR);
        assert_eq!(tri.max_lod, 10.0);
        assert!(tri.anisotropy);

        let att = SamplerDesc::attachment();
        assert_eq!(att.address_mode, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(att.max_lod, 0.0);
        assert!(!att.anisotropy);
    }
}
