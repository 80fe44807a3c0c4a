//! Swapchain creation, acquisition, and presentation.
//!
//! [`Swapchain`] owns the `VkSwapchainKHR` handle and one image view per
//! swapchain image. The images themselves belong to the swapchain and are
//! only borrowed by the frame loop for layout transitions and rendering.
//!
//! Acquisition and presentation return `vk::Result` rather than [`RhiError`]
//! so the frame loop can match on `ERROR_OUT_OF_DATE_KHR` and recreate the
//! swapchain instead of failing the frame.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::RhiError;
use crate::instance::Instance;

/// What the surface offers for swapchain creation.
struct SurfaceSupport {
    capabilities: vk::SurfaceCapabilitiesKHR,
    formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    fn query(
        physical_device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        surface_loader: &ash::khr::surface::Instance,
    ) -> Result<Self, RhiError> {
        let capabilities = unsafe {
            surface_loader.get_physical_device_surface_capabilities(physical_device, surface)?
        };
        let formats = unsafe {
            surface_loader.get_physical_device_surface_formats(physical_device, surface)?
        };
        let present_modes = unsafe {
            surface_loader.get_physical_device_surface_present_modes(physical_device, surface)?
        };
        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    /// Prefers sRGB BGRA, then the first sRGB color space entry, then
    /// whatever comes first.
    fn pick_format(&self) -> vk::SurfaceFormatKHR {
        let srgb_nonlinear = |f: &&vk::SurfaceFormatKHR| {
            f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        };

        if let Some(&format) = self
            .formats
            .iter()
            .filter(srgb_nonlinear)
            .find(|f| f.format == vk::Format::B8G8R8A8_SRGB)
        {
            return format;
        }
        if let Some(&format) = self.formats.iter().find(srgb_nonlinear) {
            warn!(format = ?format.format, "Preferred surface format unavailable");
            return format;
        }
        warn!(format = ?self.formats[0].format, "No sRGB color space available");
        self.formats[0]
    }

    /// MAILBOX when offered, otherwise FIFO (always available).
    fn pick_present_mode(&self) -> vk::PresentModeKHR {
        if self.present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
            vk::PresentModeKHR::MAILBOX
        } else {
            vk::PresentModeKHR::FIFO
        }
    }

    /// The surface's fixed extent when it has one, otherwise the requested
    /// size clamped to the surface limits.
    fn pick_extent(&self, width: u32, height: u32) -> vk::Extent2D {
        let caps = &self.capabilities;
        if caps.current_extent.width != u32::MAX {
            return caps.current_extent;
        }
        vk::Extent2D {
            width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }

    /// One more than the minimum, capped by the surface maximum (0 = none).
    fn pick_image_count(&self) -> u32 {
        let caps = &self.capabilities;
        let wanted = caps.min_image_count + 1;
        if caps.max_image_count > 0 {
            wanted.min(caps.max_image_count)
        } else {
            wanted
        }
    }
}

/// The presentable image chain and its views.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Creates a swapchain for the given surface and window size.
    ///
    /// # Errors
    ///
    /// Returns an error if the surface reports no formats or present modes,
    /// or if any Vulkan call fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<Self, RhiError> {
        Self::create(instance, device, surface, width, height, vk::SwapchainKHR::null())
    }

    fn create(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
        old_swapchain: vk::SwapchainKHR,
    ) -> Result<Self, RhiError> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support = SurfaceSupport::query(device.physical_device(), surface, &surface_loader)?;
        if support.formats.is_empty() || support.present_modes.is_empty() {
            return Err(RhiError::SwapchainError(
                "surface reports no formats or present modes".to_string(),
            ));
        }

        let surface_format = support.pick_format();
        let present_mode = support.pick_present_mode();
        let extent = support.pick_extent(width, height);
        let image_count = support.pick_image_count();

        // Graphics and present on different families need CONCURRENT access
        // to the images; the common single-family case stays EXCLUSIVE.
        let families = device.queue_families();
        let graphics = families.graphics_family.unwrap();
        let present = families.present_family.unwrap();
        let family_indices = [graphics, present];
        let (sharing_mode, indices) = if graphics != present {
            (vk::SharingMode::CONCURRENT, family_indices.as_slice())
        } else {
            (vk::SharingMode::EXCLUSIVE, &[][..])
        };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(image_count)
            .image_format(surface_format.format)
            .image_color_space(surface_format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let handle = unsafe { loader.create_swapchain(&create_info, None)? };
        let images = unsafe { loader.get_swapchain_images(handle)? };
        let image_views = create_image_views(&device, &images, surface_format.format)?;

        info!(
            width = extent.width,
            height = extent.height,
            format = ?surface_format.format,
            present_mode = ?present_mode,
            images = images.len(),
            "Swapchain created"
        );

        Ok(Self {
            device,
            loader,
            handle,
            images,
            image_views,
            format: surface_format.format,
            extent,
        })
    }

    /// Replaces the swapchain after a resize, chaining the old handle so the
    /// driver can reuse its images.
    ///
    /// Waits for the device to go idle first; callers must not hold views
    /// into the old image chain across this call.
    ///
    /// # Errors
    ///
    /// Returns an error if recreation fails; the old swapchain is destroyed
    /// either way.
    pub fn recreate(
        &mut self,
        instance: &Instance,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> Result<(), RhiError> {
        self.device.wait_idle()?;
        debug!(width, height, "Recreating swapchain");

        self.destroy_image_views();
        let old_handle = self.handle;

        let mut fresh = Self::create(
            instance,
            self.device.clone(),
            surface,
            width,
            height,
            old_handle,
        )?;

        unsafe {
            self.loader.destroy_swapchain(old_handle, None);
        }

        self.handle = fresh.handle;
        self.images = std::mem::take(&mut fresh.images);
        self.image_views = std::mem::take(&mut fresh.image_views);
        self.format = fresh.format;
        self.extent = fresh.extent;

        // `fresh` must not destroy the handle we just adopted.
        fresh.handle = vk::SwapchainKHR::null();

        Ok(())
    }

    /// Acquires the next image, signalling `semaphore` when it is ready.
    ///
    /// Returns the image index and whether the swapchain is suboptimal.
    ///
    /// # Errors
    ///
    /// `ERROR_OUT_OF_DATE_KHR` means the swapchain must be recreated before
    /// the next frame.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe {
            self.loader
                .acquire_next_image(self.handle, u64::MAX, semaphore, vk::Fence::null())
        }
    }

    /// Presents `image_index` after `wait_semaphore` signals.
    ///
    /// Returns true if the swapchain is suboptimal and should be recreated.
    ///
    /// # Errors
    ///
    /// `ERROR_OUT_OF_DATE_KHR` means the swapchain must be recreated.
    pub fn present(
        &self,
        queue: vk::Queue,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let swapchains = [self.handle];
        let indices = [image_index];
        let wait = [wait_semaphore];
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&indices);

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    /// The swapchain image format.
    #[inline]
    pub fn format(&self) -> vk::Format {
        self.format
    }

    /// Current swapchain resolution.
    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of images in the chain.
    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// Image at `index`; panics when out of bounds.
    #[inline]
    pub fn image(&self, index: usize) -> vk::Image {
        self.images[index]
    }

    /// View of the image at `index`; panics when out of bounds.
    #[inline]
    pub fn image_view(&self, index: usize) -> vk::ImageView {
        self.image_views[index]
    }

    fn destroy_image_views(&mut self) {
        for &view in &self.image_views {
            unsafe {
                self.device.handle().destroy_image_view(view, None);
            }
        }
        self.image_views.clear();
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_image_views();
        if self.handle != vk::SwapchainKHR::null() {
            unsafe {
                self.loader.destroy_swapchain(self.handle, None);
            }
        }
    }
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    format: vk::Format,
) -> Result<Vec<vk::ImageView>, RhiError> {
    images
        .iter()
        .map(|&image| {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .level_count(1)
                        .layer_count(1),
                );
            unsafe {
                device
                    .handle()
                    .create_image_view(&create_info, None)
                    .map_err(RhiError::from)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn support_with(
        formats: Vec<vk::SurfaceFormatKHR>,
        present_modes: Vec<vk::PresentModeKHR>,
        capabilities: vk::SurfaceCapabilitiesKHR,
    ) -> SurfaceSupport {
        SurfaceSupport {
            capabilities,
            formats,
            present_modes,
        }
    }

    #[test]
    fn test_format_selection_prefers_bgra_srgb() {
        let support = support_with(
            vec![
                vk::SurfaceFormatKHR {
                    format: vk::Format::R8G8B8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
                vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_SRGB,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                },
            ],
            vec![],
            vk::SurfaceCapabilitiesKHR::default(),
        );
        assert_eq!(support.pick_format().format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn test_format_selection_falls_back_to_first_entry() {
        let support = support_with(
            vec![vk::SurfaceFormatKHR {
                format: vk::Format::R16G16B16A16_SFLOAT,
                color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            }],
            vec![],
            vk::SurfaceCapabilitiesKHR::default(),
        );
        assert_eq!(support.pick_format().format, vk::Format::R16G16B16A16_SFLOAT);
    }

    #[test]
    fn test_present_mode_prefers_mailbox_over_fifo() {
        let both = support_with(
            vec![],
            vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            vk::SurfaceCapabilitiesKHR::default(),
        );
        assert_eq!(both.pick_present_mode(), vk::PresentModeKHR::MAILBOX);

        let fifo_only = support_with(
            vec![],
            vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::IMMEDIATE],
            vk::SurfaceCapabilitiesKHR::default(),
        );
        assert_eq!(fifo_only.pick_present_mode(), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_extent_uses_surface_extent_when_fixed() {
        let support = support_with(
            vec![],
            vec![],
            vk::SurfaceCapabilitiesKHR {
                current_extent: vk::Extent2D {
                    width: 1920,
                    height: 1080,
                },
                ..Default::default()
            },
        );
        let extent = support.pick_extent(800, 600);
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_extent_clamps_requested_size() {
        let support = support_with(
            vec![],
            vec![],
            vk::SurfaceCapabilitiesKHR {
                current_extent: vk::Extent2D {
                    width: u32::MAX,
                    height: u32::MAX,
                },
                min_image_extent: vk::Extent2D {
                    width: 64,
                    height: 64,
                },
                max_image_extent: vk::Extent2D {
                    width: 2048,
                    height: 2048,
                },
                ..Default::default()
            },
        );
        let too_big = support.pick_extent(4000, 4000);
        assert_eq!((too_big.width, too_big.height), (2048, 2048));
        let too_small = support.pick_extent(8, 8);
        assert_eq!((too_small.width, too_small.height), (64, 64));
    }

    #[test]
    fn test_image_count_respects_surface_maximum() {
        let capped = support_with(
            vec![],
            vec![],
            vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 2,
                ..Default::default()
            },
        );
        assert_eq!(capped.pick_image_count(), 2);

        let uncapped = support_with(
            vec![],
            vec![],
            vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 0,
                ..Default::default()
            },
        );
        assert_eq!(uncapped.pick_image_count(), 3);
    }
}
