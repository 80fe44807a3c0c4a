//! GPU enumeration and selection.
//!
//! Every Vulkan-capable adapter is scored and the best one wins: discrete
//! GPUs over integrated, more VRAM over less, with a bonus for
//! multi-draw-indirect since indirect batches collapse to one submission
//! there. Capability answers are captured once here instead of being
//! re-queried per frame.

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Queue family indices for the queues the renderer needs.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// True when both a graphics and a present family were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// The distinct family indices, for building queue create infos without
    /// requesting the same family twice.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }
        families
    }
}

/// Everything logical-device creation needs to know about a GPU.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    pub device: vk::PhysicalDevice,
    pub properties: vk::PhysicalDeviceProperties,
    pub features: vk::PhysicalDeviceFeatures,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    pub fn device_name(&self) -> &str {
        unsafe {
            CStr::from_ptr(self.properties.device_name.as_ptr())
                .to_str()
                .unwrap_or("unknown device")
        }
    }

    /// Whether one indirect command may carry multiple draws.
    #[inline]
    pub fn supports_multi_draw_indirect(&self) -> bool {
        self.features.multi_draw_indirect == vk::TRUE
    }

    fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.properties.device_type)
            .field("queue_families", &self.queue_families)
            .field("multi_draw_indirect", &self.supports_multi_draw_indirect())
            .finish()
    }
}

/// Picks the highest-scoring GPU that meets the renderer's requirements:
/// graphics and present queues, sampler anisotropy, and Vulkan 1.3 for
/// dynamic rendering.
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        warn!("no Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    let selected = devices
        .into_iter()
        .filter_map(|device| query_device(instance, device, surface, surface_loader))
        .max_by_key(|info| {
            let score = rate_device(info);
            debug!(name = info.device_name(), score, "GPU candidate");
            score
        })
        .ok_or_else(|| {
            warn!("no GPU meets the renderer's requirements");
            RhiError::NoSuitableGpu
        })?;

    info!(
        name = selected.device_name(),
        multi_draw_indirect = selected.supports_multi_draw_indirect(),
        "selected GPU"
    );

    Ok(selected)
}

/// Returns device info when the GPU is usable, `None` otherwise.
fn query_device(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let info = PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families: find_queue_families(instance, device, surface, surface_loader),
    };

    if !info.queue_families.is_complete() {
        debug!(name = info.device_name(), "skipped: missing queue families");
        return None;
    }
    if features.sampler_anisotropy == vk::FALSE {
        debug!(name = info.device_name(), "skipped: no sampler anisotropy");
        return None;
    }
    if properties.api_version < vk::API_VERSION_1_3 {
        debug!(name = info.device_name(), "skipped: Vulkan 1.3 required");
        return None;
    }

    Some(info)
}

fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in families.iter().enumerate() {
        let i = i as u32;
        if family.queue_count == 0 {
            continue;
        }

        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(i);
        }

        if indices.present_family.is_none() {
            let present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, i, surface)
                    .unwrap_or(false)
            };
            if present {
                indices.present_family = Some(i);
            }
        }
    }

    indices
}

fn rate_device(info: &PhysicalDeviceInfo) -> u32 {
    let mut score = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10_000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1_000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    score += info.properties.limits.max_image_dimension2_d;

    // VRAM in MB, capped so one huge heap cannot outweigh the type ranking
    score += ((info.device_local_memory() / (1024 * 1024)) as u32).min(16_000);

    if info.supports_multi_draw_indirect() {
        score += 500;
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_complete_only_with_both_families() {
        assert!(!QueueFamilyIndices::default().is_complete());
        assert!(
            !QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: None,
            }
            .is_complete()
        );
        assert!(
            QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            }
            .is_complete()
        );
    }

    #[test]
    fn unique_families_dedupes_shared_index() {
        let shared = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(shared.unique_families(), vec![0]);

        let split = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn multi_draw_indirect_raises_score() {
        let mut info = PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties::default(),
            features: vk::PhysicalDeviceFeatures::default(),
            memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
            queue_families: QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            },
        };

        let without = rate_device(&info);
        info.features.multi_draw_indirect = vk::TRUE;
        assert!(rate_device(&info) > without);
    }

    #[test]
    fn discrete_outranks_integrated() {
        let make = |ty| {
            let mut properties = vk::PhysicalDeviceProperties::default();
            properties.device_type = ty;
            PhysicalDeviceInfo {
                device: vk::PhysicalDevice::null(),
                properties,
                features: vk::PhysicalDeviceFeatures::default(),
                memory_properties: vk::PhysicalDeviceMemoryProperties::default(),
                queue_families: QueueFamilyIndices::default(),
            }
        };

        assert!(
            rate_device(&make(vk::PhysicalDeviceType::DISCRETE_GPU))
                > rate_device(&make(vk::PhysicalDeviceType::INTEGRATED_GPU))
        );
    }
}
