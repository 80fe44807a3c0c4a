//! Descriptor layouts, pools, and write helpers.
//!
//! Every mesh material shares the binding order produced by
//! [`mesh_material_bindings`], so one pipeline layout serves geometry and
//! shadow passes for all objects.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Owned `vk::DescriptorSetLayout`.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<Device>,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);
        let layout = unsafe {
            device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        Ok(Self { device, layout })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Pool the renderer allocates all its descriptor sets from.
///
/// Sets are allocated once at object registration and live for the life of
/// the pool, so individual frees are allowed but never exercised.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
}

impl DescriptorPool {
    pub fn new(
        device: Arc<Device>,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> RhiResult<Self> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(max_sets)
            .pool_sizes(pool_sizes)
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET);

        let pool = unsafe { device.handle().create_descriptor_pool(&create_info, None)? };
        debug!(max_sets, "descriptor pool created");

        Ok(Self { device, pool })
    }

    /// Allocates one set per layout handle.
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };
        Ok(sets)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Flushes descriptor writes to the device. No-op for an empty slice.
pub fn update_descriptor_sets(device: &Device, writes: &[vk::WriteDescriptorSet]) {
    if writes.is_empty() {
        return;
    }
    unsafe {
        device.handle().update_descriptor_sets(writes, &[]);
    }
}

#[inline]
pub fn buffer_info(
    buffer: vk::Buffer,
    offset: vk::DeviceSize,
    range: vk::DeviceSize,
) -> vk::DescriptorBufferInfo {
    vk::DescriptorBufferInfo::default()
        .buffer(buffer)
        .offset(offset)
        .range(range)
}

#[inline]
pub fn image_info(
    sampler: vk::Sampler,
    image_view: vk::ImageView,
    image_layout: vk::ImageLayout,
) -> vk::DescriptorImageInfo {
    vk::DescriptorImageInfo::default()
        .sampler(sampler)
        .image_view(image_view)
        .image_layout(image_layout)
}

/// Shorthand constructors for the two binding kinds the renderer uses.
pub struct DescriptorBindingBuilder;

impl DescriptorBindingBuilder {
    #[inline]
    pub fn uniform_buffer(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .descriptor_count(1)
            .stage_flags(stage_flags)
    }

    #[inline]
    pub fn combined_image_sampler(
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .descriptor_count(1)
            .stage_flags(stage_flags)
    }
}

/// Descriptor set layout bindings shared by every mesh material.
///
/// Bindings come in a fixed order so a single pipeline layout serves all
/// materials:
///
/// - binding 0: model/view/projection uniform buffer (vertex)
/// - binding 1: view uniform buffer with lights and shadow matrix (vertex + fragment)
/// - binding 2: environment cubemap (fragment)
/// - binding 3: shadow map (fragment)
/// - bindings 4..: per-object textures (fragment)
pub fn mesh_material_bindings(
    texture_count: u32,
) -> Vec<vk::DescriptorSetLayoutBinding<'static>> {
    let mut bindings = vec![
        DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
        DescriptorBindingBuilder::uniform_buffer(
            1,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        ),
        DescriptorBindingBuilder::combined_image_sampler(2, vk::ShaderStageFlags::FRAGMENT),
        DescriptorBindingBuilder::combined_image_sampler(3, vk::ShaderStageFlags::FRAGMENT),
    ];
    for i in 0..texture_count {
        bindings.push(DescriptorBindingBuilder::combined_image_sampler(
            4 + i,
            vk::ShaderStageFlags::FRAGMENT,
        ));
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_buffer_binding_shape() {
        let binding = DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX);
        assert_eq!(binding.binding, 0);
        assert_eq!(binding.descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
        assert_eq!(binding.descriptor_count, 1);
        assert_eq!(binding.stage_flags, vk::ShaderStageFlags::VERTEX);
    }

    #[test]
    fn sampler_binding_shape() {
        let binding =
            DescriptorBindingBuilder::combined_image_sampler(2, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(binding.binding, 2);
        assert_eq!(
            binding.descriptor_type,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        );
    }

    #[test]
    fn material_bindings_fixed_order() {
        let bindings = mesh_material_bindings(2);
        assert_eq!(bindings.len(), 6);

        assert_eq!(bindings[0].binding, 0);
        assert_eq!(
            bindings[0].descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER
        );
        assert_eq!(bindings[0].stage_flags, vk::ShaderStageFlags::VERTEX);

        assert_eq!(bindings[1].binding, 1);
        assert_eq!(
            bindings[1].descriptor_type,
            vk::DescriptorType::UNIFORM_BUFFER
        );
        assert!(
            bindings[1]
                .stage_flags
                .contains(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
        );

        // Cubemap, shadow map, then object textures
        for (i, binding) in bindings[2..].iter().enumerate() {
            assert_eq!(binding.binding, 2 + i as u32);
            assert_eq!(
                binding.descriptor_type,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            );
            assert_eq!(binding.stage_flags, vk::ShaderStageFlags::FRAGMENT);
        }
    }

    #[test]
    fn material_bindings_without_textures() {
        let bindings = mesh_material_bindings(0);
        assert_eq!(bindings.len(), 4);
        assert_eq!(bindings.last().unwrap().binding, 3);
    }

    #[test]
    fn descriptor_info_helpers() {
        let buf = buffer_info(vk::Buffer::null(), 64, 128);
        assert_eq!(buf.offset, 64);
        assert_eq!(buf.range, 128);

        let img = image_info(
            vk::Sampler::null(),
            vk::ImageView::null(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        );
        assert_eq!(img.image_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
    }
}
