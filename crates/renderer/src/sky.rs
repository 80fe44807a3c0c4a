//! Sky dome pass.
//!
//! # Overview
//!
//! Draws an inward-facing textured sphere centered on the camera as the
//! last draw of the main pass. Depth testing against the loaded scene
//! depth rejects every fragment already covered by geometry, so the dome
//! only fills the sky. Depth is not written.
//!
//! The dome is recorded for the lit variant only; the debug visualization
//! variants show the raw G-buffer contents without a sky behind them.
//!
//! Descriptor bindings:
//!
//! | Slot | Resource                         |
//! |------|----------------------------------|
//! | 0    | per-frame dome transform uniform |
//! | 1    | equirectangular sky texture      |

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use deferred_resources::MeshData;
use deferred_rhi::RhiResult;
use deferred_rhi::buffer::{Buffer, BufferUsage};
use deferred_rhi::command::CommandBuffer;
use deferred_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, buffer_info, image_info,
    update_descriptor_sets,
};
use deferred_rhi::device::Device;
use deferred_rhi::pipeline::{
    CompareOp, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use deferred_rhi::shader::{Shader, ShaderStage};
use deferred_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use deferred_rhi::texture::Texture;
use deferred_rhi::vertex::Vertex;

use crate::gbuffer::DEPTH_FORMAT;
use crate::object::MeshBuffers;
use crate::ubo::BaseUniform;

/// Latitude subdivisions of the dome sphere.
const DOME_STACKS: u32 = 32;
/// Longitude subdivisions of the dome sphere.
const DOME_SLICES: u32 = 64;

/// The sky dome draw: a camera-centered sphere painted where no geometry
/// reached the swapchain image.
pub struct SkydomePass {
    device: Arc<Device>,
    layout: PipelineLayout,
    pipeline: Pipeline,
    descriptor_sets: Vec<vk::DescriptorSet>,
    uniforms: Vec<Buffer>,
    mesh: MeshBuffers,
    texture: Texture,
}

impl SkydomePass {
    /// Creates the dome pipeline and mesh and binds `texture` as the sky.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh upload, shaders, layouts or pipeline
    /// cannot be created.
    pub fn new(
        device: Arc<Device>,
        descriptor_pool: &DescriptorPool,
        shader_dir: &Path,
        swapchain_format: vk::Format,
        texture: Texture,
    ) -> RhiResult<Self> {
        let bindings = [
            DescriptorBindingBuilder::uniform_buffer(0, vk::ShaderStageFlags::VERTEX),
            DescriptorBindingBuilder::combined_image_sampler(1, vk::ShaderStageFlags::FRAGMENT),
        ];
        let set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let layout = PipelineLayout::new(device.clone(), &[set_layout.handle()], &[])?;

        let vert = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("skydome.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let frag = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("skydome.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        // The sphere is wound to face inward, so back-face culling drops
        // the half of the dome behind the camera. Depth tests against the
        // loaded scene depth but never writes it.
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .cull_mode(CullMode::Back)
            .depth_test_enable(true)
            .depth_write_enable(false)
            .depth_compare_op(CompareOp::LessOrEqual)
            .color_attachment_format(swapchain_format)
            .depth_attachment_format(DEPTH_FORMAT)
            .dynamic_states(&[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR])
            .build(device.clone(), &layout)?;

        let mesh = MeshBuffers::new(
            device.clone(),
            &MeshData::uv_sphere(DOME_STACKS, DOME_SLICES),
        )?;

        let mut uniforms = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            uniforms.push(Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                BaseUniform::SIZE as vk::DeviceSize,
            )?);
        }

        let layouts = [set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        let pass = Self {
            device,
            layout,
            pipeline,
            descriptor_sets,
            uniforms,
            mesh,
            texture,
        };
        pass.write_descriptors();
        debug!(
            stacks = DOME_STACKS,
            slices = DOME_SLICES,
            "Created sky dome pass"
        );
        Ok(pass)
    }

    /// Replaces the sky texture.
    ///
    /// The descriptor sets are rewritten in place; the caller must make
    /// sure no recorded frame still references the old texture (setup
    /// time, or after a device idle).
    pub fn set_texture(&mut self, texture: Texture) {
        self.texture = texture;
        self.write_descriptors();
    }

    fn write_descriptors(&self) {
        for (frame, &set) in self.descriptor_sets.iter().enumerate() {
            let uniform = [buffer_info(
                self.uniforms[frame].handle(),
                0,
                vk::WHOLE_SIZE,
            )];
            let sky = [image_info(
                self.texture.sampler(),
                self.texture.view(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )];
            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&uniform),
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&sky),
            ];
            update_descriptor_sets(&self.device, &writes);
        }
    }

    /// Rewrites the frame slot's dome transform.
    pub fn write_uniform(&self, frame: usize, ubo: &BaseUniform) -> RhiResult<()> {
        self.uniforms[frame].write_data(0, bytemuck::bytes_of(ubo))
    }

    /// Records the dome draw. The caller has begun the main rendering pass
    /// and set viewport and scissor.
    pub fn record(&self, cmd: &CommandBuffer, frame: usize) {
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.layout.handle(),
            0,
            &[self.descriptor_sets[frame]],
            &[],
        );
        cmd.bind_vertex_buffers(0, &[self.mesh.vertex_buffer()], &[0]);
        cmd.bind_index_buffer(self.mesh.index_buffer(), 0, vk::IndexType::UINT32);
        cmd.draw_indexed(self.mesh.index_count(), 1, 0, 0, 0);
    }
}
