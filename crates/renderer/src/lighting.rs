//! Main-pass full-screen draws: background backdrop and lighting
//! composition.
//!
//! # Overview
//!
//! The orchestrator opens one rendering pass on the swapchain image,
//! records two full-screen draws (6 vertices each, no vertex buffer), and
//! closes the pass with the sky dome draw (see [`crate::sky`]):
//!
//! 1. [`BackgroundPass`] paints the backdrop texture across the whole
//!    image.
//! 2. [`CompositionPass`] samples the six G-buffer attachments, the shadow
//!    map and the environment cubemap, evaluates lighting and writes the
//!    final color. Fragments with no geometry behind them are discarded so
//!    the backdrop shows through. One pipeline exists per
//!    specialization-constant value; the bound variant is selected at
//!    record time.
//!
//! The pass's depth attachment is *loaded*, not cleared: the orchestrator
//! copies the geometry pass's depth into the main depth buffer beforehand
//! so later forward passes can test against scene depth.
//!
//! Composition descriptor sets use their own binding order:
//!
//! | Slot | Resource                  |
//! |------|---------------------------|
//! | 0    | view uniform buffer       |
//! | 1-5  | G-buffer color fragments  |
//! | 6    | G-buffer depth            |
//! | 7    | shadow map                |
//! | 8    | environment cubemap       |

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use deferred_rhi::RhiResult;
use deferred_rhi::buffer::Buffer;
use deferred_rhi::command::CommandBuffer;
use deferred_rhi::descriptor::{
    DescriptorBindingBuilder, DescriptorPool, DescriptorSetLayout, buffer_info, image_info,
    update_descriptor_sets,
};
use deferred_rhi::device::Device;
use deferred_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use deferred_rhi::shader::{Shader, ShaderStage};
use deferred_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use deferred_rhi::texture::Texture;

use crate::gbuffer::{DEPTH_FORMAT, GBuffer};
use crate::plan::{COMPOSITION_VERTEX_COUNT, VARIANT_COUNT};
use crate::shadow::ShadowPass;
use crate::ubo::GlobalConstants;

/// The backdrop draw: one pipeline, one texture, painted before the
/// composition draw each frame.
pub struct BackgroundPass {
    device: Arc<Device>,
    layout: PipelineLayout,
    pipeline: Pipeline,
    descriptor_sets: Vec<vk::DescriptorSet>,
    texture: Texture,
}

impl BackgroundPass {
    /// Creates the background pipeline and binds `texture` as the backdrop.
    pub fn new(
        device: Arc<Device>,
        descriptor_pool: &DescriptorPool,
        shader_dir: &Path,
        swapchain_format: vk::Format,
        texture: Texture,
    ) -> RhiResult<Self> {
        let bindings = [DescriptorBindingBuilder::combined_image_sampler(
            0,
            vk::ShaderStageFlags::FRAGMENT,
        )];
        let set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;
        let layout = PipelineLayout::new(device.clone(), &[set_layout.handle()], &[])?;

        let vert = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("background.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let frag = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("background.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        // The backdrop is always behind everything; the composition draw
        // overwrites every covered fragment, so depth is neither tested
        // nor written.
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .cull_mode(CullMode::None)
            .depth_test_enable(false)
            .depth_write_enable(false)
            .color_attachment_format(swapchain_format)
            .depth_attachment_format(DEPTH_FORMAT)
            .dynamic_states(&[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR])
            .build(device.clone(), &layout)?;

        // The set layout is only needed for the allocations above; Vulkan
        // allows destroying it while sets and pipeline layout live on.
        let layouts = [set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;
        drop(set_layout);

        let pass = Self {
            device,
            layout,
            pipeline,
            descriptor_sets,
            texture,
        };
        pass.write_descriptors();
        debug!("Created background pass");
        Ok(pass)
    }

    /// Replaces the backdrop texture.
    ///
    /// The descriptor sets are rewritten in place; the caller must make
    /// sure no recorded frame still references the old texture (setup
    /// time, or after a device idle).
    pub fn set_texture(&mut self, texture: Texture) {
        self.texture = texture;
        self.write_descriptors();
    }

    fn write_descriptors(&self) {
        for &set in &self.descriptor_sets {
            let info = [image_info(
                self.texture.sampler(),
                self.texture.view(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )];
            let writes = [vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(&info)];
            update_descriptor_sets(&self.device, &writes);
        }
    }

    /// Records the backdrop draw. The caller has begun the main rendering
    /// pass and set viewport and scissor.
    pub fn record(&self, cmd: &CommandBuffer, frame: usize) {
        cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.layout.handle(),
            0,
            &[self.descriptor_sets[frame]],
            &[],
        );
        cmd.draw(COMPOSITION_VERTEX_COUNT, 1, 0, 0);
    }
}

/// The composition draw: per-variant pipelines and per-frame input
/// bindings.
pub struct CompositionPass {
    device: Arc<Device>,
    set_layout: DescriptorSetLayout,
    layout: PipelineLayout,
    pipelines: Vec<Pipeline>,
    descriptor_sets: Vec<vk::DescriptorSet>,
}

impl CompositionPass {
    /// Creates the composition pipelines targeting the swapchain format.
    ///
    /// Descriptor sets are allocated here but hold no resources until
    /// [`write_descriptors`](Self::write_descriptors) runs.
    ///
    /// # Errors
    ///
    /// Returns an error if shaders, layouts or any pipeline cannot be
    /// created.
    pub fn new(
        device: Arc<Device>,
        descriptor_pool: &DescriptorPool,
        shader_dir: &Path,
        swapchain_format: vk::Format,
    ) -> RhiResult<Self> {
        let mut bindings = vec![DescriptorBindingBuilder::uniform_buffer(
            0,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        )];
        for slot in 1..=8 {
            bindings.push(DescriptorBindingBuilder::combined_image_sampler(
                slot,
                vk::ShaderStageFlags::FRAGMENT,
            ));
        }
        let set_layout = DescriptorSetLayout::new(device.clone(), &bindings)?;

        let push_range = vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: GlobalConstants::SIZE as u32,
        };
        let layout = PipelineLayout::new(device.clone(), &[set_layout.handle()], &[push_range])?;

        let vert = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("composition.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let frag = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("composition.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        let mut pipelines = Vec::with_capacity(VARIANT_COUNT as usize);
        for variant in 0..VARIANT_COUNT {
            pipelines.push(Self::build_pipeline(
                device.clone(),
                &layout,
                &vert,
                &frag,
                variant,
                swapchain_format,
            )?);
        }

        let layouts = [set_layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        debug!(variants = VARIANT_COUNT, "Created composition pass");

        Ok(Self {
            device,
            set_layout,
            layout,
            pipelines,
            descriptor_sets,
        })
    }

    fn build_pipeline(
        device: Arc<Device>,
        layout: &PipelineLayout,
        vert: &Shader,
        frag: &Shader,
        variant: u32,
        swapchain_format: vk::Format,
    ) -> RhiResult<Pipeline> {
        let map_entries = [vk::SpecializationMapEntry {
            constant_id: 0,
            offset: 0,
            size: 4,
        }];
        let data = (variant as i32).to_ne_bytes();
        let spec_info = vk::SpecializationInfo::default()
            .map_entries(&map_entries)
            .data(&data);

        // No vertex input: positions are generated from the vertex index.
        GraphicsPipelineBuilder::new()
            .vertex_shader(vert)
            .fragment_shader(frag)
            .fragment_specialization(&spec_info)
            .cull_mode(CullMode::None)
            .depth_test_enable(false)
            .depth_write_enable(false)
            .color_attachment_format(swapchain_format)
            .depth_attachment_format(DEPTH_FORMAT)
            .dynamic_states(&[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR])
            .build(device, layout)
    }

    /// (Re)binds the pass inputs into every frame's descriptor set.
    ///
    /// Called at startup and again after a resize replaces the G-buffer
    /// attachments.
    pub fn write_descriptors(
        &self,
        view_uniforms: &[Buffer],
        gbuffer: &GBuffer,
        shadow: &ShadowPass,
        environment: &Texture,
    ) {
        for (frame, &set) in self.descriptor_sets.iter().enumerate() {
            let view_info = [buffer_info(
                view_uniforms[frame].handle(),
                0,
                vk::WHOLE_SIZE,
            )];
            let sampled = gbuffer.sampled_views();
            let attachment_infos: Vec<_> = sampled
                .iter()
                .enumerate()
                .map(|(i, &view)| {
                    // The last sampled view is the depth attachment, which
                    // sits in its read-only depth layout.
                    let layout = if i == sampled.len() - 1 {
                        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                    } else {
                        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
                    };
                    [image_info(gbuffer.sampler(), view, layout)]
                })
                .collect();
            let shadow_info = [image_info(
                shadow.sampler(),
                shadow.map_view(),
                vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            )];
            let environment_info = [image_info(
                environment.sampler(),
                environment.view(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )];

            let mut writes = vec![
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&view_info),
            ];
            for (i, info) in attachment_infos.iter().enumerate() {
                writes.push(
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(1 + i as u32)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(info),
                );
            }
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(7)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&shadow_info),
            );
            writes.push(
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(8)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&environment_info),
            );

            update_descriptor_sets(&self.device, &writes);
        }
    }

    /// Records the composition draw for `variant`. The caller has begun
    /// the main rendering pass and set viewport and scissor.
    pub fn record(
        &self,
        cmd: &CommandBuffer,
        variant: u32,
        constants: &GlobalConstants,
        frame: usize,
    ) {
        cmd.bind_pipeline(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipelines[variant as usize].handle(),
        );
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.layout.handle(),
            0,
            &[self.descriptor_sets[frame]],
            &[],
        );
        cmd.push_constants(
            self.layout.handle(),
            vk::ShaderStageFlags::FRAGMENT,
            0,
            constants,
        );
        cmd.draw(COMPOSITION_VERTEX_COUNT, 1, 0, 0);
    }

    /// The composition descriptor set layout.
    pub fn set_layout(&self) -> &DescriptorSetLayout {
        &self.set_layout
    }
}
