//! Opaque geometry pass.
//!
//! # Overview
//!
//! Draws every opaque object into the six G-buffer attachments in one
//! render pass. One pipeline exists per combination of vertex-layout
//! variant (plain / instanced) and specialization-constant index; the
//! variant is baked into each pipeline at creation so shaders never branch
//! on it at run time.
//!
//! After this pass the attachments are left in shader-readable layouts for
//! the composition pass; the depth image additionally goes through an
//! explicit copy into the main depth buffer, recorded by the orchestrator.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use deferred_rhi::RhiResult;
use deferred_rhi::command::CommandBuffer;
use deferred_rhi::descriptor::DescriptorSetLayout;
use deferred_rhi::device::Device;
use deferred_rhi::image::cmd_transition_image_layout;
use deferred_rhi::pipeline::{
    CompareOp, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use deferred_rhi::rendering::{ColorAttachment, DepthAttachment, RenderingConfig};
use deferred_rhi::shader::{Shader, ShaderStage};
use deferred_rhi::vertex::{self, Vertex};

use crate::gbuffer::{DEPTH_FORMAT, GBuffer};
use crate::object::{PassPipelines, RenderObject, record_planned_draws};
use crate::plan::{PlannedDraw, VARIANT_COUNT};
use crate::ubo::GlobalConstants;

/// The geometry pass: G-buffer attachments plus its pipeline matrix.
pub struct GeometryPass {
    gbuffer: GBuffer,
    layout: PipelineLayout,
    plain_pipelines: Vec<Pipeline>,
    instanced_pipelines: Vec<Pipeline>,
}

impl GeometryPass {
    /// Creates the G-buffer and 2 x [`VARIANT_COUNT`] pipelines.
    ///
    /// # Errors
    ///
    /// Returns an error if attachment images, shaders, or any pipeline
    /// cannot be created.
    pub fn new(
        device: Arc<Device>,
        object_layout: &DescriptorSetLayout,
        shader_dir: &Path,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let gbuffer = GBuffer::new(device.clone(), width, height)?;

        let push_range = vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: GlobalConstants::SIZE as u32,
        };
        let layout =
            PipelineLayout::new(device.clone(), &[object_layout.handle()], &[push_range])?;

        let vert = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("geometry.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let instanced_vert = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("geometry_instanced.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let frag = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("geometry.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        let mut plain_pipelines = Vec::with_capacity(VARIANT_COUNT as usize);
        let mut instanced_pipelines = Vec::with_capacity(VARIANT_COUNT as usize);
        for variant in 0..VARIANT_COUNT {
            plain_pipelines.push(Self::build_pipeline(
                device.clone(),
                &layout,
                &vert,
                &frag,
                variant,
                false,
            )?);
            instanced_pipelines.push(Self::build_pipeline(
                device.clone(),
                &layout,
                &instanced_vert,
                &frag,
                variant,
                true,
            )?);
        }

        debug!(
            variants = VARIANT_COUNT,
            "Created geometry pass pipelines"
        );

        Ok(Self {
            gbuffer,
            layout,
            plain_pipelines,
            instanced_pipelines,
        })
    }

    fn build_pipeline(
        device: Arc<Device>,
        layout: &PipelineLayout,
        vert: &Shader,
        frag: &Shader,
        variant: u32,
        instanced: bool,
    ) -> RhiResult<Pipeline> {
        // Constant id 0 selects the shader variant, baked in per pipeline.
        let map_entries = [vk::SpecializationMapEntry {
            constant_id: 0,
            offset: 0,
            size: 4,
        }];
        let data = (variant as i32).to_ne_bytes();
        let spec_info = vk::SpecializationInfo::default()
            .map_entries(&map_entries)
            .data(&data);

        let builder = GraphicsPipelineBuilder::new()
            .vertex_shader(vert)
            .fragment_shader(frag)
            .fragment_specialization(&spec_info)
            .cull_mode(CullMode::Back)
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(CompareOp::LessOrEqual)
            .color_attachment_formats(&GBuffer::color_formats())
            .depth_attachment_format(DEPTH_FORMAT)
            .dynamic_states(&[vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR]);

        let builder = if instanced {
            builder
                .vertex_bindings(&vertex::instanced_binding_descriptions())
                .vertex_attributes(&vertex::instanced_attribute_descriptions())
        } else {
            builder
                .vertex_binding(Vertex::binding_description())
                .vertex_attributes(&Vertex::attribute_descriptions())
        };

        builder.build(device, layout)
    }

    /// Records the pass for one frame.
    ///
    /// Leaves the color attachments in `SHADER_READ_ONLY_OPTIMAL` and the
    /// depth attachment in `DEPTH_STENCIL_READ_ONLY_OPTIMAL`.
    pub fn record(
        &self,
        cmd: &CommandBuffer,
        objects: &[RenderObject],
        draws: &[PlannedDraw],
        variant: u32,
        constants: &GlobalConstants,
        frame: usize,
    ) {
        let extent = self.gbuffer.extent();

        for image in self.gbuffer.color_images() {
            cmd_transition_image_layout(
                cmd,
                image.handle(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                0,
                1,
                1,
            );
        }
        cmd_transition_image_layout(
            cmd,
            self.gbuffer.depth().handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            0,
            1,
            1,
        );

        let mut config = RenderingConfig::from_extent(extent);
        for view in self.gbuffer.color_views() {
            config = config.with_color_attachment(ColorAttachment::new(view));
        }
        let config = config
            .with_depth_attachment(DepthAttachment::new(self.gbuffer.depth().view()).store());
        let bundle = config.build();
        cmd.begin_rendering(&bundle.info());

        cmd.set_viewport(&vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(&vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        });
        cmd.push_constants(
            self.layout.handle(),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            0,
            constants,
        );

        let variant = variant as usize;
        record_planned_draws(
            cmd,
            self.layout.handle(),
            &PassPipelines {
                plain: self.plain_pipelines[variant].handle(),
                instanced: self.instanced_pipelines[variant].handle(),
            },
            objects,
            draws,
            frame,
        );

        cmd.end_rendering();

        for image in self.gbuffer.color_images() {
            cmd_transition_image_layout(
                cmd,
                image.handle(),
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                0,
                1,
                1,
            );
        }
        cmd_transition_image_layout(
            cmd,
            self.gbuffer.depth().handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            0,
            1,
            1,
        );
    }

    /// The pass's output attachments.
    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    /// Rebuilds the swap-extent-sized attachments; pipelines are untouched.
    pub fn recreate_attachments(&mut self, width: u32, height: u32) -> RhiResult<()> {
        self.gbuffer.recreate(width, height)
    }
}
