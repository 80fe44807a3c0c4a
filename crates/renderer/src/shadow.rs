//! Shadow map pass.
//!
//! # Overview
//!
//! Renders scene depth from the first directional light's point of view into
//! a fixed-resolution offscreen depth target, which the geometry and
//! composition shaders sample through binding slot 3.
//!
//! The pass draws every opaque object in the frame: the planner aggregates
//! all four opaque groups into the shadow draw list, so nothing can be lit
//! without also casting a shadow. Depth bias is applied through dynamic
//! state so the two shadow-quality knobs stay tunable at run time.
//!
//! The shadow map's resolution is independent of the swap extent and the
//! pass is untouched by window resizes.

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Vec3};
use tracing::debug;

use deferred_scene::DirectionalLight;

use deferred_rhi::RhiResult;
use deferred_rhi::command::CommandBuffer;
use deferred_rhi::descriptor::DescriptorSetLayout;
use deferred_rhi::device::Device;
use deferred_rhi::image::{Image, ImageDesc, cmd_transition_image_layout};
use deferred_rhi::pipeline::{
    CompareOp, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout,
};
use deferred_rhi::rendering::{DepthAttachment, RenderingConfig};
use deferred_rhi::sampler::{Sampler, SamplerDesc};
use deferred_rhi::shader::{Shader, ShaderStage};
use deferred_rhi::vertex::{self, Vertex};

use crate::object::{PassPipelines, RenderObject, record_planned_draws};
use crate::plan::PlannedDraw;

/// Shadow map resolution (square).
pub const SHADOWMAP_DIM: u32 = 1024;
/// Shadow map depth format.
pub const SHADOWMAP_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
/// Default constant depth bias.
pub const DEFAULT_DEPTH_BIAS_CONSTANT: f32 = 1.25;
/// Default slope-scaled depth bias.
pub const DEFAULT_DEPTH_BIAS_SLOPE: f32 = 7.5;

/// Builds the world-to-shadow-clip transform for a directional light.
///
/// The light looks from its position toward the origin with a standard
/// up vector; the projection Y axis is flipped for Vulkan clip space.
pub fn shadow_space_matrix(light: &DirectionalLight, z_near: f32, z_far: f32) -> Mat4 {
    let view = Mat4::look_at_rh(light.position, Vec3::ZERO, Vec3::Y);
    let mut projection =
        Mat4::perspective_rh(45.0_f32.to_radians(), 1.0, z_near, z_far);
    projection.y_axis.y *= -1.0;
    projection * view
}

/// The shadow pass's depth target and pipelines.
pub struct ShadowPass {
    map: Image,
    sampler: Sampler,
    layout: PipelineLayout,
    pipelines: ShadowPipelines,
    /// Constant depth bias applied while recording.
    pub depth_bias_constant: f32,
    /// Slope-scaled depth bias applied while recording.
    pub depth_bias_slope: f32,
}

struct ShadowPipelines {
    plain: Pipeline,
    instanced: Pipeline,
}

impl ShadowPass {
    /// Creates the shadow map and its two pipeline variants.
    ///
    /// # Errors
    ///
    /// Returns an error if the depth target, a shader module, or a
    /// pipeline cannot be created.
    pub fn new(
        device: Arc<Device>,
        object_layout: &DescriptorSetLayout,
        shader_dir: &Path,
    ) -> RhiResult<Self> {
        let map = Image::new(
            device.clone(),
            &ImageDesc {
                name: "shadow_map",
                ..ImageDesc::depth_attachment(SHADOWMAP_DIM, SHADOWMAP_DIM, SHADOWMAP_FORMAT)
            },
        )?;
        let sampler = Sampler::new(device.clone(), &SamplerDesc::attachment())?;

        let layout = PipelineLayout::new(device.clone(), &[object_layout.handle()], &[])?;

        let vert = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("shadow.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        let instanced_vert = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("shadow_instanced.vert.spv"),
            ShaderStage::Vertex,
            "main",
        )?;
        // Pass-through fragment stage, kept for portability even though the
        // pass writes no color output.
        let frag = Shader::from_spirv_file(
            device.clone(),
            &shader_dir.join("shadow.frag.spv"),
            ShaderStage::Fragment,
            "main",
        )?;

        let plain = Self::build_pipeline(device.clone(), &layout, &vert, &frag, false)?;
        let instanced = Self::build_pipeline(device, &layout, &instanced_vert, &frag, true)?;

        debug!(dim = SHADOWMAP_DIM, "Created shadow pass");

        Ok(Self {
            map,
            sampler,
            layout,
            pipelines: ShadowPipelines { plain, instanced },
            depth_bias_constant: DEFAULT_DEPTH_BIAS_CONSTANT,
            depth_bias_slope: DEFAULT_DEPTH_BIAS_SLOPE,
        })
    }

    fn build_pipeline(
        device: Arc<Device>,
        layout: &PipelineLayout,
        vert: &Shader,
        frag: &Shader,
        instanced: bool,
    ) -> RhiResult<Pipeline> {
        let builder = GraphicsPipelineBuilder::new()
            .vertex_shader(vert)
            .fragment_shader(frag)
            .cull_mode(CullMode::Front)
            .depth_test_enable(true)
            .depth_write_enable(true)
            .depth_compare_op(CompareOp::LessOrEqual)
            .depth_attachment_format(SHADOWMAP_FORMAT)
            .dynamic_states(&[
                vk::DynamicState::VIEWPORT,
                vk::DynamicState::SCISSOR,
                vk::DynamicState::DEPTH_BIAS,
            ]);

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

    /// Records the depth-only pass for one frame.
    ///
    /// Leaves the shadow map in `DEPTH_STENCIL_READ_ONLY_OPTIMAL` for the
    /// downstream sampling stages.
    pub fn record(
        &self,
        cmd: &CommandBuffer,
        objects: &[RenderObject],
        draws: &[PlannedDraw],
        frame: usize,
    ) {
        cmd_transition_image_layout(
            cmd,
            self.map.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            0,
            1,
            1,
        );

        let config = RenderingConfig::new(SHADOWMAP_DIM, SHADOWMAP_DIM)
            .with_depth_attachment(DepthAttachment::new(self.map.view()).store());
        let bundle = config.build();
        cmd.begin_rendering(&bundle.info());

        cmd.set_viewport(&vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: SHADOWMAP_DIM as f32,
            height: SHADOWMAP_DIM as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        });
        cmd.set_scissor(&vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: vk::Extent2D {
                width: SHADOWMAP_DIM,
                height: SHADOWMAP_DIM,
            },
        });
        cmd.set_depth_bias(self.depth_bias_constant, 0.0, self.depth_bias_slope);

        record_planned_draws(
            cmd,
            self.layout.handle(),
            &PassPipelines {
                plain: self.pipelines.plain.handle(),
                instanced: self.pipelines.instanced.handle(),
            },
            objects,
            draws,
            frame,
        );

        cmd.end_rendering();

        cmd_transition_image_layout(
            cmd,
            self.map.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            0,
            1,
            1,
        );
    }

    /// The shadow map view, bound at descriptor slot 3.
    pub fn map_view(&self) -> vk::ImageView {
        self.map.view()
    }

    /// The sampler the shadow map is read through.
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn test_shadow_space_matrix_centers_origin() {
        let light = DirectionalLight {
            position: Vec3::new(10.0, 20.0, 10.0),
            ..Default::default()
        };
        let matrix = shadow_space_matrix(&light, 0.1, 100.0);

        // The origin projects to the center of the shadow map.
        let clip = matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() < 1e-5);
        assert!(ndc.y.abs() < 1e-5);
    }

    #[test]
    fn test_shadow_space_depth_increases_away_from_light() {
        let light = DirectionalLight {
            position: Vec3::new(0.0, 0.0, 10.0),
            ..Default::default()
        };
        let matrix = shadow_space_matrix(&light, 0.1, 100.0);

        let near_point = matrix * Vec4::new(0.0, 0.0, 5.0, 1.0);
        let far_point = matrix * Vec4::new(0.0, 0.0, -5.0, 1.0);
        assert!(near_point.z / near_point.w < far_point.z / far_point.w);
    }

    #[test]
    fn test_default_bias_values() {
        assert_eq!(DEFAULT_DEPTH_BIAS_CONSTANT, 1.25);
        assert_eq!(DEFAULT_DEPTH_BIAS_SLOPE, 7.5);
    }
}
