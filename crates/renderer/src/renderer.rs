//! Frame orchestration.
//!
//! # Overview
//!
//! [`Renderer`] owns every GPU resource and drives the per-frame state
//! machine: wait for the frame slot's fence, acquire a swapchain image,
//! rewrite the slot's uniform buffers, then re-record from scratch and
//! submit the full pass sequence
//!
//! ```text
//! shadow -> geometry -> depth copy -> main (background, composition, sky dome) -> present
//! ```
//!
//! Out-of-date or suboptimal swapchain reports trigger recreation of every
//! swap-extent-sized resource (swapchain, G-buffer, main depth buffer); the
//! fixed-resolution shadow pass and all pipelines are untouched. Any other
//! frame error propagates to the caller and aborts the loop.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use deferred_platform::Window;
//! use deferred_renderer::Renderer;
//!
//! # fn example(window: &Window) -> deferred_renderer::RenderResult<()> {
//! let mut renderer = Renderer::new(window, Path::new("shaders"))?;
//! loop {
//!     renderer.render_frame(1.0 / 60.0)?;
//! #   break;
//! }
//! # Ok(())
//! # }
//! ```

use std::mem::ManuallyDrop;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use glam::{Mat4, Quat, Vec3};
use tracing::{debug, error, info};

use deferred_platform::{Surface, Window};
use deferred_resources::{MeshData, TextureData};
use deferred_rhi::buffer::{Buffer, BufferUsage};
use deferred_rhi::command::{CommandBuffer, CommandPool};
use deferred_rhi::descriptor::{DescriptorPool, DescriptorSetLayout};
use deferred_rhi::device::Device;
use deferred_rhi::image::{Image, ImageDesc, cmd_transition_image_layout};
use deferred_rhi::instance::Instance;
use deferred_rhi::physical_device::select_physical_device;
use deferred_rhi::rendering::{ColorAttachment, DepthAttachment, RenderingConfig};
use deferred_rhi::swapchain::Swapchain;
use deferred_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use deferred_rhi::texture::Texture;
use deferred_rhi::vertex::InstanceData;
use deferred_rhi::RhiResult;
use deferred_scene::{Camera, LightRegistry, Projection};

use crate::error::RenderResult;
use crate::frame_manager::{AcquireResult, FrameManager};
use crate::gbuffer::DEPTH_FORMAT;
use crate::geometry::GeometryPass;
use crate::lighting::{BackgroundPass, CompositionPass};
use crate::object::{ObjectSharedBindings, RenderObject, object_set_layout};
use crate::plan::{DrawCaps, DrawKind, DrawRef, FramePlan, PassLists, VARIANT_COUNT};
use crate::shadow::{ShadowPass, shadow_space_matrix};
use crate::sky::SkydomePass;
use crate::ubo::{BaseUniform, GlobalConstants, ViewUniform};

/// Handle to a created render object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectId(usize);

/// The deferred renderer: owns the device, all passes, and the scene's GPU
/// resources, and drives the frame loop.
pub struct Renderer {
    device: Arc<Device>,

    // Destroyed manually in reverse dependency order.
    instance: ManuallyDrop<Instance>,
    surface: ManuallyDrop<Surface>,
    swapchain: ManuallyDrop<Swapchain>,
    command_pool: ManuallyDrop<CommandPool>,
    upload_pool: ManuallyDrop<CommandPool>,
    descriptor_pool: ManuallyDrop<DescriptorPool>,
    object_layout: ManuallyDrop<DescriptorSetLayout>,
    shadow_pass: ManuallyDrop<ShadowPass>,
    geometry_pass: ManuallyDrop<GeometryPass>,
    background_pass: ManuallyDrop<BackgroundPass>,
    composition_pass: ManuallyDrop<CompositionPass>,
    skydome_pass: ManuallyDrop<SkydomePass>,
    main_depth: ManuallyDrop<Image>,
    environment: ManuallyDrop<Texture>,
    fallback_texture: ManuallyDrop<Texture>,

    frame_manager: FrameManager,
    view_uniforms: Vec<Buffer>,
    view_data: Box<ViewUniform>,

    objects: Vec<RenderObject>,
    lists: PassLists,

    /// Scene lights; pushed by the application during setup.
    pub lights: LightRegistry,
    /// Scene camera; the application rewrites pose and projection per frame.
    pub camera: Camera,
    /// Shader variant selector (0..=9), e.g. debug visualization modes.
    pub variant: u32,
    /// Whether the stage rotation animation advances.
    pub animate_stage: bool,
    /// Whether the light orbit animation advances.
    pub animate_lights: bool,
    /// Global metallic override, forwarded via push constants.
    pub metallic: f32,
    /// Global roughness override, forwarded via push constants.
    pub roughness: f32,

    time: f32,
    presented_frames: u64,
    framebuffer_resized: bool,
    width: u32,
    height: u32,
    shader_dir: PathBuf,
}

impl Renderer {
    /// Initializes the device and all pass resources.
    ///
    /// SPIR-V shader binaries are loaded by filename from `shader_dir`.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal: an unsupported device, a missing shader
    /// file, or a failed allocation all abort startup.
    pub fn new(window: &Window, shader_dir: &Path) -> RenderResult<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing deferred renderer ({}x{})", width, height);

        let enable_validation = cfg!(debug_assertions);
        let instance = Instance::new(enable_validation)?;

        let surface = window.create_surface(instance.entry(), instance.handle())?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;

        let graphics_family = device.queue_families().graphics_family.unwrap_or(0);
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let upload_pool = CommandPool::new_transient(device.clone(), graphics_family)?;

        let descriptor_pool = Self::create_descriptor_pool(device.clone())?;
        let object_layout = object_set_layout(device.clone())?;

        let shadow_pass = ShadowPass::new(device.clone(), &object_layout, shader_dir)?;
        let geometry_pass =
            GeometryPass::new(device.clone(), &object_layout, shader_dir, width, height)?;
        let composition_pass = CompositionPass::new(
            device.clone(),
            &descriptor_pool,
            shader_dir,
            swapchain.format(),
        )?;

        let main_depth = Self::create_main_depth(device.clone(), width, height)?;

        // 1x1 defaults: mid-gray environment, white fallback texture,
        // night-blue backdrop, dusk-blue sky. The application may replace
        // the backdrop via `set_background` and the sky via `set_sky`.
        let environment = Texture::cubemap_from_rgba8(
            device.clone(),
            &upload_pool,
            &[128u8, 128, 128, 255].repeat(6),
            1,
            false,
        )?;
        let fallback_texture =
            Texture::from_rgba8(device.clone(), &upload_pool, &[255u8; 4], 1, 1, false)?;
        let backdrop =
            Texture::from_rgba8(device.clone(), &upload_pool, &[12u8, 16, 28, 255], 1, 1, false)?;
        let background_pass = BackgroundPass::new(
            device.clone(),
            &descriptor_pool,
            shader_dir,
            swapchain.format(),
            backdrop,
        )?;
        let sky =
            Texture::from_rgba8(device.clone(), &upload_pool, &[58u8, 82, 122, 255], 1, 1, false)?;
        let skydome_pass = SkydomePass::new(
            device.clone(),
            &descriptor_pool,
            shader_dir,
            swapchain.format(),
            sky,
        )?;

        let mut view_uniforms = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            view_uniforms.push(Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                ViewUniform::SIZE as vk::DeviceSize,
            )?);
        }

        composition_pass.write_descriptors(
            &view_uniforms,
            geometry_pass.gbuffer(),
            &shadow_pass,
            &environment,
        );

        let frame_manager = FrameManager::new(device.clone(), &command_pool)?;

        let mut camera = Camera::new();
        camera.set_perspective(
            45.0_f32.to_radians(),
            width as f32 / height as f32,
            0.1,
            45.0,
        );

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, multi-draw-indirect: {}",
            swapchain.image_count(),
            MAX_FRAMES_IN_FLIGHT,
            device.supports_multi_draw_indirect()
        );

        Ok(Self {
            device,
            instance: ManuallyDrop::new(instance),
            surface: ManuallyDrop::new(surface),
            swapchain: ManuallyDrop::new(swapchain),
            command_pool: ManuallyDrop::new(command_pool),
            upload_pool: ManuallyDrop::new(upload_pool),
            descriptor_pool: ManuallyDrop::new(descriptor_pool),
            object_layout: ManuallyDrop::new(object_layout),
            shadow_pass: ManuallyDrop::new(shadow_pass),
            geometry_pass: ManuallyDrop::new(geometry_pass),
            background_pass: ManuallyDrop::new(background_pass),
            composition_pass: ManuallyDrop::new(composition_pass),
            skydome_pass: ManuallyDrop::new(skydome_pass),
            main_depth: ManuallyDrop::new(main_depth),
            environment: ManuallyDrop::new(environment),
            fallback_texture: ManuallyDrop::new(fallback_texture),
            frame_manager,
            view_uniforms,
            view_data: Box::new(ViewUniform::default()),
            objects: Vec::new(),
            lists: PassLists::default(),
            lights: LightRegistry::new(),
            camera,
            variant: 0,
            animate_stage: false,
            animate_lights: false,
            metallic: 0.0,
            roughness: 0.5,
            time: 0.0,
            presented_frames: 0,
            framebuffer_resized: false,
            width,
            height,
            shader_dir: shader_dir.to_path_buf(),
        })
    }

    fn create_descriptor_pool(device: Arc<Device>) -> RhiResult<DescriptorPool> {
        // Sized for a demo-scale scene; exhausting the pool is a setup
        // error, not a runtime condition.
        const MAX_OBJECTS: u32 = 128;
        // +3 for the composition, background and sky dome sets.
        let sets = (MAX_OBJECTS + 3) * MAX_FRAMES_IN_FLIGHT as u32;
        let pool_sizes = [
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(sets * 2),
            vk::DescriptorPoolSize::default()
                .ty(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(sets * 9),
        ];
        DescriptorPool::new(device, sets, &pool_sizes)
    }

    fn create_main_depth(device: Arc<Device>, width: u32, height: u32) -> RhiResult<Image> {
        Image::new(
            device,
            &ImageDesc {
                name: "main_depth",
                ..ImageDesc::depth_attachment(width, height, DEPTH_FORMAT)
            },
        )
    }

    // =========================================================================
    // Scene setup
    // =========================================================================

    /// Creates a plain render object and adds it to both opaque passes.
    ///
    /// # Errors
    ///
    /// Returns an error if any upload or descriptor allocation fails.
    pub fn add_object(
        &mut self,
        mesh: &MeshData,
        textures: &[TextureData],
        transform: Mat4,
    ) -> RenderResult<ObjectId> {
        let object = RenderObject::new(
            self.device.clone(),
            &self.upload_pool,
            &self.descriptor_pool,
            mesh,
            textures,
            &self.shared_bindings(),
            transform,
        )?;
        Ok(self.register(object))
    }

    /// Creates an instanced render object.
    pub fn add_instanced_object(
        &mut self,
        mesh: &MeshData,
        textures: &[TextureData],
        transform: Mat4,
        instances: &[InstanceData],
    ) -> RenderResult<ObjectId> {
        let object = RenderObject::new_instanced(
            self.device.clone(),
            &self.upload_pool,
            &self.descriptor_pool,
            mesh,
            textures,
            &self.shared_bindings(),
            transform,
            instances,
        )?;
        Ok(self.register(object))
    }

    /// Creates an indirect render object.
    pub fn add_indirect_object(
        &mut self,
        mesh: &MeshData,
        textures: &[TextureData],
        transform: Mat4,
        commands: &[vk::DrawIndexedIndirectCommand],
    ) -> RenderResult<ObjectId> {
        let object = RenderObject::new_indirect(
            self.device.clone(),
            &self.upload_pool,
            &self.descriptor_pool,
            mesh,
            textures,
            &self.shared_bindings(),
            transform,
            commands,
        )?;
        Ok(self.register(object))
    }

    /// Creates an indirect-instanced render object.
    #[allow(clippy::too_many_arguments)]
    pub fn add_indirect_instanced_object(
        &mut self,
        mesh: &MeshData,
        textures: &[TextureData],
        transform: Mat4,
        instances: &[InstanceData],
        commands: &[vk::DrawIndexedIndirectCommand],
    ) -> RenderResult<ObjectId> {
        let object = RenderObject::new_indirect_instanced(
            self.device.clone(),
            &self.upload_pool,
            &self.descriptor_pool,
            mesh,
            textures,
            &self.shared_bindings(),
            transform,
            instances,
            commands,
        )?;
        Ok(self.register(object))
    }

    fn shared_bindings(&self) -> ObjectSharedBindings<'_> {
        ObjectSharedBindings {
            layout: &self.object_layout,
            view_uniforms: &self.view_uniforms,
            environment: &self.environment,
            shadow_view: self.shadow_pass.map_view(),
            shadow_sampler: self.shadow_pass.sampler(),
            fallback_texture: &self.fallback_texture,
        }
    }

    fn register(&mut self, object: RenderObject) -> ObjectId {
        let index = self.objects.len();
        let draw_ref = DrawRef::new(index, object.draw_kind());
        match draw_ref.kind {
            DrawKind::Plain => self.lists.plain.push(draw_ref),
            DrawKind::Instanced { .. } => self.lists.instanced.push(draw_ref),
            DrawKind::Indirect { .. } => self.lists.indirect.push(draw_ref),
            DrawKind::IndirectInstanced { .. } => self.lists.indirect_instanced.push(draw_ref),
        }
        self.objects.push(object);
        ObjectId(index)
    }

    /// Replaces an object's world transform for subsequent frames.
    pub fn set_transform(&mut self, id: ObjectId, transform: Mat4) {
        self.objects[id.0].transform = transform;
    }

    /// Replaces the backdrop texture painted behind the scene.
    ///
    /// Waits for the device to go idle before swapping, so this is safe
    /// at any point but meant for scene setup.
    pub fn set_background(&mut self, data: &TextureData) -> RenderResult<()> {
        self.device.wait_idle()?;
        let texture = Texture::from_rgba8(
            self.device.clone(),
            &self.upload_pool,
            &data.pixels,
            data.width,
            data.height,
            true,
        )?;
        self.background_pass.set_texture(texture);
        Ok(())
    }

    /// Replaces the equirectangular texture mapped onto the sky dome.
    ///
    /// Waits for the device to go idle before swapping, so this is safe
    /// at any point but meant for scene setup.
    pub fn set_sky(&mut self, data: &TextureData) -> RenderResult<()> {
        self.device.wait_idle()?;
        let texture = Texture::from_rgba8(
            self.device.clone(),
            &self.upload_pool,
            &data.pixels,
            data.width,
            data.height,
            true,
        )?;
        self.skydome_pass.set_texture(texture);
        Ok(())
    }

    // =========================================================================
    // Frame loop
    // =========================================================================

    /// Flags the swap resources for recreation at a new window size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        self.framebuffer_resized = true;
        self.camera.set_aspect(width as f32 / height as f32);
    }

    /// Renders and presents one frame.
    ///
    /// `delta_secs` advances the animation clock. A recoverable swapchain
    /// report skips or finishes the frame and recreates swap resources; any
    /// other error is fatal and propagates.
    pub fn render_frame(&mut self, delta_secs: f32) -> RenderResult<()> {
        if self.framebuffer_resized {
            self.framebuffer_resized = false;
            self.recreate_swap_resources()?;
        }

        self.frame_manager.wait_for_frame()?;

        if self.frame_manager.acquire_next_image(&self.swapchain)? == AcquireResult::OutOfDate {
            debug!("Swapchain out of date on acquire, recreating");
            self.recreate_swap_resources()?;
            return Ok(());
        }

        self.time += delta_secs;
        let frame = self.frame_manager.frame_index();
        self.update_uniforms(frame)?;

        self.frame_manager.begin_frame()?;
        let plan = FramePlan::build(
            &self.lists,
            DrawCaps {
                multi_draw_indirect: self.device.supports_multi_draw_indirect(),
            },
            self.variant,
        );
        self.record_commands(&plan, frame);
        self.frame_manager.end_frame()?;

        self.frame_manager.submit()?;
        let needs_recreate = self.frame_manager.present(&self.swapchain)?;
        self.presented_frames += 1;
        self.frame_manager.advance();

        if needs_recreate {
            debug!("Swapchain suboptimal on present, recreating");
            self.recreate_swap_resources()?;
        }

        Ok(())
    }

    /// Rewrites the frame slot's uniform buffers from the scene state.
    fn update_uniforms(&mut self, frame: usize) -> RhiResult<()> {
        if self.animate_lights {
            let rotation = Quat::from_rotation_y(self.time * 0.5);
            if let Some(light) = self.lights.directional_mut().first_mut() {
                light.position = rotation * Vec3::new(10.0, 14.0, 2.0);
                light.direction = (-light.position).normalize_or_zero();
            }
        }

        let view = self.camera.view_matrix();
        let projection = self.camera.projection_matrix();
        let (fov_y, z_near, z_far) = match self.camera.projection {
            Projection::Perspective {
                fov_y, near, far, ..
            } => (fov_y, near, far),
            Projection::Orthographic { near, far, .. } => (0.0, near, far),
        };

        self.view_data.shadowmap_space = match self.lights.directional().first() {
            Some(light) => shadow_space_matrix(light, z_near, z_far),
            None => Mat4::IDENTITY,
        };
        self.view_data.local_to_world = if self.animate_stage {
            Mat4::from_rotation_y(self.time * 0.2)
        } else {
            Mat4::IDENTITY
        };
        self.view_data
            .set_camera(self.camera.position, fov_y, z_near, z_far);
        let environment_mips = self.environment.image().mip_levels();
        self.view_data.set_lights(&self.lights, environment_mips);

        self.view_uniforms[frame].write_data(0, bytemuck::bytes_of(self.view_data.as_ref()))?;

        for object in &self.objects {
            let ubo = BaseUniform::new(object.transform, view, projection);
            object.write_base_uniform(frame, &ubo)?;
        }

        // The dome follows the camera and is scaled to sit inside the far
        // plane in every direction.
        let dome_model = Mat4::from_translation(self.camera.position)
            * Mat4::from_scale(Vec3::splat(z_far * 1.8));
        self.skydome_pass
            .write_uniform(frame, &BaseUniform::new(dome_model, view, projection))?;
        Ok(())
    }

    /// Records the full pass sequence for one frame.
    fn record_commands(&self, plan: &FramePlan, frame: usize) {
        let cmd = &self.frame_manager.current().command_buffer;
        let constants = GlobalConstants {
            time: self.time,
            metallic: self.metallic,
            roughness: self.roughness,
            variant: plan.variant as i32,
            variant_count: VARIANT_COUNT as i32,
        };

        self.shadow_pass.record(cmd, &self.objects, &plan.shadow, frame);

        self.geometry_pass.record(
            cmd,
            &self.objects,
            &plan.geometry,
            plan.variant,
            &constants,
            frame,
        );

        self.record_depth_copy(cmd);

        let image_index = self.frame_manager.image_index() as usize;
        cmd_transition_image_layout(
            cmd,
            self.swapchain.image(image_index),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            0,
            1,
            1,
        );

        self.record_main_pass(cmd, image_index, plan, &constants, frame);

        cmd_transition_image_layout(
            cmd,
            self.swapchain.image(image_index),
            vk::ImageAspectFlags::COLOR,
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            vk::ImageLayout::PRESENT_SRC_KHR,
            0,
            1,
            1,
        );
    }

    /// Records the main pass on the swapchain image: the backdrop draw,
    /// the lighting composition draw over it, and for the lit variant the
    /// sky dome over the remaining empty fragments. Depth is loaded from
    /// the copy made by [`record_depth_copy`](Self::record_depth_copy).
    fn record_main_pass(
        &self,
        cmd: &CommandBuffer,
        image_index: usize,
        plan: &FramePlan,
        constants: &GlobalConstants,
        frame: usize,
    ) {
        let extent = self.swapchain.extent();
        let config = RenderingConfig::from_extent(extent)
            .with_color_attachment(ColorAttachment::new(self.swapchain.image_view(image_index)))
            .with_depth_attachment(DepthAttachment::new(self.main_depth.view()).load().store());
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

        self.background_pass.record(cmd, frame);
        self.composition_pass
            .record(cmd, plan.variant, constants, frame);
        if plan.draws_sky() {
            self.skydome_pass.record(cmd, frame);
        }

        cmd.end_rendering();
    }

    /// Copies the geometry pass's depth into the main depth buffer.
    ///
    /// The composition render pass *loads* existing depth rather than
    /// recomputing it, so the content has to be moved explicitly, guarded
    /// by layout transitions on both images.
    fn record_depth_copy(&self, cmd: &CommandBuffer) {
        let gbuffer_depth = self.geometry_pass.gbuffer().depth();
        let extent = gbuffer_depth.extent();

        cmd_transition_image_layout(
            cmd,
            gbuffer_depth.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            0,
            1,
            1,
        );
        cmd_transition_image_layout(
            cmd,
            self.main_depth.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            0,
            1,
            1,
        );

        let subresource = vk::ImageSubresourceLayers::default()
            .aspect_mask(vk::ImageAspectFlags::DEPTH)
            .mip_level(0)
            .base_array_layer(0)
            .layer_count(1);
        let region = vk::ImageCopy::default()
            .src_subresource(subresource)
            .dst_subresource(subresource)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            });
        cmd.copy_image(
            gbuffer_depth.handle(),
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            self.main_depth.handle(),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            &[region],
        );

        cmd_transition_image_layout(
            cmd,
            gbuffer_depth.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
            0,
            1,
            1,
        );
        cmd_transition_image_layout(
            cmd,
            self.main_depth.handle(),
            vk::ImageAspectFlags::DEPTH,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            0,
            1,
            1,
        );
    }

    /// Recreates every swap-extent-sized resource at the current size.
    ///
    /// Pipelines and the fixed-resolution shadow pass survive; the
    /// composition descriptor sets are rewritten to point at the new
    /// G-buffer attachments.
    fn recreate_swap_resources(&mut self) -> RhiResult<()> {
        self.device.wait_idle()?;

        self.swapchain
            .recreate(&self.instance, self.surface.handle(), self.width, self.height)?;
        let extent = self.swapchain.extent();

        self.geometry_pass
            .recreate_attachments(extent.width, extent.height)?;
        *self.main_depth =
            Self::create_main_depth(self.device.clone(), extent.width, extent.height)?;

        self.frame_manager.reset_sync()?;

        self.composition_pass.write_descriptors(
            &self.view_uniforms,
            self.geometry_pass.gbuffer(),
            &self.shadow_pass,
            &self.environment,
        );

        info!(
            "Recreated swap resources: {}x{}",
            extent.width, extent.height
        );
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of frames presented since startup.
    pub fn presented_frames(&self) -> u64 {
        self.presented_frames
    }

    /// Accumulated animation time in seconds.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// The logical device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Directory SPIR-V shader binaries are loaded from.
    pub fn shader_dir(&self) -> &Path {
        &self.shader_dir
    }

    /// Blocks until the device has finished all outstanding work.
    pub fn wait_idle(&self) -> RenderResult<()> {
        self.device.wait_idle()?;
        Ok(())
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        info!("Destroying renderer");

        if let Err(e) = self.device.wait_idle() {
            error!("Failed to wait for device idle on shutdown: {}", e);
        }

        // Scene resources only reference the device and may drop in field
        // order; the ManuallyDrop chain below enforces the dependency order
        // between the core objects.
        self.objects.clear();
        self.view_uniforms.clear();

        unsafe {
            ManuallyDrop::drop(&mut self.skydome_pass);
            ManuallyDrop::drop(&mut self.composition_pass);
            ManuallyDrop::drop(&mut self.background_pass);
            ManuallyDrop::drop(&mut self.geometry_pass);
            ManuallyDrop::drop(&mut self.shadow_pass);
            ManuallyDrop::drop(&mut self.main_depth);
            ManuallyDrop::drop(&mut self.environment);
            ManuallyDrop::drop(&mut self.fallback_texture);
            ManuallyDrop::drop(&mut self.object_layout);
            ManuallyDrop::drop(&mut self.descriptor_pool);
            ManuallyDrop::drop(&mut self.upload_pool);
            ManuallyDrop::drop(&mut self.command_pool);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}
