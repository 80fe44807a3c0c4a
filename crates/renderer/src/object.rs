//! GPU-side render objects.
//!
//! # Overview
//!
//! A [`RenderObject`] owns everything needed to draw one mesh: vertex and
//! index buffers, its textures, one base uniform buffer per frame in flight,
//! and one descriptor set per frame in flight. Objects are built once during
//! scene setup, immutable during the render loop (apart from their base
//! uniform contents), and destroyed at shutdown.
//!
//! Descriptor sets follow a fixed binding-slot contract shared with the
//! shaders:
//!
//! | Slot | Resource               |
//! |------|------------------------|
//! | 0    | base uniform buffer    |
//! | 1    | view uniform buffer    |
//! | 2    | environment cubemap    |
//! | 3    | shadow map             |
//! | 4+   | object textures        |
//!
//! A mismatch here does not fail loudly; shaders would silently sample the
//! wrong resource. The layout is produced by
//! [`mesh_material_bindings`](deferred_rhi::descriptor::mesh_material_bindings)
//! and the writes below in the same order.
//!
//! All objects share one descriptor set layout with
//! [`OBJECT_TEXTURE_SLOTS`] texture slots so that every pass's pipeline
//! layout stays compatible with every object's set; unused slots are
//! filled with a shared fallback texture.

use std::sync::Arc;

use ash::vk;
use glam::Mat4;
use tracing::{debug, warn};

use deferred_resources::{MeshData, TextureData};
use deferred_rhi::RhiResult;
use deferred_rhi::buffer::{Buffer, BufferUsage};
use deferred_rhi::command::{CommandBuffer, CommandPool};
use deferred_rhi::descriptor::{
    DescriptorPool, DescriptorSetLayout, buffer_info, image_info, mesh_material_bindings,
    update_descriptor_sets,
};
use deferred_rhi::device::Device;
use deferred_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use deferred_rhi::texture::Texture;
use deferred_rhi::vertex::{INSTANCE_BUFFER_BIND_ID, InstanceData, VERTEX_BUFFER_BIND_ID, Vertex};

use crate::plan::{DrawKind, INDIRECT_COMMAND_STRIDE, PlannedDraw};
use crate::ubo::BaseUniform;

/// Texture slot count in the shared object descriptor layout.
pub const OBJECT_TEXTURE_SLOTS: usize = 4;

/// Creates the descriptor set layout shared by every render object.
pub fn object_set_layout(device: Arc<Device>) -> RhiResult<DescriptorSetLayout> {
    let bindings = mesh_material_bindings(OBJECT_TEXTURE_SLOTS as u32);
    DescriptorSetLayout::new(device, &bindings)
}

/// Shared resources bound into every object's descriptor sets.
pub struct ObjectSharedBindings<'a> {
    /// The shared object descriptor set layout.
    pub layout: &'a DescriptorSetLayout,
    /// Per-frame view/lighting uniform buffers (slot 1).
    pub view_uniforms: &'a [Buffer],
    /// Environment cubemap (slot 2).
    pub environment: &'a Texture,
    /// Shadow map view (slot 3).
    pub shadow_view: vk::ImageView,
    /// Shadow map sampler (slot 3).
    pub shadow_sampler: vk::Sampler,
    /// Bound into texture slots the object leaves empty.
    pub fallback_texture: &'a Texture,
}

/// Device-local mesh geometry.
pub struct MeshBuffers {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl MeshBuffers {
    /// Uploads a mesh's vertex and index arrays to device-local buffers.
    pub fn new(device: Arc<Device>, mesh: &MeshData) -> RhiResult<Self> {
        let vertices: Vec<Vertex> = mesh
            .vertices
            .iter()
            .map(|v| Vertex::new(v.position, v.normal, v.color, v.tex_coord))
            .collect();

        let vertex_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&vertices),
        )?;
        let index_buffer = Buffer::new_with_data(
            device,
            BufferUsage::Index,
            bytemuck::cast_slice(&mesh.indices),
        )?;

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        })
    }

    /// Vertex buffer handle.
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle.
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Number of indices to draw.
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}

/// Per-draw-style GPU resources.
pub enum ObjectDraw {
    /// One indexed draw, single instance.
    Plain,
    /// Indexed draw over an instance attribute buffer.
    Instanced {
        /// Tightly packed [`InstanceData`] array.
        instance_buffer: Buffer,
        /// Number of instances in the buffer.
        instance_count: u32,
    },
    /// Draw parameters read from an indirect command buffer.
    Indirect {
        /// `vk::DrawIndexedIndirectCommand` array.
        indirect_buffer: Buffer,
        /// Number of commands in the buffer.
        command_count: u32,
    },
    /// Indirect draw that also consumes an instance attribute buffer.
    IndirectInstanced {
        /// Tightly packed [`InstanceData`] array.
        instance_buffer: Buffer,
        /// `vk::DrawIndexedIndirectCommand` array.
        indirect_buffer: Buffer,
        /// Number of commands in the buffer.
        command_count: u32,
    },
}

/// One drawable object: mesh, material bindings, and draw style.
pub struct RenderObject {
    mesh: MeshBuffers,
    draw: ObjectDraw,
    /// World transform; animated objects rewrite this between frames.
    pub transform: Mat4,
    #[allow(dead_code)]
    textures: Vec<Texture>,
    base_uniforms: Vec<Buffer>,
    descriptor_sets: Vec<vk::DescriptorSet>,
}

impl RenderObject {
    /// Creates a plain render object from mesh and texture data.
    ///
    /// The first texture is treated as sRGB base color; any further
    /// textures are linear data (normal maps, material parameters).
    ///
    /// # Errors
    ///
    /// Returns an error if any upload or descriptor allocation fails.
    pub fn new(
        device: Arc<Device>,
        upload_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        mesh: &MeshData,
        textures: &[TextureData],
        shared: &ObjectSharedBindings<'_>,
        transform: Mat4,
    ) -> RhiResult<Self> {
        Self::with_draw(
            device,
            upload_pool,
            descriptor_pool,
            mesh,
            textures,
            shared,
            transform,
            ObjectDraw::Plain,
        )
    }

    /// Creates an instanced render object.
    ///
    /// Uploads `instances` as a tightly packed vertex attribute buffer
    /// bound at the instance binding slot during recording.
    #[allow(clippy::too_many_arguments)]
    pub fn new_instanced(
        device: Arc<Device>,
        upload_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        mesh: &MeshData,
        textures: &[TextureData],
        shared: &ObjectSharedBindings<'_>,
        transform: Mat4,
        instances: &[InstanceData],
    ) -> RhiResult<Self> {
        let instance_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(instances),
        )?;
        Self::with_draw(
            device,
            upload_pool,
            descriptor_pool,
            mesh,
            textures,
            shared,
            transform,
            ObjectDraw::Instanced {
                instance_buffer,
                instance_count: instances.len() as u32,
            },
        )
    }

    /// Creates an indirect-instanced render object.
    ///
    /// `commands` is uploaded to an indirect buffer; whether it is consumed
    /// by one multi-draw call or one call per command is decided at planning
    /// time from the device's capabilities.
    #[allow(clippy::too_many_arguments)]
    pub fn new_indirect_instanced(
        device: Arc<Device>,
        upload_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        mesh: &MeshData,
        textures: &[TextureData],
        shared: &ObjectSharedBindings<'_>,
        transform: Mat4,
        instances: &[InstanceData],
        commands: &[vk::DrawIndexedIndirectCommand],
    ) -> RhiResult<Self> {
        let instance_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(instances),
        )?;
        let indirect_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Indirect,
            command_bytes(commands),
        )?;
        Self::with_draw(
            device,
            upload_pool,
            descriptor_pool,
            mesh,
            textures,
            shared,
            transform,
            ObjectDraw::IndirectInstanced {
                instance_buffer,
                indirect_buffer,
                command_count: commands.len() as u32,
            },
        )
    }

    /// Creates an indirect render object without instance attributes.
    #[allow(clippy::too_many_arguments)]
    pub fn new_indirect(
        device: Arc<Device>,
        upload_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        mesh: &MeshData,
        textures: &[TextureData],
        shared: &ObjectSharedBindings<'_>,
        transform: Mat4,
        commands: &[vk::DrawIndexedIndirectCommand],
    ) -> RhiResult<Self> {
        let indirect_buffer = Buffer::new_with_data(
            device.clone(),
            BufferUsage::Indirect,
            command_bytes(commands),
        )?;
        Self::with_draw(
            device,
            upload_pool,
            descriptor_pool,
            mesh,
            textures,
            shared,
            transform,
            ObjectDraw::Indirect {
                indirect_buffer,
                command_count: commands.len() as u32,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn with_draw(
        device: Arc<Device>,
        upload_pool: &CommandPool,
        descriptor_pool: &DescriptorPool,
        mesh: &MeshData,
        texture_data: &[TextureData],
        shared: &ObjectSharedBindings<'_>,
        transform: Mat4,
        draw: ObjectDraw,
    ) -> RhiResult<Self> {
        let mesh = MeshBuffers::new(device.clone(), mesh)?;

        let texture_data = if texture_data.len() > OBJECT_TEXTURE_SLOTS {
            warn!(
                supplied = texture_data.len(),
                slots = OBJECT_TEXTURE_SLOTS,
                "Too many object textures, extra ones are ignored"
            );
            &texture_data[..OBJECT_TEXTURE_SLOTS]
        } else {
            texture_data
        };

        let mut textures = Vec::with_capacity(texture_data.len());
        for (i, data) in texture_data.iter().enumerate() {
            textures.push(Texture::from_rgba8(
                device.clone(),
                upload_pool,
                &data.pixels,
                data.width,
                data.height,
                i == 0,
            )?);
        }

        let mut base_uniforms = Vec::with_capacity(MAX_FRAMES_IN_FLIGHT);
        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            base_uniforms.push(Buffer::new(
                device.clone(),
                BufferUsage::Uniform,
                BaseUniform::SIZE as vk::DeviceSize,
            )?);
        }

        let layouts = [shared.layout.handle(); MAX_FRAMES_IN_FLIGHT];
        let descriptor_sets = descriptor_pool.allocate(&layouts)?;

        for (frame, &set) in descriptor_sets.iter().enumerate() {
            write_object_set(
                &device,
                set,
                &base_uniforms[frame],
                &shared.view_uniforms[frame],
                shared,
                &textures,
            );
        }

        debug!(
            textures = textures.len(),
            indices = mesh.index_count(),
            "Created render object"
        );

        Ok(Self {
            mesh,
            draw,
            transform,
            textures,
            base_uniforms,
            descriptor_sets,
        })
    }

    /// Writes this object's base uniform for one frame-in-flight slot.
    pub fn write_base_uniform(&self, frame: usize, ubo: &BaseUniform) -> RhiResult<()> {
        self.base_uniforms[frame].write_data(0, bytemuck::bytes_of(ubo))
    }

    /// The mesh geometry buffers.
    pub fn mesh(&self) -> &MeshBuffers {
        &self.mesh
    }

    /// The draw style and its GPU resources.
    pub fn draw(&self) -> &ObjectDraw {
        &self.draw
    }

    /// CPU-side draw description, consumed by frame planning.
    pub fn draw_kind(&self) -> DrawKind {
        match &self.draw {
            ObjectDraw::Plain => DrawKind::Plain,
            ObjectDraw::Instanced { instance_count, .. } => DrawKind::Instanced {
                instances: *instance_count,
            },
            ObjectDraw::Indirect { command_count, .. } => DrawKind::Indirect {
                commands: *command_count,
            },
            ObjectDraw::IndirectInstanced { command_count, .. } => DrawKind::IndirectInstanced {
                commands: *command_count,
            },
        }
    }

    /// The descriptor set for one frame-in-flight slot.
    pub fn descriptor_set(&self, frame: usize) -> vk::DescriptorSet {
        self.descriptor_sets[frame]
    }

    /// Number of object textures bound at slot 4 and up.
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Whether the object reads an instance attribute buffer.
    pub fn is_instanced(&self) -> bool {
        matches!(
            self.draw,
            ObjectDraw::Instanced { .. } | ObjectDraw::IndirectInstanced { .. }
        )
    }
}

/// The plain/instanced pipeline pair of one pass.
pub struct PassPipelines {
    /// Bound for objects without instance attributes.
    pub plain: vk::Pipeline,
    /// Bound for objects with instance attributes.
    pub instanced: vk::Pipeline,
}

/// Records a planned draw sequence against one pass's pipelines.
///
/// Bindings are re-issued only when the object changes, so the expanded
/// one-call-per-command fallback path does not rebind buffers per command.
pub fn record_planned_draws(
    cmd: &CommandBuffer,
    layout: vk::PipelineLayout,
    pipelines: &PassPipelines,
    objects: &[RenderObject],
    draws: &[PlannedDraw],
    frame: usize,
) {
    let mut bound_object = None;
    for draw in draws {
        let index = draw.object();
        let object = &objects[index];

        if bound_object != Some(index) {
            let pipeline = if object.is_instanced() {
                pipelines.instanced
            } else {
                pipelines.plain
            };
            cmd.bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline);
            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[object.descriptor_set(frame)],
                &[],
            );
            cmd.bind_vertex_buffers(
                VERTEX_BUFFER_BIND_ID,
                &[object.mesh().vertex_buffer()],
                &[0],
            );
            match object.draw() {
                ObjectDraw::Instanced { instance_buffer, .. }
                | ObjectDraw::IndirectInstanced { instance_buffer, .. } => {
                    cmd.bind_vertex_buffers(
                        INSTANCE_BUFFER_BIND_ID,
                        &[instance_buffer.handle()],
                        &[0],
                    );
                }
                ObjectDraw::Plain | ObjectDraw::Indirect { .. } => {}
            }
            cmd.bind_index_buffer(object.mesh().index_buffer(), 0, vk::IndexType::UINT32);
            bound_object = Some(index);
        }

        match *draw {
            PlannedDraw::Indexed { instance_count, .. } => {
                cmd.draw_indexed(object.mesh().index_count(), instance_count, 0, 0, 0);
            }
            PlannedDraw::IndexedIndirect {
                offset, draw_count, ..
            } => {
                let indirect = match object.draw() {
                    ObjectDraw::Indirect {
                        indirect_buffer, ..
                    }
                    | ObjectDraw::IndirectInstanced {
                        indirect_buffer, ..
                    } => indirect_buffer.handle(),
                    // The planner only emits indirect draws for indirect
                    // objects; hitting this is a planning bug.
                    ObjectDraw::Plain | ObjectDraw::Instanced { .. } => {
                        warn!(object = index, "Indirect draw planned for a direct object");
                        continue;
                    }
                };
                cmd.draw_indexed_indirect(indirect, offset, draw_count, INDIRECT_COMMAND_STRIDE);
            }
        }
    }
}

fn command_bytes(commands: &[vk::DrawIndexedIndirectCommand]) -> &[u8] {
    // vk::DrawIndexedIndirectCommand is a plain repr(C) struct of five u32s
    // but does not implement Pod, so the cast is done by hand.
    unsafe {
        std::slice::from_raw_parts(
            commands.as_ptr().cast::<u8>(),
            std::mem::size_of_val(commands),
        )
    }
}

/// Writes the fixed binding layout into one descriptor set.
fn write_object_set(
    device: &Device,
    set: vk::DescriptorSet,
    base_uniform: &Buffer,
    view_uniform: &Buffer,
    shared: &ObjectSharedBindings<'_>,
    textures: &[Texture],
) {
    let base_info = [buffer_info(base_uniform.handle(), 0, vk::WHOLE_SIZE)];
    let view_info = [buffer_info(view_uniform.handle(), 0, vk::WHOLE_SIZE)];
    let environment_info = [image_info(
        shared.environment.sampler(),
        shared.environment.view(),
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    )];
    let shadow_info = [image_info(
        shared.shadow_sampler,
        shared.shadow_view,
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    )];
    // Every slot gets a write; slots past the object's own textures fall
    // back to the shared default so samplers never see a null descriptor.
    let texture_infos: Vec<_> = (0..OBJECT_TEXTURE_SLOTS)
        .map(|slot| {
            let texture = textures.get(slot).unwrap_or(shared.fallback_texture);
            [image_info(
                texture.sampler(),
                texture.view(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )]
        })
        .collect();

    let mut writes = vec![
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(0)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&base_info),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(1)
            .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
            .buffer_info(&view_info),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(2)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&environment_info),
        vk::WriteDescriptorSet::default()
            .dst_set(set)
            .dst_binding(3)
            .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
            .image_info(&shadow_info),
    ];
    for (i, info) in texture_infos.iter().enumerate() {
        writes.push(
            vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(4 + i as u32)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .image_info(info),
        );
    }

    update_descriptor_sets(device, &writes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_order_contract() {
        // Slots 0-3 are fixed regardless of texture count; object textures
        // start at slot 4.
        for texture_count in [0u32, 1, 3, 8] {
            let bindings = mesh_material_bindings(texture_count);
            assert_eq!(bindings.len() as u32, 4 + texture_count);
            assert_eq!(bindings[0].binding, 0);
            assert_eq!(bindings[0].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
            assert_eq!(bindings[1].binding, 1);
            assert_eq!(bindings[1].descriptor_type, vk::DescriptorType::UNIFORM_BUFFER);
            assert_eq!(
                bindings[2].descriptor_type,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            );
            assert_eq!(
                bindings[3].descriptor_type,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            );
            for (i, binding) in bindings.iter().enumerate().skip(4) {
                assert_eq!(binding.binding, i as u32);
                assert_eq!(
                    binding.descriptor_type,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER
                );
            }
        }
    }

    #[test]
    fn test_indirect_command_bytes_layout() {
        let commands = [vk::DrawIndexedIndirectCommand {
            index_count: 36,
            instance_count: 1,
            first_index: 0,
            vertex_offset: 0,
            first_instance: 7,
        }];
        let bytes = command_bytes(&commands);
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[0..4], &36u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &7u32.to_le_bytes());
    }
}
