//! Vertex data structures and input descriptions.
//!
//! This module defines the vertex formats used in the renderer.
//!
//! # Vertex Types
//!
//! - [`Vertex`] - Per-vertex mesh data (position, normal, color, UV)
//! - [`InstanceData`] - Per-instance data consumed at binding 1

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

/// Binding slot for per-vertex mesh data.
pub const VERTEX_BUFFER_BIND_ID: u32 = 0;
/// Binding slot for per-instance data.
pub const INSTANCE_BUFFER_BIND_ID: u32 = 1;

/// Standard vertex format with position, normal, color, and UV.
///
/// This is the single vertex format for all mesh rendering; meshes without
/// vertex colors store white.
///
/// # Memory Layout
///
/// The struct uses `#[repr(C)]` to ensure predictable memory layout:
/// - Offset 0: position (12 bytes)
/// - Offset 12: normal (12 bytes)
/// - Offset 24: color (12 bytes)
/// - Offset 36: tex_coord (8 bytes)
/// - Total size: 44 bytes
///
/// # Shader Locations
///
/// - location 0: position (vec3)
/// - location 1: normal (vec3)
/// - location 2: color (vec3)
/// - location 3: tex_coord (vec2)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 3D position in object space.
    pub position: Vec3,
    /// Surface normal vector (should be normalized).
    pub normal: Vec3,
    /// Vertex color (white when the source mesh has none).
    pub color: Vec3,
    /// Texture coordinates (UV).
    pub tex_coord: Vec2,
}

impl Vertex {
    /// Creates a new vertex with the specified attributes.
    #[inline]
    pub const fn new(position: Vec3, normal: Vec3, color: Vec3, tex_coord: Vec2) -> Self {
        Self {
            position,
            normal,
            color,
            tex_coord,
        }
    }

    /// Returns the size of the vertex in bytes.
    #[inline]
    pub const fn size() -> usize {
        std::mem::size_of::<Self>()
    }

    /// Get the vertex input binding description.
    ///
    /// Per-vertex input rate at [`VERTEX_BUFFER_BIND_ID`].
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: VERTEX_BUFFER_BIND_ID,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Get the vertex attribute descriptions.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            // Position at location 0
            vk::VertexInputAttributeDescription {
                binding: VERTEX_BUFFER_BIND_ID,
                location: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            // Normal at location 1
            vk::VertexInputAttributeDescription {
                binding: VERTEX_BUFFER_BIND_ID,
                location: 1,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            // Color at location 2
            vk::VertexInputAttributeDescription {
                binding: VERTEX_BUFFER_BIND_ID,
                location: 2,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 24,
            },
            // TexCoord at location 3
            vk::VertexInputAttributeDescription {
                binding: VERTEX_BUFFER_BIND_ID,
                location: 3,
                format: vk::Format::R32G32_SFLOAT,
                offset: 36,
            },
        ]
    }
}

/// Per-instance data consumed at [`INSTANCE_BUFFER_BIND_ID`].
///
/// # Memory Layout
///
/// - Offset 0: position (12 bytes)
/// - Offset 12: rotation (12 bytes), Euler angles in radians
/// - Offset 24: scale (4 bytes)
/// - Offset 28: tex_index (1 byte) + 3 bytes padding
/// - Total size: 32 bytes
///
/// # Shader Locations
///
/// - location 4: position (vec3)
/// - location 5: rotation (vec3)
/// - location 6: scale (float)
/// - location 7: tex_index (uint, R8_UINT)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    /// World-space position offset.
    pub position: Vec3,
    /// Euler rotation in radians.
    pub rotation: Vec3,
    /// Uniform scale factor.
    pub scale: f32,
    /// Index into the object texture array.
    pub tex_index: u8,
    /// Keeps the stride at a 4-byte multiple.
    pub _pad: [u8; 3],
}

impl InstanceData {
    /// Creates new per-instance data.
    #[inline]
    pub const fn new(position: Vec3, rotation: Vec3, scale: f32, tex_index: u8) -> Self {
        Self {
            position,
            rotation,
            scale,
            tex_index,
            _pad: [0; 3],
        }
    }

    /// Get the instance input binding description.
    ///
    /// Per-instance input rate at [`INSTANCE_BUFFER_BIND_ID`].
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: INSTANCE_BUFFER_BIND_ID,
            stride: std::mem::size_of::<Self>() as u32,
            input_rate: vk::VertexInputRate::INSTANCE,
        }
    }

    /// Get the instance attribute descriptions.
    ///
    /// Locations continue after [`Vertex::attribute_descriptions`].
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 4] {
        [
            // Instance position at location 4
            vk::VertexInputAttributeDescription {
                binding: INSTANCE_BUFFER_BIND_ID,
                location: 4,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 0,
            },
            // Instance rotation at location 5
            vk::VertexInputAttributeDescription {
                binding: INSTANCE_BUFFER_BIND_ID,
                location: 5,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: 12,
            },
            // Instance scale at location 6
            vk::VertexInputAttributeDescription {
                binding: INSTANCE_BUFFER_BIND_ID,
                location: 6,
                format: vk::Format::R32_SFLOAT,
                offset: 24,
            },
            // Texture array index at location 7
            vk::VertexInputAttributeDescription {
                binding: INSTANCE_BUFFER_BIND_ID,
                location: 7,
                format: vk::Format::R8_UINT,
                offset: 28,
            },
        ]
    }
}

/// Binding descriptions for pipelines that consume both vertex and instance
/// buffers.
pub fn instanced_binding_descriptions() -> [vk::VertexInputBindingDescription; 2] {
    [
        Vertex::binding_description(),
        InstanceData::binding_description(),
    ]
}

/// Attribute descriptions for pipelines that consume both vertex and instance
/// buffers (locations 0..=7).
pub fn instanced_attribute_descriptions() -> [vk::VertexInputAttributeDescription; 8] {
    let v = Vertex::attribute_descriptions();
    let i = InstanceData::attribute_descriptions();
    [v[0], v[1], v[2], v[3], i[0], i[1], i[2], i[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_size() {
        // Vertex: Vec3 (12) + Vec3 (12) + Vec3 (12) + Vec2 (8) = 44 bytes
        assert_eq!(std::mem::size_of::<Vertex>(), 44);
        assert_eq!(Vertex::size(), 44);
    }

    #[test]
    fn test_vertex_binding_description() {
        let binding = Vertex::binding_description();
        assert_eq!(binding.binding, VERTEX_BUFFER_BIND_ID);
        assert_eq!(binding.stride, 44);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
    }

    #[test]
    fn test_vertex_attribute_descriptions() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs.len(), 4);

        // Position attribute (location 0)
        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[0].format, vk::Format::R32G32B32_SFLOAT);
        assert_eq!(attrs[0].offset, 0);

        // Normal attribute (location 1)
        assert_eq!(attrs[1].location, 1);
        assert_eq!(attrs[1].offset, 12);

        // Color attribute (location 2)
        assert_eq!(attrs[2].location, 2);
        assert_eq!(attrs[2].offset, 24);

        // TexCoord attribute (location 3)
        assert_eq!(attrs[3].location, 3);
        assert_eq!(attrs[3].format, vk::Format::R32G32_SFLOAT);
        assert_eq!(attrs[3].offset, 36);
    }

    #[test]
    fn test_vertex_offsets() {
        use std::mem::offset_of;

        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, normal), 12);
        assert_eq!(offset_of!(Vertex, color), 24);
        assert_eq!(offset_of!(Vertex, tex_coord), 36);
    }

    #[test]
    fn test_instance_data_size() {
        // InstanceData: Vec3 (12) + Vec3 (12) + f32 (4) + u8 + pad (4) = 32 bytes
        assert_eq!(std::mem::size_of::<InstanceData>(), 32);
    }

    #[test]
    fn test_instance_data_binding_description() {
        let binding = InstanceData::binding_description();
        assert_eq!(binding.binding, INSTANCE_BUFFER_BIND_ID);
        assert_eq!(binding.stride, 32);
        assert_eq!(binding.input_rate, vk::VertexInputRate::INSTANCE);
    }

    #[test]
    fn test_instance_data_attribute_descriptions() {
        let attrs = InstanceData::attribute_descriptions();
        assert_eq!(attrs.len(), 4);

        assert_eq!(attrs[0].location, 4);
        assert_eq!(attrs[0].offset, 0);

        assert_eq!(attrs[1].location, 5);
        assert_eq!(attrs[1].offset, 12);

        assert_eq!(attrs[2].location, 6);
        assert_eq!(attrs[2].format, vk::Format::R32_SFLOAT);
        assert_eq!(attrs[2].offset, 24);

        assert_eq!(attrs[3].location, 7);
        assert_eq!(attrs[3].format, vk::Format::R8_UINT);
        assert_eq!(attrs[3].offset, 28);
    }

    #[test]
    fn test_instanced_descriptions_cover_both_bindings() {
        let bindings = instanced_binding_descriptions();
        assert_eq!(bindings[0].binding, VERTEX_BUFFER_BIND_ID);
        assert_eq!(bindings[1].binding, INSTANCE_BUFFER_BIND_ID);

        let attrs = instanced_attribute_descriptions();
        assert_eq!(attrs.len(), 8);
        for (expected_location, attr) in attrs.iter().enumerate() {
            assert_eq!(attr.location, expected_location as u32);
        }
    }

    #[test]
    fn test_vertex_pod_roundtrip() {
        let vertex = Vertex::new(
            Vec3::new(1.0, 2.0, 3.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::ONE,
            Vec2::new(0.5, 0.5),
        );

        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), 44);

        let vertex_back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(*vertex_back, vertex);
    }

    #[test]
    fn test_instance_data_new_zeroes_padding() {
        let instance = InstanceData::new(Vec3::ZERO, Vec3::ZERO, 1.0, 7);
        assert_eq!(instance.tex_index, 7);
        assert_eq!(instance._pad, [0; 3]);
    }
}
