//! Uniform buffer and push constant definitions for the deferred pipeline.
//!
//! These structures must match the GLSL uniform block layouts exactly.
//! All structures use `#[repr(C)]` for predictable memory layout and implement
//! `Pod` and `Zeroable` for safe byte casting.
//!
//! Every buffer-backed block here is duplicated per frame in flight so the
//! CPU can rewrite slot `f+1` while the GPU still reads slot `f`.

use bytemuck::{Pod, Zeroable};
use glam::{IVec4, Mat4, Vec3, Vec4};

use deferred_scene::{
    GpuLight, LightRegistry, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS, MAX_SPOT_LIGHTS,
};

/// Per-object uniform buffer data (binding 0 of every mesh descriptor set).
///
/// # Memory Layout
///
/// - Offset 0: model matrix (64 bytes)
/// - Offset 64: view matrix (64 bytes)
/// - Offset 128: projection matrix (64 bytes)
/// - Total size: 192 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct BaseUniform {
    /// Model matrix (object to world space).
    pub model: Mat4,
    /// View matrix (world to view space).
    pub view: Mat4,
    /// Projection matrix (view to clip space).
    pub projection: Mat4,
}

impl BaseUniform {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Creates a new base uniform from the three transform matrices.
    pub fn new(model: Mat4, view: Mat4, projection: Mat4) -> Self {
        Self {
            model,
            view,
            projection,
        }
    }
}

/// View and lighting uniform buffer data (binding 1 of every mesh descriptor
/// set, and binding 0 of the composition set).
///
/// Holds the shadow-space transform, the camera, and the fixed-capacity light
/// arrays with their active counts. Rewritten every frame and read by the
/// shadow, geometry and composition shaders.
///
/// At roughly 34 KiB this block is large enough that callers should keep it
/// boxed rather than on the stack.
///
/// # Memory Layout
///
/// - Offset 0: shadow-space matrix (64 bytes)
/// - Offset 64: stage local-to-world matrix (64 bytes)
/// - Offset 128: camera info, xyz = position, w = field of view (16 bytes)
/// - Offset 144: directional lights (16 x 64 bytes)
/// - Offset 1168: point lights (512 x 64 bytes)
/// - Offset 33936: spot lights (16 x 64 bytes)
/// - Offset 34960: active light counts, w = cubemap mip count (16 bytes)
/// - Offset 34976: near plane, far plane, 8 bytes padding
/// - Total size: 34992 bytes
#[repr(C)]
#[derive(Clone, Copy)]
pub struct ViewUniform {
    /// Transform from world space into the shadow map's clip space.
    pub shadowmap_space: Mat4,
    /// Stage rotation applied to world-space sampling (animated).
    pub local_to_world: Mat4,
    /// Camera position (xyz) and vertical field of view in radians (w).
    pub camera_info: Vec4,
    /// Directional light slots; only the first `lights_count.x` are valid.
    pub directional_lights: [GpuLight; MAX_DIRECTIONAL_LIGHTS],
    /// Point light slots; only the first `lights_count.y` are valid.
    pub point_lights: [GpuLight; MAX_POINT_LIGHTS],
    /// Spot light slots; only the first `lights_count.z` are valid.
    pub spot_lights: [GpuLight; MAX_SPOT_LIGHTS],
    /// x/y/z = active directional/point/spot counts, w = environment mip count.
    pub lights_count: IVec4,
    /// Near clip plane distance.
    pub z_near: f32,
    /// Far clip plane distance.
    pub z_far: f32,
    /// Padding to a 16-byte boundary.
    pub _padding: [f32; 2],
}

// The derive macros reject the 512-element array, so Pod/Zeroable are
// implemented manually. Safety: repr(C), every field is Pod, and the
// trailing pad makes the layout free of implicit padding bytes.
unsafe impl Zeroable for ViewUniform {}
unsafe impl Pod for ViewUniform {}

impl Default for ViewUniform {
    fn default() -> Self {
        Zeroable::zeroed()
    }
}

impl ViewUniform {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Writes the packed light arrays and counts from a registry.
    pub fn set_lights(&mut self, lights: &LightRegistry, environment_mip_count: u32) {
        self.directional_lights = lights.pack_directional();
        self.point_lights = *lights.pack_point();
        self.spot_lights = lights.pack_spot();
        let (dir, point, spot) = lights.counts();
        self.lights_count = IVec4::new(
            dir as i32,
            point as i32,
            spot as i32,
            environment_mip_count as i32,
        );
    }

    /// Writes the camera position, field of view and clip planes.
    pub fn set_camera(&mut self, position: Vec3, fov_y: f32, z_near: f32, z_far: f32) {
        self.camera_info = position.extend(fov_y);
        self.z_near = z_near;
        self.z_far = z_far;
    }
}

/// Push constants shared by the geometry and composition stages.
///
/// Pushed once per frame; 20 bytes, well under the 128-byte minimum
/// push constant budget the API guarantees.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct GlobalConstants {
    /// Accumulated simulation time in seconds.
    pub time: f32,
    /// Global metallic override for material preview modes.
    pub metallic: f32,
    /// Global roughness override for material preview modes.
    pub roughness: f32,
    /// Active shader variant index, mirrors the bound pipeline's constant.
    pub variant: i32,
    /// Total number of shader variants compiled.
    pub variant_count: i32,
}

impl GlobalConstants {
    /// Size of the struct in bytes.
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

#[cfg(test)]
mod tests {
    use super::*;
    use deferred_scene::DirectionalLight;

    #[test]
    fn test_base_uniform_size() {
        // 3 Mat4 = 192 bytes
        assert_eq!(BaseUniform::SIZE, 192);
        assert_eq!(std::mem::align_of::<BaseUniform>(), 16);
    }

    #[test]
    fn test_view_uniform_size() {
        // 2 Mat4 + Vec4 + (16 + 512 + 16) lights * 64 + IVec4 + 4 f32
        let expected = 64 + 64 + 16 + (16 + 512 + 16) * 64 + 16 + 16;
        assert_eq!(ViewUniform::SIZE, expected);
    }

    #[test]
    fn test_global_constants_size() {
        assert_eq!(GlobalConstants::SIZE, 20);
    }

    #[test]
    fn test_view_uniform_set_lights() {
        let mut lights = LightRegistry::new();
        lights.push_directional(DirectionalLight::default());
        lights.push_directional(DirectionalLight::default());

        let mut view = ViewUniform::default();
        view.set_lights(&lights, 9);

        assert_eq!(view.lights_count, IVec4::new(2, 0, 0, 9));
    }

    #[test]
    fn test_view_uniform_set_camera() {
        let mut view = ViewUniform::default();
        view.set_camera(Vec3::new(1.0, 2.0, 3.0), 1.2, 0.1, 45.0);

        assert_eq!(view.camera_info, Vec4::new(1.0, 2.0, 3.0, 1.2));
        assert_eq!(view.z_near, 0.1);
        assert_eq!(view.z_far, 45.0);
    }

    #[test]
    fn test_view_uniform_pod_roundtrip() {
        let view = ViewUniform::default();
        let bytes: &[u8] = bytemuck::bytes_of(&view);
        assert_eq!(bytes.len(), ViewUniform::SIZE);

        let base = BaseUniform::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY);
        assert_eq!(bytemuck::bytes_of(&base).len(), BaseUniform::SIZE);
    }
}
