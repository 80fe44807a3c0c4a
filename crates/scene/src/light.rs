//! Light definitions for the scene.
//!
//! CPU-side light descriptions ([`DirectionalLight`], [`PointLight`],
//! [`SpotLight`]) are collected into a [`LightRegistry`] once per frame and
//! packed into the GPU layout ([`GpuLight`]) when the view uniform buffer is
//! written. The shader declares fixed-capacity arrays, so the registry is
//! bounded: lights past the capacity are dropped with a warning rather than
//! growing past what the shader can index.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use tracing::warn;

/// Maximum number of directional lights the shader can consume.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 16;
/// Maximum number of point lights the shader can consume.
pub const MAX_POINT_LIGHTS: usize = 512;
/// Maximum number of spot lights the shader can consume.
pub const MAX_SPOT_LIGHTS: usize = 16;

/// A directional light (sun-like).
#[derive(Clone, Copy, Debug)]
pub struct DirectionalLight {
    /// Position the light shines from; the shadow pass looks from here
    /// toward the origin.
    pub position: Vec3,
    /// Light direction (normalized)
    pub direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 10.0, 0.0),
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

/// A point light (omnidirectional).
#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    /// Light position in world space
    pub position: Vec3,
    /// Attenuation radius
    pub radius: f32,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 10.0,
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

/// A spot light (cone-shaped).
#[derive(Clone, Copy, Debug)]
pub struct SpotLight {
    /// Light position in world space
    pub position: Vec3,
    /// Light direction (normalized)
    pub direction: Vec3,
    /// Light color
    pub color: Vec3,
    /// Light intensity
    pub intensity: f32,
    /// Inner cone angle cosine
    pub inner_cutoff: f32,
    /// Outer cone angle cosine
    pub outer_cutoff: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::ONE,
            intensity: 1.0,
            inner_cutoff: 0.9, // ~25 degrees
            outer_cutoff: 0.8, // ~37 degrees
        }
    }
}

/// GPU layout for one light: four vec4s, matching the shader's `Light`
/// struct for all three light kinds.
///
/// - `position.xyz` = world position, `position.w` unused
/// - `color.rgb` = color, `color.a` = intensity
/// - `direction.xyz` = direction (directional/spot), `direction.w` unused
/// - `info.x` = radius (point), `info.y`/`info.z` = inner/outer cutoff (spot)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position: Vec4,
    pub color: Vec4,
    pub direction: Vec4,
    pub info: Vec4,
}

impl From<&DirectionalLight> for GpuLight {
    fn from(light: &DirectionalLight) -> Self {
        Self {
            position: light.position.extend(1.0),
            color: light.color.extend(light.intensity),
            direction: light.direction.extend(0.0),
            info: Vec4::ZERO,
        }
    }
}

impl From<&PointLight> for GpuLight {
    fn from(light: &PointLight) -> Self {
        Self {
            position: light.position.extend(1.0),
            color: light.color.extend(light.intensity),
            direction: Vec4::ZERO,
            info: Vec4::new(light.radius, 0.0, 0.0, 0.0),
        }
    }
}

impl From<&SpotLight> for GpuLight {
    fn from(light: &SpotLight) -> Self {
        Self {
            position: light.position.extend(1.0),
            color: light.color.extend(light.intensity),
            direction: light.direction.extend(0.0),
            info: Vec4::new(0.0, light.inner_cutoff, light.outer_cutoff, 0.0),
        }
    }
}

/// Bounded registry of scene lights, rebuilt or mutated between frames and
/// packed into the view uniform each frame.
///
/// Capacities match the shader's fixed array sizes; pushes beyond capacity
/// are dropped with a warning.
#[derive(Debug, Default)]
pub struct LightRegistry {
    directional: Vec<DirectionalLight>,
    point: Vec<PointLight>,
    spot: Vec<SpotLight>,
}

impl LightRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directional light. Returns false if the registry is full.
    pub fn push_directional(&mut self, light: DirectionalLight) -> bool {
        if self.directional.len() >= MAX_DIRECTIONAL_LIGHTS {
            warn!(
                "Directional light dropped: registry full ({} lights)",
                MAX_DIRECTIONAL_LIGHTS
            );
            return false;
        }
        self.directional.push(light);
        true
    }

    /// Add a point light. Returns false if the registry is full.
    pub fn push_point(&mut self, light: PointLight) -> bool {
        if self.point.len() >= MAX_POINT_LIGHTS {
            warn!(
                "Point light dropped: registry full ({} lights)",
                MAX_POINT_LIGHTS
            );
            return false;
        }
        self.point.push(light);
        true
    }

    /// Add a spot light. Returns false if the registry is full.
    pub fn push_spot(&mut self, light: SpotLight) -> bool {
        if self.spot.len() >= MAX_SPOT_LIGHTS {
            warn!(
                "Spot light dropped: registry full ({} lights)",
                MAX_SPOT_LIGHTS
            );
            return false;
        }
        self.spot.push(light);
        true
    }

    /// Directional lights in insertion order.
    pub fn directional(&self) -> &[DirectionalLight] {
        &self.directional
    }

    /// Point lights in insertion order.
    pub fn point(&self) -> &[PointLight] {
        &self.point
    }

    /// Spot lights in insertion order.
    pub fn spot(&self) -> &[SpotLight] {
        &self.spot
    }

    /// Mutable access to the directional lights (for animation).
    pub fn directional_mut(&mut self) -> &mut [DirectionalLight] {
        &mut self.directional
    }

    /// Mutable access to the point lights (for animation).
    pub fn point_mut(&mut self) -> &mut [PointLight] {
        &mut self.point
    }

    /// Active light counts as (directional, point, spot).
    pub fn counts(&self) -> (u32, u32, u32) {
        (
            self.directional.len() as u32,
            self.point.len() as u32,
            self.spot.len() as u32,
        )
    }

    /// Pack the directional lights into a fixed-capacity GPU array.
    pub fn pack_directional(&self) -> [GpuLight; MAX_DIRECTIONAL_LIGHTS] {
        let mut out = [GpuLight::default(); MAX_DIRECTIONAL_LIGHTS];
        for (slot, light) in out.iter_mut().zip(&self.directional) {
            *slot = light.into();
        }
        out
    }

    /// Pack the point lights into a fixed-capacity GPU array.
    pub fn pack_point(&self) -> Box<[GpuLight; MAX_POINT_LIGHTS]> {
        let mut out = Box::new([GpuLight::default(); MAX_POINT_LIGHTS]);
        for (slot, light) in out.iter_mut().zip(&self.point) {
            *slot = light.into();
        }
        out
    }

    /// Pack the spot lights into a fixed-capacity GPU array.
    pub fn pack_spot(&self) -> [GpuLight; MAX_SPOT_LIGHTS] {
        let mut out = [GpuLight::default(); MAX_SPOT_LIGHTS];
        for (slot, light) in out.iter_mut().zip(&self.spot) {
            *slot = light.into();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_light_size() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 64);
    }

    #[test]
    fn test_directional_packing() {
        let light = DirectionalLight {
            position: Vec3::new(1.0, 2.0, 3.0),
            direction: Vec3::new(0.0, -1.0, 0.0),
            color: Vec3::new(1.0, 0.5, 0.25),
            intensity: 2.0,
        };
        let gpu = GpuLight::from(&light);

        assert_eq!(gpu.position, Vec4::new(1.0, 2.0, 3.0, 1.0));
        assert_eq!(gpu.color, Vec4::new(1.0, 0.5, 0.25, 2.0));
        assert_eq!(gpu.direction, Vec4::new(0.0, -1.0, 0.0, 0.0));
    }

    #[test]
    fn test_point_light_radius_in_info() {
        let light = PointLight {
            radius: 7.5,
            ..Default::default()
        };
        let gpu = GpuLight::from(&light);
        assert_eq!(gpu.info.x, 7.5);
    }

    #[test]
    fn test_spot_light_cutoffs_in_info() {
        let light = SpotLight::default();
        let gpu = GpuLight::from(&light);
        assert_eq!(gpu.info.y, 0.9);
        assert_eq!(gpu.info.z, 0.8);
    }

    #[test]
    fn test_registry_counts() {
        let mut registry = LightRegistry::new();
        registry.push_directional(DirectionalLight::default());
        registry.push_point(PointLight::default());
        registry.push_point(PointLight::default());
        registry.push_spot(SpotLight::default());

        assert_eq!(registry.counts(), (1, 2, 1));
    }

    #[test]
    fn test_registry_rejects_overflow() {
        let mut registry = LightRegistry::new();
        for _ in 0..MAX_DIRECTIONAL_LIGHTS {
            assert!(registry.push_directional(DirectionalLight::default()));
        }
        assert!(!registry.push_directional(DirectionalLight::default()));
        assert_eq!(registry.counts().0, MAX_DIRECTIONAL_LIGHTS as u32);
    }

    #[test]
    fn test_pack_fills_leading_slots_only() {
        let mut registry = LightRegistry::new();
        registry.push_spot(SpotLight {
            intensity: 3.0,
            ..Default::default()
        });

        let packed = registry.pack_spot();
        assert_eq!(packed[0].color.w, 3.0);
        assert_eq!(packed[1], GpuLight::default());
    }
}
