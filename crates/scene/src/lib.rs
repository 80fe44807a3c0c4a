//! Scene-side state the renderer consumes each frame: the camera and the
//! bounded light registry.

pub mod camera;
pub mod light;

pub use camera::{Camera, Projection};
pub use light::{
    DirectionalLight, GpuLight, LightRegistry, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS,
    MAX_SPOT_LIGHTS, PointLight, SpotLight,
};
