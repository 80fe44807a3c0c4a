//! Scene camera and projection math.

use glam::{Mat4, Quat, Vec3};

/// Projection parameters, matched by the renderer when it fills the view
/// uniform (field of view and clip planes travel to the shaders).
#[derive(Clone, Debug)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

/// World-space camera. Fields are public; the app positions and orients it
/// directly each frame.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            rotation: Quat::IDENTITY,
            projection: Projection::Perspective {
                fov_y: 45.0_f32.to_radians(),
                aspect: 16.0 / 9.0,
                near: 0.1,
                far: 1000.0,
            },
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection = Projection::Perspective {
            fov_y,
            aspect,
            near,
            far,
        };
    }

    /// Updates only the aspect ratio, keeping field of view and clip
    /// planes. No-op for orthographic projections. Called on window resize.
    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective {
            fov_y, near, far, ..
        } = self.projection
        {
            self.set_perspective(fov_y, aspect, near, far);
        }
    }

    /// Points the camera at `target` from its current position.
    pub fn look_at(&mut self, target: Vec3) {
        let to_target = target - self.position;
        if to_target.length_squared() > 0.0 {
            self.rotation = Quat::from_rotation_arc(Vec3::NEG_Z, to_target.normalize());
        }
    }

    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    /// Projection matrix with the Y axis flipped for Vulkan clip space.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = match self.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(left, right, bottom, top, near, far),
        };
        proj.y_axis.y *= -1.0;
        proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_matrix_flips_y() {
        let camera = Camera::default();
        // Vulkan clip space has Y pointing down.
        assert!(camera.projection_matrix().y_axis.y < 0.0);
    }

    #[test]
    fn look_at_faces_target() {
        let mut camera = Camera::default();
        camera.position = Vec3::new(0.0, 0.0, 5.0);
        camera.look_at(Vec3::ZERO);
        assert!((camera.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn set_aspect_preserves_fov_and_planes() {
        let mut camera = Camera::default();
        camera.set_perspective(60.0_f32.to_radians(), 1.0, 0.1, 45.0);
        camera.set_aspect(1.5);

        match camera.projection {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => {
                assert_eq!(aspect, 1.5);
                assert_eq!(fov_y, 60.0_f32.to_radians());
                assert_eq!(near, 0.1);
                assert_eq!(far, 45.0);
            }
            Projection::Orthographic { .. } => panic!("expected perspective projection"),
        }
    }
}
