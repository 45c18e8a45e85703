//! Camera and light, the per-frame inputs shared by every instance.

use glam::{Mat4, Vec3};

/// A perspective camera looking from `position` at `target`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn look_from(position: Vec3, target: Vec3) -> Camera {
        Camera {
            position,
            target,
            ..Camera::default()
        }
    }

    pub fn look_to(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y, self.aspect_ratio, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

impl Default for Camera {
    fn default() -> Camera {
        Camera {
            position: Vec3::new(0.0, 1.0, 4.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y: 60f32.to_radians(),
            aspect_ratio: 16.0 / 9.0,
            near: 0.05,
            far: 500.0,
        }
    }
}

/// One directional light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Lighting {
    /// The direction the light travels in.
    pub direction: Vec3,
    pub color: Vec3,
}

impl Default for Lighting {
    fn default() -> Lighting {
        Lighting {
            direction: Vec3::new(-0.5, -1.0, -0.3).normalize(),
            color: Vec3::splat(3.0),
        }
    }
}

/// The uniforms every draw of a frame shares.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameUniforms {
    pub proj_view: Mat4,
    pub camera_position: Vec3,
    pub light_direction: Vec3,
    pub light_color: Vec3,
}

impl FrameUniforms {
    pub fn new(camera: &Camera, lighting: &Lighting) -> FrameUniforms {
        FrameUniforms {
            proj_view: camera.view_projection(),
            camera_position: camera.position,
            light_direction: lighting.direction,
            light_color: lighting.color,
        }
    }
}
