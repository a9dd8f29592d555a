use std::ops::Range;

use glam::*;

/// The camera contract picking needs.
pub trait CameraTrait {
    /// Get the view matrix.
    fn view(&self) -> Mat4;

    /// Get the projection matrix.
    fn projection(&self, aspect_ratio: f32) -> Mat4;

    /// Get the position in world space.
    fn position(&self) -> Vec3 {
        self.view().inverse().w_axis.truncate()
    }
}

/// A look-at camera.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// The position of the camera.
    pub pos: Vec3,
    /// The point the camera looks at.
    pub target: Vec3,
    /// The z range of the camera.
    pub z: Range<f32>,
    /// The vertical FOV.
    pub vertical_fov: f32,
}

impl Camera {
    /// Up direction.
    pub const UP: Vec3 = Vec3::Y;

    /// The default position.
    pub const DEFAULT_POS: Vec3 = Vec3::new(-0.2176, 0.7880, 3.1653);

    /// The default target.
    pub const DEFAULT_TARGET: Vec3 = Vec3::new(-0.3051, 0.5187, 0.2482);

    /// Create a new camera at the default pose.
    pub fn new(z: Range<f32>, vertical_fov: f32) -> Self {
        Self {
            pos: Self::DEFAULT_POS,
            target: Self::DEFAULT_TARGET,
            z,
            vertical_fov,
        }
    }

    /// Create a new camera looking from `pos` at `target`.
    pub fn looking_at(pos: Vec3, target: Vec3) -> Self {
        Self {
            pos,
            target,
            ..Self::default()
        }
    }

    /// Move the camera and target together.
    pub fn move_by(&mut self, forward: f32, right: f32) {
        let delta = self.get_forward() * forward + self.get_right() * right;
        self.pos += delta;
        self.target += delta;
    }

    /// Move towards the target, never past it.
    pub fn zoom_by(&mut self, delta: f32) {
        let distance = self.pos.distance(self.target);
        let step = delta.min(distance - self.z.start);
        self.pos += self.get_forward() * step;
    }

    /// Get the forward vector.
    pub fn get_forward(&self) -> Vec3 {
        (self.target - self.pos).normalize_or(Vec3::NEG_Z)
    }

    /// Get the right vector.
    pub fn get_right(&self) -> Vec3 {
        self.get_forward().cross(Self::UP).normalize_or(Vec3::X)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(0.01..100.0, std::f32::consts::PI / 5.0)
    }
}

impl CameraTrait for Camera {
    fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.pos, self.target, Self::UP)
    }

    fn projection(&self, aspect_ratio: f32) -> Mat4 {
        Mat4::perspective_rh_gl(self.vertical_fov, aspect_ratio, self.z.start, self.z.end)
    }

    fn position(&self) -> Vec3 {
        self.pos
    }
}

/// A viewport rectangle in window pixels, origin at the top left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pos: Vec2,
    pub size: Vec2,
}

impl Viewport {
    /// Create a viewport at the origin.
    pub const fn new(size: Vec2) -> Self {
        Self {
            pos: Vec2::ZERO,
            size,
        }
    }

    /// Get the aspect ratio.
    pub fn aspect_ratio(&self) -> f32 {
        self.size.x / self.size.y
    }
}
