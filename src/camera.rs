//! Swaying camera rig and viewport-dependent projection parameters.

use glam::{Mat4, Vec3};

use crate::params::{CameraParams, RenderConfig};

/// Viewport size in device pixels, plus the host's device pixel ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1.0,
        }
    }

    pub fn with_pixel_ratio(mut self, pixel_ratio: f32) -> Self {
        self.pixel_ratio = pixel_ratio;
        self
    }

    /// Width over height; a collapsed viewport reports 1
    pub fn aspect_ratio(&self) -> f32 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Everything that changes when the viewport is resized
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub viewport: Viewport,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
    /// Sprite scale: screen size = size * point_scale * pixel_ratio / view depth
    pub point_scale: f32,
    /// Clamped device pixel ratio
    pub pixel_ratio: f32,
}

impl Projection {
    pub fn new(camera: &CameraParams, render: &RenderConfig, viewport: Viewport) -> Self {
        Self {
            viewport,
            fov_y_radians: camera.fov_degrees.to_radians(),
            near: camera.near_plane,
            far: camera.far_plane,
            point_scale: render.point_scale,
            pixel_ratio: render.clamp_pixel_ratio(viewport.pixel_ratio),
        }
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.viewport.aspect_ratio()
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, self.aspect_ratio(), self.near, self.far)
    }
}

/// Camera that sways along X while staying locked on its target
pub struct CameraRig {
    params: CameraParams,
}

impl CameraRig {
    pub fn new(params: CameraParams) -> Self {
        Self { params }
    }

    /// Eye position at simulated time `time_s`
    pub fn eye(&self, time_s: f32) -> Vec3 {
        let rest = Vec3::from_array(self.params.position);
        let sway = (time_s * self.params.sway_rate).sin() * self.params.sway_amplitude;
        Vec3::new(rest.x + sway, rest.y, rest.z)
    }

    /// View matrix at simulated time `time_s`
    pub fn view_matrix(&self, time_s: f32) -> Mat4 {
        // Always keep Y as up vector (camera never rolls)
        Mat4::look_at_rh(
            self.eye(time_s),
            Vec3::from_array(self.params.target),
            Vec3::Y,
        )
    }
}
