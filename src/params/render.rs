//! Rendering configuration.

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Initial window width (logical pixels)
    pub window_width: u32,

    /// Initial window height (logical pixels)
    pub window_height: u32,

    /// Point sprite scale: screen size = size * point_scale / view depth
    pub point_scale: f32,

    /// Device pixel ratio is clamped to this before scaling sprites
    pub max_pixel_ratio: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            point_scale: 300.0,
            max_pixel_ratio: 2.0,
        }
    }
}

impl RenderConfig {
    /// Clamp a host-reported device pixel ratio
    pub fn clamp_pixel_ratio(&self, ratio: f32) -> f32 {
        ratio.min(self.max_pixel_ratio)
    }
}
