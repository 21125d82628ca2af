//! Camera rig configuration.

/// Swaying perspective camera looking at the wave center
#[derive(Debug, Clone)]
pub struct CameraParams {
    /// Vertical field of view (degrees)
    pub fov_degrees: f32,

    /// Near clipping plane (world units)
    pub near_plane: f32,

    /// Far clipping plane (world units)
    pub far_plane: f32,

    /// Resting eye position (world units)
    pub position: [f32; 3],

    /// Look-at target (world units)
    pub target: [f32; 3],

    /// Horizontal sway amplitude along X (world units)
    pub sway_amplitude: f32,

    /// Sway angular rate (radians per simulated second)
    pub sway_rate: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near_plane: 0.1,
            far_plane: 1000.0,
            position: [0.0, 50.0, 100.0],
            target: [0.0, 0.0, 0.0],
            sway_amplitude: 5.0,
            sway_rate: 0.3,
        }
    }
}
