//! Wave field and bokeh field parameters.

/// Wave field parameters
#[derive(Debug, Clone)]
pub struct WaveParams {
    /// Field width along X (world units), particles span ±extent_x / 2
    pub extent_x: f32,

    /// Field depth along Z (world units), particles span ±extent_z / 2
    pub extent_z: f32,

    /// Simulated seconds added to the clock per rendered frame
    pub time_step: f32,

    /// Smallest wave point size (world units before perspective scaling)
    pub min_size: f32,

    /// Random size added on top of `min_size`
    pub size_jitter: f32,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            extent_x: 200.0,
            extent_z: 100.0,
            time_step: 0.02,
            min_size: 0.5,
            size_jitter: 2.0,
        }
    }
}

/// Bokeh field parameters (static depth-cue particles below the wave)
#[derive(Debug, Clone)]
pub struct BokehParams {
    /// Horizontal spread relative to the wave extent (1.5 = 50% wider)
    pub spread_x: f32,

    /// Depth spread relative to the wave extent
    pub spread_z: f32,

    /// Vertical band (world units), always below the wave surface
    pub y_range: (f32, f32),

    /// Smallest bokeh size
    pub min_size: f32,

    /// Random size added on top of `min_size`
    pub size_jitter: f32,
}

impl Default for BokehParams {
    fn default() -> Self {
        Self {
            spread_x: 1.5,
            spread_z: 2.0,
            y_range: (-40.0, -10.0),
            min_size: 8.0,
            size_jitter: 15.0,
        }
    }
}
