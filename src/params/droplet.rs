//! Droplet lifecycle and spawn-rate parameters.

/// Samples held by every droplet trail (ring slot 0 is the newest)
pub const TRAIL_LENGTH: usize = 12;

/// Droplet pool parameters
///
/// Rates are per frame, not per second; they assume the fixed 0.02 clock step.
#[derive(Debug, Clone)]
pub struct DropletParams {
    /// Vertical position parked on inactive droplets, far below the view
    pub sentinel_y: f32,

    /// Spawn area relative to the wave extent, (x fraction, z fraction)
    pub spawn_extent: (f32, f32),

    /// Initial rise velocity range (world units per frame)
    pub velocity_range: (f32, f32),

    /// Multiplicative velocity decay per frame
    pub velocity_decay: f32,

    /// Velocity never decays below this (world units per frame)
    pub velocity_floor: f32,

    /// Minimum climb above the spawn point before fading starts
    pub rise_min: f32,

    /// Random extra climb added on top of `rise_min`
    pub rise_jitter: f32,

    /// Opacity assigned on spawn
    pub spawn_opacity: f32,

    /// Opacity gained per frame while rising
    pub fade_in_rate: f32,

    /// Opacity lost per frame while fading
    pub fade_out_rate: f32,

    /// Batch clock interval (simulated seconds)
    pub batch_interval: f32,

    /// Droplets activated per batch, inclusive range
    pub batch_size: (usize, usize),

    /// Target floor for the active population
    pub target_active: usize,

    /// Guaranteed activations per frame whenever inactive droplets exist
    pub min_floor_spawns: usize,

    /// Per-frame spawn probability of each inactive droplet
    pub stochastic_chance: f32,

    /// Fraction of the pool seeded active at construction
    pub initial_active_fraction: f32,

    /// Extra height range for droplets seeded active at construction
    pub initial_height_jitter: f32,

    /// Shared spawn budget across all three policies (None = uncapped)
    pub max_spawns_per_frame: Option<usize>,

    /// Smallest head point size
    pub head_min_size: f32,

    /// Random head size added on top of `head_min_size`
    pub head_size_jitter: f32,

    /// Trail point size at ring slot 0, shrinking linearly with slot index
    pub trail_max_size: f32,

    /// Head base color (scaled by flicker brightness and opacity)
    pub head_color: [f32; 3],

    /// Trail base color (scaled by slot fade and opacity)
    pub trail_color: [f32; 3],

    /// Head flicker angular rate (radians per simulated second)
    pub flicker_rate: f32,

    /// Head brightness midpoint
    pub flicker_base: f32,

    /// Head brightness swing around the midpoint
    pub flicker_depth: f32,
}

impl Default for DropletParams {
    fn default() -> Self {
        Self {
            sentinel_y: -200.0,
            spawn_extent: (0.9, 0.7),
            velocity_range: (0.5, 1.2),
            velocity_decay: 0.995,
            velocity_floor: 0.3,
            rise_min: 80.0,
            rise_jitter: 120.0,
            spawn_opacity: 0.5,
            fade_in_rate: 0.05,
            fade_out_rate: 0.03,
            batch_interval: 0.1,
            batch_size: (2, 3),
            target_active: 20,
            min_floor_spawns: 3,
            stochastic_chance: 0.25,
            initial_active_fraction: 0.1,
            initial_height_jitter: 40.0,
            max_spawns_per_frame: None,
            head_min_size: 3.0,
            head_size_jitter: 2.0,
            trail_max_size: 2.0,
            head_color: [0.5, 1.0, 1.0],
            trail_color: [0.6, 1.0, 1.0],
            flicker_rate: 5.0,
            flicker_base: 0.8,
            flicker_depth: 0.2,
        }
    }
}
