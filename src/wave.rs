//! Ambient particle populations: the deforming wave field and the static bokeh field.

use rand::Rng;

use crate::params::{BokehParams, WaveParams};
use crate::theme::ThemeDescriptor;

/// Shortest time shift after which the whole surface repeats.
///
/// The time coefficients 1, 0.8 and 1.2 are 5/5, 4/5 and 6/5, so every term
/// completes a whole number of cycles after 2π·5.
pub const WAVE_PERIOD: f32 = 10.0 * std::f32::consts::PI;

/// Height of the wave surface at `(x, z)` and simulated time `t`
#[inline]
pub fn wave_height(x: f32, z: f32, t: f32) -> f32 {
    (x * 0.05 + t).sin() * 8.0
        + (z * 0.08 + 0.8 * t).sin() * 5.0
        + ((x + z) * 0.03 + 1.2 * t).sin() * 3.0
}

/// A point particle with a fixed footprint and color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub color: [f32; 3],
    pub size: f32,
}

impl Particle {
    pub fn position(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Wave particle: only `y` changes after creation
pub type WaveParticle = Particle;

/// Bokeh particle: never changes after creation
pub type BokehParticle = Particle;

/// Uniform draw from `[-extent/2, extent/2)`
#[inline]
fn centered<R: Rng>(rng: &mut R, extent: f32) -> f32 {
    (rng.gen::<f32>() - 0.5) * extent
}

/// Fixed population whose heights follow [`wave_height`]
pub struct WaveField {
    particles: Vec<WaveParticle>,
}

impl WaveField {
    /// Scatter `count` particles uniformly over the field extent
    pub fn initialize<R: Rng>(
        count: usize,
        params: &WaveParams,
        theme: &ThemeDescriptor,
        rng: &mut R,
    ) -> Self {
        let particles = (0..count)
            .map(|_| {
                let x = centered(rng, params.extent_x);
                let z = centered(rng, params.extent_z);
                let color = theme.sample_color(rng);
                let size = params.min_size + rng.gen::<f32>() * params.size_jitter;
                Particle {
                    x,
                    y: 0.0,
                    z,
                    color,
                    size,
                }
            })
            .collect();

        Self { particles }
    }

    /// Recompute every particle height for time `t`
    pub fn step(&mut self, t: f32) {
        for p in &mut self.particles {
            p.y = wave_height(p.x, p.z, t);
        }
    }

    pub fn particles(&self) -> &[WaveParticle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}

/// Decorative particles scattered below the wave for depth
pub struct BokehField {
    particles: Vec<BokehParticle>,
}

impl BokehField {
    pub fn initialize<R: Rng>(
        count: usize,
        params: &BokehParams,
        extent_x: f32,
        extent_z: f32,
        rng: &mut R,
    ) -> Self {
        let (y_min, y_max) = params.y_range;
        let particles = (0..count)
            .map(|_| Particle {
                x: centered(rng, extent_x * params.spread_x),
                y: y_min + rng.gen::<f32>() * (y_max - y_min),
                z: centered(rng, extent_z * params.spread_z),
                color: [0.2, 0.5 + rng.gen::<f32>() * 0.3, 1.0],
                size: params.min_size + rng.gen::<f32>() * params.size_jitter,
            })
            .collect();

        Self { particles }
    }

    pub fn particles(&self) -> &[BokehParticle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}
