//! Buffer synchronization: logical particle state to flat GPU-ready arrays.
//!
//! Every population gets one [`PointBuffers`] with separate position, color
//! and size arrays. Arrays are sized once at mount and rewritten in place each
//! frame; the dirty flags tell the backend which arrays to re-upload.

use rand::Rng;

use crate::droplets::{Droplet, DropletPool};
use crate::params::{DropletParams, TRAIL_LENGTH};
use crate::wave::{BokehField, Particle, WaveField};

/// Which arrays of a [`PointBuffers`] changed since the last upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyFlags {
    pub positions: bool,
    pub colors: bool,
    pub sizes: bool,
}

impl DirtyFlags {
    pub const ALL: Self = Self {
        positions: true,
        colors: true,
        sizes: true,
    };

    pub fn any(&self) -> bool {
        self.positions || self.colors || self.sizes
    }
}

/// Point attributes for one population, one entry per rendered point
#[derive(Debug, Clone)]
pub struct PointBuffers {
    positions: Vec<[f32; 3]>,
    colors: Vec<[f32; 3]>,
    sizes: Vec<f32>,
    dirty: DirtyFlags,
}

impl PointBuffers {
    /// Zeroed buffers for `count` points, fully dirty
    pub fn new(count: usize) -> Self {
        Self {
            positions: vec![[0.0; 3]; count],
            colors: vec![[0.0; 3]; count],
            sizes: vec![0.0; count],
            dirty: DirtyFlags::ALL,
        }
    }

    /// Buffers mirroring a particle slice, fully dirty
    pub fn from_particles(particles: &[Particle]) -> Self {
        Self {
            positions: particles.iter().map(Particle::position).collect(),
            colors: particles.iter().map(|p| p.color).collect(),
            sizes: particles.iter().map(|p| p.size).collect(),
            dirty: DirtyFlags::ALL,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions
    }

    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    pub fn sizes(&self) -> &[f32] {
        &self.sizes
    }

    pub fn dirty(&self) -> DirtyFlags {
        self.dirty
    }

    /// Mark every array for re-upload
    pub fn mark_all_dirty(&mut self) {
        self.dirty = DirtyFlags::ALL;
    }

    /// Called by the backend once the dirty arrays are uploaded
    pub fn clear_dirty(&mut self) {
        self.dirty = DirtyFlags::default();
    }
}

/// The four render-visible populations
#[derive(Debug, Clone)]
pub struct SceneBuffers {
    pub wave: PointBuffers,
    pub bokeh: PointBuffers,
    /// `TRAIL_LENGTH` points per droplet, droplet-major
    pub trails: PointBuffers,
    /// One point per droplet
    pub heads: PointBuffers,
}

impl SceneBuffers {
    /// Allocate all buffers and write the attributes that never change
    pub fn new<R: Rng>(
        wave: &WaveField,
        bokeh: &BokehField,
        pool: &DropletPool,
        rng: &mut R,
    ) -> Self {
        let params = pool.params();
        let mut trails = PointBuffers::new(pool.len() * TRAIL_LENGTH);
        for (slot, size) in trails.sizes.iter_mut().enumerate() {
            *size = params.trail_max_size * trail_fade(slot % TRAIL_LENGTH);
        }

        let mut heads = PointBuffers::new(pool.len());
        for size in &mut heads.sizes {
            *size = params.head_min_size + rng.gen::<f32>() * params.head_size_jitter;
        }

        let mut buffers = Self {
            wave: PointBuffers::from_particles(wave.particles()),
            bokeh: PointBuffers::from_particles(bokeh.particles()),
            trails,
            heads,
        };
        sync_droplets(
            &mut buffers.trails,
            &mut buffers.heads,
            pool.droplets(),
            params,
            0.0,
        );
        buffers
    }

    /// Rewrite everything that moves this frame
    ///
    /// Must run after the wave and the pool have been stepped for time `t`.
    pub fn sync(&mut self, wave: &WaveField, pool: &DropletPool, t: f32) {
        sync_wave(&mut self.wave, wave);
        sync_droplets(
            &mut self.trails,
            &mut self.heads,
            pool.droplets(),
            pool.params(),
            t,
        );
    }

    pub fn populations(&self) -> [&PointBuffers; 4] {
        [&self.wave, &self.bokeh, &self.trails, &self.heads]
    }

    pub fn populations_mut(&mut self) -> [&mut PointBuffers; 4] {
        [
            &mut self.wave,
            &mut self.bokeh,
            &mut self.trails,
            &mut self.heads,
        ]
    }
}

/// Intensity and size factor of trail ring slot `index` (1 at the head)
#[inline]
pub fn trail_fade(index: usize) -> f32 {
    1.0 - index as f32 / TRAIL_LENGTH as f32
}

/// Head brightness for droplet `index` at time `t`
#[inline]
pub fn head_brightness(params: &DropletParams, index: usize, t: f32) -> f32 {
    params.flicker_base + (t * params.flicker_rate + index as f32).sin() * params.flicker_depth
}

/// Copy wave heights into the wave position array
pub fn sync_wave(buffers: &mut PointBuffers, field: &WaveField) {
    for (pos, p) in buffers.positions.iter_mut().zip(field.particles()) {
        *pos = p.position();
    }
    buffers.dirty.positions = true;
}

/// Write head and trail points for every droplet, inactive ones included
pub fn sync_droplets(
    trails: &mut PointBuffers,
    heads: &mut PointBuffers,
    droplets: &[Droplet],
    params: &DropletParams,
    t: f32,
) {
    let trail_points = trails
        .positions
        .chunks_exact_mut(TRAIL_LENGTH)
        .zip(trails.colors.chunks_exact_mut(TRAIL_LENGTH));

    for (i, ((droplet, (head_pos, head_color)), (trail_pos, trail_color))) in droplets
        .iter()
        .zip(heads.positions.iter_mut().zip(heads.colors.iter_mut()))
        .zip(trail_points)
        .enumerate()
    {
        let (x, z) = (droplet.x(), droplet.z());
        let opacity = droplet.opacity();

        *head_pos = [x, droplet.y(), z];
        let brightness = if droplet.is_active() {
            head_brightness(params, i, t) * opacity
        } else {
            0.0
        };
        *head_color = params.head_color.map(|c| c * brightness);

        for (j, ((pos, color), y)) in trail_pos
            .iter_mut()
            .zip(trail_color.iter_mut())
            .zip(droplet.trail().iter())
            .enumerate()
        {
            *pos = [x, y, z];
            let intensity = trail_fade(j) * opacity;
            *color = params.trail_color.map(|c| c * intensity);
        }
    }

    trails.dirty.positions = true;
    trails.dirty.colors = true;
    heads.dirty.positions = true;
    heads.dirty.colors = true;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{BokehParams, WaveParams};
    use crate::theme::ThemeDescriptor;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn scene(seed: u64) -> (WaveField, BokehField, DropletPool, StdRng) {
        let mut rng = StdRng::seed_from_u64(seed);
        let wave_params = WaveParams::default();
        let wave = WaveField::initialize(1_000, &wave_params, &ThemeDescriptor::wave(), &mut rng);
        let bokeh = BokehField::initialize(
            20,
            &BokehParams::default(),
            wave_params.extent_x,
            wave_params.extent_z,
            &mut rng,
        );
        let pool = DropletPool::new(
            30,
            DropletParams::default(),
            wave_params.extent_x,
            wave_params.extent_z,
            &mut rng,
        );
        (wave, bokeh, pool, rng)
    }

    #[test]
    fn test_buffer_sizes() {
        let (wave, bokeh, pool, mut rng) = scene(1);
        let buffers = SceneBuffers::new(&wave, &bokeh, &pool, &mut rng);

        assert_eq!(buffers.wave.len(), 1_000);
        assert_eq!(buffers.bokeh.len(), 20);
        assert_eq!(buffers.trails.len(), 30 * TRAIL_LENGTH);
        assert_eq!(buffers.heads.len(), 30);
        for b in buffers.populations() {
            assert_eq!(b.colors().len(), b.len());
            assert_eq!(b.sizes().len(), b.len());
            assert_eq!(b.dirty(), DirtyFlags::ALL);
        }
    }

    #[test]
    fn test_trail_sizes_shrink_with_ring_index() {
        let (wave, bokeh, pool, mut rng) = scene(2);
        let buffers = SceneBuffers::new(&wave, &bokeh, &pool, &mut rng);

        for chunk in buffers.trails.sizes().chunks(TRAIL_LENGTH) {
            assert_eq!(chunk[0], 2.0);
            assert!(chunk.windows(2).all(|w| w[1] < w[0]));
        }
        assert!(buffers.heads.sizes().iter().all(|&s| (3.0..=5.0).contains(&s)));
    }

    #[test]
    fn test_sync_reuses_storage() {
        let (mut wave, bokeh, mut pool, mut rng) = scene(3);
        let mut buffers = SceneBuffers::new(&wave, &bokeh, &pool, &mut rng);
        let before = buffers.populations().map(|b| b.positions().as_ptr());

        for i in 1..=50 {
            let t = i as f32 * 0.02;
            wave.step(t);
            pool.step(t, &mut rng);
            buffers.sync(&wave, &pool, t);
        }

        let after = buffers.populations().map(|b| b.positions().as_ptr());
        assert_eq!(before, after);
    }

    #[test]
    fn test_sync_marks_moving_arrays_dirty() {
        let (mut wave, bokeh, pool, mut rng) = scene(4);
        let mut buffers = SceneBuffers::new(&wave, &bokeh, &pool, &mut rng);
        for b in buffers.populations_mut() {
            b.clear_dirty();
        }

        wave.step(0.5);
        buffers.sync(&wave, &pool, 0.5);

        let moving = DirtyFlags {
            positions: true,
            colors: true,
            sizes: false,
        };
        assert!(buffers.wave.dirty().positions);
        assert!(!buffers.wave.dirty().sizes);
        assert!(!buffers.bokeh.dirty().any());
        assert_eq!(buffers.trails.dirty(), moving);
        assert_eq!(buffers.heads.dirty(), moving);
    }

    #[test]
    fn test_wave_positions_follow_field() {
        let (mut wave, bokeh, pool, mut rng) = scene(5);
        let mut buffers = SceneBuffers::new(&wave, &bokeh, &pool, &mut rng);

        wave.step(2.0);
        buffers.sync(&wave, &pool, 2.0);

        for (pos, p) in buffers.wave.positions().iter().zip(wave.particles()) {
            assert_eq!(*pos, [p.x, p.y, p.z]);
        }
    }

    #[test]
    fn test_trail_colors_fade_and_heads_flicker() {
        let (wave, bokeh, mut pool, mut rng) = scene(6);
        let mut buffers = SceneBuffers::new(&wave, &bokeh, &pool, &mut rng);

        for i in 0..pool.len() {
            pool.spawn(i, 0.0, &mut rng);
        }
        let t = 0.7;
        buffers.sync(&wave, &pool, t);

        let params = pool.params().clone();
        for (i, d) in pool.droplets().iter().enumerate() {
            let head = buffers.heads.colors()[i];
            let expected = head_brightness(&params, i, t) * d.opacity();
            assert!((head[1] - expected).abs() < 1e-6);
            assert!((head[0] - 0.5 * expected).abs() < 1e-6);

            let trail = &buffers.trails.colors()[i * TRAIL_LENGTH..(i + 1) * TRAIL_LENGTH];
            assert!((trail[0][1] - d.opacity()).abs() < 1e-6);
            assert!(trail.windows(2).all(|w| w[1][1] < w[0][1]));

            let positions = &buffers.trails.positions()[i * TRAIL_LENGTH..(i + 1) * TRAIL_LENGTH];
            for (pos, y) in positions.iter().zip(d.trail().iter()) {
                assert_eq!(*pos, [d.x(), y, d.z()]);
            }
        }
    }

    #[test]
    fn test_inactive_droplets_render_dark_at_sentinel() {
        let mut rng = StdRng::seed_from_u64(7);
        let params = DropletParams {
            initial_active_fraction: 0.0,
            ..DropletParams::default()
        };
        let wave = WaveField::initialize(
            10,
            &WaveParams::default(),
            &ThemeDescriptor::wave(),
            &mut rng,
        );
        let bokeh = BokehField::initialize(0, &BokehParams::default(), 200.0, 100.0, &mut rng);
        let pool = DropletPool::new(4, params, 200.0, 100.0, &mut rng);
        let buffers = SceneBuffers::new(&wave, &bokeh, &pool, &mut rng);

        assert!(buffers.heads.colors().iter().all(|c| *c == [0.0; 3]));
        assert!(buffers.trails.colors().iter().all(|c| *c == [0.0; 3]));
        assert!(buffers.heads.positions().iter().all(|p| p[1] == -200.0));
        assert!(buffers.trails.positions().iter().all(|p| p[1] == -200.0));
    }
}
