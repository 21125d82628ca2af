//! Droplet pool: rising particles with fading trails.
//!
//! The pool is an arena allocated once per engine. Droplets are never
//! allocated or freed after construction; "destroying" one means parking it
//! at the sentinel height with a flat trail so it renders off-screen.
//!
//! Per-droplet lifecycle:
//!
//! ```text
//!   Inactive --spawn--> Rising --(y > max_height)--> Fading --(opacity <= 0)--> Inactive
//! ```
//!
//! Rising and Fading are both `active`; they differ only by the height test.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::params::{DropletParams, TRAIL_LENGTH};
use crate::wave::wave_height;

/// Fixed-length FIFO of recent heights, newest at index 0
#[derive(Debug, Clone, PartialEq)]
pub struct Trail {
    samples: [f32; TRAIL_LENGTH],
    /// Physical slot of logical index 0
    head: usize,
}

impl Trail {
    pub fn filled(y: f32) -> Self {
        Self {
            samples: [y; TRAIL_LENGTH],
            head: 0,
        }
    }

    pub fn fill(&mut self, y: f32) {
        self.samples = [y; TRAIL_LENGTH];
        self.head = 0;
    }

    /// Insert `y` as the newest sample, dropping the oldest
    pub fn push(&mut self, y: f32) {
        self.head = (self.head + TRAIL_LENGTH - 1) % TRAIL_LENGTH;
        self.samples[self.head] = y;
    }

    /// Sample at ring index `index` (0 = newest, `TRAIL_LENGTH - 1` = oldest)
    ///
    /// Panics if `index >= TRAIL_LENGTH`.
    pub fn get(&self, index: usize) -> f32 {
        assert!(index < TRAIL_LENGTH, "trail index {} out of range", index);
        self.samples[(self.head + index) % TRAIL_LENGTH]
    }

    pub fn newest(&self) -> f32 {
        self.get(0)
    }

    pub fn oldest(&self) -> f32 {
        self.get(TRAIL_LENGTH - 1)
    }

    /// Samples from newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (0..TRAIL_LENGTH).map(move |i| self.get(i))
    }

    pub const fn len(&self) -> usize {
        TRAIL_LENGTH
    }

    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Lifecycle phase, derived from `active` and the height test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropletPhase {
    Inactive,
    Rising,
    Fading,
}

/// A single pooled droplet
#[derive(Debug, Clone, PartialEq)]
pub struct Droplet {
    x: f32,
    z: f32,
    y: f32,
    velocity: f32,
    active: bool,
    max_height: f32,
    trail: Trail,
    opacity: f32,
}

impl Droplet {
    /// Parked droplet at the sentinel height
    pub fn inactive(x: f32, z: f32, sentinel_y: f32) -> Self {
        Self {
            x,
            z,
            y: sentinel_y,
            velocity: 0.0,
            active: false,
            max_height: sentinel_y,
            trail: Trail::filled(sentinel_y),
            opacity: 0.0,
        }
    }

    pub fn phase(&self) -> DropletPhase {
        if !self.active {
            DropletPhase::Inactive
        } else if self.y > self.max_height {
            DropletPhase::Fading
        } else {
            DropletPhase::Rising
        }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn z(&self) -> f32 {
        self.z
    }

    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn max_height(&self) -> f32 {
        self.max_height
    }

    pub fn trail(&self) -> &Trail {
        &self.trail
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Activate at `(x, y, z)`; `y` is expected to lie on the wave surface
    fn activate(&mut self, x: f32, y: f32, z: f32, velocity: f32, max_height: f32, opacity: f32) {
        self.x = x;
        self.z = z;
        self.y = y;
        self.velocity = velocity;
        self.max_height = max_height;
        self.opacity = opacity;
        self.active = true;
        self.trail.fill(y);
    }

    /// Decay velocity toward the floor, climb, and record the new height
    fn drift(&mut self, params: &DropletParams) {
        self.velocity = (self.velocity * params.velocity_decay).max(params.velocity_floor);
        self.y += self.velocity;
        self.trail.push(self.y);
    }

    /// One frame in the Rising phase
    pub fn rise(&mut self, params: &DropletParams) {
        self.drift(params);
        self.opacity = (self.opacity + params.fade_in_rate).min(1.0);
    }

    /// One frame in the Fading phase
    ///
    /// Opacity may drop below zero here; [`Droplet::advance`] retires the
    /// droplet in the same frame, which restores it to zero.
    pub fn fade(&mut self, params: &DropletParams) {
        self.drift(params);
        self.opacity -= params.fade_out_rate;
    }

    /// Return to the pool: park at the sentinel with a flat trail
    pub fn retire(&mut self, sentinel_y: f32) {
        self.active = false;
        self.y = sentinel_y;
        self.velocity = 0.0;
        self.opacity = 0.0;
        self.trail.fill(sentinel_y);
    }

    /// Advance one frame; returns true if the droplet retired
    pub fn advance(&mut self, params: &DropletParams) -> bool {
        match self.phase() {
            DropletPhase::Inactive => false,
            DropletPhase::Rising => {
                self.rise(params);
                false
            }
            DropletPhase::Fading => {
                self.fade(params);
                if self.opacity <= 0.0 {
                    self.retire(params.sentinel_y);
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// What one frame of the pool did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnReport {
    /// Active droplets after the transition pass, before spawning
    pub active_before: usize,
    pub retired: usize,
    pub batch: usize,
    pub floor: usize,
    pub stochastic: usize,
}

impl SpawnReport {
    pub fn spawned(&self) -> usize {
        self.batch + self.floor + self.stochastic
    }
}

/// Owner of the droplet arena and its spawn policies
pub struct DropletPool {
    droplets: Vec<Droplet>,
    params: DropletParams,
    /// Spawn area, full width along X and Z
    spawn_extent: (f32, f32),
    last_batch_time: f32,
    // Scratch index lists, kept to avoid per-frame allocation
    inactive: Vec<usize>,
    candidates: Vec<usize>,
}

impl DropletPool {
    /// Allocate `count` droplets over a wave field of `extent_x` × `extent_z`
    ///
    /// A random `initial_active_fraction` of the pool starts mid-flight so the
    /// first frames are not empty.
    pub fn new<R: Rng>(
        count: usize,
        params: DropletParams,
        extent_x: f32,
        extent_z: f32,
        rng: &mut R,
    ) -> Self {
        let spawn_extent = (extent_x * params.spawn_extent.0, extent_z * params.spawn_extent.1);

        let droplets = (0..count)
            .map(|_| {
                let x = (rng.gen::<f32>() - 0.5) * spawn_extent.0;
                let z = (rng.gen::<f32>() - 0.5) * spawn_extent.1;
                let mut droplet = Droplet::inactive(x, z, params.sentinel_y);

                if rng.gen::<f32>() < params.initial_active_fraction {
                    let surface = wave_height(x, z, 0.0);
                    let y = surface + rng.gen::<f32>() * params.initial_height_jitter;
                    let velocity = random_between(rng, params.velocity_range);
                    let max_height =
                        surface + params.rise_min + rng.gen::<f32>() * params.rise_jitter;
                    droplet.activate(x, y, z, velocity, max_height, 1.0);
                }
                droplet
            })
            .collect();

        Self {
            droplets,
            params,
            spawn_extent,
            last_batch_time: 0.0,
            inactive: Vec::with_capacity(count),
            candidates: Vec::with_capacity(count),
        }
    }

    pub fn droplets(&self) -> &[Droplet] {
        &self.droplets
    }

    pub fn params(&self) -> &DropletParams {
        &self.params
    }

    pub fn len(&self) -> usize {
        self.droplets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.droplets.is_empty()
    }

    pub fn active_count(&self) -> usize {
        self.droplets.iter().filter(|d| d.active).count()
    }

    /// Spawn droplet `index` on the wave surface at time `t`
    ///
    /// Returns false (and changes nothing) if the droplet is already active.
    pub fn spawn<R: Rng>(&mut self, index: usize, t: f32, rng: &mut R) -> bool {
        let params = &self.params;
        let Some(droplet) = self.droplets.get_mut(index) else {
            return false;
        };
        if droplet.active {
            return false;
        }

        let x = (rng.gen::<f32>() - 0.5) * self.spawn_extent.0;
        let z = (rng.gen::<f32>() - 0.5) * self.spawn_extent.1;
        let y = wave_height(x, z, t);
        let velocity = random_between(rng, params.velocity_range);
        let max_height = y + params.rise_min + rng.gen::<f32>() * params.rise_jitter;
        droplet.activate(x, y, z, velocity, max_height, params.spawn_opacity);
        true
    }

    /// Advance every droplet one frame, then run the spawn policies
    pub fn step<R: Rng>(&mut self, t: f32, rng: &mut R) -> SpawnReport {
        let mut report = SpawnReport::default();
        let mut inactive = std::mem::take(&mut self.inactive);
        inactive.clear();

        for (i, droplet) in self.droplets.iter_mut().enumerate() {
            if droplet.active {
                if droplet.advance(&self.params) {
                    report.retired += 1;
                    inactive.push(i);
                } else {
                    report.active_before += 1;
                }
            } else {
                inactive.push(i);
            }
        }

        let mut budget = self.params.max_spawns_per_frame.unwrap_or(usize::MAX);

        // Batch clock
        if t - self.last_batch_time >= self.params.batch_interval && !inactive.is_empty() {
            let (lo, hi) = self.params.batch_size;
            let count = rng.gen_range(lo..=hi.max(lo)).min(inactive.len());
            inactive.shuffle(rng);
            for &i in inactive.iter().take(count) {
                if budget == 0 {
                    break;
                }
                if self.spawn(i, t, rng) {
                    report.batch += 1;
                    budget -= 1;
                }
            }
            self.last_batch_time = t;
        }

        // Target floor, counted against the population before this frame's spawns
        let mut candidates = std::mem::take(&mut self.candidates);
        candidates.clear();
        candidates.extend(inactive.iter().copied().filter(|&i| !self.droplets[i].active));
        if !candidates.is_empty() {
            let need = self
                .params
                .min_floor_spawns
                .max(self.params.target_active.saturating_sub(report.active_before));
            candidates.shuffle(rng);
            for &i in candidates.iter().take(need) {
                if budget == 0 {
                    break;
                }
                if self.spawn(i, t, rng) {
                    report.floor += 1;
                    budget -= 1;
                }
            }
        }

        // Stochastic top-up
        for i in 0..self.droplets.len() {
            if budget == 0 {
                break;
            }
            if !self.droplets[i].active
                && rng.gen::<f32>() < self.params.stochastic_chance
                && self.spawn(i, t, rng)
            {
                report.stochastic += 1;
                budget -= 1;
            }
        }

        self.inactive = inactive;
        self.candidates = candidates;

        tracing::trace!(
            active = report.active_before,
            retired = report.retired,
            batch = report.batch,
            floor = report.floor,
            stochastic = report.stochastic,
            "droplet step"
        );

        report
    }
}

/// Uniform draw from `[lo, hi)`
#[inline]
fn random_between<R: Rng>(rng: &mut R, (lo, hi): (f32, f32)) -> f32 {
    lo + rng.gen::<f32>() * (hi - lo)
}
