//! Simulation clock.

/// Monotonic simulation time, advanced by a fixed step once per frame
#[derive(Debug, Clone)]
pub struct Clock {
    time: f32,
    step: f32,
}

impl Clock {
    pub fn new(step: f32) -> Self {
        Self { time: 0.0, step }
    }

    /// Advance one frame and return the new time
    pub fn advance(&mut self) -> f32 {
        self.time += self.step;
        self.time
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn step(&self) -> f32 {
        self.step
    }
}
