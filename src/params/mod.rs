//! Parameter definitions with units and documented semantics.
//!
//! All magic numbers of the particle sea live here with:
//! - Units (world units, seconds, pixels, per-frame rates)
//! - Documented ranges and meanings
//! - Defaults tuned for the particle sea

mod camera;
mod droplet;
mod render;
mod wave;

// Re-export all types
pub use camera::CameraParams;
pub use droplet::{DropletParams, TRAIL_LENGTH};
pub use render::RenderConfig;
pub use wave::{BokehParams, WaveParams};
