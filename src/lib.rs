//! Particle Sea - procedural particle animation engine
//!
//! A sea of points rolls under a closed-form wave function, static bokeh
//! glows beneath it, and a fixed pool of droplets rises off the surface
//! trailing light as it climbs and fades.

pub mod camera;
pub mod clock;
pub mod droplets;
pub mod engine;
pub mod error;
pub mod params;
pub mod rendering;
pub mod sync;
pub mod theme;
pub mod wave;
