//! Theme descriptors handed to the engine by its host.
//!
//! A theme is read once at mount. Switching themes means disposing the
//! running engine and mounting a new one; there is no ambient palette state.

use rand::Rng;

/// One mode of the wave palette: `color = base + random(0,1) * jitter`, per channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaletteEntry {
    /// Relative selection weight
    pub weight: f32,
    pub base: [f32; 3],
    pub jitter: [f32; 3],
}

impl PaletteEntry {
    pub const fn new(weight: f32, base: [f32; 3], jitter: [f32; 3]) -> Self {
        Self {
            weight,
            base,
            jitter,
        }
    }
}

/// Everything the engine reads from its host's theme configuration
#[derive(Debug, Clone)]
pub struct ThemeDescriptor {
    pub id: String,

    /// When false the host must not mount the engine at all
    pub enabled: bool,

    /// Weighted wave palette (droplet colors are fixed)
    pub palette: Vec<PaletteEntry>,

    pub wave_count: usize,
    pub bokeh_count: usize,
    pub droplet_count: usize,

    /// Background gradient, linear RGB
    pub background_top: [f32; 3],
    pub background_bottom: [f32; 3],
}

impl ThemeDescriptor {
    /// The particle sea: tri-modal cyan / blue / white wave over a deep navy gradient
    pub fn wave() -> Self {
        Self {
            id: "wave".to_string(),
            enabled: true,
            palette: vec![
                PaletteEntry::new(0.5, [0.0, 0.8, 1.0], [0.0, 0.2, 0.0]),
                PaletteEntry::new(0.3, [0.1, 0.3, 0.9], [0.0, 0.3, 0.1]),
                PaletteEntry::new(0.2, [0.8, 0.9, 1.0], [0.2, 0.1, 0.0]),
            ],
            wave_count: 15_000,
            bokeh_count: 100,
            droplet_count: 150,
            background_top: srgb_hex(0x000000),
            background_bottom: srgb_hex(0x0d1f3c),
        }
    }

    /// Effects switched off
    pub fn none() -> Self {
        Self {
            id: "none".to_string(),
            enabled: false,
            palette: Vec::new(),
            wave_count: 0,
            bokeh_count: 0,
            droplet_count: 0,
            background_top: srgb_hex(0x000000),
            background_bottom: srgb_hex(0x000000),
        }
    }

    /// Look up a built-in theme
    pub fn by_id(id: &str) -> Option<Self> {
        match id {
            "wave" => Some(Self::wave()),
            "none" => Some(Self::none()),
            _ => None,
        }
    }

    /// Draw one wave color from the weighted palette
    ///
    /// An empty palette yields white.
    pub fn sample_color<R: Rng>(&self, rng: &mut R) -> [f32; 3] {
        let total: f32 = self.palette.iter().map(|e| e.weight).sum();
        if self.palette.is_empty() || total <= 0.0 {
            return [1.0; 3];
        }

        let mut pick = rng.gen::<f32>() * total;
        let mut chosen = &self.palette[self.palette.len() - 1];
        for entry in &self.palette {
            if pick < entry.weight {
                chosen = entry;
                break;
            }
            pick -= entry.weight;
        }

        let mut color = chosen.base;
        for (channel, jitter) in color.iter_mut().zip(chosen.jitter) {
            *channel += rng.gen::<f32>() * jitter;
        }
        color
    }
}

impl Default for ThemeDescriptor {
    fn default() -> Self {
        Self::wave()
    }
}

/// Convert a 0xRRGGBB sRGB color to linear RGB
pub fn srgb_hex(hex: u32) -> [f32; 3] {
    let channel = |shift: u32| {
        let c = ((hex >> shift) & 0xff) as f32 / 255.0;
        if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    [channel(16), channel(8), channel(0)]
}
