//! Command-line argument parsing.

use clap::Parser;

use particle_sea::engine::EngineConfig;
use particle_sea::theme::ThemeDescriptor;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "particle-sea")]
#[command(about = "Procedural particle sea with rising droplets", long_about = None)]
pub struct Args {
    /// Theme id: wave (default) or none
    #[arg(long, value_name = "ID", default_value = "wave")]
    pub theme: String,

    /// Initial window width (logical pixels)
    #[arg(long, value_name = "PIXELS", default_value = "1280")]
    pub width: u32,

    /// Initial window height (logical pixels)
    #[arg(long, value_name = "PIXELS", default_value = "720")]
    pub height: u32,

    /// RNG seed (random when omitted)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Override the theme's wave particle count
    #[arg(long, value_name = "COUNT")]
    pub wave_particles: Option<usize>,

    /// Override the theme's droplet pool size
    #[arg(long, value_name = "COUNT")]
    pub droplets: Option<usize>,

    /// Cap droplet activations per frame across all spawn policies
    #[arg(long, value_name = "COUNT")]
    pub max_spawns_per_frame: Option<usize>,
}

impl Args {
    /// Resolve the theme, applying count overrides
    pub fn theme(&self) -> ThemeDescriptor {
        let mut theme = ThemeDescriptor::by_id(&self.theme).unwrap_or_else(|| {
            tracing::warn!("Unknown theme '{}', using wave", self.theme);
            ThemeDescriptor::wave()
        });

        if let Some(count) = self.wave_particles {
            theme.wave_count = count;
        }
        if let Some(count) = self.droplets {
            theme.droplet_count = count;
        }
        theme
    }

    /// Engine configuration from defaults plus command-line overrides
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.render.window_width = self.width;
        config.render.window_height = self.height;
        config.droplets.max_spawns_per_frame = self.max_spawns_per_frame;
        config.seed = self.seed.unwrap_or_else(rand::random);
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["particle-sea"]);
        let theme = args.theme();
        assert_eq!(theme.id, "wave");
        assert_eq!(theme.wave_count, 15_000);

        let config = args.engine_config();
        assert_eq!(config.render.window_width, 1280);
        assert_eq!(config.droplets.max_spawns_per_frame, None);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "particle-sea",
            "--seed",
            "7",
            "--wave-particles",
            "2000",
            "--droplets",
            "50",
            "--max-spawns-per-frame",
            "4",
        ]);
        let theme = args.theme();
        assert_eq!((theme.wave_count, theme.droplet_count), (2000, 50));

        let config = args.engine_config();
        assert_eq!(config.seed, 7);
        assert_eq!(config.droplets.max_spawns_per_frame, Some(4));
    }

    #[test]
    fn test_unknown_theme_falls_back_to_wave() {
        let args = Args::parse_from(["particle-sea", "--theme", "aurora"]);
        assert_eq!(args.theme().id, "wave");

        let args = Args::parse_from(["particle-sea", "--theme", "none"]);
        assert!(!args.theme().enabled);
    }
}
