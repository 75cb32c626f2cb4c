// cli.rs - Command-line interface configuration
use std::path::PathBuf;

use clap::Parser;

use crate::config::PageConfig;
use crate::scenes::DiceConfig;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "scene-host")]
#[command(about = "Interactive landing page scenes", long_about = None)]
pub struct Cli {
    /// Page configuration (JSON); defaults are used for missing fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// glTF model shown in the showcase band
    #[arg(long)]
    pub model: Option<String>,

    /// Uniform scale applied to the showcase model
    #[arg(long)]
    pub scale: Option<f32>,

    /// Route a click on the showcase model navigates to
    #[arg(long)]
    pub redirect: Option<String>,

    /// Number of stars in the background field
    #[arg(long)]
    pub stars: Option<usize>,

    /// Mount the glowing dice band
    #[arg(long, default_value = "false")]
    pub dice: bool,

    /// Run this many frames without a window, then print a summary
    #[arg(long, value_name = "FRAMES")]
    pub headless: Option<usize>,
}

impl Cli {
    /// Load the page config, if one was given, and apply flag overrides
    pub fn page_config(&self) -> anyhow::Result<PageConfig> {
        let mut config = match &self.config {
            Some(path) => PageConfig::load(path)?,
            None => PageConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    pub fn apply(&self, config: &mut PageConfig) {
        if let Some(stars) = self.stars {
            config.starfield.count = stars;
        }
        if self.model.is_some() || self.scale.is_some() || self.redirect.is_some() {
            let showcase = config.showcase.get_or_insert_with(Default::default);
            if let Some(model) = &self.model {
                showcase.model_path = model.clone();
            }
            if let Some(scale) = self.scale {
                showcase.scale = scale;
            }
            if let Some(redirect) = &self.redirect {
                showcase.redirect = redirect.clone();
            }
        }
        if self.dice && config.dice.is_none() {
            config.dice = Some(DiceConfig::default());
        }
    }
}
