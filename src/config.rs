use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};

use crate::scenes::{DiceConfig, ShowcaseConfig, StarfieldConfig};

/// Everything the landing page mounts, loaded from JSON. Missing fields take
/// the defaults of the live page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    pub title: String,
    pub description: String,
    pub window_width: u32,
    pub window_height: u32,
    /// Height of the model band in pixels
    pub showcase_height: u32,
    pub starfield: StarfieldConfig,
    pub showcase: Option<ShowcaseConfig>,
    /// Off unless configured
    pub dice: Option<DiceConfig>,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: "Tomak | Professional services for online businesses".into(),
            description: "Web design, SEO, content, graphics and analytics for your business.".into(),
            window_width: 1280,
            window_height: 800,
            showcase_height: 400,
            starfield: StarfieldConfig::default(),
            showcase: Some(ShowcaseConfig::default()),
            dice: None,
        }
    }
}

impl PageConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page config {:?}", path))?;
        let config: PageConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse page config {:?}", path))?;
        info!("Loaded page config from {:?}", path);
        Ok(config)
    }
}
