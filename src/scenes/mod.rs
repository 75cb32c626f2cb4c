//! The three scenes of the landing page, each a [`SceneContent`] plus a
//! `mount_*` entry point.
//!
//! [`SceneContent`]: crate::host::SceneContent

pub mod dice;
pub mod showcase;
pub mod starfield;

pub use dice::{mount_dice, DiceConfig, GlowDice};
pub use showcase::{mount_showcase, reload_showcase, AssetLoadedObject, ModelShowcase, ShowcaseConfig};
pub use starfield::{generate_point_cloud, mount_starfield, ProceduralField, StarfieldConfig};
