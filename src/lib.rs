pub mod camera;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod host;
pub mod loaders;
pub mod math;
pub mod page;
pub mod picking;
pub mod scene;
pub mod scenes;

pub use error::{Result, SceneError};
pub use host::{HostEnvironment, SceneHost};
pub use page::LandingPage;
