use thiserror::Error;

/// Failures inside a scene host.
///
/// None of these are fatal to the page: every variant degrades to rendering
/// less, and is logged where it happens.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to load asset {path}: {reason}")]
    AssetLoadFailure { path: String, reason: String },

    #[error("container has zero size ({width}x{height})")]
    ZeroSizedContainer { width: u32, height: u32 },

    #[error("container was detached before the resize handler ran")]
    ResizeOnDetachedContainer,

    #[error("no pickable object is registered")]
    PickTargetUnavailable,

    #[error("render surface unavailable: {0}")]
    Surface(String),

    #[error("gpu error: {0}")]
    Gpu(String),
}

impl SceneError {
    pub fn asset(path: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::AssetLoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SceneError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_error_mentions_path() {
        let err = SceneError::asset("models/missing.gltf", "file not found");
        let msg = err.to_string();
        assert!(msg.contains("models/missing.gltf"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn zero_size_reports_dimensions() {
        let err = SceneError::ZeroSizedContainer { width: 0, height: 400 };
        assert_eq!(err.to_string(), "container has zero size (0x400)");
    }
}
