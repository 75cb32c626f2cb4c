use futures::channel::oneshot;
use log::{debug, warn};

use crate::error::{Result, SceneError};
use crate::scene::{ModelData, TextureData};

/// Sending half of an asset load
pub struct Completer<T> {
    label: String,
    sender: oneshot::Sender<Result<T>>,
}

impl<T> Completer<T> {
    /// Deliver the result. Returns false if the load was already abandoned.
    pub fn complete(self, result: Result<T>) -> bool {
        let delivered = self.sender.send(result).is_ok();
        if !delivered {
            debug!("load of {} finished after it was abandoned", self.label);
        }
        delivered
    }

    pub fn is_abandoned(&self) -> bool {
        self.sender.is_canceled()
    }
}

/// An asset load in flight. Dropping it abandons the load.
pub struct Pending<T> {
    label: String,
    receiver: oneshot::Receiver<Result<T>>,
}

/// A linked completer / pending pair for `label`
pub fn channel<T>(label: impl Into<String>) -> (Completer<T>, Pending<T>) {
    let label = label.into();
    let (sender, receiver) = oneshot::channel();
    (
        Completer {
            label: label.clone(),
            sender,
        },
        Pending { label, receiver },
    )
}

impl<T> Pending<T> {
    /// Already resolved, used when the value is at hand
    pub fn ready(label: impl Into<String>, result: Result<T>) -> Self {
        let (completer, pending) = channel(label);
        completer.complete(result);
        pending
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Non-blocking check. `None` while the load is still running; a loader
    /// that went away without answering counts as a failure.
    pub fn poll(&mut self) -> Option<Result<T>> {
        match self.receiver.try_recv() {
            Ok(Some(result)) => Some(result),
            Ok(None) => None,
            Err(oneshot::Canceled) => Some(Err(SceneError::asset(
                self.label.clone(),
                "loader dropped without a result",
            ))),
        }
    }
}

/// Where scenes get their assets from
pub trait AssetSource {
    fn load_model(&self, path: &str) -> Pending<ModelData>;

    fn load_texture(&self, path: &str) -> Pending<TextureData>;
}

/// Loads assets from disk on a background thread per request
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadedAssetSource;

impl ThreadedAssetSource {
    pub fn new() -> Self {
        Self
    }

    fn spawn<T, F>(label: &str, load: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let (completer, pending) = channel(label);
        let path = label.to_string();
        let spawned = std::thread::Builder::new()
            .name("asset-loader".into())
            .spawn(move || {
                if completer.is_abandoned() {
                    return;
                }
                let result = load().map_err(|e| SceneError::asset(path.clone(), format!("{:#}", e)));
                completer.complete(result);
            });

        if let Err(e) = spawned {
            warn!("could not start loader thread for {}: {}", label, e);
            // The completer was moved into the failed spawn and dropped, so
            // polling reports the failure
        }
        pending
    }
}

impl AssetSource for ThreadedAssetSource {
    fn load_model(&self, path: &str) -> Pending<ModelData> {
        let owned = path.to_string();
        Self::spawn(path, move || super::gltf::load_model(&owned))
    }

    fn load_texture(&self, path: &str) -> Pending<TextureData> {
        let owned = path.to_string();
        Self::spawn(path, move || super::gltf::load_texture(&owned))
    }
}
