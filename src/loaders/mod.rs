pub mod assets;
pub mod gltf;

pub use self::assets::{channel, AssetSource, Completer, Pending, ThreadedAssetSource};
pub use self::gltf::{load_model, load_texture};
