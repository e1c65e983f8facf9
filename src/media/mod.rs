mod deployer;
mod local;
mod service;
mod thumbnail;

pub use deployer::{MediaDeployer, deployer_for};
pub use local::LocalDeployer;
pub use service::{MediaSave, MediaService, MediaUpload, ThumbnailUpdate};
pub use thumbnail::{ThumbnailGenerator, Thumbnailer};
