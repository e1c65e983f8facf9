mod server;

pub use server::{DeployerSettings, EnvironmentConfig, ServerConfig};
