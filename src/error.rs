use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("schema '{child}' cannot inherit from '{parent}': type tags differ")]
    ParentMismatch { child: String, parent: String },

    #[error("schema parent chain revisits '{0}'")]
    SchemaCycle(String),

    #[error("no media deployer configured for environment '{0}'")]
    NoDeployerConfigured(String),

    #[error("external process failed: {0}")]
    ExternalProcess(String),

    #[error("schema file is not under a type directory: {0}")]
    MissingTypeTag(String),
}

pub type Result<T> = std::result::Result<T, Error>;
