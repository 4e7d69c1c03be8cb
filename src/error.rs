// File: src/error.rs
use std::path::PathBuf;

/// Errors raised while registering command definitions.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid command definition for action '{action}': {reason}")]
    Validation { action: String, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is corrupt: {0}")]
    Codec(#[from] bincode::Error),

    #[error("could not replace state file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("no plugin named '{0}' is installed")]
    Unknown(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}
