use std::io;

use scriptstudio_core::config::ConfigError;
use scriptstudio_core::remote::RemoteError;
use scriptstudio_core::Collection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] scriptstudio_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Invalid field assignment '{0}': expected KEY=VALUE")]
    InvalidAssignment(String),
    #[error("Field name cannot be empty in '{0}'")]
    EmptyFieldName(String),
    #[error("No {collection} record found for id: {id}")]
    RecordNotFound { collection: Collection, id: String },
}
