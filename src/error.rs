use std::path::PathBuf;

use linescope_core::EditError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::script::ScriptError;

/// Error returned by the file-level operations of this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("invalid edit script {}: {source}", path.display())]
    Script {
        path: PathBuf,
        source: ScriptError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("binary file rejected (NUL byte found): {}", path.display())]
    Binary { path: PathBuf },

    #[error("non-UTF8 file rejected: {}", path.display())]
    NotUtf8 { path: PathBuf },
}

impl Error {
    /// Process exit code for this error: 1 when the file cannot be read or
    /// written as text, 2 for failures of the edit script or its configuration.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Io { .. } | Error::Binary { .. } | Error::NotUtf8 { .. } => 1,
            _ => 2,
        }
    }
}
