/// Error types for the skein command-line host

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid syntax tree in {file}: {message}")]
    Parse { file: PathBuf, message: String },

    #[error("Invalid constants in {file}: {message}")]
    Consts { file: PathBuf, message: String },

    #[error("{0}")]
    Script(#[from] skein_eval::Error),
}

impl CliError {
    pub fn parse(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CliError::Parse {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn consts(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        CliError::Consts {
            file: file.into(),
            message: message.into(),
        }
    }
}
