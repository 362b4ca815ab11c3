//! Error types for vsh

use thiserror::Error;

/// Result type alias for vsh operations
pub type VshResult<T> = Result<T, VshError>;

/// Error types for vsh shell operations
#[derive(Error, Debug)]
pub enum VshError {
    /// Syntax error: a required token was absent
    #[error("Syntax error: missing {0}")]
    MissingToken(String),

    /// Syntax error: a statement was malformed
    #[error("Syntax error: {0}")]
    InvalidStatement(String),

    /// Runtime error during command execution
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// System call failure from the process layer
    #[error("System error: {0}")]
    Sys(#[from] nix::errno::Errno),

    /// Exit requested (not really an error)
    #[error("Exit with code {0}")]
    Exit(i32),
}
