//! Crate-level error type.
//!
//! Each module reports its own failures; this enum gathers them for callers
//! that drive the whole pipeline through [`crate::check`].

use thiserror::Error;

use crate::engine::RunError;
use crate::pattern::PatternSyntaxError;
use crate::syntax::ParseError;

/// A type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Failed to load or validate configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A rule's node pattern did not compile.
    #[error("Invalid node pattern: {0}")]
    Pattern(#[from] PatternSyntaxError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Run(#[from] RunError),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Self::config(format!("{error:#}"))
    }
}
