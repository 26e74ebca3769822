//! Error types.
//!
//! Nothing on the matching path returns an error: a missing family is a
//! plain `None`. Errors only describe why a face could not be built or
//! loaded, and are attached to the face itself.

use alloc::string::String;
use thiserror::Error;

/// The error attached to a face in the `error` state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FontFaceError {
    /// A descriptor or `src` value could not be parsed.
    #[error("SyntaxError: {message}")]
    Syntax { message: String },
    /// Every source was tried and none produced a font.
    #[error("NetworkError: A network error occurred.")]
    Network,
}

impl FontFaceError {
    pub fn syntax(message: impl Into<String>) -> Self {
        FontFaceError::Syntax {
            message: message.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FontFaceError::Syntax { .. } => "SyntaxError",
            FontFaceError::Network => "NetworkError",
        }
    }
}

/// Why a remote fetch did not produce bytes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("resource blocked by CORS policy")]
    Cors,
    #[error("resource not found")]
    NotFound,
    #[error("subresource integrity check failed")]
    IntegrityCheckFailed,
}

/// The decoder rejected the bytes of a font.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to decode font: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

impl DecodeError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors from the on-disk system font index.
#[cfg(feature = "cache")]
#[derive(Error, Debug)]
pub enum IndexCacheError {
    #[error("no cache directory available on this platform")]
    NoCacheDir,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("corrupt cache manifest: {0}")]
    Corrupt(#[from] bincode::Error),
    #[error("cache manifest version {found} does not match {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}
