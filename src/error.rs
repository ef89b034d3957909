//! The flat error taxonomy surfaced by every core component.
//!
//! Library code returns [`Error`] so callers can match on the kind of
//! failure instead of grepping a formatted message; the CLI wraps it in
//! [`anyhow::Error`] at the boundary the same way `xwin`'s `main.rs` does.

use camino::Utf8PathBuf as PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An HTTP request failed, or a downloaded payload's hash didn't match.
    ///
    /// `status` is `None` when the failure happened before a response was
    /// received (connection error, hash mismatch).
    #[error("download failed for {url}{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Download {
        url: String,
        status: Option<u16>,
        message: String,
    },

    /// An expected package id or payload filename is absent from the manifest.
    #[error("missing package: {0}")]
    MissingPackage(String),

    /// The requested arch/variant/version combination has no representation
    /// in the manifest.
    #[error("unsupported package configuration: {0}")]
    UnsupportedPackageConfiguration(String),

    /// The manifest JSON violates the expected schema.
    #[error("malformed manifest JSON: {0}")]
    MalformedJson(String),

    /// Structurally valid JSON is missing a field we require.
    #[error("missing required field '{field}' on {context}")]
    MissingField { field: String, context: String },

    /// A user-supplied string (version, path, ...) failed validation.
    #[error("invalid input: {0}")]
    InvalidInputData(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
