//! Error types for the sdf-mesh-converter library.
//!
//! Three error types reflect three distinct failure scopes:
//!
//! * [`MeshConvError`]: **Document or batch level**: the document could not
//!   be parsed, its rewritten form could not be written, or the batch could not
//!   enumerate its inputs. Returned as `Err(MeshConvError)` from the
//!   top-level `convert*` functions.
//!
//! * [`ReferenceError`]: **Non-fatal**: a single mesh reference could not be
//!   resolved or converted, but every other reference in the document is
//!   still processed. Stored inside [`crate::output::ReferenceOutcome`] so
//!   callers can inspect partial success.
//!
//! * [`TranscodeError`]: returned by a [`crate::transcode::MeshTranscoder`]
//!   when decoding or encoding geometry fails. The cache folds it into a
//!   [`ReferenceError::ConversionFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors for one document, or for a whole batch.
///
/// Reference-level failures use [`ReferenceError`] and never surface here.
#[derive(Debug, Error)]
pub enum MeshConvError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input document was not found at the given path.
    #[error("Scene document not found: '{path}'\nCheck the path exists and is readable.")]
    DocumentNotFound { path: PathBuf },

    /// The input document could not be read.
    #[error("Failed to read scene document '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not well-formed XML.
    #[error("Failed to parse scene document '{path}': {detail}")]
    ParseFailure { path: PathBuf, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create or write the rewritten document.
    #[error("Failed to write rewritten document '{path}': {source}")]
    RewriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Batch errors ──────────────────────────────────────────────────────
    /// Recursive mode could not walk the input directory.
    #[error("Failed to enumerate scene documents under '{root}': {detail}")]
    EnumerationFailed { root: PathBuf, detail: String },

    /// The document report carries a document-level error, such as a
    /// failed write of the rewritten document.
    ///
    /// Returned by [`crate::output::DocumentReport::into_result`].
    #[error("Converting '{path}' failed: {detail}")]
    DocumentFailed { path: PathBuf, detail: String },

    /// The document produced zero successful conversions.
    ///
    /// Returned by [`crate::output::DocumentReport::into_result`] for callers
    /// that treat an unconverted document as an error.
    #[error("No meshes converted in '{path}' ({total} references found)")]
    NothingConverted { path: PathBuf, total: usize },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single mesh reference.
///
/// The document keeps processing its other references.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum ReferenceError {
    /// No file exists at the resolved candidate path.
    #[error("Mesh not found for '{uri}' (tried {candidate})")]
    Unresolved { uri: String, candidate: String },

    /// The source extension is not in the supported input set.
    #[error("Unsupported mesh format '{extension}' for {path}")]
    UnsupportedFormat { path: String, extension: String },

    /// The transcoder rejected or failed on the input.
    #[error("Conversion of {path} failed: {detail}")]
    ConversionFailed { path: String, detail: String },
}

/// Error returned by a [`crate::transcode::MeshTranscoder`].
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed {format} data in '{path}': {detail}")]
    Malformed {
        format: &'static str,
        path: PathBuf,
        detail: String,
    },

    #[error("No triangles found in '{path}'")]
    EmptyMesh { path: PathBuf },

    #[error("Unsupported input extension '{extension}'")]
    UnsupportedInput { extension: String },

    #[error("Failed to encode output: {0}")]
    Encode(String),
}

impl TranscodeError {
    pub(crate) fn malformed(
        format: &'static str,
        path: &std::path::Path,
        detail: impl Into<String>,
    ) -> Self {
        TranscodeError::Malformed {
            format,
            path: path.to_path_buf(),
            detail: detail.into(),
        }
    }
}
