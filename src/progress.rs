//! Progress-callback trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConverterConfigBuilder::progress_callback`] to receive
//! events as the pipeline processes each document and mesh reference.
//!
//! # Example
//!
//! ```rust
//! use sdf_mesh_converter::{ConversionProgressCallback, ConverterConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     converted: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_mesh_converted(&self, _document: &std::path::Path, uri: &str, _output: &std::path::Path) {
//!         self.converted.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("converted {uri}");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { converted: AtomicUsize::new(0) });
//!
//! let config = ConverterConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by the pipeline as it processes documents and references.
///
/// Implementations must be `Send + Sync`: documents of a batch are
/// processed concurrently, so every method may be called from several tasks
/// at once. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first document of a batch.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called after a document has been parsed.
    ///
    /// # Arguments
    /// * `document`: input document path
    /// * `references`: number of mesh references found
    fn on_document_start(&self, document: &Path, references: usize) {
        let _ = (document, references);
    }

    /// Called when a reference was converted (or served from the cache).
    fn on_mesh_converted(&self, document: &Path, uri: &str, output: &Path) {
        let _ = (document, uri, output);
    }

    /// Called when a reference was skipped: unresolved, unsupported or failed.
    fn on_mesh_skipped(&self, document: &Path, uri: &str, reason: &str) {
        let _ = (document, uri, reason);
    }

    /// Called once per document after all its references were attempted.
    ///
    /// # Arguments
    /// * `converted`: references that ended in a converted mesh
    /// * `total`: references found in the document
    /// * `output`: rewritten document path, if one was written
    fn on_document_complete(
        &self,
        document: &Path,
        converted: usize,
        total: usize,
        output: Option<&Path>,
    ) {
        let _ = (document, converted, total, output);
    }

    /// Called when a document fails to parse or its output cannot be written.
    fn on_document_error(&self, document: &Path, error: &str) {
        let _ = (document, error);
    }

    /// Called once after every document of a batch has been attempted.
    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        let _ = (total_documents, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConverterConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
