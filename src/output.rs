//! Result types returned by the conversion pipeline.
//!
//! Every mesh reference ends in exactly one [`ReferenceOutcome`]; a
//! [`DocumentReport`] aggregates the outcomes of one document and a
//! [`BatchReport`] the reports of a whole run. All types serialise to JSON
//! so the CLI can emit them verbatim with `--json`.

use crate::error::{MeshConvError, ReferenceError};
use crate::pipeline::cache::CacheStats;
use crate::pipeline::resolve::Scheme;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Terminal state of one mesh reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReferenceOutcome {
    /// The reference resolved and its mesh is available in the target format.
    Converted {
        uri: String,
        scheme: Scheme,
        source: PathBuf,
        output: PathBuf,
        /// True when the mesh had already been converted earlier in the run.
        cached: bool,
    },
    /// No file exists for the reference.
    Unresolved { uri: String, error: ReferenceError },
    /// The file exists but could not be converted.
    Failed {
        uri: String,
        source: PathBuf,
        error: ReferenceError,
    },
}

impl ReferenceOutcome {
    /// The raw URI text as it appeared in the document.
    pub fn uri(&self) -> &str {
        match self {
            ReferenceOutcome::Converted { uri, .. }
            | ReferenceOutcome::Unresolved { uri, .. }
            | ReferenceOutcome::Failed { uri, .. } => uri,
        }
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, ReferenceOutcome::Converted { .. })
    }

    /// The non-fatal error, if the reference was skipped.
    pub fn error(&self) -> Option<&ReferenceError> {
        match self {
            ReferenceOutcome::Converted { .. } => None,
            ReferenceOutcome::Unresolved { error, .. } | ReferenceOutcome::Failed { error, .. } => {
                Some(error)
            }
        }
    }
}

/// Per-document result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentReport {
    /// Input document.
    pub document: PathBuf,
    /// Rewritten document, when at least one reference was converted.
    pub output_document: Option<PathBuf>,
    /// One outcome per mesh reference, in document order.
    pub references: Vec<ReferenceOutcome>,
    /// Document-level failure. A failed write of the rewritten document is
    /// recorded here in every report; parse and read failures only appear
    /// here in batch reports.
    pub error: Option<String>,
    /// Wall-clock time spent on this document.
    pub duration_ms: u64,
}

impl DocumentReport {
    pub fn total(&self) -> usize {
        self.references.len()
    }

    pub fn converted(&self) -> usize {
        self.references.iter().filter(|r| r.is_converted()).count()
    }

    pub fn unresolved(&self) -> usize {
        self.references
            .iter()
            .filter(|r| matches!(r, ReferenceOutcome::Unresolved { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.references
            .iter()
            .filter(|r| matches!(r, ReferenceOutcome::Failed { .. }))
            .count()
    }

    /// A document succeeds when it was processed without a document-level
    /// error and either converted at least one mesh or had nothing to convert.
    pub fn is_success(&self) -> bool {
        self.error.is_none() && (self.converted() > 0 || self.references.is_empty())
    }

    /// Treat a document-level error, or a document with references but zero
    /// conversions, as an error.
    pub fn into_result(self) -> Result<Self, MeshConvError> {
        if let Some(detail) = self.error {
            return Err(MeshConvError::DocumentFailed {
                path: self.document,
                detail,
            });
        }
        if !self.references.is_empty() && self.converted() == 0 {
            return Err(MeshConvError::NothingConverted {
                path: self.document,
                total: self.references.len(),
            });
        }
        Ok(self)
    }
}

/// Aggregate result of a batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    /// Per-document reports, in input order.
    pub documents: Vec<DocumentReport>,
    /// Conversion-cache counters for the run.
    pub cache: CacheStats,
    /// Wall-clock time for the whole batch.
    pub total_duration_ms: u64,
}

impl BatchReport {
    /// Number of documents that [`DocumentReport::is_success`].
    pub fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.is_success()).count()
    }

    /// Number of documents that hit a document-level error.
    pub fn errored(&self) -> usize {
        self.documents.iter().filter(|d| d.error.is_some()).count()
    }

    /// Converted references across all documents (cache hits included).
    pub fn meshes_converted(&self) -> usize {
        self.documents.iter().map(DocumentReport::converted).sum()
    }
}
