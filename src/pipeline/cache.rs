//! Conversion cache: transcode every distinct source mesh at most once.
//!
//! One [`ConversionCache`] lives for one batch run and is shared by every
//! document task through an `Arc`. Entries are keyed by the absolute,
//! normalised source path (see [`canonical_key`]), so
//! `model://arm/meshes/a.dae`, `meshes/a.dae` and `file:///…/meshes/a.dae`
//! all land on the same entry.
//!
//! ## Concurrency
//!
//! Each canonical source path owns a slot: an async mutex around the
//! optional output path. Looking up and filling a slot happens under that
//! mutex, so two tasks asking for the same source never both transcode it.
//! Failures leave the slot empty, which lets a later request retry.
//!
//! Distinct sources sharing a file stem map to the same output file. Their
//! transcodes are serialised through a per-output-path lock; the later one
//! overwrites the earlier output. That collision is a known limitation and
//! is not worked around.

use crate::config::OutputFormat;
use crate::error::ReferenceError;
use crate::pipeline::resolve::normalize_lexically;
use crate::transcode::MeshTranscoder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Input extensions accepted for transcoding (compared case-insensitively).
pub const SUPPORTED_INPUT_EXTENSIONS: [&str; 5] = ["dae", "obj", "stl", "ply", "off"];

/// Check an extension against [`SUPPORTED_INPUT_EXTENSIONS`].
pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_INPUT_EXTENSIONS
        .iter()
        .any(|s| s.eq_ignore_ascii_case(ext))
}

/// Cache key for a source: absolute and lexically normalised.
///
/// Symlinks are not followed. The extension check and the output name use
/// the path as referenced, even when it links to an extensionless blob.
pub fn canonical_key(source_path: &Path) -> PathBuf {
    let absolute = std::path::absolute(source_path).unwrap_or_else(|_| source_path.to_path_buf());
    normalize_lexically(&absolute)
}

/// A completed conversion recorded in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Canonical source path (the key).
    pub source_path: PathBuf,
    pub output_path: PathBuf,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Distinct sources converted successfully.
    pub entries: usize,
    /// Transcoder invocations, successful or not.
    pub transcodes: usize,
    /// Requests answered from an existing entry.
    pub hits: usize,
    /// Requests that ended in an unsupported-format or conversion error.
    pub failures: usize,
}

/// Successful answer of [`ConversionCache::convert`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedConversion {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    /// True when served from an existing entry without transcoding.
    pub cached: bool,
}

type Slot = Arc<tokio::sync::Mutex<Option<PathBuf>>>;

/// Run-scoped map from canonical source path to converted output.
pub struct ConversionCache {
    transcoder: Arc<dyn MeshTranscoder>,
    output_dir: PathBuf,
    format: OutputFormat,
    slots: Mutex<HashMap<PathBuf, Slot>>,
    output_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    transcodes: AtomicUsize,
    hits: AtomicUsize,
    failures: AtomicUsize,
}

impl std::fmt::Debug for ConversionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversionCache")
            .field("output_dir", &self.output_dir)
            .field("format", &self.format)
            .field("stats", &self.stats())
            .finish()
    }
}

impl ConversionCache {
    /// Create an empty cache. A relative `output_dir` is anchored at the
    /// current directory.
    pub fn new(
        transcoder: Arc<dyn MeshTranscoder>,
        output_dir: impl Into<PathBuf>,
        format: OutputFormat,
    ) -> Self {
        let output_dir = output_dir.into();
        Self {
            transcoder,
            output_dir: std::path::absolute(&output_dir).unwrap_or(output_dir),
            format,
            slots: Mutex::new(HashMap::new()),
            output_locks: Mutex::new(HashMap::new()),
            transcodes: AtomicUsize::new(0),
            hits: AtomicUsize::new(0),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Output path for a source: `<output_dir>/<stem>.<ext>`.
    pub fn output_path_for(&self, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mesh".to_string());
        self.output_dir
            .join(format!("{}.{}", stem, self.format.extension()))
    }

    /// Convert `source_path`, or return the output of an earlier conversion.
    ///
    /// The scale of the first successful conversion applies to every later
    /// request for the same source; scale is not part of the key.
    ///
    /// # Errors
    /// * [`ReferenceError::UnsupportedFormat`]: extension not in the allow-list
    /// * [`ReferenceError::ConversionFailed`]: source unreadable or transcoding failed
    pub async fn convert(
        &self,
        source_path: &Path,
        scale: [f64; 3],
    ) -> Result<CachedConversion, ReferenceError> {
        let source_path = canonical_key(source_path);
        if let Err(e) = tokio::fs::metadata(&source_path).await {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(ReferenceError::ConversionFailed {
                path: source_path.display().to_string(),
                detail: format!("cannot read source: {e}"),
            });
        }

        let slot = self.slot(&source_path);
        let mut entry = slot.lock().await;

        if let Some(output_path) = entry.as_ref() {
            self.hits.fetch_add(1, Ordering::SeqCst);
            debug!("Cache hit: {}", source_path.display());
            return Ok(CachedConversion {
                source_path,
                output_path: output_path.clone(),
                cached: true,
            });
        }

        let extension = source_path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !is_supported_extension(&extension) {
            self.failures.fetch_add(1, Ordering::SeqCst);
            warn!("Unsupported format: {}", source_path.display());
            return Err(ReferenceError::UnsupportedFormat {
                path: source_path.display().to_string(),
                extension,
            });
        }

        let output_path = self.output_path_for(&source_path);
        let failed = |detail: String| {
            self.failures.fetch_add(1, Ordering::SeqCst);
            ReferenceError::ConversionFailed {
                path: source_path.display().to_string(),
                detail,
            }
        };

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| failed(format!("cannot create {}: {e}", self.output_dir.display())))?;

        let output_lock = self.output_lock(&output_path);
        let _writing = output_lock.lock().await;

        info!(
            "Converting {} -> {}",
            source_path.display(),
            output_path.display()
        );
        self.transcodes.fetch_add(1, Ordering::SeqCst);

        let transcoder = Arc::clone(&self.transcoder);
        let (src, dst) = (source_path.clone(), output_path.clone());
        let result =
            tokio::task::spawn_blocking(move || transcoder.transcode(&src, scale, &dst)).await;

        match result {
            Ok(Ok(())) => {
                *entry = Some(output_path.clone());
                Ok(CachedConversion {
                    source_path,
                    output_path,
                    cached: false,
                })
            }
            Ok(Err(e)) => {
                warn!("Error converting {}: {}", source_path.display(), e);
                Err(failed(e.to_string()))
            }
            Err(e) => Err(failed(format!("transcode task panicked: {e}"))),
        }
    }

    /// Completed entries, sorted by source path.
    ///
    /// Slots whose conversion is still in flight are not listed.
    pub fn entries(&self) -> Vec<CacheEntry> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<CacheEntry> = slots
            .iter()
            .filter_map(|(source, slot)| {
                let guard = slot.try_lock().ok()?;
                guard.as_ref().map(|output| CacheEntry {
                    source_path: source.clone(),
                    output_path: output.clone(),
                })
            })
            .collect();
        entries.sort_by(|a, b| a.source_path.cmp(&b.source_path));
        entries
    }

    /// Output recorded for `source_path`, if it was converted in this run.
    pub fn lookup(&self, source_path: &Path) -> Option<PathBuf> {
        let key = canonical_key(source_path);
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(&key)?;
        let guard = slot.try_lock().ok()?;
        guard.clone()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries().len(),
            transcodes: self.transcodes.load(Ordering::SeqCst),
            hits: self.hits.load(Ordering::SeqCst),
            failures: self.failures.load(Ordering::SeqCst),
        }
    }

    fn slot(&self, source_path: &Path) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(source_path.to_path_buf()).or_default())
    }

    fn output_lock(&self, output_path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .output_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(output_path.to_path_buf()).or_default())
    }
}
