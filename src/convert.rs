//! Conversion entry points: one document, a list of documents, or a tree.
//!
//! Each document goes through the same stages:
//!
//! ```text
//! read ─▶ extract ─▶ resolve ─▶ convert (cache) ─▶ rewrite ─▶ write
//! ```
//!
//! Only a parse failure or an unreadable document stops a document early.
//! Every reference otherwise ends in an explicit [`ReferenceOutcome`], kept
//! even when the rewritten document then fails to write. In batch mode documents run concurrently and share
//! one [`ConversionCache`], so a mesh referenced from many documents is
//! still transcoded once.

use crate::config::ConverterConfig;
use crate::error::MeshConvError;
use crate::output::{BatchReport, DocumentReport, ReferenceOutcome};
use crate::pipeline::cache::ConversionCache;
use crate::pipeline::extract::extract_references;
use crate::pipeline::resolve::UriResolver;
use crate::pipeline::rewrite::{ReferenceRewriter, RewritePlan};
use crate::transcode::{MeshTranscoder, NativeTranscoder};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Convert the meshes of one document and write the rewritten document.
///
/// Uses a fresh cache. The output document goes to `config.output_path`
/// when set, otherwise next to the input (see [`default_output_path`]).
///
/// # Returns
/// `Ok(DocumentReport)` whenever the document could be parsed, even if no
/// reference converted. A [`MeshConvError::RewriteFailure`] while writing
/// the output document is recorded in [`DocumentReport::error`] next to the
/// per-reference outcomes. Use [`DocumentReport::into_result`] to treat
/// either case as an error.
///
/// # Errors
/// * [`MeshConvError::DocumentNotFound`] / [`MeshConvError::ReadFailed`]
/// * [`MeshConvError::ParseFailure`]: not well-formed XML
pub async fn convert_document(
    document: impl AsRef<Path>,
    config: &ConverterConfig,
) -> Result<DocumentReport, MeshConvError> {
    let document = document.as_ref();
    let cache = build_cache(config);
    let resolver = UriResolver::new(config.model_roots.clone());
    let result = convert_document_with(
        document,
        config,
        &cache,
        &resolver,
        config.output_path.as_deref(),
    )
    .await;
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_document_error(document, &e.to_string());
    }
    result
}

/// Convert one document against a caller-owned cache and resolver.
///
/// `output_path` overrides the derived output document path.
pub async fn convert_document_with(
    document: &Path,
    config: &ConverterConfig,
    cache: &ConversionCache,
    resolver: &UriResolver,
    output_path: Option<&Path>,
) -> Result<DocumentReport, MeshConvError> {
    let start = Instant::now();
    info!("Processing SDF file: {}", document.display());

    // ── Step 1: Read ─────────────────────────────────────────────────────
    if !document.is_file() {
        return Err(MeshConvError::DocumentNotFound {
            path: document.to_path_buf(),
        });
    }
    let text = tokio::fs::read_to_string(document)
        .await
        .map_err(|source| MeshConvError::ReadFailed {
            path: document.to_path_buf(),
            source,
        })?;

    // ── Step 2: Extract ──────────────────────────────────────────────────
    let references = extract_references(&text, document)?;
    info!(
        "Found {} mesh reference(s) in {}",
        references.len(),
        document.display()
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_document_start(document, references.len());
    }

    // ── Step 3: Resolve and convert, one reference at a time ─────────────
    let mut outcomes = Vec::with_capacity(references.len());
    let mut plan = RewritePlan::new();
    for reference in &references {
        let uri = reference.raw_uri.as_str();
        let outcome = match resolver.resolve(uri, document) {
            Err(error) => {
                warn!("Mesh file not found: {} ({})", uri, error);
                ReferenceOutcome::Unresolved {
                    uri: uri.to_string(),
                    error,
                }
            }
            Ok(resolved) => match cache.convert(&resolved.path, reference.scale).await {
                Ok(converted) => {
                    plan.push(uri, converted.output_path.clone(), reference.uri_span.clone());
                    ReferenceOutcome::Converted {
                        uri: uri.to_string(),
                        scheme: resolved.scheme,
                        source: converted.source_path,
                        output: converted.output_path,
                        cached: converted.cached,
                    }
                }
                Err(error) => {
                    warn!("Skipping {}: {}", uri, error);
                    ReferenceOutcome::Failed {
                        uri: uri.to_string(),
                        source: resolved.path,
                        error,
                    }
                }
            },
        };

        if let Some(ref cb) = config.progress_callback {
            match &outcome {
                ReferenceOutcome::Converted { output, .. } => {
                    cb.on_mesh_converted(document, uri, output)
                }
                other => {
                    let reason = other.error().map(|e| e.to_string()).unwrap_or_default();
                    cb.on_mesh_skipped(document, uri, &reason);
                }
            }
        }
        outcomes.push(outcome);
    }

    // ── Step 4: Rewrite and write ────────────────────────────────────────
    let mut report = DocumentReport {
        document: document.to_path_buf(),
        output_document: None,
        references: outcomes,
        error: None,
        duration_ms: 0,
    };
    if plan.is_empty() {
        debug!("Nothing converted in {}, no output written", document.display());
    } else {
        let target = output_path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| default_output_path(document, &config.suffix));
        let rewritten = ReferenceRewriter::new(config.rewrite_mode).rewrite(&text, &target, &plan);
        match write_atomic(&target, &rewritten).await {
            Ok(()) => {
                info!("Saved converted SDF to: {}", target.display());
                report.output_document = Some(target);
            }
            Err(e) => {
                warn!("Error writing {}: {}", target.display(), e);
                report.error = Some(e.to_string());
            }
        }
    }
    report.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "Converted {}/{} meshes in {}",
        report.converted(),
        report.total(),
        document.display()
    );
    if let Some(ref cb) = config.progress_callback {
        match report.error {
            Some(ref error) => cb.on_document_error(document, error),
            None => cb.on_document_complete(
                document,
                report.converted(),
                report.total(),
                report.output_document.as_deref(),
            ),
        }
    }
    Ok(report)
}

/// Convert many documents with one shared cache.
///
/// At most `config.concurrency` documents are in flight at once. A failing
/// document is recorded in its [`DocumentReport::error`] and never stops the
/// others. Reports come back in input order. `config.output_path` is
/// ignored; every output is derived from `config.suffix`.
pub async fn convert_batch<P: AsRef<Path>>(
    documents: &[P],
    config: &ConverterConfig,
) -> Result<BatchReport, MeshConvError> {
    if config.concurrency == 0 {
        return Err(MeshConvError::InvalidConfig(
            "concurrency must be at least 1".into(),
        ));
    }
    let start = Instant::now();
    let total = documents.len();
    info!("Starting batch of {} document(s)", total);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let cache = Arc::new(build_cache(config));
    let resolver = Arc::new(UriResolver::new(config.model_roots.clone()));

    let mut indexed: Vec<(usize, DocumentReport)> =
        stream::iter(documents.iter().enumerate().map(|(idx, doc)| {
            let doc = doc.as_ref().to_path_buf();
            let cache = Arc::clone(&cache);
            let resolver = Arc::clone(&resolver);
            async move {
                let doc_start = Instant::now();
                let report =
                    match convert_document_with(&doc, config, &cache, &resolver, None).await {
                        Ok(report) => report,
                        Err(e) => {
                            warn!("Error processing {}: {}", doc.display(), e);
                            if let Some(ref cb) = config.progress_callback {
                                cb.on_document_error(&doc, &e.to_string());
                            }
                            DocumentReport {
                                document: doc.clone(),
                                error: Some(e.to_string()),
                                duration_ms: doc_start.elapsed().as_millis() as u64,
                                ..Default::default()
                            }
                        }
                    };
                (idx, report)
            }
        }))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    indexed.sort_by_key(|(idx, _)| *idx);

    let report = BatchReport {
        documents: indexed.into_iter().map(|(_, r)| r).collect(),
        cache: cache.stats(),
        total_duration_ms: start.elapsed().as_millis() as u64,
    };
    info!(
        "Batch complete: {}/{} document(s) succeeded, {} mesh(es) converted, {} transcode(s), {}ms",
        report.succeeded(),
        total,
        report.meshes_converted(),
        report.cache.transcodes,
        report.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, report.succeeded());
    }
    Ok(report)
}

/// Find every scene document under `root` and convert them as one batch.
///
/// # Errors
/// [`MeshConvError::EnumerationFailed`] when `root` cannot be walked. This is
/// the only error that aborts a whole batch.
pub async fn convert_directory(
    root: impl AsRef<Path>,
    config: &ConverterConfig,
) -> Result<BatchReport, MeshConvError> {
    let documents = find_documents(root.as_ref(), &config.suffix)?;
    info!(
        "Found {} SDF file(s) under {}",
        documents.len(),
        root.as_ref().display()
    );
    convert_batch(&documents, config).await
}

/// Synchronous wrapper around [`convert_batch`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_batch_sync<P: AsRef<Path>>(
    documents: &[P],
    config: &ConverterConfig,
) -> Result<BatchReport, MeshConvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| MeshConvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_batch(documents, config))
}

/// Every `*.sdf` file under `root`, sorted, skipping files whose stem
/// already ends with `suffix` (outputs of an earlier run).
///
/// Unreadable entries below the root are logged and skipped; failing to
/// read the root itself is an error.
pub fn find_documents(root: &Path, suffix: &str) -> Result<Vec<PathBuf>, MeshConvError> {
    if !root.is_dir() {
        return Err(MeshConvError::EnumerationFailed {
            root: root.to_path_buf(),
            detail: "not a directory".into(),
        });
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(MeshConvError::EnumerationFailed {
                    root: root.to_path_buf(),
                    detail: e.to_string(),
                });
            }
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_sdf = path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("sdf"));
        let already_converted = !suffix.is_empty()
            && path
                .file_stem()
                .is_some_and(|s| s.to_string_lossy().ends_with(suffix));
        if is_sdf && !already_converted {
            found.push(path.to_path_buf());
        }
    }
    found.sort();
    Ok(found)
}

/// `<dir>/<stem><suffix>.<ext>` next to the input document.
pub fn default_output_path(document: &Path, suffix: &str) -> PathBuf {
    let stem = document
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match document.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    document.with_file_name(name)
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The configured transcoder, or a native one for the configured format.
fn build_cache(config: &ConverterConfig) -> ConversionCache {
    let transcoder: Arc<dyn MeshTranscoder> = match config.transcoder {
        Some(ref t) => Arc::clone(t),
        None => Arc::new(NativeTranscoder::new(config.format)),
    };
    ConversionCache::new(transcoder, config.output_dir.clone(), config.format)
}

/// Atomic write: write to a sibling temp file, then rename over the target.
async fn write_atomic(path: &Path, contents: &str) -> Result<(), MeshConvError> {
    let fail = |source: std::io::Error| MeshConvError::RewriteFailure {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(fail)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(fail)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(fail(e));
    }
    Ok(())
}
