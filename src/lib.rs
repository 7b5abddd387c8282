//! # sdf-mesh-converter
//!
//! Convert the meshes referenced by SDF scene documents to glTF and rewrite
//! the documents to point at the converted files.
//!
//! Simulation scenes reference geometry in many formats (COLLADA, STL, OBJ,
//! PLY, OFF) through several addressing schemes. Renderers that only load
//! glTF need every one of those converted, and a mesh shared by twenty links
//! should be converted once, not twenty times.
//!
//! ## Pipeline Overview
//!
//! ```text
//! robot.sdf
//!  │
//!  ├─ 1. Extract  stream the XML, collect <mesh> <uri>/<scale>
//!  ├─ 2. Resolve  file:// · model:// · package:// · relative
//!  ├─ 3. Convert  canonical path ─▶ cache ─▶ MeshTranscoder (spawn_blocking)
//!  ├─ 4. Rewrite  new URIs relative to the output document
//!  └─ 5. Output   robot_converted.sdf + per-reference outcomes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sdf_mesh_converter::{convert_document, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::builder()
//!         .output_dir("assets/converted")
//!         .build()?;
//!     let report = convert_document("worlds/robot.sdf", &config).await?;
//!     eprintln!("converted {}/{} meshes", report.converted(), report.total());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `sdfmesh` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! sdf-mesh-converter = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod transcode;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder, OutputFormat, RewriteMode};
pub use convert::{
    convert_batch, convert_batch_sync, convert_directory, convert_document,
    convert_document_with, default_output_path, find_documents,
};
pub use error::{MeshConvError, ReferenceError, TranscodeError};
pub use output::{BatchReport, DocumentReport, ReferenceOutcome};
pub use pipeline::cache::{CacheEntry, CacheStats, ConversionCache};
pub use pipeline::extract::MeshReference;
pub use pipeline::resolve::{ResolvedPath, Scheme, UriResolver};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use transcode::{MeshTranscoder, NativeTranscoder};
