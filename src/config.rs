//! Configuration types for scene-document mesh conversion.
//!
//! All conversion behaviour is controlled through [`ConverterConfig`], built
//! via its [`ConverterConfigBuilder`]. One config is shared by every document
//! of a batch, so it is cheap to clone and safe to send across tasks.

use crate::error::MeshConvError;
use crate::pipeline::resolve::default_model_roots;
use crate::progress::ProgressCallback;
use crate::transcode::MeshTranscoder;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a conversion run.
///
/// Built via [`ConverterConfig::builder()`] or using
/// [`ConverterConfig::default()`].
///
/// # Example
/// ```rust
/// use sdf_mesh_converter::{ConverterConfig, OutputFormat};
///
/// let config = ConverterConfig::builder()
///     .output_dir("assets/converted")
///     .format(OutputFormat::Gltf)
///     .concurrency(8)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConverterConfig {
    /// Directory receiving converted meshes. Default: `assets/converted`.
    ///
    /// Output names are `<source stem>.<ext>` with no collision avoidance:
    /// two sources sharing a stem overwrite each other's output.
    pub output_dir: PathBuf,

    /// Target geometry format. Default: [`OutputFormat::Glb`].
    pub format: OutputFormat,

    /// Suffix inserted before the extension of the rewritten document.
    /// Default: `_converted` (`robot.sdf` → `robot_converted.sdf`).
    pub suffix: String,

    /// Explicit path for the rewritten document. Only honoured by
    /// [`crate::convert::convert_document`]; batch runs always derive the
    /// path from `suffix`.
    pub output_path: Option<PathBuf>,

    /// Ordered search roots for `model://` URIs. First root containing the
    /// model wins.
    pub model_roots: Vec<PathBuf>,

    /// How references are substituted in the document. Default: [`RewriteMode::Textual`].
    pub rewrite_mode: RewriteMode,

    /// Number of documents processed concurrently in batch mode. Default: 4.
    pub concurrency: usize,

    /// Pre-constructed transcoder. If None, a
    /// [`crate::transcode::NativeTranscoder`] for `format` is used.
    pub transcoder: Option<Arc<dyn MeshTranscoder>>,

    /// Optional progress hooks.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("assets/converted"),
            format: OutputFormat::default(),
            suffix: "_converted".to_string(),
            output_path: None,
            model_roots: default_model_roots(),
            rewrite_mode: RewriteMode::default(),
            concurrency: 4,
            transcoder: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConverterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterConfig")
            .field("output_dir", &self.output_dir)
            .field("format", &self.format)
            .field("suffix", &self.suffix)
            .field("output_path", &self.output_path)
            .field("model_roots", &self.model_roots)
            .field("rewrite_mode", &self.rewrite_mode)
            .field("concurrency", &self.concurrency)
            .field(
                "transcoder",
                &self.transcoder.as_ref().map(|_| "<dyn MeshTranscoder>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        ConverterConfigBuilder {
            config: Self::default(),
            extra_roots: Vec::new(),
        }
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
    extra_roots: Vec<PathBuf>,
}

impl ConverterConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.suffix = suffix.into();
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = Some(path.into());
        self
    }

    /// Replace the whole `model://` search list, discarding the defaults.
    pub fn model_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.config.model_roots = roots;
        self
    }

    /// Add a root searched before the configured ones. Repeated calls keep
    /// their call order.
    pub fn extra_model_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.extra_roots.push(root.into());
        self
    }

    pub fn rewrite_mode(mut self, mode: RewriteMode) -> Self {
        self.config.rewrite_mode = mode;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn transcoder(mut self, transcoder: Arc<dyn MeshTranscoder>) -> Self {
        self.config.transcoder = Some(transcoder);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConverterConfig, MeshConvError> {
        let mut config = self.config;
        if config.output_dir.as_os_str().is_empty() {
            return Err(MeshConvError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        if config.suffix.is_empty() && config.output_path.is_none() {
            return Err(MeshConvError::InvalidConfig(
                "Suffix must not be empty: the rewritten document would overwrite its input"
                    .into(),
            ));
        }
        if config.suffix.contains(['/', '\\']) {
            return Err(MeshConvError::InvalidConfig(format!(
                "Suffix must not contain path separators, got '{}'",
                config.suffix
            )));
        }
        if config.concurrency == 0 {
            return Err(MeshConvError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if !self.extra_roots.is_empty() {
            let mut roots = self.extra_roots;
            roots.append(&mut config.model_roots);
            config.model_roots = roots;
        }
        Ok(config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target geometry format for converted meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Binary glTF container (default).
    #[default]
    Glb,
    /// JSON glTF with the buffer embedded as a base64 data URI.
    Gltf,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Glb => "glb",
            OutputFormat::Gltf => "gltf",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// How converted references are written back into the document.
///
/// | Mode | Behaviour |
/// |------|-----------|
/// | `Textual` | Replace every `<uri>RAW</uri>` in the whole document. Nodes sharing the same raw URI text are rewritten identically. (default) |
/// | `Structural` | Replace only the URI text node of each converted reference, located by its byte span. |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewriteMode {
    #[default]
    Textual,
    Structural,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let c = ConverterConfig::default();
        assert_eq!(c.output_dir, PathBuf::from("assets/converted"));
        assert_eq!(c.format, OutputFormat::Glb);
        assert_eq!(c.suffix, "_converted");
        assert_eq!(c.rewrite_mode, RewriteMode::Textual);
        assert_eq!(c.concurrency, 4);
    }

    #[test]
    fn extra_roots_are_searched_first() {
        let c = ConverterConfig::builder()
            .model_roots(vec![PathBuf::from("/usr/share/gazebo/models")])
            .extra_model_root("/a")
            .extra_model_root("/b")
            .build()
            .unwrap();
        assert_eq!(
            c.model_roots,
            vec![
                PathBuf::from("/a"),
                PathBuf::from("/b"),
                PathBuf::from("/usr/share/gazebo/models"),
            ]
        );
    }

    #[test]
    fn empty_suffix_rejected_without_explicit_output() {
        let err = ConverterConfig::builder().suffix("").build().unwrap_err();
        assert!(matches!(err, MeshConvError::InvalidConfig(_)));

        let ok = ConverterConfig::builder()
            .suffix("")
            .output_path("/tmp/out.sdf")
            .build();
        assert!(ok.is_ok());
    }

    #[test]
    fn concurrency_is_clamped() {
        let c = ConverterConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn output_format_extension() {
        assert_eq!(OutputFormat::Glb.extension(), "glb");
        assert_eq!(OutputFormat::Gltf.to_string(), "gltf");
    }
}
