//! Mesh transcoding: turn one source mesh file into one glTF file.
//!
//! [`MeshTranscoder`] is the seam the conversion cache calls through. The
//! built-in [`NativeTranscoder`] reads STL, OBJ, PLY, OFF and COLLADA,
//! flattens every geometry into a single triangle mesh, applies the scale
//! and writes GLB or glTF. Tests and embedders can plug in their own.
//!
//! Transcoding is synchronous, CPU-bound work. Callers on an async runtime
//! run it on the blocking pool.

pub mod gltf;
pub mod mesh;
pub mod readers;

use crate::config::OutputFormat;
use crate::error::TranscodeError;
use mesh::TriMesh;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Converts a source mesh into a glTF-family file.
pub trait MeshTranscoder: Send + Sync {
    /// Read `source`, multiply vertices component-wise by `scale`, and write
    /// the result to `output`. An existing `output` is overwritten.
    fn transcode(&self, source: &Path, scale: [f64; 3], output: &Path) -> Result<(), TranscodeError>;
}

/// Pure-Rust transcoder.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeTranscoder {
    format: OutputFormat,
}

impl NativeTranscoder {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }
}

/// Read `path` into one flattened mesh, dispatching on the extension.
pub fn read_mesh(path: &Path) -> Result<TriMesh, TranscodeError> {
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    let reader: fn(&Path, &[u8]) -> Result<TriMesh, TranscodeError> = match extension.as_str() {
        "stl" => readers::read_stl,
        "obj" => readers::read_obj,
        "ply" => readers::read_ply,
        "off" => readers::read_off,
        "dae" => readers::read_dae,
        _ => return Err(TranscodeError::UnsupportedInput { extension }),
    };
    let bytes = fs::read(path).map_err(|source| TranscodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    reader(path, &bytes)
}

impl MeshTranscoder for NativeTranscoder {
    fn transcode(&self, source: &Path, scale: [f64; 3], output: &Path) -> Result<(), TranscodeError> {
        let mut mesh = read_mesh(source)?;
        if mesh.is_empty() {
            return Err(TranscodeError::EmptyMesh {
                path: source.to_path_buf(),
            });
        }
        mesh.validate()
            .map_err(|detail| TranscodeError::Encode(format!("{}: {detail}", source.display())))?;
        mesh.apply_scale(scale);

        let bytes = match self.format {
            OutputFormat::Glb => gltf::encode_glb(&mesh)?,
            OutputFormat::Gltf => gltf::encode_gltf(&mesh)?,
        };
        fs::write(output, &bytes).map_err(|source| TranscodeError::Io {
            path: output.to_path_buf(),
            source,
        })?;

        debug!(
            "Transcoded {} ({} vertices, {} triangles) -> {} ({} bytes)",
            source.display(),
            mesh.vertex_count(),
            mesh.triangle_count(),
            output.display(),
            bytes.len()
        );
        Ok(())
    }
}
