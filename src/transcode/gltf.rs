//! glTF 2.0 writers: binary `.glb` and JSON `.gltf` with an embedded buffer.
//!
//! The document holds one mesh with one triangle primitive. The single
//! buffer is laid out as `[positions: f32 x 3 x N][indices: u32 x M]`.

use super::mesh::TriMesh;
use crate::error::TranscodeError;
use base64::Engine;
use serde_json::{json, Value};

const GLB_MAGIC: u32 = 0x4654_6C67; // "glTF"
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A; // "JSON"
const CHUNK_BIN: u32 = 0x004E_4942; // "BIN\0"

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_TRIANGLES: u32 = 4;

const GENERATOR: &str = concat!("sdf-mesh-converter ", env!("CARGO_PKG_VERSION"));

fn buffer_bytes(mesh: &TriMesh) -> Vec<u8> {
    let mut bin = Vec::with_capacity(mesh.positions.len() * 12 + mesh.indices.len() * 4);
    for p in &mesh.positions {
        for c in p {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    for i in &mesh.indices {
        bin.extend_from_slice(&i.to_le_bytes());
    }
    bin
}

/// Build the glTF JSON. `uri` is set on the buffer for the `.gltf` form.
fn document(mesh: &TriMesh, buffer_len: usize, uri: Option<String>) -> Result<Value, TranscodeError> {
    let (min, max) = mesh
        .bounds()
        .ok_or_else(|| TranscodeError::Encode("mesh has no vertices".into()))?;
    let positions_len = mesh.positions.len() * 12;
    let indices_len = mesh.indices.len() * 4;

    let mut buffer = json!({ "byteLength": buffer_len });
    if let Some(uri) = uri {
        buffer["uri"] = Value::String(uri);
    }

    Ok(json!({
        "asset": { "version": "2.0", "generator": GENERATOR },
        "scene": 0,
        "scenes": [ { "nodes": [0] } ],
        "nodes": [ { "mesh": 0 } ],
        "meshes": [ {
            "primitives": [ {
                "attributes": { "POSITION": 0 },
                "indices": 1,
                "mode": MODE_TRIANGLES
            } ]
        } ],
        "accessors": [
            {
                "bufferView": 0,
                "componentType": COMPONENT_FLOAT,
                "count": mesh.positions.len(),
                "type": "VEC3",
                "min": min,
                "max": max
            },
            {
                "bufferView": 1,
                "componentType": COMPONENT_UNSIGNED_INT,
                "count": mesh.indices.len(),
                "type": "SCALAR"
            }
        ],
        "bufferViews": [
            {
                "buffer": 0,
                "byteOffset": 0,
                "byteLength": positions_len,
                "target": TARGET_ARRAY_BUFFER
            },
            {
                "buffer": 0,
                "byteOffset": positions_len,
                "byteLength": indices_len,
                "target": TARGET_ELEMENT_ARRAY_BUFFER
            }
        ],
        "buffers": [ buffer ]
    }))
}

fn pad_to_4(bytes: &mut Vec<u8>, fill: u8) {
    while bytes.len() % 4 != 0 {
        bytes.push(fill);
    }
}

/// Encode `mesh` as binary glTF.
pub fn encode_glb(mesh: &TriMesh) -> Result<Vec<u8>, TranscodeError> {
    let mut bin = buffer_bytes(mesh);
    let doc = document(mesh, bin.len(), None)?;
    let mut json = serde_json::to_vec(&doc).map_err(|e| TranscodeError::Encode(e.to_string()))?;
    pad_to_4(&mut json, b' ');
    pad_to_4(&mut bin, 0);

    let total = 12 + 8 + json.len() + 8 + bin.len();
    let total = u32::try_from(total)
        .map_err(|_| TranscodeError::Encode(format!("GLB too large ({total} bytes)")))?;

    let mut out = Vec::with_capacity(total as usize);
    out.extend_from_slice(&GLB_MAGIC.to_le_bytes());
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total.to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);
    Ok(out)
}

/// Encode `mesh` as a self-contained `.gltf` JSON document.
pub fn encode_gltf(mesh: &TriMesh) -> Result<Vec<u8>, TranscodeError> {
    let bin = buffer_bytes(mesh);
    let uri = format!(
        "data:application/octet-stream;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&bin)
    );
    let doc = document(mesh, bin.len(), Some(uri))?;
    serde_json::to_vec_pretty(&doc).map_err(|e| TranscodeError::Encode(e.to_string()))
}
