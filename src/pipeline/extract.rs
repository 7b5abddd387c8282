//! Reference extraction: find every `<mesh>` node of a scene document.
//!
//! The document is scanned with a streaming `quick-xml` reader rather than
//! built into a DOM. Besides the URI text and scale of each mesh node we
//! record the byte span of the URI text node, which lets the structural
//! rewrite mode replace exactly that node later.
//!
//! Only direct `<uri>` and `<scale>` children of a `<mesh>` element count;
//! the first of each wins. Namespace prefixes are ignored.

use crate::error::MeshConvError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Unit scale, used when the `<scale>` child is absent or malformed.
pub const UNIT_SCALE: [f64; 3] = [1.0, 1.0, 1.0];

/// One mesh node found in a scene document.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshReference {
    /// URI text with surrounding whitespace trimmed and entities unescaped.
    pub raw_uri: String,
    /// Per-axis scale; [`UNIT_SCALE`] when absent or malformed.
    pub scale: [f64; 3],
    /// Document the reference was found in.
    pub source_document: PathBuf,
    /// Byte range of the `<uri>` element's content in the document text.
    pub uri_span: Range<usize>,
}

/// Parse `<scale>` text.
///
/// One token `s` means `(s, s, s)`; three tokens are taken as-is. Any other
/// token count, or any token that is not a number, resets to unit scale.
pub fn parse_scale(text: &str) -> [f64; 3] {
    let parsed: Result<Vec<f64>, _> = text.split_whitespace().map(str::parse::<f64>).collect();
    match parsed.as_deref() {
        Ok([s]) => [*s, *s, *s],
        Ok([x, y, z]) => [*x, *y, *z],
        _ => UNIT_SCALE,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Uri,
    Scale,
}

/// In-progress state for one open `<mesh>` element.
#[derive(Debug, Default)]
struct OpenMesh {
    depth: usize,
    uri: Option<(String, Range<usize>)>,
    scale: Option<String>,
}

/// Capture of the text content of a `<uri>`/`<scale>` child.
struct Capture {
    field: Field,
    depth: usize,
    start: usize,
    text: String,
}

/// Extract every mesh reference from `text`.
///
/// # Errors
/// [`MeshConvError::ParseFailure`] when the document is not well-formed XML
/// or has no root element.
pub fn extract_references(text: &str, document: &Path) -> Result<Vec<MeshReference>, MeshConvError> {
    let parse_err = |detail: String| MeshConvError::ParseFailure {
        path: document.to_path_buf(),
        detail,
    };

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut refs = Vec::new();
    let mut depth = 0usize;
    let mut saw_root = false;
    let mut meshes: Vec<OpenMesh> = Vec::new();
    let mut capture: Option<Capture> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| parse_err(format!("at byte {}: {}", reader.buffer_position(), e)))?;

        match event {
            Event::Start(e) => {
                depth += 1;
                saw_root = true;
                let name = e.local_name();
                let name = name.as_ref();
                if name == b"mesh" {
                    meshes.push(OpenMesh {
                        depth,
                        ..Default::default()
                    });
                } else if capture.is_none() {
                    if let Some(mesh) = meshes.last() {
                        if mesh.depth + 1 == depth {
                            let field = match name {
                                b"uri" if mesh.uri.is_none() => Some(Field::Uri),
                                b"scale" if mesh.scale.is_none() => Some(Field::Scale),
                                _ => None,
                            };
                            if let Some(field) = field {
                                capture = Some(Capture {
                                    field,
                                    depth,
                                    start: reader.buffer_position() as usize,
                                    text: String::new(),
                                });
                            }
                        }
                    }
                }
            }
            Event::Empty(_) => {
                saw_root = true;
            }
            Event::Text(e) => {
                if let Some(cap) = capture.as_mut() {
                    let unescaped = e
                        .unescape()
                        .map_err(|err| parse_err(format!("in <uri>/<scale>: {err}")))?;
                    cap.text.push_str(&unescaped);
                }
            }
            Event::CData(e) => {
                if let Some(cap) = capture.as_mut() {
                    cap.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(e) => {
                if let Some(cap) = capture.take_if(|c| c.depth == depth) {
                    // The closing tag is the last `</` before the reader position.
                    let after = reader.buffer_position() as usize;
                    let end = text[..after].rfind("</").unwrap_or(after).max(cap.start);
                    if let Some(mesh) = meshes.last_mut() {
                        match cap.field {
                            Field::Uri => mesh.uri = Some((cap.text, cap.start..end)),
                            Field::Scale => mesh.scale = Some(cap.text),
                        }
                    }
                }
                if e.local_name().as_ref() == b"mesh"
                    && meshes.last().is_some_and(|m| m.depth == depth)
                {
                    if let Some(mesh) = meshes.pop() {
                        push_reference(&mut refs, mesh, document);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(parse_err(format!("{depth} element(s) left unclosed")));
    }
    if !saw_root {
        return Err(parse_err("no root element".to_string()));
    }

    debug!(
        "Extracted {} mesh reference(s) from {}",
        refs.len(),
        document.display()
    );
    Ok(refs)
}

fn push_reference(refs: &mut Vec<MeshReference>, mesh: OpenMesh, document: &Path) {
    let Some((uri, span)) = mesh.uri else {
        debug!("Mesh node without <uri> in {}", document.display());
        return;
    };
    let raw_uri = uri.trim().to_string();
    if raw_uri.is_empty() {
        warn!("Empty mesh <uri> in {}", document.display());
        return;
    }
    let scale = mesh.scale.as_deref().map(parse_scale).unwrap_or(UNIT_SCALE);
    refs.push(MeshReference {
        raw_uri,
        scale,
        source_document: document.to_path_buf(),
        uri_span: span,
    });
}
