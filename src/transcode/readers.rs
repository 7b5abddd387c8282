//! Mesh readers for the supported source formats.
//!
//! Every reader takes the raw file bytes and returns one flattened
//! [`TriMesh`]. Only positions and faces are read; normals, texture
//! coordinates, colours and materials are dropped. Polygons are fan
//! triangulated.

use super::mesh::TriMesh;
use crate::error::TranscodeError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::path::Path;

// ── STL ──────────────────────────────────────────────────────────────────

const STL_HEADER_LEN: usize = 80;
const STL_TRIANGLE_LEN: usize = 50;

/// Read binary or ASCII STL.
///
/// A file is binary when its length matches the triangle count in the
/// header exactly. ASCII files starting with `solid` are the fallback.
pub fn read_stl(path: &Path, bytes: &[u8]) -> Result<TriMesh, TranscodeError> {
    if let Some(count) = binary_stl_count(bytes) {
        return read_stl_binary(bytes, count);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| TranscodeError::malformed("STL", path, "neither binary nor ASCII"))?;
    if !text.trim_start().starts_with("solid") {
        return Err(TranscodeError::malformed(
            "STL",
            path,
            "binary size mismatch and no `solid` keyword",
        ));
    }
    read_stl_ascii(path, text)
}

fn binary_stl_count(bytes: &[u8]) -> Option<usize> {
    let raw = bytes.get(STL_HEADER_LEN..STL_HEADER_LEN + 4)?;
    let count = u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let expected = STL_HEADER_LEN + 4 + count.checked_mul(STL_TRIANGLE_LEN)?;
    (expected == bytes.len()).then_some(count)
}

fn read_stl_binary(bytes: &[u8], count: usize) -> Result<TriMesh, TranscodeError> {
    let mut mesh = TriMesh::new();
    mesh.positions.reserve(count * 3);
    mesh.indices.reserve(count * 3);
    let body = &bytes[STL_HEADER_LEN + 4..];
    for tri in body.chunks_exact(STL_TRIANGLE_LEN) {
        // 12 bytes normal, 3 x 12 bytes vertices, 2 bytes attribute.
        for v in 0..3 {
            let off = 12 + v * 12;
            let p = [
                le_f32(&tri[off..off + 4]),
                le_f32(&tri[off + 4..off + 8]),
                le_f32(&tri[off + 8..off + 12]),
            ];
            let i = mesh.push_vertex(p);
            mesh.indices.push(i);
        }
    }
    Ok(mesh)
}

fn read_stl_ascii(path: &Path, text: &str) -> Result<TriMesh, TranscodeError> {
    let mut mesh = TriMesh::new();
    let mut facet: Vec<u32> = Vec::with_capacity(3);
    for (line_no, line) in text.lines().enumerate() {
        let mut it = line.split_whitespace();
        match it.next() {
            Some("vertex") => {
                let p = parse_xyz(&mut it).ok_or_else(|| {
                    TranscodeError::malformed("STL", path, format!("bad vertex at line {}", line_no + 1))
                })?;
                facet.push(mesh.push_vertex(p));
            }
            Some("endloop") => {
                mesh.push_polygon(&facet);
                facet.clear();
            }
            _ => {}
        }
    }
    Ok(mesh)
}

// ── OBJ ──────────────────────────────────────────────────────────────────

/// Read Wavefront OBJ `v` and `f` records. Groups and objects are merged.
pub fn read_obj(path: &Path, bytes: &[u8]) -> Result<TriMesh, TranscodeError> {
    let text = String::from_utf8_lossy(bytes);
    let mut mesh = TriMesh::new();
    let mut corners: Vec<u32> = Vec::new();

    for (line_no, raw_line) in text.lines().enumerate() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        let mut it = line.split_whitespace();
        match it.next() {
            Some("v") => {
                let p = parse_xyz(&mut it).ok_or_else(|| {
                    TranscodeError::malformed("OBJ", path, format!("bad vertex at line {}", line_no + 1))
                })?;
                mesh.push_vertex(p);
            }
            Some("f") => {
                corners.clear();
                for token in it {
                    let vi = token.split('/').next().unwrap_or("");
                    let idx = obj_index(vi, mesh.vertex_count()).ok_or_else(|| {
                        TranscodeError::malformed(
                            "OBJ",
                            path,
                            format!("bad face index '{token}' at line {}", line_no + 1),
                        )
                    })?;
                    corners.push(idx);
                }
                if corners.len() < 3 {
                    return Err(TranscodeError::malformed(
                        "OBJ",
                        path,
                        format!("face with fewer than 3 vertices at line {}", line_no + 1),
                    ));
                }
                mesh.push_polygon(&corners);
            }
            _ => {}
        }
    }
    Ok(mesh)
}

/// Resolve a 1-based (or negative, relative) OBJ index to 0-based.
fn obj_index(token: &str, count: usize) -> Option<u32> {
    let i: i64 = token.parse().ok()?;
    let resolved = match i {
        0 => return None,
        i if i > 0 => i - 1,
        i => count as i64 + i,
    };
    (0..count as i64).contains(&resolved).then_some(resolved as u32)
}

// ── OFF ──────────────────────────────────────────────────────────────────

/// Read Object File Format. Per-face colours after the index list are ignored.
pub fn read_off(path: &Path, bytes: &[u8]) -> Result<TriMesh, TranscodeError> {
    let text = String::from_utf8_lossy(bytes);
    let err = |detail: &str| TranscodeError::malformed("OFF", path, detail);
    let mut lines = text
        .lines()
        .map(|l| l.split('#').next().unwrap_or("").trim())
        .filter(|l| !l.is_empty());

    let header = lines.next().ok_or_else(|| err("empty file"))?;
    let rest = header
        .strip_prefix("OFF")
        .ok_or_else(|| err("missing OFF keyword"))?;
    let counts_line = if rest.trim().is_empty() {
        lines.next().ok_or_else(|| err("missing counts"))?
    } else {
        rest
    };
    let counts: Vec<usize> = counts_line
        .split_whitespace()
        .map(str::parse::<usize>)
        .collect::<Result<_, _>>()
        .map_err(|_| err("bad counts line"))?;
    let (nv, nf) = match counts.as_slice() {
        [nv, nf, ..] => (*nv, *nf),
        _ => return Err(err("bad counts line")),
    };

    let mut mesh = TriMesh::new();
    for _ in 0..nv {
        let line = lines.next().ok_or_else(|| err("truncated vertex list"))?;
        let p = parse_xyz(&mut line.split_whitespace()).ok_or_else(|| err("bad vertex"))?;
        mesh.push_vertex(p);
    }
    let mut corners = Vec::new();
    for _ in 0..nf {
        let line = lines.next().ok_or_else(|| err("truncated face list"))?;
        let mut it = line.split_whitespace().map(str::parse::<u32>);
        let n = it
            .next()
            .and_then(Result::ok)
            .ok_or_else(|| err("bad face"))? as usize;
        corners.clear();
        for _ in 0..n {
            let i = it.next().and_then(Result::ok).ok_or_else(|| err("bad face"))?;
            corners.push(i);
        }
        mesh.push_polygon(&corners);
    }
    mesh.validate().map_err(|d| err(&d))?;
    Ok(mesh)
}

// ── PLY ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlyScalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}

impl PlyScalar {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "char" | "int8" => Self::I8,
            "uchar" | "uint8" => Self::U8,
            "short" | "int16" => Self::I16,
            "ushort" | "uint16" => Self::U16,
            "int" | "int32" => Self::I32,
            "uint" | "uint32" => Self::U32,
            "float" | "float32" => Self::F32,
            "double" | "float64" => Self::F64,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

#[derive(Debug, Clone)]
enum PlyProperty {
    Scalar { name: String, ty: PlyScalar },
    List { name: String, count: PlyScalar, item: PlyScalar },
}

#[derive(Debug, Clone)]
struct PlyElement {
    name: String,
    count: usize,
    properties: Vec<PlyProperty>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PlyEncoding {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

/// Sequential value source over the PLY body.
enum PlyBody<'a> {
    Ascii(std::str::SplitAsciiWhitespace<'a>),
    Binary { data: &'a [u8], pos: usize, big_endian: bool },
}

impl PlyBody<'_> {
    fn next(&mut self, ty: PlyScalar) -> Option<f64> {
        match self {
            PlyBody::Ascii(tokens) => tokens.next()?.parse().ok(),
            PlyBody::Binary { data, pos, big_endian } => {
                let raw = data.get(*pos..*pos + ty.size())?;
                *pos += ty.size();
                let mut buf = [0u8; 8];
                buf[..raw.len()].copy_from_slice(raw);
                if *big_endian {
                    buf[..raw.len()].reverse();
                }
                let v = match ty {
                    PlyScalar::I8 => buf[0] as i8 as f64,
                    PlyScalar::U8 => buf[0] as f64,
                    PlyScalar::I16 => i16::from_le_bytes([buf[0], buf[1]]) as f64,
                    PlyScalar::U16 => u16::from_le_bytes([buf[0], buf[1]]) as f64,
                    PlyScalar::I32 => i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
                    PlyScalar::U32 => u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
                    PlyScalar::F32 => f32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]) as f64,
                    PlyScalar::F64 => f64::from_le_bytes(buf),
                };
                Some(v)
            }
        }
    }
}

/// Read PLY (ASCII, binary little or big endian).
///
/// Vertex `x`/`y`/`z` and the face `vertex_indices` (or `vertex_index`)
/// list are used; other elements and properties are skipped.
pub fn read_ply(path: &Path, bytes: &[u8]) -> Result<TriMesh, TranscodeError> {
    let err = |detail: String| TranscodeError::malformed("PLY", path, detail);

    let marker = b"end_header";
    let header_end = bytes
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| err("missing end_header".into()))?;
    let body_start = bytes[header_end..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|p| header_end + p + 1)
        .unwrap_or(bytes.len());
    let header = std::str::from_utf8(&bytes[..header_end])
        .map_err(|_| err("header is not UTF-8".into()))?;

    let (encoding, elements) = parse_ply_header(header).map_err(err)?;
    let body = &bytes[body_start..];
    let mut source = match encoding {
        PlyEncoding::Ascii => PlyBody::Ascii(
            std::str::from_utf8(body)
                .map_err(|_| err("ASCII body is not UTF-8".into()))?
                .split_ascii_whitespace(),
        ),
        PlyEncoding::BinaryLittleEndian | PlyEncoding::BinaryBigEndian => PlyBody::Binary {
            data: body,
            pos: 0,
            big_endian: encoding == PlyEncoding::BinaryBigEndian,
        },
    };

    let mut mesh = TriMesh::new();
    let mut corners = Vec::new();
    for element in &elements {
        let is_vertex = element.name == "vertex";
        let is_face = element.name == "face";
        let axis_of = |name: &str| match name {
            "x" => Some(0),
            "y" => Some(1),
            "z" => Some(2),
            _ => None,
        };
        for row in 0..element.count {
            let mut p = [0f32; 3];
            for prop in &element.properties {
                let truncated = || err(format!("{} {} is truncated", element.name, row));
                match prop {
                    PlyProperty::Scalar { name, ty } => {
                        let v = source.next(*ty).ok_or_else(truncated)?;
                        if is_vertex {
                            if let Some(axis) = axis_of(name) {
                                p[axis] = v as f32;
                            }
                        }
                    }
                    PlyProperty::List { name, count, item } => {
                        let n = source.next(*count).ok_or_else(truncated)? as usize;
                        let keep = is_face && (name == "vertex_indices" || name == "vertex_index");
                        corners.clear();
                        for _ in 0..n {
                            let v = source.next(*item).ok_or_else(truncated)?;
                            if keep {
                                corners.push(v as u32);
                            }
                        }
                        if keep {
                            mesh.push_polygon(&corners);
                        }
                    }
                }
            }
            if is_vertex {
                mesh.push_vertex(p);
            }
        }
    }
    mesh.validate().map_err(err)?;
    Ok(mesh)
}

fn parse_ply_header(header: &str) -> Result<(PlyEncoding, Vec<PlyElement>), String> {
    let mut lines = header.lines().map(str::trim);
    if lines.next() != Some("ply") {
        return Err("missing `ply` magic".into());
    }
    let mut encoding = None;
    let mut elements: Vec<PlyElement> = Vec::new();
    for line in lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["format", fmt, ..] => {
                encoding = Some(match *fmt {
                    "ascii" => PlyEncoding::Ascii,
                    "binary_little_endian" => PlyEncoding::BinaryLittleEndian,
                    "binary_big_endian" => PlyEncoding::BinaryBigEndian,
                    other => return Err(format!("unknown format '{other}'")),
                });
            }
            ["element", name, count] => elements.push(PlyElement {
                name: name.to_string(),
                count: count.parse().map_err(|_| format!("bad element count '{count}'"))?,
                properties: Vec::new(),
            }),
            ["property", "list", count, item, name] => {
                let prop = PlyProperty::List {
                    name: name.to_string(),
                    count: PlyScalar::parse(count).ok_or_else(|| format!("unknown type '{count}'"))?,
                    item: PlyScalar::parse(item).ok_or_else(|| format!("unknown type '{item}'"))?,
                };
                elements
                    .last_mut()
                    .ok_or("property before any element")?
                    .properties
                    .push(prop);
            }
            ["property", ty, name] => {
                let prop = PlyProperty::Scalar {
                    name: name.to_string(),
                    ty: PlyScalar::parse(ty).ok_or_else(|| format!("unknown type '{ty}'"))?,
                };
                elements
                    .last_mut()
                    .ok_or("property before any element")?
                    .properties
                    .push(prop);
            }
            _ => {}
        }
    }
    let encoding = encoding.ok_or("missing format line")?;
    Ok((encoding, elements))
}

// ── COLLADA ──────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct DaeInput {
    semantic: String,
    source: String,
    offset: usize,
}

#[derive(Debug, Default)]
struct DaePrimitive {
    inputs: Vec<DaeInput>,
    vcount: Vec<usize>,
    /// One entry per `<p>`.
    p: Vec<Vec<u32>>,
    /// `<triangles>` rather than `<polylist>`/`<polygons>`.
    triangles: bool,
}

#[derive(Debug, Default)]
struct DaeMesh {
    /// `<source>` id -> (float array, accessor stride).
    sources: HashMap<String, (Vec<f32>, usize)>,
    /// `<vertices>` id -> POSITION source id.
    vertices: HashMap<String, String>,
    primitives: Vec<DaePrimitive>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DaeText {
    FloatArray,
    P,
    VCount,
}

fn attr(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn strip_hash(s: &str) -> String {
    s.trim_start_matches('#').to_string()
}

/// Read every `<geometry>` of a COLLADA document into one mesh.
///
/// Node transforms from the visual scene are not applied.
pub fn read_dae(path: &Path, bytes: &[u8]) -> Result<TriMesh, TranscodeError> {
    let err = |detail: String| TranscodeError::malformed("COLLADA", path, detail);
    let text = std::str::from_utf8(bytes).map_err(|_| err("document is not UTF-8".into()))?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut out = TriMesh::new();
    let mut current: Option<DaeMesh> = None;
    let mut source_id: Option<String> = None;
    let mut vertices_id: Option<String> = None;
    let mut primitive: Option<DaePrimitive> = None;
    let mut text_target: Option<DaeText> = None;
    let mut buffer = String::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| err(format!("at byte {}: {}", reader.buffer_position(), e)))?;
        match event {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"mesh" => current = Some(DaeMesh::default()),
                    b"source" if current.is_some() && primitive.is_none() => {
                        source_id = attr(&e, b"id");
                    }
                    b"float_array" if source_id.is_some() => {
                        text_target = Some(DaeText::FloatArray);
                        buffer.clear();
                    }
                    b"accessor" => {
                        if let (Some(mesh), Some(id), Some(stride)) =
                            (current.as_mut(), source_id.as_ref(), attr(&e, b"stride"))
                        {
                            if let (Some(entry), Ok(stride)) = (mesh.sources.get_mut(id), stride.parse()) {
                                entry.1 = stride;
                            }
                        }
                    }
                    b"vertices" if current.is_some() => vertices_id = attr(&e, b"id"),
                    b"triangles" | b"polylist" | b"polygons" if current.is_some() => {
                        primitive = Some(DaePrimitive {
                            triangles: name.as_ref() == b"triangles",
                            ..Default::default()
                        });
                    }
                    b"input" => {
                        let semantic = attr(&e, b"semantic").unwrap_or_default();
                        let source = strip_hash(&attr(&e, b"source").unwrap_or_default());
                        if let Some(prim) = primitive.as_mut() {
                            let offset = attr(&e, b"offset")
                                .and_then(|o| o.parse().ok())
                                .unwrap_or(0);
                            prim.inputs.push(DaeInput { semantic, source, offset });
                        } else if let (Some(mesh), Some(id)) = (current.as_mut(), vertices_id.as_ref()) {
                            if semantic == "POSITION" {
                                mesh.vertices.insert(id.clone(), source);
                            }
                        }
                    }
                    b"p" if primitive.is_some() => {
                        text_target = Some(DaeText::P);
                        buffer.clear();
                    }
                    b"vcount" if primitive.is_some() => {
                        text_target = Some(DaeText::VCount);
                        buffer.clear();
                    }
                    _ => {}
                }
            }
            Event::Text(e) => {
                if text_target.is_some() {
                    let t = e.unescape().map_err(|x| err(x.to_string()))?;
                    buffer.push_str(&t);
                    buffer.push(' ');
                }
            }
            Event::End(e) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"float_array" if text_target == Some(DaeText::FloatArray) => {
                        text_target = None;
                        let values = parse_numbers::<f32>(&buffer)
                            .ok_or_else(|| err("bad float_array".into()))?;
                        if let (Some(mesh), Some(id)) = (current.as_mut(), source_id.as_ref()) {
                            mesh.sources.insert(id.clone(), (values, 3));
                        }
                    }
                    b"p" if text_target == Some(DaeText::P) => {
                        text_target = None;
                        let values =
                            parse_numbers::<u32>(&buffer).ok_or_else(|| err("bad <p> list".into()))?;
                        if let Some(prim) = primitive.as_mut() {
                            prim.p.push(values);
                        }
                    }
                    b"vcount" if text_target == Some(DaeText::VCount) => {
                        text_target = None;
                        let values = parse_numbers::<usize>(&buffer)
                            .ok_or_else(|| err("bad <vcount> list".into()))?;
                        if let Some(prim) = primitive.as_mut() {
                            prim.vcount = values;
                        }
                    }
                    b"source" if primitive.is_none() => source_id = None,
                    b"vertices" => vertices_id = None,
                    b"triangles" | b"polylist" | b"polygons" => {
                        if let (Some(mesh), Some(prim)) = (current.as_mut(), primitive.take()) {
                            mesh.primitives.push(prim);
                        }
                    }
                    b"mesh" => {
                        if let Some(mesh) = current.take() {
                            let part = build_dae_mesh(&mesh).map_err(err)?;
                            out.append(&part);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(out)
}

fn build_dae_mesh(mesh: &DaeMesh) -> Result<TriMesh, String> {
    let mut out = TriMesh::new();
    for prim in &mesh.primitives {
        let Some(vertex_input) = prim
            .inputs
            .iter()
            .find(|i| i.semantic == "VERTEX" || i.semantic == "POSITION")
        else {
            continue;
        };
        let source_id = mesh
            .vertices
            .get(&vertex_input.source)
            .unwrap_or(&vertex_input.source);
        let (floats, stride) = mesh
            .sources
            .get(source_id)
            .ok_or_else(|| format!("position source '{source_id}' not found"))?;
        let stride = (*stride).max(3);
        let index_stride = prim.inputs.iter().map(|i| i.offset).max().unwrap_or(0) + 1;

        // Positions are emitted per primitive so each keeps its own indexing.
        let base = out.vertex_count() as u32;
        for chunk in floats.chunks_exact(stride) {
            out.push_vertex([chunk[0], chunk[1], chunk[2]]);
        }
        let vertex_count = out.vertex_count() as u32 - base;

        let corner = |p: &[u32], c: usize| -> Result<u32, String> {
            let v = *p
                .get(c * index_stride + vertex_input.offset)
                .ok_or("index list is truncated")?;
            if v >= vertex_count {
                return Err(format!("vertex index {v} out of range ({vertex_count})"));
            }
            Ok(base + v)
        };

        let mut corners = Vec::new();
        if prim.triangles {
            for p in &prim.p {
                let n = p.len() / index_stride;
                for c in 0..n - n % 3 {
                    out.indices.push(corner(p, c)?);
                }
            }
        } else if !prim.vcount.is_empty() {
            let p = prim.p.first().map(Vec::as_slice).unwrap_or(&[]);
            let mut c = 0;
            for &n in &prim.vcount {
                corners.clear();
                for k in 0..n {
                    corners.push(corner(p, c + k)?);
                }
                out.push_polygon(&corners);
                c += n;
            }
        } else {
            for p in &prim.p {
                corners.clear();
                for c in 0..p.len() / index_stride {
                    corners.push(corner(p, c)?);
                }
                out.push_polygon(&corners);
            }
        }
    }
    Ok(out)
}

// ── helpers ──────────────────────────────────────────────────────────────

fn le_f32(b: &[u8]) -> f32 {
    f32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn parse_xyz<'a>(it: &mut impl Iterator<Item = &'a str>) -> Option<[f32; 3]> {
    let x = it.next()?.parse().ok()?;
    let y = it.next()?.parse().ok()?;
    let z = it.next()?.parse().ok()?;
    Some([x, y, z])
}

fn parse_numbers<T: std::str::FromStr>(text: &str) -> Option<Vec<T>> {
    text.split_ascii_whitespace().map(|t| t.parse().ok()).collect()
}
