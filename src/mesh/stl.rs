//! STL encoding, decoding and export.
//!
//! Binary layout:
//!
//! ```text
//! UINT8[80]    header (ignored on read)
//! UINT32       triangle count, little endian
//! foreach triangle
//!     REAL32[3] normal
//!     REAL32[9] three vertices
//!     UINT16    attribute byte count, always 0
//! end
//! ```
//!
//! The ASCII form writes floats in their shortest round-trip notation so a
//! decoded mesh is bit-identical to the encoded one.

use std::collections::HashMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::Mesh;
use crate::error::{LithoError, Result};

const HEADER_SIZE: usize = 80;
const TRIANGLE_SIZE: usize = 50;

/// Binary header. Must not start with "solid" or readers take it for ASCII.
const BINARY_HEADER: &[u8] = b"lithophane binary STL";

/// Solid name used in ASCII output
pub const DEFAULT_SOLID_NAME: &str = "lithophane";

/// Output encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StlFormat {
    #[default]
    Binary,
    Ascii,
}

/// Write `mesh` as binary STL
pub fn write_binary<W: Write>(writer: &mut W, mesh: &Mesh) -> io::Result<()> {
    let mut header = [0u8; HEADER_SIZE];
    header[..BINARY_HEADER.len()].copy_from_slice(BINARY_HEADER);
    writer.write_all(&header)?;

    let count = u32::try_from(mesh.triangle_count()).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "binary STL holds at most u32::MAX triangles",
        )
    })?;
    writer.write_all(&count.to_le_bytes())?;

    for tri in mesh.iter_triangles() {
        for &n in &tri.normal {
            writer.write_all(&n.to_le_bytes())?;
        }
        for vertex in &tri.vertices {
            for &coord in vertex {
                writer.write_all(&coord.to_le_bytes())?;
            }
        }
        writer.write_all(&[0u8, 0u8])?;
    }
    Ok(())
}

/// Write `mesh` as ASCII STL named `name`
pub fn write_ascii<W: Write>(writer: &mut W, mesh: &Mesh, name: &str) -> io::Result<()> {
    writeln!(writer, "solid {name}")?;
    for tri in mesh.iter_triangles() {
        let [nx, ny, nz] = tri.normal;
        writeln!(writer, "  facet normal {nx:e} {ny:e} {nz:e}")?;
        writeln!(writer, "    outer loop")?;
        for [x, y, z] in tri.vertices {
            writeln!(writer, "      vertex {x:e} {y:e} {z:e}")?;
        }
        writeln!(writer, "    endloop")?;
        writeln!(writer, "  endfacet")?;
    }
    writeln!(writer, "endsolid {name}")?;
    Ok(())
}

fn write_format<W: Write>(writer: &mut W, mesh: &Mesh, format: StlFormat) -> io::Result<()> {
    match format {
        StlFormat::Binary => write_binary(writer, mesh),
        StlFormat::Ascii => write_ascii(writer, mesh, DEFAULT_SOLID_NAME),
    }
}

/// Encode `mesh` into an in-memory STL document
pub fn encode(mesh: &Mesh, format: StlFormat) -> Result<Vec<u8>> {
    let mut bytes = Vec::with_capacity(estimate_stl_size(mesh.triangle_count()));
    write_format(&mut bytes, mesh, format).map_err(|e| LithoError::io("encoding STL", e))?;
    Ok(bytes)
}

/// Decode binary or ASCII STL into an indexed mesh
///
/// The input is binary when its length matches the count in the header,
/// otherwise it must be ASCII starting with `solid`. Identical vertex
/// positions (by bit pattern) are welded into one index.
pub fn decode(bytes: &[u8]) -> Result<Mesh> {
    if is_binary(bytes) {
        return decode_binary(bytes);
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|_| LithoError::invalid_data("decoding STL", "neither binary nor UTF-8 text"))?;
    if !text.trim_start().starts_with("solid") {
        return Err(LithoError::invalid_data(
            "decoding STL",
            "binary size does not match its triangle count and text does not start with 'solid'",
        ));
    }
    decode_ascii(text)
}

fn is_binary(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE + 4 {
        return false;
    }
    let count = read_u32(&bytes[HEADER_SIZE..]) as u64;
    bytes.len() as u64 == (HEADER_SIZE + 4) as u64 + count * TRIANGLE_SIZE as u64
}

fn read_u32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

fn read_vec3(buf: &[u8]) -> [f32; 3] {
    let f = |k: usize| f32::from_le_bytes([buf[k], buf[k + 1], buf[k + 2], buf[k + 3]]);
    [f(0), f(4), f(8)]
}

fn decode_binary(bytes: &[u8]) -> Result<Mesh> {
    let mut welder = Welder::with_capacity(read_u32(&bytes[HEADER_SIZE..]) as usize);
    for chunk in bytes[HEADER_SIZE + 4..].chunks_exact(TRIANGLE_SIZE) {
        welder.push(
            read_vec3(&chunk[0..12]),
            [
                read_vec3(&chunk[12..24]),
                read_vec3(&chunk[24..36]),
                read_vec3(&chunk[36..48]),
            ],
        );
    }
    Ok(welder.finish())
}

/// Where the ASCII parser is inside the document
#[derive(Debug, Clone, Copy, PartialEq)]
enum AsciiState {
    Start,
    Solid,
    Facet,
    Loop,
    EndLoop,
    Done,
}

fn decode_ascii(text: &str) -> Result<Mesh> {
    let mut welder = Welder::with_capacity(0);
    let mut state = AsciiState::Start;
    let mut normal = [0.0f32; 3];
    let mut corners: Vec<[f32; 3]> = Vec::with_capacity(3);

    for (line_no, line) in text.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&keyword) = parts.first() else {
            continue;
        };
        let bad = |msg: &str| {
            LithoError::invalid_data(
                "decoding ASCII STL",
                format!("line {}: {msg}", line_no + 1),
            )
        };

        state = match (state, keyword) {
            (AsciiState::Start, "solid") => AsciiState::Solid,
            (AsciiState::Solid, "facet") => {
                if parts.get(1) != Some(&"normal") {
                    return Err(bad("expected 'facet normal'"));
                }
                normal = parse_vec3(&parts[2..]).ok_or_else(|| bad("bad facet normal"))?;
                AsciiState::Facet
            }
            (AsciiState::Solid, "endsolid") => AsciiState::Done,
            (AsciiState::Facet, "outer") => {
                if parts.get(1) != Some(&"loop") {
                    return Err(bad("expected 'outer loop'"));
                }
                corners.clear();
                AsciiState::Loop
            }
            (AsciiState::Loop, "vertex") => {
                if corners.len() == 3 {
                    return Err(bad("facet has more than three vertices"));
                }
                corners.push(parse_vec3(&parts[1..]).ok_or_else(|| bad("bad vertex"))?);
                AsciiState::Loop
            }
            (AsciiState::Loop, "endloop") => {
                if corners.len() != 3 {
                    return Err(bad("facet needs exactly three vertices"));
                }
                AsciiState::EndLoop
            }
            (AsciiState::EndLoop, "endfacet") => {
                welder.push(normal, [corners[0], corners[1], corners[2]]);
                AsciiState::Solid
            }
            (AsciiState::Done, _) => return Err(bad("content after 'endsolid'")),
            (state, keyword) => {
                return Err(bad(&format!("unexpected '{keyword}' ({state:?})")));
            }
        };
    }

    if state != AsciiState::Done {
        return Err(LithoError::invalid_data(
            "decoding ASCII STL",
            "document ends before 'endsolid'",
        ));
    }
    Ok(welder.finish())
}

fn parse_vec3(parts: &[&str]) -> Option<[f32; 3]> {
    match parts {
        [x, y, z] => Some([x.parse().ok()?, y.parse().ok()?, z.parse().ok()?]),
        _ => None,
    }
}

/// Builds an indexed mesh from triangle soup, sharing bit-identical vertices
struct Welder {
    index: HashMap<[u32; 3], u32>,
    mesh: Mesh,
}

impl Welder {
    fn with_capacity(triangles: usize) -> Self {
        Self {
            index: HashMap::with_capacity(triangles),
            mesh: Mesh {
                vertices: Vec::with_capacity(triangles),
                triangles: Vec::with_capacity(triangles),
                normals: Vec::with_capacity(triangles),
            },
        }
    }

    fn vertex(&mut self, v: [f32; 3]) -> u32 {
        let key = v.map(f32::to_bits);
        let vertices = &mut self.mesh.vertices;
        *self.index.entry(key).or_insert_with(|| {
            vertices.push(v);
            (vertices.len() - 1) as u32
        })
    }

    fn push(&mut self, normal: [f32; 3], corners: [[f32; 3]; 3]) {
        let tri = corners.map(|v| self.vertex(v));
        self.mesh.triangles.push(tri);
        self.mesh.normals.push(normal);
    }

    fn finish(self) -> Mesh {
        self.mesh
    }
}

/// Get the file size of a binary STL with the given number of triangles
pub fn estimate_stl_size(triangle_count: usize) -> usize {
    // 80 (header) + 4 (count) + triangles * (12 normal + 36 vertices + 2 attribute)
    HEADER_SIZE + 4 + triangle_count * TRIANGLE_SIZE
}

/// Write `mesh` to `path`, replacing any existing file atomically
///
/// The document goes to a temporary file next to `path` first; nothing is
/// left behind when any step fails.
pub fn write_stl(path: &Path, mesh: &Mesh, format: StlFormat) -> Result<()> {
    let context = || format!("writing STL file {}", path.display());
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| LithoError::io(context(), e))?;
    {
        let mut writer = BufWriter::new(&mut tmp);
        write_format(&mut writer, mesh, format)
            .and_then(|_| writer.flush())
            .map_err(|e| LithoError::io(context(), e))?;
    }
    tmp.persist(path)
        .map_err(|e| LithoError::io(context(), e.error))?;
    Ok(())
}

/// Read and decode an STL file
pub fn read_stl(path: &Path) -> Result<Mesh> {
    let bytes = fs::read(path)
        .map_err(|e| LithoError::io(format!("reading STL file {}", path.display()), e))?;
    decode(&bytes)
}
