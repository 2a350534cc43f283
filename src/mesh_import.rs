/// Triangulated mesh import behind the export stage's format seam
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeshImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("mesh has no triangles")]
    Empty,
    #[error("unsupported mesh format `{0}`")]
    UnsupportedFormat(String),
}

/// Triangle soup with resolved per-vertex attributes. `faces` holds index
/// triples into the three parallel attribute arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub faces: Vec<[u32; 3]>,
}

/// Capability interface for loading triangulated geometry from disk.
/// The export stage only sees this seam, so heavyweight format libraries
/// can be swapped in without touching the pipeline.
pub trait MeshImporter {
    fn import(&self, path: &Path) -> Result<TriangleMesh, MeshImportError>;
}

/// Wavefront OBJ importer. Faces are fan-triangulated and every corner is
/// expanded into its own attribute entry.
pub struct ObjImporter;

impl MeshImporter for ObjImporter {
    fn import(&self, path: &Path) -> Result<TriangleMesh, MeshImportError> {
        let extension = path
            .extension()
            .unwrap_or_default()
            .to_string_lossy()
            .to_lowercase();
        if extension != "obj" {
            return Err(MeshImportError::UnsupportedFormat(extension));
        }

        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }
}

impl ObjImporter {
    /// Parses OBJ text into triangle-soup form.
    pub fn parse<R: BufRead>(reader: R) -> Result<TriangleMesh, MeshImportError> {
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut uvs = Vec::new();
        let mut mesh = TriangleMesh::default();

        for line in reader.lines() {
            let line = line?;
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match parts[0] {
                "v" if parts.len() >= 4 => {
                    positions.push(parse_vec3(&parts[1..4], "vertex")?);
                }
                "vn" if parts.len() >= 4 => {
                    normals.push(parse_vec3(&parts[1..4], "normal")?);
                }
                "vt" if parts.len() >= 3 => {
                    let u = parse_float(parts[1], "tex coord u")?;
                    let v = parse_float(parts[2], "tex coord v")?;
                    uvs.push([u, v]);
                }
                "f" if parts.len() >= 4 => {
                    let mut corners = Vec::new();
                    for corner in &parts[1..] {
                        corners.push(resolve_corner(corner, &positions, &normals, &uvs, &mut mesh)?);
                    }
                    // Fan triangulation around the first corner.
                    for i in 1..corners.len() - 1 {
                        mesh.faces.push([corners[0], corners[i], corners[i + 1]]);
                    }
                }
                _ => {}
            }
        }

        if mesh.faces.is_empty() {
            return Err(MeshImportError::Empty);
        }
        Ok(mesh)
    }
}

fn parse_float(token: &str, what: &str) -> Result<f32, MeshImportError> {
    token
        .parse()
        .map_err(|_| MeshImportError::Parse(format!("invalid {what} `{token}`")))
}

fn parse_vec3(tokens: &[&str], what: &str) -> Result<[f32; 3], MeshImportError> {
    Ok([
        parse_float(tokens[0], what)?,
        parse_float(tokens[1], what)?,
        parse_float(tokens[2], what)?,
    ])
}

/// Resolves one `v[/vt[/vn]]` face corner into an expanded vertex and
/// returns its index. OBJ indices are 1-based; texture and normal indices
/// fall back to neutral defaults when absent.
fn resolve_corner(
    corner: &str,
    positions: &[[f32; 3]],
    normals: &[[f32; 3]],
    uvs: &[[f32; 2]],
    mesh: &mut TriangleMesh,
) -> Result<u32, MeshImportError> {
    let indices: Vec<&str> = corner.split('/').collect();

    let position_index = indices[0]
        .parse::<usize>()
        .ok()
        .and_then(|i| i.checked_sub(1))
        .ok_or_else(|| MeshImportError::Parse(format!("invalid face index `{corner}`")))?;
    let position = *positions
        .get(position_index)
        .ok_or_else(|| MeshImportError::Parse(format!("face index `{corner}` out of bounds")))?;

    let uv = indices
        .get(1)
        .filter(|t| !t.is_empty())
        .and_then(|t| t.parse::<usize>().ok())
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| uvs.get(i))
        .copied()
        .unwrap_or([0.0, 0.0]);

    let normal = indices
        .get(2)
        .filter(|t| !t.is_empty())
        .and_then(|t| t.parse::<usize>().ok())
        .and_then(|i| i.checked_sub(1))
        .and_then(|i| normals.get(i))
        .copied()
        .unwrap_or([0.0, 1.0, 0.0]);

    mesh.positions.push(position);
    mesh.normals.push(normal);
    mesh.uvs.push(uv);
    Ok((mesh.positions.len() - 1) as u32)
}
