/// Sequential SMD triangle-stream writing
// https://developer.valvesoftware.com/wiki/SMD
use crate::mesh_import::TriangleMesh;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmdError {
    #[error("failed to write mesh stream: {0}")]
    Io(#[from] std::io::Error),
    #[error("face references vertex {0} outside the attribute arrays")]
    BadIndex(usize),
}

/// Fixed stream preamble: a single root bone and one identity skeleton
/// frame, as expected for static props.
const SMD_HEADER: &str = "version 1\nnodes\n0 \"root\" -1\nend\nskeleton\ntime 0\n0\t0 0 0\t0 0 0\nend\ntriangles\n";

/// Append-only SMD stream builder. Blocks are emitted in call order and
/// nothing may follow [`SmdStream::finish`].
pub struct SmdStream {
    buffer: String,
}

impl SmdStream {
    pub fn new() -> Self {
        Self {
            buffer: SMD_HEADER.to_string(),
        }
    }

    /// Opens one triangle block with its material name line.
    pub fn push_triangle(&mut self, material: &str) {
        self.buffer.push_str(material);
        self.buffer.push('\n');
    }

    /// Appends one vertex record bound to the root bone.
    pub fn push_vertex(&mut self, position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) {
        let _ = writeln!(
            self.buffer,
            "0\t{} {} {}\t{} {} {}\t{} {}",
            position[0], position[1], position[2], normal[0], normal[1], normal[2], uv[0], uv[1],
        );
    }

    /// Terminates the stream. The terminator carries no trailing newline.
    pub fn finish(mut self) -> String {
        self.buffer.push_str("end");
        self.buffer
    }
}

impl Default for SmdStream {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders a triangle mesh as a complete SMD stream, one block per face in
/// face order.
pub fn render_smd(mesh: &TriangleMesh, material: &str) -> Result<String, SmdError> {
    let mut stream = SmdStream::new();
    for face in &mesh.faces {
        stream.push_triangle(material);
        for &corner in face {
            let corner = corner as usize;
            let position = *mesh
                .positions
                .get(corner)
                .ok_or(SmdError::BadIndex(corner))?;
            let normal = *mesh.normals.get(corner).ok_or(SmdError::BadIndex(corner))?;
            let uv = *mesh.uvs.get(corner).ok_or(SmdError::BadIndex(corner))?;
            stream.push_vertex(position, normal, uv);
        }
    }
    Ok(stream.finish())
}

/// Writes the rendered stream to `path`, truncating any previous file.
pub fn write_smd(path: &Path, mesh: &TriangleMesh, material: &str) -> Result<(), SmdError> {
    fs::write(path, render_smd(mesh, material)?)?;
    Ok(())
}
