/// Plain-text vertex export
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::mesh::TriangleMesh;

/// Write every mesh vertex as one `x y z` line
pub fn write_vertices<W: Write>(mesh: &TriangleMesh, mut out: W) -> io::Result<()> {
    for vertex in mesh.vertices() {
        let p = vertex.point;
        writeln!(out, "{} {} {}", p.x, p.y, p.z)?;
    }
    out.flush()
}

/// `<dir>/<stem>-points.txt` next to the source file
pub fn default_export_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mesh".to_string());
    source.with_file_name(format!("{stem}-points.txt"))
}
