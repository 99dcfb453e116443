/// Indexed triangle mesh built up one triangle at a time
use std::collections::HashMap;
use std::fmt;

use nalgebra::{Point3, Vector3};

use crate::geometry::{BoundingBox, Triangle};

/// Write side of a mesh, as seen by the ingestion job
pub trait MeshSink {
    fn add_triangle(&mut self, triangle: &Triangle);

    /// Translate the mesh so that its bounding box is centred on the origin
    fn center(&mut self);

    fn set_name(&mut self, name: &str);

    fn facet_count(&self) -> usize;

    fn bounding_box(&self) -> BoundingBox;
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshVertex {
    pub point: Point3<f32>,
    facets: Vec<usize>,
}

impl MeshVertex {
    /// Indices of the facets sharing this vertex
    pub fn adjacent_facets(&self) -> &[usize] {
        &self.facets
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    pub vertices: [usize; 3],
    pub normal: Vector3<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub start: usize,
    pub end: usize,
    facet_count: usize,
}

impl Edge {
    pub fn facet_count(&self) -> usize {
        self.facet_count
    }

    /// An edge bordering a gap in the surface: open boundary or non-manifold
    pub fn is_lamina(&self) -> bool {
        self.facet_count != 2
    }
}

/// Triangle mesh with welded vertices, unique edges and facet adjacency.
///
/// Vertices are welded on exact position, which is what STL files rely on
/// to express connectivity.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    name: String,
    vertices: Vec<MeshVertex>,
    facets: Vec<Facet>,
    edges: Vec<Edge>,
    vertex_lookup: HashMap<[u32; 3], usize>,
    edge_lookup: HashMap<(usize, usize), usize>,
    bbox: BoundingBox,
}

fn position_key(p: &Point3<f32>) -> [u32; 3] {
    // -0.0 and 0.0 weld together
    let bits = |v: f32| if v == 0.0 { 0 } else { v.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

impl TriangleMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_triangles<'a>(triangles: impl IntoIterator<Item = &'a Triangle>) -> Self {
        let mut mesh = Self::new();
        for t in triangles {
            mesh.add_triangle(t);
        }
        mesh
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vertices(&self) -> &[MeshVertex] {
        &self.vertices
    }

    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.facets.is_empty()
    }

    pub fn lamina_edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|e| e.is_lamina())
    }

    pub fn facet_points(&self, facet: &Facet) -> [Point3<f32>; 3] {
        facet.vertices.map(|v| self.vertices[v].point)
    }

    /// Smoothed normal: normalised sum of the adjacent facet normals
    pub fn vertex_normal(&self, vertex: usize) -> Vector3<f32> {
        self.vertices[vertex]
            .facets
            .iter()
            .fold(Vector3::zeros(), |acc, &f| acc + self.facets[f].normal)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn area(&self) -> f64 {
        self.facets
            .iter()
            .map(|f| {
                let [a, b, c] = self.facet_points(f);
                0.5 * f64::from((b - a).cross(&(c - a)).norm())
            })
            .sum()
    }

    /// Enclosed volume from signed tetrahedra; only meaningful when closed
    pub fn volume(&self) -> f64 {
        let signed: f64 = self
            .facets
            .iter()
            .map(|f| {
                let [a, b, c] = self.facet_points(f);
                f64::from(a.coords.dot(&b.coords.cross(&c.coords))) / 6.0
            })
            .sum();
        signed.abs()
    }

    /// Closed two-manifold: every edge is shared by exactly two facets
    pub fn is_manifold(&self) -> bool {
        !self.facets.is_empty() && self.edges.iter().all(|e| !e.is_lamina())
    }

    fn weld_vertex(&mut self, point: Point3<f32>) -> usize {
        let key = position_key(&point);
        if let Some(&index) = self.vertex_lookup.get(&key) {
            return index;
        }
        let index = self.vertices.len();
        self.vertices.push(MeshVertex {
            point,
            facets: Vec::new(),
        });
        self.vertex_lookup.insert(key, index);
        self.bbox.extend(&point);
        index
    }

    fn link_edge(&mut self, a: usize, b: usize) {
        let key = (a.min(b), a.max(b));
        match self.edge_lookup.get(&key) {
            Some(&index) => self.edges[index].facet_count += 1,
            None => {
                self.edge_lookup.insert(key, self.edges.len());
                self.edges.push(Edge {
                    start: a,
                    end: b,
                    facet_count: 1,
                });
            }
        }
    }
}

impl MeshSink for TriangleMesh {
    fn add_triangle(&mut self, triangle: &Triangle) {
        let facet_index = self.facets.len();
        let indices = triangle.positions().map(|p| self.weld_vertex(p));

        for (i, &v) in indices.iter().enumerate() {
            // A degenerate triangle can repeat a vertex; link it once
            if !indices[..i].contains(&v) {
                self.vertices[v].facets.push(facet_index);
            }
        }
        for i in 0..3 {
            let (a, b) = (indices[i], indices[(i + 1) % 3]);
            if a != b {
                self.link_edge(a, b);
            }
        }

        self.facets.push(Facet {
            vertices: indices,
            normal: triangle.calculate_normal(),
        });
    }

    fn center(&mut self) {
        if self.bbox.is_empty() {
            return;
        }
        let offset = self.bbox.center().coords;
        for v in &mut self.vertices {
            v.point -= offset;
        }

        self.vertex_lookup = self
            .vertices
            .iter()
            .enumerate()
            .map(|(i, v)| (position_key(&v.point), i))
            .collect();
        self.bbox = BoundingBox::from_points(self.vertices.iter().map(|v| &v.point));
    }

    fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    fn facet_count(&self) -> usize {
        self.facets.len()
    }

    fn bounding_box(&self) -> BoundingBox {
        self.bbox
    }
}

/// Summary statistics reported to the user about a loaded mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshInfo {
    pub name: String,
    pub facets: usize,
    pub edges: usize,
    pub vertices: usize,
    pub lamina_edges: usize,
    pub volume: f64,
    pub area: f64,
    pub closed: bool,
    pub extents: Option<Vector3<f32>>,
}

impl MeshInfo {
    pub fn of(mesh: &TriangleMesh) -> Self {
        let bbox = mesh.bounding_box();
        Self {
            name: mesh.name().to_string(),
            facets: mesh.facets().len(),
            edges: mesh.edges().len(),
            vertices: mesh.vertices().len(),
            lamina_edges: mesh.lamina_edges().count(),
            volume: mesh.volume(),
            area: mesh.area(),
            closed: mesh.is_manifold(),
            extents: (!bbox.is_empty()).then(|| bbox.extents()),
        }
    }

    pub fn euler_characteristic(&self) -> i64 {
        self.vertices as i64 - self.edges as i64 + self.facets as i64
    }
}

impl fmt::Display for MeshInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name: {}", self.name)?;
        writeln!(f, "Number of facets: {}", self.facets)?;
        writeln!(f, "Number of edges: {}", self.edges)?;
        writeln!(f, "Number of vertices: {}", self.vertices)?;
        writeln!(f, "Euler characteristic: {}", self.euler_characteristic())?;
        writeln!(f, "Number of lamina edges: {}", self.lamina_edges)?;
        writeln!(f, "Volume: {}", self.volume)?;
        writeln!(f, "Area: {}", self.area)?;
        writeln!(f, "Is Closed: {}", if self.closed { "TRUE" } else { "FALSE" })?;
        writeln!(f)?;
        writeln!(f, "BBox dimensions:")?;
        match self.extents {
            Some(e) => write!(f, "X: {:.4} Y: {:.4} Z: {:.4}", e.x, e.y, e.z),
            None => write!(f, "(empty)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{cube_triangles, Vertex};
    use approx::assert_relative_eq;

    fn single_triangle() -> Triangle {
        Triangle::new(
            Vertex::at(0.0, 0.0, 0.0),
            Vertex::at(1.0, 0.0, 0.0),
            Vertex::at(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_cube_topology() {
        let mesh = TriangleMesh::from_triangles(&cube_triangles(2.0));

        assert_eq!(mesh.facet_count(), 12);
        assert_eq!(mesh.vertices().len(), 8);
        assert_eq!(mesh.edges().len(), 18);
        assert_eq!(mesh.lamina_edges().count(), 0);
        assert!(mesh.is_manifold());
        assert_relative_eq!(mesh.volume(), 8.0, epsilon = 1e-5);
        assert_relative_eq!(mesh.area(), 24.0, epsilon = 1e-5);
        assert_eq!(MeshInfo::of(&mesh).euler_characteristic(), 2);
    }

    #[test]
    fn test_open_triangle_is_all_lamina() {
        let mesh = TriangleMesh::from_triangles(&[single_triangle()]);

        assert_eq!(mesh.edges().len(), 3);
        assert!(mesh.edges().iter().all(Edge::is_lamina));
        assert!(!mesh.is_manifold());
        assert_relative_eq!(mesh.facets()[0].normal, Vector3::z());
    }

    #[test]
    fn test_welding_shares_vertices() {
        let t1 = single_triangle();
        let t2 = Triangle::new(
            Vertex::at(1.0, 0.0, 0.0),
            Vertex::at(1.0, 1.0, 0.0),
            Vertex::at(0.0, 1.0, 0.0),
        );
        let mesh = TriangleMesh::from_triangles(&[t1, t2]);

        assert_eq!(mesh.vertices().len(), 4);
        assert_eq!(mesh.edges().len(), 5);
        assert_eq!(mesh.lamina_edges().count(), 4);
        assert_eq!(mesh.vertices()[1].adjacent_facets(), &[0, 1]);
    }

    #[test]
    fn test_center_moves_bbox_to_origin() {
        let shifted: Vec<Triangle> = cube_triangles(2.0)
            .into_iter()
            .map(|mut t| {
                for v in &mut t.vertices {
                    v.position += Vector3::new(10.0, -4.0, 3.0);
                }
                t
            })
            .collect();
        let mut mesh = TriangleMesh::from_triangles(&shifted);
        mesh.center();

        assert_relative_eq!(mesh.bounding_box().center(), Point3::origin());
        assert_relative_eq!(mesh.bounding_box().max_extent(), 2.0);

        // Welding still works against the centred positions
        mesh.add_triangle(&Triangle::new(
            Vertex::at(1.0, 1.0, 1.0),
            Vertex::at(-1.0, 1.0, 1.0),
            Vertex::at(0.0, 5.0, 0.0),
        ));
        assert_eq!(mesh.vertices().len(), 9);
    }

    #[test]
    fn test_vertex_normal_averages_neighbours() {
        let mesh = TriangleMesh::from_triangles(&cube_triangles(2.0));
        let corner = mesh
            .vertices()
            .iter()
            .position(|v| v.point == Point3::new(1.0, 1.0, 1.0))
            .expect("corner vertex");

        let n = mesh.vertex_normal(corner);
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-6);
        assert!(n.x > 0.0 && n.y > 0.0 && n.z > 0.0);
    }

    #[test]
    fn test_mesh_info_report() {
        let mut mesh = TriangleMesh::from_triangles(&cube_triangles(2.0));
        mesh.set_name("cube");
        let report = MeshInfo::of(&mesh).to_string();

        assert!(report.starts_with("Name: cube\n"));
        assert!(report.contains("Is Closed: TRUE"));
        assert!(report.contains("X: 2.0000 Y: 2.0000 Z: 2.0000"));
    }
}
