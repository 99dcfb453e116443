/// Geometry primitives shared by the importer, the mesh and the scene graph
use nalgebra::{Point3, Vector3};

/// A 3D vertex with position and normal
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, nx: f32, ny: f32, nz: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            normal: Vector3::new(nx, ny, nz),
        }
    }

    /// A vertex with no normal supplied by the producer
    pub fn at(x: f32, y: f32, z: f32) -> Self {
        Self::new(x, y, z, 0.0, 0.0, 0.0)
    }
}

/// A triangle as produced by a triangle stream
#[derive(Debug, Clone, PartialEq)]
pub struct Triangle {
    pub vertices: [Vertex; 3],
}

impl Triangle {
    pub fn new(v0: Vertex, v1: Vertex, v2: Vertex) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    pub fn positions(&self) -> [Point3<f32>; 3] {
        [
            self.vertices[0].position,
            self.vertices[1].position,
            self.vertices[2].position,
        ]
    }

    /// Calculate the face normal from the triangle's vertices.
    ///
    /// Falls back to the producer-supplied normal for degenerate triangles,
    /// and to the zero vector when neither is usable.
    pub fn calculate_normal(&self) -> Vector3<f32> {
        let [v0, v1, v2] = self.positions();
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        edge1
            .cross(&edge2)
            .try_normalize(f32::EPSILON)
            .or_else(|| self.vertices[0].normal.try_normalize(f32::EPSILON))
            .unwrap_or_else(Vector3::zeros)
    }

    pub fn area(&self) -> f32 {
        let [v0, v1, v2] = self.positions();
        0.5 * (v1 - v0).cross(&(v2 - v0)).norm()
    }
}

/// Axis-aligned bounding box.
///
/// `BoundingBox::empty()` is the sentinel for "no geometry"; callers must
/// check `is_empty()` before asking for the center or extents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    min: Point3<f32>,
    max: Point3<f32>,
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3<f32>>) -> Self {
        let mut bbox = Self::empty();
        for p in points {
            bbox.extend(p);
        }
        bbox
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, p: &Point3<f32>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn min(&self) -> Point3<f32> {
        self.assert_not_empty();
        self.min
    }

    pub fn max(&self) -> Point3<f32> {
        self.assert_not_empty();
        self.max
    }

    pub fn center(&self) -> Point3<f32> {
        self.assert_not_empty();
        nalgebra::center(&self.min, &self.max)
    }

    pub fn extents(&self) -> Vector3<f32> {
        self.assert_not_empty();
        self.max - self.min
    }

    pub fn extent_x(&self) -> f32 {
        self.extents().x
    }

    pub fn extent_y(&self) -> f32 {
        self.extents().y
    }

    pub fn extent_z(&self) -> f32 {
        self.extents().z
    }

    pub fn max_extent(&self) -> f32 {
        self.extents().max()
    }

    pub fn diagonal(&self) -> f32 {
        self.extents().norm()
    }

    fn assert_not_empty(&self) {
        assert!(!self.is_empty(), "queried the extent of an empty bounding box");
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

/// Triangles of an axis-aligned cube centred on the origin, wound outwards
pub fn cube_triangles(size: f32) -> Vec<Triangle> {
    let h = size / 2.0;
    let quad = |a: [f32; 3], b: [f32; 3], c: [f32; 3], d: [f32; 3], n: [f32; 3]| {
        let v = |p: [f32; 3]| Vertex::new(p[0], p[1], p[2], n[0], n[1], n[2]);
        [
            Triangle::new(v(a), v(b), v(c)),
            Triangle::new(v(a), v(c), v(d)),
        ]
    };

    [
        // Front / back
        quad([-h, -h, h], [h, -h, h], [h, h, h], [-h, h, h], [0.0, 0.0, 1.0]),
        quad([-h, -h, -h], [-h, h, -h], [h, h, -h], [h, -h, -h], [0.0, 0.0, -1.0]),
        // Top / bottom
        quad([-h, h, -h], [-h, h, h], [h, h, h], [h, h, -h], [0.0, 1.0, 0.0]),
        quad([-h, -h, -h], [h, -h, -h], [h, -h, h], [-h, -h, h], [0.0, -1.0, 0.0]),
        // Right / left
        quad([h, -h, -h], [h, h, -h], [h, h, h], [h, -h, h], [1.0, 0.0, 0.0]),
        quad([-h, -h, -h], [-h, -h, h], [-h, h, h], [-h, h, -h], [-1.0, 0.0, 0.0]),
    ]
    .into_iter()
    .flatten()
    .collect()
}
