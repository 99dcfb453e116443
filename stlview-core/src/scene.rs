/// Scene graph of drawable nodes, each owning one precompiled draw batch
use std::collections::VecDeque;
use std::f32::consts::FRAC_1_SQRT_2;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use nalgebra::Vector3;

use crate::batch::{BatchRecorder, Color, DrawBatch, GraphicsBackend, Primitive, RenderState};
use crate::geometry::BoundingBox;
use crate::mesh::{MeshSink, TriangleMesh};

/// Neighbouring facet normals further apart than 45° make a crease
pub const SHARP_EDGE_COS: f32 = FRAC_1_SQRT_2;
const SHARP_EDGE_TOLERANCE: f32 = 1.0e-4;

pub const REGULAR_EDGE_COLOR: Color = [0.0, 0.0, 0.0];
pub const LAMINA_EDGE_COLOR: Color = [1.0, 1.0, 0.0];

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

/// What a node draws
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Organizational node with no geometry of its own
    Group,
    /// Filled surface, flat-coloured by facet orientation
    Surface(Rc<TriangleMesh>),
    /// Every mesh edge as a line, lamina edges highlighted
    Edges(Rc<TriangleMesh>),
}

#[derive(Debug)]
pub struct SceneNode {
    id: NodeId,
    kind: NodeKind,
    batch: Option<DrawBatch>,
    children: Vec<SceneNode>,
    suppressed: bool,
}

impl SceneNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed)),
            kind,
            batch: None,
            children: Vec::new(),
            suppressed: false,
        }
    }

    pub fn group() -> Self {
        Self::new(NodeKind::Group)
    }

    pub fn surface(mesh: Rc<TriangleMesh>) -> Self {
        Self::new(NodeKind::Surface(mesh))
    }

    pub fn edges(mesh: Rc<TriangleMesh>) -> Self {
        Self::new(NodeKind::Edges(mesh))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn draw_batch(&self) -> Option<&DrawBatch> {
        self.batch.as_ref()
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    pub fn add_child(&mut self, node: SceneNode) -> NodeId {
        let id = node.id;
        self.children.push(node);
        id
    }

    /// Detach the direct child with `id`, if there is one
    pub fn remove_child(&mut self, id: NodeId) -> Option<SceneNode> {
        let index = self.children.iter().position(|c| c.id == id)?;
        Some(self.children.remove(index))
    }

    /// Drop every child; this node's own batch is kept
    pub fn remove_all_children(&mut self) {
        self.children.clear();
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    /// Hide this node and its whole subtree from drawing. The subtree is
    /// kept so it can be shown again without a rebuild.
    pub fn set_suppressed(&mut self, suppressed: bool) {
        self.suppressed = suppressed;
    }

    /// Find a node anywhere in this subtree
    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter_mut());
        }
        None
    }

    /// Compile this node's batch, then every descendant's. There is no
    /// dirty tracking: the whole subtree is rebuilt.
    pub fn build(&mut self, backend: &dyn GraphicsBackend) {
        let mut queue = VecDeque::from([self]);
        while let Some(node) = queue.pop_front() {
            node.compile(backend);
            queue.extend(node.children.iter_mut());
        }
    }

    /// Replay the batches of every visible node, breadth first
    pub fn draw(&self, backend: &mut dyn GraphicsBackend) {
        self.visit_visible(|node| {
            if let Some(batch) = &node.batch {
                batch.replay(backend);
            }
        });
    }

    /// Ids of the nodes a draw would visit, in visiting order
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        self.visit_visible(|node| ids.push(node.id));
        ids
    }

    /// Extent of this node's own geometry
    pub fn own_bbox(&self) -> BoundingBox {
        match &self.kind {
            NodeKind::Group => BoundingBox::empty(),
            NodeKind::Surface(mesh) | NodeKind::Edges(mesh) => mesh.bounding_box(),
        }
    }

    /// Union over the whole subtree, suppressed nodes included
    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox::empty();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            bbox = bbox.union(&node.own_bbox());
            stack.extend(node.children.iter());
        }
        bbox
    }

    fn visit_visible<'a>(&'a self, mut visit: impl FnMut(&'a SceneNode)) {
        if self.suppressed {
            return;
        }
        let mut queue = VecDeque::from([self]);
        while let Some(node) = queue.pop_front() {
            visit(node);
            queue.extend(node.children.iter().filter(|c| !c.suppressed));
        }
    }

    fn compile(&mut self, backend: &dyn GraphicsBackend) {
        // Replacing the batch drops the old one
        self.batch = match &self.kind {
            NodeKind::Group => None,
            NodeKind::Surface(mesh) => Some(DrawBatch::record(backend, |rec| record_surface(rec, mesh))),
            NodeKind::Edges(mesh) => Some(DrawBatch::record(backend, |rec| record_edges(rec, mesh))),
        };
    }
}

/// Debug colouring: how much the facet faces each principal axis
pub fn facet_color(normal: &Vector3<f32>) -> Color {
    [normal.x.abs(), normal.y.abs(), normal.z.abs()]
}

pub fn is_sharp_edge_boundary(a: &Vector3<f32>, b: &Vector3<f32>) -> bool {
    a.dot(b) < SHARP_EDGE_COS - SHARP_EDGE_TOLERANCE
}

/// Normal to emit for `vertex` while drawing `facet`.
///
/// The smoothed vertex normal is used unless any facet around the vertex
/// bends more than 45° away from `facet`, in which case the facet's own
/// normal keeps the crease hard. Depends on the facet being drawn.
pub fn shading_normal(mesh: &TriangleMesh, facet: usize, vertex: usize) -> Vector3<f32> {
    let facets = mesh.facets();
    let facet_normal = facets[facet].normal;
    let sharp = mesh.vertices()[vertex]
        .adjacent_facets()
        .iter()
        .any(|&f| is_sharp_edge_boundary(&facet_normal, &facets[f].normal));

    if sharp {
        facet_normal
    } else {
        mesh.vertex_normal(vertex)
    }
}

fn record_surface(rec: &mut BatchRecorder, mesh: &TriangleMesh) {
    rec.begin(Primitive::Triangles);
    for (index, facet) in mesh.facets().iter().enumerate() {
        rec.color(facet_color(&facet.normal));
        for &vertex in &facet.vertices {
            rec.normal(shading_normal(mesh, index, vertex));
            rec.vertex(mesh.vertices()[vertex].point);
        }
    }
    rec.end();
}

fn record_edges(rec: &mut BatchRecorder, mesh: &TriangleMesh) {
    let state = RenderState {
        blend: true,
        line_smooth: true,
    };
    rec.with_state(state, |rec| {
        rec.begin(Primitive::Lines);
        for edge in mesh.edges() {
            rec.color(if edge.is_lamina() {
                LAMINA_EDGE_COLOR
            } else {
                REGULAR_EDGE_COLOR
            });
            rec.vertex(mesh.vertices()[edge.start].point);
            rec.vertex(mesh.vertices()[edge.end].point);
        }
        rec.end();
    });
}
