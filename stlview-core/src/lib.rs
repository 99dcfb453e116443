/// STLView Core Library - Mesh ingestion, scene graph and trackball camera
///
/// This library provides the renderer-independent parts of the viewer:
/// background STL ingestion with cancellation, a scene graph of nodes that
/// own precompiled draw batches, and the trackball camera with its
/// orthographic fitting.

pub mod batch;
pub mod camera;
pub mod error;
pub mod export;
pub mod geometry;
pub mod ingest;
pub mod mesh;
pub mod projection;
pub mod scene;
pub mod source;
pub mod stl;
pub mod transform;

// Re-export commonly used types
pub use batch::{Color, DrawBatch, DrawCommand, GraphicsBackend, Primitive, RenderState};
pub use camera::{construct_rotation, trackball_rotation, TrackballCamera};
pub use error::{CameraError, Cancelled, IngestError, StreamError};
pub use geometry::{BoundingBox, Triangle, Vertex};
pub use ingest::{Ingested, IngestionJob, JobEvent, JobState};
pub use mesh::{MeshInfo, MeshSink, TriangleMesh};
pub use projection::{OrthoProjection, Viewport};
pub use scene::{NodeId, NodeKind, SceneNode};
pub use source::{MemorySource, TriangleSource};
pub use stl::{parse_stl, StlFormat, StlImporter};
pub use transform::Transform;
