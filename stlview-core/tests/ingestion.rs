use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use stlview_core::{
    Cancelled, IngestError, Ingested, IngestionJob, JobEvent, JobState, MemorySource, MeshSink,
    StlImporter, StreamError, Triangle, TriangleMesh, TriangleSource, Vertex,
};

const TIMEOUT: Duration = Duration::from_secs(10);

/// Disjoint triangle number `i`, identifiable by its x offset
fn numbered_triangle(i: usize) -> Triangle {
    let x = i as f32 * 2.0;
    Triangle::new(
        Vertex::at(x, 0.0, 0.0),
        Vertex::at(x + 1.0, 0.0, 0.0),
        Vertex::at(x, 1.0, 0.0),
    )
}

/// First-vertex x of every facet, relative to facet 0
fn facet_offsets(mesh: &TriangleMesh) -> Vec<f32> {
    let origin = mesh.facet_points(&mesh.facets()[0])[0].x;
    mesh.facets()
        .iter()
        .map(|f| mesh.facet_points(f)[0].x - origin)
        .collect()
}

/// Streams `total` numbered triangles, pausing after `gate_at` of them
/// until the test lets it continue
struct GatedSource {
    total: usize,
    gate_at: usize,
    reached: Sender<()>,
    resume: Receiver<()>,
}

impl TriangleSource for GatedSource {
    fn expected_triangle_count(&self) -> usize {
        self.total
    }

    fn name(&self) -> &str {
        "gated"
    }

    fn stream(
        &mut self,
        emit: &mut dyn FnMut(Triangle) -> Result<(), Cancelled>,
    ) -> stlview_core::error::Result<()> {
        for i in 0..self.total {
            if i == self.gate_at {
                let _ = self.reached.send(());
                let _ = self.resume.recv();
            }
            emit(numbered_triangle(i))?;
        }
        Ok(())
    }
}

fn gated(total: usize, gate_at: usize) -> (GatedSource, Receiver<()>, Sender<()>) {
    let (reached_tx, reached_rx) = mpsc::channel();
    let (resume_tx, resume_rx) = mpsc::channel();
    let source = GatedSource {
        total,
        gate_at,
        reached: reached_tx,
        resume: resume_rx,
    };
    (source, reached_rx, resume_tx)
}

fn binary_stl(count: u32, records: usize) -> Vec<u8> {
    let mut data = vec![0u8; 80];
    data.extend_from_slice(&count.to_le_bytes());
    for i in 0..records {
        let t = numbered_triangle(i);
        data.extend_from_slice(&[0u8; 12]);
        for v in &t.vertices {
            for c in v.position.coords.iter() {
                data.extend_from_slice(&c.to_le_bytes());
            }
        }
        data.extend_from_slice(&[0, 0]);
    }
    data
}

#[test]
fn test_uncancelled_stream_commits_every_triangle_in_order() {
    let triangles: Vec<Triangle> = (0..100).map(numbered_triangle).collect();
    let job = IngestionJob::open(MemorySource::new("strip", triangles)).unwrap();

    assert_eq!(job.wait_event(TIMEOUT), Some(JobEvent::Completed));
    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(job.facets_processed(), 100);

    let mesh = job.finish().unwrap().into_mesh();
    assert_eq!(mesh.facet_count(), 100);
    assert_eq!(mesh.name(), "strip");

    let expected: Vec<f32> = (0..100).map(|i| i as f32 * 2.0).collect();
    assert_eq!(facet_offsets(&mesh), expected);

    // Centred after the stream ends
    let center = mesh.bounding_box().center();
    assert!(center.coords.norm() < 1e-4);
}

#[test]
fn test_cancel_midway_keeps_a_prefix() {
    let (source, reached, resume) = gated(1000, 500);
    let job = IngestionJob::open(source).unwrap();
    assert_eq!(job.expected_facets(), 1000);

    reached.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(job.facets_processed(), 500);
    job.cancel();
    resume.send(()).unwrap();

    assert_eq!(job.wait_event(TIMEOUT), Some(JobEvent::Cancelled));
    assert_eq!(job.state(), JobState::Cancelled);
    assert!(job.try_event().is_none());

    let mesh = match job.finish().unwrap() {
        Ingested::Cancelled(mesh) => mesh,
        Ingested::Completed(_) => panic!("a cancelled import must not complete"),
    };
    assert!(mesh.facet_count() <= 500);

    let expected: Vec<f32> = (0..mesh.facet_count()).map(|i| i as f32 * 2.0).collect();
    assert_eq!(facet_offsets(&mesh), expected);
    // Cancelled meshes are neither centred nor named
    assert_eq!(mesh.name(), "");
    assert_eq!(mesh.facet_points(&mesh.facets()[0])[0].x, 0.0);
}

#[test]
fn test_progress_is_monotonic_and_bounded() {
    let (source, reached, resume) = gated(200, 50);
    let job = IngestionJob::open(source).unwrap();

    reached.recv_timeout(TIMEOUT).unwrap();
    let halfway = job.progress();
    assert!((halfway - 0.25).abs() < 1e-6);
    resume.send(()).unwrap();

    assert_eq!(job.wait_event(TIMEOUT), Some(JobEvent::Completed));
    assert!(job.progress() >= halfway);
    assert_eq!(job.progress(), 1.0);
}

#[test]
fn test_truncated_file_fails_without_done_notification() {
    let importer = StlImporter::from_bytes(binary_stl(3, 2)).unwrap();
    let job = IngestionJob::open(importer).unwrap();

    assert_eq!(job.wait_event(TIMEOUT), Some(JobEvent::Failed));
    assert!(job.try_event().is_none());
    assert_eq!(job.state(), JobState::Failed);

    match job.finish() {
        Err(IngestError::Stream(StreamError::Truncated { expected, found })) => {
            assert_eq!((expected, found), (3, 2));
        }
        other => panic!("expected a truncation failure, got {other:?}"),
    }
}

#[test]
fn test_start_twice_is_a_noop() {
    let mut job = IngestionJob::new(TriangleMesh::new());
    job.start(MemorySource::new("first", (0..10).map(numbered_triangle).collect()))
        .unwrap();
    job.start(MemorySource::new("second", (0..99).map(numbered_triangle).collect()))
        .unwrap();

    assert_eq!(job.wait_event(TIMEOUT), Some(JobEvent::Completed));
    assert!(job.try_event().is_none());
    assert_eq!(job.expected_facets(), 10);

    let mesh = job.finish().unwrap().into_mesh();
    assert_eq!(mesh.name(), "first");
    assert_eq!(mesh.facet_count(), 10);
}

#[test]
fn test_cancel_is_idempotent() {
    let (source, reached, resume) = gated(10, 3);
    let job = IngestionJob::open(source).unwrap();

    reached.recv_timeout(TIMEOUT).unwrap();
    job.cancel();
    job.cancel();
    resume.send(()).unwrap();

    assert_eq!(job.wait_event(TIMEOUT), Some(JobEvent::Cancelled));
    job.cancel();
    assert!(job.try_event().is_none());
    assert_eq!(job.finish().unwrap().into_mesh().facet_count(), 3);
}

#[test]
fn test_dropping_a_running_job_stops_the_worker() {
    let (source, reached, resume) = gated(1000, 1);
    let job = IngestionJob::open(source).unwrap();
    reached.recv_timeout(TIMEOUT).unwrap();

    // Queue the resume before the drop blocks on joining the worker
    resume.send(()).unwrap();
    drop(job);
}
