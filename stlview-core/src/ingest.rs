/// Background mesh ingestion with progress polling and cooperative cancellation
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{Cancelled, IngestError, StreamError};
use crate::mesh::{MeshSink, TriangleMesh};
use crate::source::TriangleSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, JobState::Completed | JobState::Cancelled | JobState::Failed)
    }
}

/// Terminal notification sent once per job.
///
/// `Completed` and `Cancelled` are the done notification; `Failed` is the
/// separate error signal and is never followed by a done notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Completed,
    Cancelled,
    Failed,
}

/// The mesh handed back by a job that did not fail
#[derive(Debug)]
pub enum Ingested<S> {
    /// The full stream, centred and named
    Completed(S),
    /// The prefix committed before cancellation was observed. Never named;
    /// centred only when the cancel arrived during the centring pass.
    Cancelled(S),
}

impl<S> Ingested<S> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Ingested::Completed(_))
    }

    pub fn into_mesh(self) -> S {
        match self {
            Ingested::Completed(mesh) | Ingested::Cancelled(mesh) => mesh,
        }
    }
}

/// Everything the worker and the foreground share; one mutex guards it all
struct Shared<S> {
    mesh: Option<S>,
    facets_processed: usize,
    cancel_requested: bool,
    state: JobState,
    failure: Option<IngestError>,
}

fn lock<S>(shared: &Mutex<Shared<S>>) -> MutexGuard<'_, Shared<S>> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drains a triangle stream into a mesh sink on a dedicated worker thread.
///
/// The foreground polls [`IngestionJob::facets_processed`] on its own
/// cadence and may call [`IngestionJob::cancel`] at any time. The worker
/// checks the cancellation flag under the same lock it commits each
/// triangle with, so nothing is committed after cancellation is observed.
///
/// Dropping a running job cancels it and joins the worker.
pub struct IngestionJob<S: MeshSink + Send + 'static = TriangleMesh> {
    shared: Arc<Mutex<Shared<S>>>,
    events_tx: Sender<JobEvent>,
    events: Receiver<JobEvent>,
    worker: Option<JoinHandle<()>>,
    expected: usize,
}

impl IngestionJob<TriangleMesh> {
    /// Start ingesting `producer` into a fresh `TriangleMesh`
    pub fn open<P>(producer: P) -> Result<Self, IngestError>
    where
        P: TriangleSource + Send + 'static,
    {
        let mut job = Self::new(TriangleMesh::new());
        job.start(producer)?;
        Ok(job)
    }
}

impl<S: MeshSink + Send + 'static> IngestionJob<S> {
    pub fn new(sink: S) -> Self {
        let (events_tx, events) = mpsc::channel();
        Self {
            shared: Arc::new(Mutex::new(Shared {
                mesh: Some(sink),
                facets_processed: 0,
                cancel_requested: false,
                state: JobState::Idle,
                failure: None,
            })),
            events_tx,
            events,
            worker: None,
            expected: 0,
        }
    }

    /// Spawn the worker. A job runs at most once: starting a job that is
    /// already running, finished or cancelled does nothing.
    pub fn start<P>(&mut self, producer: P) -> Result<(), IngestError>
    where
        P: TriangleSource + Send + 'static,
    {
        {
            let mut shared = lock(&self.shared);
            if shared.state != JobState::Idle {
                debug!("ignoring start of a {:?} import job", shared.state);
                return Ok(());
            }
            shared.state = JobState::Running;
        }

        self.expected = producer.expected_triangle_count();
        debug!(
            "starting import of {:?}, {} triangles expected",
            producer.name(),
            self.expected
        );

        let shared = Arc::clone(&self.shared);
        let events = self.events_tx.clone();
        let spawned = thread::Builder::new()
            .name("stl-import".into())
            .spawn(move || run_worker(&shared, producer, &events));

        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                let mut shared = lock(&self.shared);
                shared.state = JobState::Failed;
                shared.mesh = None;
                shared.failure = Some(IngestError::Spawn(std::io::Error::new(err.kind(), err.to_string())));
                Err(IngestError::Spawn(err))
            }
        }
    }

    /// Ask the worker to stop. Returns immediately; wait for
    /// `JobEvent::Cancelled` or call `finish` before reusing the mesh.
    pub fn cancel(&self) {
        let mut shared = lock(&self.shared);
        if shared.cancel_requested {
            return;
        }
        shared.cancel_requested = true;

        if shared.state == JobState::Idle {
            shared.state = JobState::Cancelled;
            drop(shared);
            debug!("import job cancelled before it started");
            let _ = self.events_tx.send(JobEvent::Cancelled);
        } else {
            debug!("cancellation requested");
        }
    }

    pub fn facets_processed(&self) -> usize {
        lock(&self.shared).facets_processed
    }

    pub fn expected_facets(&self) -> usize {
        self.expected
    }

    /// Fraction of the expected triangles committed so far, in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.expected == 0 {
            return if self.state() == JobState::Completed { 1.0 } else { 0.0 };
        }
        (self.facets_processed() as f32 / self.expected as f32).clamp(0.0, 1.0)
    }

    pub fn state(&self) -> JobState {
        lock(&self.shared).state
    }

    pub fn try_event(&self) -> Option<JobEvent> {
        self.events.try_recv().ok()
    }

    pub fn wait_event(&self, timeout: Duration) -> Option<JobEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Join the worker and take the result.
    ///
    /// A failed import yields its error and no mesh. Blocks until the worker
    /// exits, so call it after a terminal event or after `cancel`.
    pub fn finish(mut self) -> Result<Ingested<S>, IngestError> {
        self.join_worker();

        let mut shared = lock(&self.shared);
        let outcome = match (shared.state, shared.failure.take(), shared.mesh.take()) {
            (_, Some(err), _) => Err(err),
            (JobState::Completed, None, Some(mesh)) => Ok(Ingested::Completed(mesh)),
            (JobState::Cancelled, None, Some(mesh)) => Ok(Ingested::Cancelled(mesh)),
            _ => Err(IngestError::NotStarted),
        };
        drop(shared);
        outcome
    }

    fn join_worker(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        if handle.join().is_err() {
            warn!("import thread panicked");
            let mut shared = lock(&self.shared);
            shared.state = JobState::Failed;
            shared.mesh = None;
            shared.failure = Some(IngestError::WorkerPanicked);
        }
    }
}

impl<S: MeshSink + Send + 'static> Drop for IngestionJob<S> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel();
            self.join_worker();
        }
    }
}

fn run_worker<S, P>(shared: &Mutex<Shared<S>>, mut producer: P, events: &Sender<JobEvent>)
where
    S: MeshSink,
    P: TriangleSource,
{
    let name = producer.name().to_string();

    // A panic in the producer or sink settles the job as Failed
    let event = panic::catch_unwind(AssertUnwindSafe(|| drain(shared, &mut producer, &name)))
        .unwrap_or_else(|_| {
            warn!("import of {name:?} panicked");
            let mut shared = lock(shared);
            shared.state = JobState::Failed;
            shared.mesh = None;
            shared.failure = Some(IngestError::WorkerPanicked);
            JobEvent::Failed
        });

    let _ = events.send(event);
}

fn drain<S, P>(shared: &Mutex<Shared<S>>, producer: &mut P, name: &str) -> JobEvent
where
    S: MeshSink,
    P: TriangleSource,
{
    let streamed = producer.stream(&mut |triangle| {
        let mut guard = lock(shared);
        let shared = &mut *guard;
        if shared.cancel_requested {
            return Err(Cancelled);
        }
        if let Some(mesh) = shared.mesh.as_mut() {
            mesh.add_triangle(&triangle);
        }
        shared.facets_processed += 1;
        Ok(())
    });

    match streamed {
        Ok(()) => finalize(shared, name),
        Err(StreamError::Cancelled) => {
            let mut shared = lock(shared);
            shared.state = JobState::Cancelled;
            debug!("import cancelled after {} triangles", shared.facets_processed);
            JobEvent::Cancelled
        }
        Err(err) => {
            warn!("import failed: {err}");
            let mut shared = lock(shared);
            shared.state = JobState::Failed;
            shared.mesh = None;
            shared.failure = Some(IngestError::Stream(err));
            JobEvent::Failed
        }
    }
}

/// Centre the finished mesh outside the lock, then settle the terminal
/// state. A cancel that lands after the last triangle still wins; the name
/// is only copied once the job is known to complete.
fn finalize<S: MeshSink>(shared: &Mutex<Shared<S>>, name: &str) -> JobEvent {
    let taken = {
        let mut shared = lock(shared);
        if shared.cancel_requested {
            shared.state = JobState::Cancelled;
            debug!("import cancelled at end of stream");
            return JobEvent::Cancelled;
        }
        shared.mesh.take()
    };

    let mut mesh = taken.map(|mut mesh| {
        mesh.center();
        mesh
    });

    let mut shared = lock(shared);
    if shared.cancel_requested {
        shared.mesh = mesh;
        shared.state = JobState::Cancelled;
        debug!("import cancelled while centring");
        return JobEvent::Cancelled;
    }
    if let Some(mesh) = mesh.as_mut() {
        mesh.set_name(name);
    }
    let facets = mesh.as_ref().map_or(0, MeshSink::facet_count);
    shared.mesh = mesh;
    shared.state = JobState::Completed;
    info!("imported {name:?}: {facets} facets");
    JobEvent::Completed
}
