/// Precompiled draw batches and the graphics backend they replay on
use std::marker::PhantomData;

use nalgebra::{Point3, Vector3};

pub type Color = [f32; 3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Triangles,
    Lines,
}

/// Backend state toggles scoped to part of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderState {
    pub blend: bool,
    pub line_smooth: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCommand {
    Begin(Primitive),
    End,
    Color(Color),
    Normal(Vector3<f32>),
    Vertex(Point3<f32>),
    PushState(RenderState),
    PopState,
}

/// Something that can replay recorded draw commands.
///
/// Recording requires a live context; batches are confined to the thread
/// that owns it.
pub trait GraphicsBackend {
    fn has_context(&self) -> bool {
        true
    }

    fn replay(&mut self, commands: &[DrawCommand]);
}

/// An immutable, replayable command sequence for one node's geometry.
///
/// Owned by exactly one scene node and dropped with it. Not `Send`: it
/// belongs to the graphics thread.
#[derive(Debug)]
pub struct DrawBatch {
    commands: Box<[DrawCommand]>,
    _thread_bound: PhantomData<*const ()>,
}

impl DrawBatch {
    /// Record a batch against `backend`.
    ///
    /// Panics when the backend has no context or when the recording leaves
    /// a primitive open.
    pub fn record(backend: &dyn GraphicsBackend, f: impl FnOnce(&mut BatchRecorder)) -> DrawBatch {
        assert!(backend.has_context(), "draw batch compiled without a graphics context");

        let mut recorder = BatchRecorder {
            commands: Vec::new(),
            open: None,
        };
        f(&mut recorder);
        assert!(recorder.open.is_none(), "draw batch finished inside an open primitive");

        DrawBatch {
            commands: recorder.commands.into_boxed_slice(),
            _thread_bound: PhantomData,
        }
    }

    pub fn replay(&self, backend: &mut dyn GraphicsBackend) {
        backend.replay(&self.commands);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn vertex_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Vertex(_)))
            .count()
    }
}

/// Scoped recorder handed out by `DrawBatch::record`
pub struct BatchRecorder {
    commands: Vec<DrawCommand>,
    open: Option<Primitive>,
}

impl BatchRecorder {
    pub fn begin(&mut self, primitive: Primitive) {
        assert!(self.open.is_none(), "nested begin({primitive:?})");
        self.open = Some(primitive);
        self.commands.push(DrawCommand::Begin(primitive));
    }

    pub fn end(&mut self) {
        assert!(self.open.take().is_some(), "end() without begin()");
        self.commands.push(DrawCommand::End);
    }

    pub fn color(&mut self, color: Color) {
        self.commands.push(DrawCommand::Color(color));
    }

    pub fn normal(&mut self, normal: Vector3<f32>) {
        self.commands.push(DrawCommand::Normal(normal));
    }

    pub fn vertex(&mut self, point: Point3<f32>) {
        self.commands.push(DrawCommand::Vertex(point));
    }

    /// Apply `state` for the commands recorded by `f` only; the previous
    /// state is restored afterwards.
    pub fn with_state(&mut self, state: RenderState, f: impl FnOnce(&mut BatchRecorder)) {
        self.commands.push(DrawCommand::PushState(state));
        f(self);
        self.commands.push(DrawCommand::PopState);
    }
}

/// Backend that keeps every replayed command, for inspecting batches
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    pub replayed: Vec<DrawCommand>,
    pub replays: usize,
    pub detached: bool,
}

#[cfg(test)]
impl GraphicsBackend for RecordingBackend {
    fn has_context(&self) -> bool {
        !self.detached
    }

    fn replay(&mut self, commands: &[DrawCommand]) {
        self.replays += 1;
        self.replayed.extend_from_slice(commands);
    }
}
