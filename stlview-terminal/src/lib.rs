/// Terminal STL viewer on top of the stlview-core scene graph
use crossterm::{
    cursor,
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers,
        MouseButton, MouseEvent, MouseEventKind,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use log::{debug, info, warn};
use nalgebra::Vector3;
use std::fs::File;
use std::io::{self, stdout, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use stlview_core::{
    export::{default_export_path, write_vertices},
    geometry::cube_triangles,
    GraphicsBackend, IngestError, Ingested, IngestionJob, MemorySource, MeshInfo, NodeId, SceneNode, StlImporter,
    StreamError, TriangleMesh, TriangleSource,
};

pub mod cli;
pub mod renderer;
pub mod view;

pub use cli::Cli;
pub use renderer::AsciiRenderer;
pub use view::{DragMode, ViewController};

/// Keyboard orbit step in degrees
const ORBIT_STEP_DEG: f32 = 5.0;
/// Keyboard and wheel zoom ratio
const ZOOM_STEP: f32 = 1.1;

/// Viewer settings, filled from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub path: Option<PathBuf>,
    pub show_edges: bool,
    pub cull_back_faces: bool,
    pub frame_time: Duration,
    pub poll_interval: Duration,
    pub spin_deg: f32,
    pub zoom_sensitivity: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            path: None,
            show_edges: true,
            cull_back_faces: true,
            frame_time: Duration::from_millis(1000 / 30),
            poll_interval: Duration::from_millis(5),
            spin_deg: 0.0,
            zoom_sensitivity: 5.0,
        }
    }
}

/// The mesh on screen together with the scene compiled from it
struct LoadedModel {
    mesh: Rc<TriangleMesh>,
    scene: SceneNode,
    edges: NodeId,
    source: Option<PathBuf>,
    info: MeshInfo,
}

/// Build the viewer's scene: a surface node with the edge overlay as its
/// child. Returns the root and the id of the edge node.
pub fn build_scene(mesh: Rc<TriangleMesh>, show_edges: bool, backend: &dyn GraphicsBackend) -> (SceneNode, NodeId) {
    let mut root = SceneNode::surface(Rc::clone(&mesh));
    let edges = root.add_child(SceneNode::edges(mesh));
    root.build(backend);
    set_edges_visible(&mut root, edges, show_edges);
    (root, edges)
}

/// Show or hide the edge overlay without rebuilding anything
pub fn set_edges_visible(scene: &mut SceneNode, edges: NodeId, visible: bool) {
    if let Some(node) = scene.find_mut(edges) {
        node.set_suppressed(!visible);
    }
}

/// Swap in the mesh of a completed import. A failed or cancelled import
/// leaves `model` alone and returns the message to show instead.
fn replace_model(
    model: &mut Option<LoadedModel>,
    outcome: Result<Ingested<TriangleMesh>, IngestError>,
    label: &str,
    source: Option<PathBuf>,
    show_edges: bool,
    backend: &dyn GraphicsBackend,
) -> Result<(), String> {
    let mesh = match outcome {
        Ok(Ingested::Completed(mesh)) => Rc::new(mesh),
        Ok(Ingested::Cancelled(_)) => return Err(format!("Import of {label} cancelled")),
        Err(err) => return Err(format!("Failed to load {label}: {err}")),
    };

    let (scene, edges) = build_scene(Rc::clone(&mesh), show_edges, backend);
    let info = MeshInfo::of(&mesh);
    *model = Some(LoadedModel {
        mesh,
        scene,
        edges,
        source,
        info,
    });
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PromptAction {
    Editing,
    Abort,
    Submit,
}

/// Line editing for the open-file prompt
fn edit_prompt(input: &mut String, code: KeyCode) -> PromptAction {
    match code {
        KeyCode::Char(c) => input.push(c),
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Esc => return PromptAction::Abort,
        KeyCode::Enter => return PromptAction::Submit,
        _ => {}
    }
    PromptAction::Editing
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Main application struct for the terminal viewer
pub struct TerminalApp {
    config: ViewerConfig,
    view: ViewController,
    renderer: AsciiRenderer,
    model: Option<LoadedModel>,
    show_edges: bool,
    show_info: bool,
    status: Option<String>,
    prompt: Option<String>,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl TerminalApp {
    pub fn new(config: ViewerConfig) -> io::Result<Self> {
        let (width, height) = terminal::size()?;

        let mut renderer = AsciiRenderer::new(width as usize, height as usize);
        renderer.set_back_face_culling(config.cull_back_faces);

        Ok(Self {
            view: ViewController::new(width, height, config.zoom_sensitivity),
            renderer,
            model: None,
            show_edges: config.show_edges,
            show_info: false,
            status: None,
            prompt: None,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
            config,
        })
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;

        let result = self.load_initial().and_then(|()| self.main_loop());

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), DisableMouseCapture, terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn load_initial(&mut self) -> io::Result<()> {
        match self.config.path.clone() {
            Some(path) => self.open_file(&path),
            None => self.ingest(MemorySource::new("cube", cube_triangles(2.0)), "cube", None),
        }
    }

    /// Import `path`. Failures and cancellation leave the current model on
    /// screen and are reported on the status line.
    pub fn open_file(&mut self, path: &Path) -> io::Result<()> {
        let label = file_label(path);
        let importer = File::open(path)
            .map_err(StreamError::from)
            .and_then(|file| StlImporter::from_reader(BufReader::new(file)));

        match importer {
            Ok(importer) => self.ingest(importer, &label, Some(path.to_path_buf())),
            Err(err) => {
                self.report(format!("Failed to load {label}: {err}"));
                Ok(())
            }
        }
    }

    fn ingest<P>(&mut self, producer: P, label: &str, source: Option<PathBuf>) -> io::Result<()>
    where
        P: TriangleSource + Send + 'static,
    {
        let job = match IngestionJob::open(producer) {
            Ok(job) => job,
            Err(err) => {
                self.report(format!("Failed to load {label}: {err}"));
                return Ok(());
            }
        };

        self.wait_for_import(&job, label)?;

        let outcome = job.finish();
        match replace_model(&mut self.model, outcome, label, source, self.show_edges, &self.renderer) {
            Ok(()) => self.installed(label),
            Err(message) => {
                self.report(message);
                Ok(())
            }
        }
    }

    /// Show progress until the job reports a terminal event. Esc cancels.
    fn wait_for_import(&mut self, job: &IngestionJob, label: &str) -> io::Result<()> {
        execute!(stdout(), terminal::Clear(ClearType::All))?;
        loop {
            if let Some(event) = job.try_event() {
                debug!("import of {label} finished with {event:?}");
                return Ok(());
            }
            self.draw_progress(label, job)?;

            if event::poll(self.config.poll_interval)? {
                match event::read()? {
                    Event::Key(KeyEvent {
                        code: KeyCode::Esc,
                        kind: KeyEventKind::Press,
                        ..
                    }) => job.cancel(),
                    Event::Resize(width, height) => self.resize(width, height),
                    _ => {}
                }
            }
        }
    }

    /// Frame the new model and label the window after it
    fn installed(&mut self, label: &str) -> io::Result<()> {
        let Some(model) = &self.model else {
            return Ok(());
        };
        self.view.center_view(&model.scene.bounding_box());
        info!("loaded {label}: {} facets, {} vertices", model.info.facets, model.info.vertices);
        self.status = Some(format!("Loaded {label}: {} facets", model.info.facets));

        execute!(stdout(), terminal::SetTitle(format!("STLView - {label}")))
    }

    fn report(&mut self, message: String) {
        warn!("{message}");
        self.status = Some(message);
    }

    fn resize(&mut self, width: u16, height: u16) {
        self.renderer.resize(width as usize, height as usize);
        self.view.resize(width, height);
    }

    fn main_loop(&mut self) -> io::Result<()> {
        while self.running {
            let frame_start = Instant::now();

            // Handle input
            while event::poll(Duration::from_millis(0))? {
                self.handle_input()?;
            }

            self.update();
            self.render()?;

            // Frame timing
            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < self.config.frame_time {
                std::thread::sleep(self.config.frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        Ok(())
    }

    fn handle_input(&mut self) -> io::Result<()> {
        match event::read()? {
            Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) if self.prompt.is_some() => self.handle_prompt_key(code)?,
            Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) => self.handle_key(code)?,
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::Resize(width, height) => self.resize(width, height),
            _ => {}
        }
        Ok(())
    }

    fn handle_prompt_key(&mut self, code: KeyCode) -> io::Result<()> {
        let Some(input) = self.prompt.as_mut() else {
            return Ok(());
        };
        match edit_prompt(input, code) {
            PromptAction::Editing => Ok(()),
            PromptAction::Abort => {
                self.prompt = None;
                Ok(())
            }
            PromptAction::Submit => {
                let input = self.prompt.take().unwrap_or_default();
                let path = input.trim();
                if path.is_empty() {
                    return Ok(());
                }
                self.open_file(Path::new(path))
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) -> io::Result<()> {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.running = false;
            }
            KeyCode::Char('w') | KeyCode::Up => self.view.orbit(&Vector3::x(), -ORBIT_STEP_DEG),
            KeyCode::Char('s') | KeyCode::Down => self.view.orbit(&Vector3::x(), ORBIT_STEP_DEG),
            KeyCode::Char('a') | KeyCode::Left => self.view.orbit(&Vector3::y(), -ORBIT_STEP_DEG),
            KeyCode::Char('d') | KeyCode::Right => self.view.orbit(&Vector3::y(), ORBIT_STEP_DEG),
            KeyCode::Char('+') | KeyCode::Char('=') => self.view.scale_zoom(1.0 / ZOOM_STEP),
            KeyCode::Char('-') => self.view.scale_zoom(ZOOM_STEP),
            KeyCode::Char('c') => {
                if let Some(model) = &self.model {
                    self.view.center_view(&model.scene.bounding_box());
                }
            }
            KeyCode::Char('e') => {
                self.show_edges = !self.show_edges;
                if let Some(model) = self.model.as_mut() {
                    set_edges_visible(&mut model.scene, model.edges, self.show_edges);
                }
            }
            KeyCode::Char('b') => {
                let cull = !self.renderer.back_face_culling();
                self.renderer.set_back_face_culling(cull);
                self.status = Some(format!("Back-face culling {}", if cull { "on" } else { "off" }));
            }
            KeyCode::Char('i') => self.show_info = !self.show_info,
            KeyCode::Char('x') => self.export_vertices(),
            KeyCode::Char('o') => self.prompt = Some(String::new()),
            _ => {}
        }
        Ok(())
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        let MouseEvent {
            kind,
            column,
            row,
            modifiers,
        } = mouse;
        let (x, y) = (f32::from(column) + 0.5, f32::from(row) + 0.5);

        match kind {
            MouseEventKind::Down(MouseButton::Left) => self.view.begin_drag(DragMode::Orbit, x, y),
            MouseEventKind::Down(MouseButton::Right) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.view.begin_drag(DragMode::Zoom, x, y)
            }
            MouseEventKind::Down(MouseButton::Right) => self.view.begin_drag(DragMode::Pan, x, y),
            MouseEventKind::Down(MouseButton::Middle) => self.view.begin_drag(DragMode::Zoom, x, y),
            MouseEventKind::Drag(_) => self.view.drag_to(x, y),
            MouseEventKind::Up(_) => self.view.end_drag(),
            MouseEventKind::ScrollUp => self.view.scale_zoom(1.0 / ZOOM_STEP),
            MouseEventKind::ScrollDown => self.view.scale_zoom(ZOOM_STEP),
            _ => {}
        }
    }

    fn export_vertices(&mut self) {
        let Some(model) = &self.model else {
            return;
        };
        let source = model
            .source
            .clone()
            .unwrap_or_else(|| PathBuf::from(model.mesh.name()));
        let path = default_export_path(&source);

        let written = File::create(&path).and_then(|file| write_vertices(&model.mesh, BufWriter::new(file)));
        self.status = Some(match written {
            Ok(()) => {
                info!("exported {} vertices to {}", model.mesh.vertices().len(), path.display());
                format!("Exported {} vertices to {}", model.mesh.vertices().len(), path.display())
            }
            Err(err) => {
                warn!("export to {} failed: {err}", path.display());
                format!("Export failed: {err}")
            }
        });
    }

    fn update(&mut self) {
        // Optional continuous orbit for demo effect
        if self.config.spin_deg != 0.0 {
            self.view.orbit(&Vector3::y(), self.config.spin_deg);
        }
    }

    fn render(&mut self) -> io::Result<()> {
        self.renderer.clear();

        if let Some(model) = &self.model {
            let projection = self.view.projection(&model.scene.bounding_box());
            let view = self.view.camera().view_matrix();
            self.renderer.set_transforms(view.matrix(), &projection.matrix());
            model.scene.draw(&mut self.renderer);
        }

        // Output to terminal
        let mut stdout = stdout();
        queue!(stdout, cursor::MoveTo(0, 0))?;

        self.renderer.draw(&mut stdout)?;

        // Draw UI overlay
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(format!(
                "STLView | FPS: {:.1} | Drag=Orbit/Pan WASD=Rotate +/-=Zoom O=Open C=Center E=Edges B=Cull I=Info X=Export Q=Quit",
                self.fps
            )),
            ResetColor
        )?;

        if self.show_info {
            if let Some(model) = &self.model {
                for (row, line) in model.info.to_string().lines().enumerate() {
                    queue!(
                        stdout,
                        cursor::MoveTo(1, row as u16 + 2),
                        SetForegroundColor(Color::White),
                        Print(line),
                        ResetColor
                    )?;
                }
            }
        }

        let prompt = self.prompt.as_ref().map(|input| format!("Open STL file: {input}_"));
        if let Some(status) = prompt.as_ref().or(self.status.as_ref()) {
            let bottom = (self.renderer.height() as u16).saturating_sub(1);
            queue!(
                stdout,
                cursor::MoveTo(0, bottom),
                SetForegroundColor(Color::Green),
                Print(status),
                ResetColor
            )?;
        }

        stdout.flush()?;
        Ok(())
    }

    fn draw_progress(&self, label: &str, job: &IngestionJob) -> io::Result<()> {
        let progress = job.progress();
        let width = self.renderer.width();
        let middle = (self.renderer.height() / 2) as u16;

        let bar_width = width.saturating_sub(10).max(10);
        let filled = ((progress * bar_width as f32).round() as usize).min(bar_width);
        let bar = format!(
            "[{}{}] {:>3.0}%",
            "#".repeat(filled),
            " ".repeat(bar_width - filled),
            progress * 100.0
        );

        let mut stdout = stdout();
        queue!(
            stdout,
            cursor::MoveTo(0, middle),
            terminal::Clear(ClearType::CurrentLine),
            Print(format!(
                "Reading {label}... {} of {} facets (Esc to cancel)",
                job.facets_processed(),
                job.expected_facets()
            )),
            cursor::MoveTo(0, middle + 1),
            terminal::Clear(ClearType::CurrentLine),
            Print(bar)
        )?;
        stdout.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube() -> Rc<TriangleMesh> {
        Rc::new(TriangleMesh::from_triangles(&cube_triangles(2.0)))
    }

    #[test]
    fn test_build_scene_honours_edge_toggle() {
        let renderer = AsciiRenderer::new(40, 20);
        let (mut scene, edges) = build_scene(cube(), false, &renderer);

        assert_eq!(scene.visible_nodes(), vec![scene.id()]);
        assert!(scene.children()[0].draw_batch().is_some());

        set_edges_visible(&mut scene, edges, true);
        assert_eq!(scene.visible_nodes(), vec![scene.id(), edges]);
    }

    #[test]
    fn test_cube_renders_into_the_grid() {
        let mut renderer = AsciiRenderer::new(40, 20);
        let (scene, _) = build_scene(cube(), true, &renderer);

        let mut view = ViewController::new(40, 20, 5.0);
        view.center_view(&scene.bounding_box());
        let projection = view.projection(&scene.bounding_box());
        renderer.set_transforms(view.camera().view_matrix().matrix(), &projection.matrix());
        scene.draw(&mut renderer);

        assert_ne!(renderer.glyph_at(20, 10), ' ');
        assert_eq!(renderer.glyph_at(0, 0), ' ');
    }

    fn loaded_cube(renderer: &AsciiRenderer) -> Option<LoadedModel> {
        let mut model = None;
        let outcome = Ok(Ingested::Completed(TriangleMesh::from_triangles(&cube_triangles(2.0))));
        replace_model(&mut model, outcome, "cube", None, true, renderer).unwrap();
        model
    }

    fn on_screen(model: &Option<LoadedModel>) -> Rc<TriangleMesh> {
        Rc::clone(&model.as_ref().unwrap().mesh)
    }

    #[test]
    fn test_failed_import_keeps_previous_model() {
        let renderer = AsciiRenderer::new(40, 20);
        let mut model = loaded_cube(&renderer);
        let before = on_screen(&model);

        // Binary header promising three records, with only one present
        let mut data = vec![0u8; 80];
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[0u8; 50]);
        let job = IngestionJob::open(StlImporter::from_bytes(data).unwrap()).unwrap();
        job.wait_event(Duration::from_secs(5));

        let message = replace_model(&mut model, job.finish(), "part.stl", None, true, &renderer).unwrap_err();
        assert!(message.starts_with("Failed to load part.stl"));
        assert!(Rc::ptr_eq(&before, &on_screen(&model)));
    }

    #[test]
    fn test_cancelled_import_keeps_previous_model() {
        let renderer = AsciiRenderer::new(40, 20);
        let mut model = loaded_cube(&renderer);
        let before = on_screen(&model);

        let mut job = IngestionJob::new(TriangleMesh::new());
        job.cancel();
        job.start(MemorySource::new("big", cube_triangles(5.0))).unwrap();

        let message = replace_model(&mut model, job.finish(), "big", None, true, &renderer).unwrap_err();
        assert_eq!(message, "Import of big cancelled");
        assert!(Rc::ptr_eq(&before, &on_screen(&model)));
    }

    #[test]
    fn test_completed_import_replaces_model() {
        let renderer = AsciiRenderer::new(40, 20);
        let mut model = loaded_cube(&renderer);
        let before = on_screen(&model);

        let job = IngestionJob::open(MemorySource::new("big", cube_triangles(5.0))).unwrap();
        job.wait_event(Duration::from_secs(5));
        let source = Some(PathBuf::from("big.stl"));
        replace_model(&mut model, job.finish(), "big", source.clone(), false, &renderer).unwrap();

        let after = model.as_ref().unwrap();
        assert!(!Rc::ptr_eq(&before, &after.mesh));
        assert_eq!(after.mesh.name(), "big");
        assert_eq!(after.source, source);
        assert_eq!(after.scene.visible_nodes(), vec![after.scene.id()]);
    }

    #[test]
    fn test_open_prompt_editing() {
        let mut input = String::new();
        for c in "part.stlx".chars() {
            assert_eq!(edit_prompt(&mut input, KeyCode::Char(c)), PromptAction::Editing);
        }
        assert_eq!(edit_prompt(&mut input, KeyCode::Backspace), PromptAction::Editing);
        assert_eq!(input, "part.stl");
        assert_eq!(edit_prompt(&mut input, KeyCode::Enter), PromptAction::Submit);
        assert_eq!(edit_prompt(&mut input, KeyCode::Esc), PromptAction::Abort);
        assert_eq!(input, "part.stl");
    }

    #[test]
    fn test_file_label() {
        assert_eq!(file_label(Path::new("/tmp/models/part.stl")), "part.stl");
        assert_eq!(file_label(Path::new("/")), "/");
    }
}
