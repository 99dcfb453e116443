/// ASCII rasterizer that replays draw batches into a terminal cell grid
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use std::io::Write;
use stlview_core::{DrawCommand, GraphicsBackend, Primitive, RenderState, Viewport};

/// Character luminosity ramp for shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &['.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Light that reaches faces turned away from the headlight
const AMBIENT: f32 = 0.15;

/// Lines win depth ties against the surface they lie on
const LINE_DEPTH_BIAS: f32 = 1.0e-3;

/// Glyph used for lines when smoothing is off
const HARD_LINE_GLYPH: char = '#';

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    glyph: char,
    color: Option<[f32; 3]>,
}

const BLANK: Cell = Cell {
    glyph: ' ',
    color: None,
};

/// A vertex after projection to cell coordinates
#[derive(Debug, Clone, Copy)]
struct Projected {
    x: f32,
    y: f32,
    depth: f32,
    shade: f32,
    color: [f32; 3],
}

/// ASCII renderer that turns replayed draw commands into terminal characters
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    cells: Vec<Cell>,
    clip: Matrix4<f32>,
    normal_matrix: Matrix3<f32>,
    cull_back_faces: bool,
    state: RenderState,
    state_stack: Vec<RenderState>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            cells: vec![BLANK; size],
            clip: Matrix4::identity(),
            normal_matrix: Matrix3::identity(),
            cull_back_faces: true,
            state: RenderState::default(),
            state_stack: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        let size = width * height;
        self.width = width;
        self.height = height;
        self.depth_buffer = vec![f32::INFINITY; size];
        self.cells = vec![BLANK; size];
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.cells.fill(BLANK);
    }

    pub fn set_transforms(&mut self, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
        self.clip = projection * view;
        self.normal_matrix = view.fixed_view::<3, 3>(0, 0).into_owned();
    }

    pub fn set_back_face_culling(&mut self, enabled: bool) {
        self.cull_back_faces = enabled;
    }

    pub fn back_face_culling(&self) -> bool {
        self.cull_back_faces
    }

    /// State currently in effect; back to the default between batches
    pub fn render_state(&self) -> RenderState {
        self.state
    }

    pub fn glyph_at(&self, x: usize, y: usize) -> char {
        self.cells[y * self.width + x].glyph
    }

    pub fn color_at(&self, x: usize, y: usize) -> Option<[f32; 3]> {
        self.cells[y * self.width + x].color
    }

    fn project(&self, point: &Point3<f32>, normal: &Vector3<f32>, color: [f32; 3]) -> Projected {
        let ndc = self.clip.transform_point(point);
        let (x, y) = Viewport::new(self.width as f32, self.height as f32).to_screen(&ndc);

        // Two-sided headlight along the view axis
        let eye_normal = (self.normal_matrix * normal)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::z);
        let shade = AMBIENT + (1.0 - AMBIENT) * eye_normal.z.abs();

        Projected {
            x,
            y,
            depth: ndc.z,
            shade,
            color,
        }
    }

    fn rasterize_triangle(&mut self, v: &[Projected; 3]) {
        let (v0, v1, v2) = (v[0], v[1], v[2]);

        // Screen y points down, so front faces wind clockwise here
        let signed_area = (v1.x - v0.x) * (v2.y - v0.y) - (v2.x - v0.x) * (v1.y - v0.y);
        if self.cull_back_faces && signed_area > 0.0 {
            return;
        }

        // Bounding box
        let min_x = v0.x.min(v1.x).min(v2.x).floor() as i32;
        let max_x = v0.x.max(v1.x).max(v2.x).ceil() as i32;
        let min_y = v0.y.min(v1.y).min(v2.y).floor() as i32;
        let max_y = v0.y.max(v1.y).max(v2.y).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;

                let Some((w0, w1, w2)) = barycentric((v0.x, v0.y), (v1.x, v1.y), (v2.x, v2.y), (px, py)) else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.depth + w1 * v1.depth + w2 * v2.depth;
                let idx = y as usize * self.width + x as usize;
                if depth < self.depth_buffer[idx] {
                    let shade = w0 * v0.shade + w1 * v1.shade + w2 * v2.shade;
                    self.depth_buffer[idx] = depth;
                    self.cells[idx] = Cell {
                        glyph: shade_glyph(shade),
                        color: Some(scale(v0.color, shade)),
                    };
                }
            }
        }
    }

    fn rasterize_line(&mut self, a: &Projected, b: &Projected) {
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        let glyph = if self.state.line_smooth {
            direction_glyph(dx, dy)
        } else {
            HARD_LINE_GLYPH
        };

        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let x = (a.x + t * dx).floor();
            let y = (a.y + t * dy).floor();
            if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
                continue;
            }

            let idx = y as usize * self.width + x as usize;
            let depth = a.depth + t * (b.depth - a.depth);
            if depth > self.depth_buffer[idx] + LINE_DEPTH_BIAS {
                continue;
            }

            let color = match (self.state.blend, self.cells[idx].color) {
                (true, Some(under)) => mix(under, a.color),
                _ => a.color,
            };
            self.depth_buffer[idx] = depth.min(self.depth_buffer[idx]);
            self.cells[idx] = Cell {
                glyph,
                color: Some(color),
            };
        }
    }

    pub fn draw<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        let mut current = None;
        for y in 0..self.height {
            for x in 0..self.width {
                let cell = self.cells[y * self.width + x];
                let color = cell.color.map_or(Color::DarkGrey, to_terminal_color);
                if current != Some(color) {
                    writer.queue(SetForegroundColor(color))?;
                    current = Some(color);
                }
                writer.queue(Print(cell.glyph))?;
            }
            if y + 1 < self.height {
                writer.queue(Print("\r\n"))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

impl GraphicsBackend for AsciiRenderer {
    fn replay(&mut self, commands: &[DrawCommand]) {
        let mut primitive = None;
        let mut color = [1.0; 3];
        let mut normal = Vector3::z();
        let mut pending: Vec<Projected> = Vec::with_capacity(3);

        for command in commands {
            match command {
                DrawCommand::Begin(p) => {
                    primitive = Some(*p);
                    pending.clear();
                }
                DrawCommand::End => {
                    primitive = None;
                    pending.clear();
                }
                DrawCommand::Color(c) => color = *c,
                DrawCommand::Normal(n) => normal = *n,
                DrawCommand::Vertex(p) => {
                    pending.push(self.project(p, &normal, color));
                    match (primitive, pending.len()) {
                        (Some(Primitive::Triangles), 3) => {
                            self.rasterize_triangle(&[pending[0], pending[1], pending[2]]);
                            pending.clear();
                        }
                        (Some(Primitive::Lines), 2) => {
                            self.rasterize_line(&pending[0], &pending[1]);
                            pending.clear();
                        }
                        (None, _) => pending.clear(),
                        _ => {}
                    }
                }
                DrawCommand::PushState(state) => {
                    self.state_stack.push(self.state);
                    self.state = *state;
                }
                DrawCommand::PopState => {
                    self.state = self.state_stack.pop().unwrap_or_default();
                }
            }
        }
    }
}

fn shade_glyph(shade: f32) -> char {
    let index = (shade.clamp(0.0, 1.0) * (LUMINOSITY_RAMP.len() - 1) as f32).round() as usize;
    LUMINOSITY_RAMP[index.min(LUMINOSITY_RAMP.len() - 1)]
}

/// Pick a glyph following the line's on-screen direction. Cells are about
/// twice as tall as they are wide.
fn direction_glyph(dx: f32, dy: f32) -> char {
    let angle = (-2.0 * dy).atan2(dx).to_degrees().rem_euclid(180.0);
    match angle {
        a if !(22.5..157.5).contains(&a) => '-',
        a if a < 67.5 => '/',
        a if a < 112.5 => '|',
        _ => '\\',
    }
}

fn scale(color: [f32; 3], factor: f32) -> [f32; 3] {
    color.map(|c| (c * factor).clamp(0.0, 1.0))
}

fn mix(under: [f32; 3], over: [f32; 3]) -> [f32; 3] {
    [
        0.5 * (under[0] + over[0]),
        0.5 * (under[1] + over[1]),
        0.5 * (under[2] + over[2]),
    ]
}

fn to_terminal_color(color: [f32; 3]) -> Color {
    let [r, g, b] = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    Color::Rgb { r, g, b }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(v0: (f32, f32), v1: (f32, f32), v2: (f32, f32), p: (f32, f32)) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}
