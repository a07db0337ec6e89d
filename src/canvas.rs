use crate::assets::ImageData;
use crate::font::StandardFont;
use crate::types::{Color, Pt, Rect, Size};

/// Drawing operations recorded for an overlay page.
///
/// Coordinates are PDF user space: origin at the bottom-left corner, y grows
/// upward. Text positions are baselines.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SaveState,
    RestoreState,
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetFont(StandardFont, Pt),
    ClipRect(Rect),
    MoveTo { x: Pt, y: Pt },
    LineTo { x: Pt, y: Pt },
    Stroke,
    StrokeRect(Rect),
    DrawString { x: Pt, y: Pt, text: String },
    DrawImage { rect: Rect, resource_id: String },
}

impl Command {
    /// Whether the command puts marks on the page, as opposed to only
    /// changing graphics state.
    pub fn is_drawing(&self) -> bool {
        matches!(
            self,
            Command::Stroke
                | Command::StrokeRect(_)
                | Command::DrawString { .. }
                | Command::DrawImage { .. }
        )
    }
}

/// The finished, immutable recording for one template page.
#[derive(Debug, Clone)]
pub struct Overlay {
    pub page_size: Size,
    pub commands: Vec<Command>,
    pub images: Vec<(String, ImageData)>,
}

impl Overlay {
    pub fn has_content(&self) -> bool {
        self.commands.iter().any(Command::is_drawing)
    }

    pub fn drawn_strings(&self) -> impl Iterator<Item = (&Pt, &Pt, &str)> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawString { x, y, text } => Some((x, y, text.as_str())),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font: Option<(StandardFont, Pt)>,
}

impl GraphicsState {
    fn initial() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_f32(1.0),
            font: None,
        }
    }
}

/// Records one overlay page. Redundant state changes are dropped so the
/// resulting content stream stays small.
pub struct Canvas {
    page_size: Size,
    commands: Vec<Command>,
    images: Vec<(String, ImageData)>,
    state_stack: Vec<GraphicsState>,
    current_state: GraphicsState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            commands: Vec::new(),
            images: Vec::new(),
            state_stack: Vec::new(),
            current_state: GraphicsState::initial(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn save_state(&mut self) {
        self.state_stack.push(self.current_state.clone());
        self.commands.push(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.state_stack.pop() {
            self.current_state = state;
            self.commands.push(Command::RestoreState);
        }
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.current_state.line_width == width {
            return;
        }
        self.current_state.line_width = width;
        self.commands.push(Command::SetLineWidth(width));
    }

    pub fn line_width(&self) -> Pt {
        self.current_state.line_width
    }

    pub fn set_font(&mut self, font: StandardFont, size: Pt) {
        if self.current_state.font == Some((font, size)) {
            return;
        }
        self.current_state.font = Some((font, size));
        self.commands.push(Command::SetFont(font, size));
    }

    pub fn clip_rect(&mut self, rect: Rect) {
        self.commands.push(Command::ClipRect(rect));
    }

    pub fn line(&mut self, x0: Pt, y0: Pt, x1: Pt, y1: Pt) {
        self.commands.push(Command::MoveTo { x: x0, y: y0 });
        self.commands.push(Command::LineTo { x: x1, y: y1 });
        self.commands.push(Command::Stroke);
    }

    pub fn stroke_rect(&mut self, rect: Rect) {
        self.commands.push(Command::StrokeRect(rect));
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        if self.current_state.font.is_none() {
            self.set_font(StandardFont::Helvetica, Pt::from_f32(12.0));
        }
        self.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    /// Registers the image under a fresh resource name and draws it into `rect`.
    pub fn draw_image(&mut self, rect: Rect, image: ImageData) {
        let resource_id = format!("Im{}", self.images.len() + 1);
        self.images.push((resource_id.clone(), image));
        self.commands.push(Command::DrawImage { rect, resource_id });
    }

    pub fn finish(self) -> Overlay {
        Overlay {
            page_size: self.page_size,
            commands: self.commands,
            images: self.images,
        }
    }
}
