use crate::canvas::Canvas;
use crate::geometry::PageBox;
use crate::types::{Color, Pt, Rect};

const MARK_INSET: f32 = 2.0;
const MARK_LINE_WIDTH: f32 = 2.0;

/// Square of side `min(width, height)` anchored at the box's bottom-left
/// corner, crossed with an X when `checked`.
pub fn draw_checkbox(canvas: &mut Canvas, checked: bool, b: &PageBox) {
    let side = b.width().min(b.height());
    canvas.set_stroke_color(Color::BLACK);
    canvas.stroke_rect(Rect {
        x: b.x0,
        y: b.y0,
        width: side,
        height: side,
    });
    if !checked {
        return;
    }

    let normal = canvas.line_width();
    let inset = Pt::from_f32(MARK_INSET);
    let (left, bottom) = (b.x0 + inset, b.y0 + inset);
    let (right, top) = (b.x0 + side - inset, b.y0 + side - inset);
    canvas.set_line_width(Pt::from_f32(MARK_LINE_WIDTH));
    canvas.line(left, bottom, right, top);
    canvas.line(left, top, right, bottom);
    canvas.set_line_width(normal);
}
