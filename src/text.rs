use serde::Deserialize;

use crate::canvas::Canvas;
use crate::font::StandardFont;
use crate::geometry::PageBox;
use crate::types::{Color, Pt};

/// Inset between a box edge and its text, in points.
pub const TEXT_PADDING: f32 = 2.0;
pub const LINE_HEIGHT_FACTOR: f32 = 1.2;

const DEBUG_LABEL_SIZE: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VAlign {
    #[default]
    Top,
    Middle,
    #[serde(other)]
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font: StandardFont,
    pub size: Pt,
    pub color: Color,
}

impl TextStyle {
    pub fn new(font: StandardFont, size: f32, color: Color) -> Self {
        Self {
            font,
            size: Pt::from_f32(size),
            color,
        }
    }

    pub fn line_height(&self) -> Pt {
        self.size * LINE_HEIGHT_FACTOR
    }
}

/// Greedy word wrap. Words are never split: a word wider than `max_width`
/// gets a line to itself. Explicit newlines start a new paragraph, and a
/// paragraph with no words produces no line.
pub fn wrap_text(text: &str, font: StandardFont, size: Pt, max_width: Pt) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            if line.is_empty() {
                line.push_str(word);
                continue;
            }
            let candidate_width = font.measure_text_width(size, &line)
                + font.measure_text_width(size, " ")
                + font.measure_text_width(size, word);
            if candidate_width <= max_width {
                line.push(' ');
                line.push_str(word);
            } else {
                lines.push(std::mem::take(&mut line));
                line.push_str(word);
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

/// Baseline of the first line for the given alignment. Lines after the first
/// descend by one line height each.
pub fn first_baseline(
    b: &PageBox,
    size: Pt,
    line_height: Pt,
    line_count: usize,
    valign: VAlign,
) -> Pt {
    let pad = Pt::from_f32(TEXT_PADDING);
    let below_first = line_height * line_count.saturating_sub(1) as i32;
    match valign {
        VAlign::Top => b.y1 - pad - size,
        VAlign::Middle => {
            let block = line_height * line_count as i32;
            b.y0 + (b.height() - block) / 2 + below_first
        }
        VAlign::Bottom => b.y0 + pad + below_first,
    }
}

/// Wraps `text` to the box width and draws it. Lines that do not fit
/// vertically are still drawn, outside the box. Returns the number of lines.
pub fn draw_text_in_box(
    canvas: &mut Canvas,
    text: &str,
    b: &PageBox,
    style: &TextStyle,
    valign: VAlign,
) -> usize {
    let pad = Pt::from_f32(TEXT_PADDING);
    let max_width = (b.width() - pad * 2).max(Pt::ZERO);
    let lines = wrap_text(text, style.font, style.size, max_width);
    if lines.is_empty() {
        return 0;
    }

    let line_height = style.line_height();
    let mut y = first_baseline(b, style.size, line_height, lines.len(), valign);
    canvas.set_fill_color(style.color);
    canvas.set_font(style.font, style.size);
    for line in &lines {
        canvas.draw_string(b.x0 + pad, y, line.as_str());
        y -= line_height;
    }
    lines.len()
}

/// Red outline of the field box with its name in the top-left corner.
pub fn draw_debug_outline(canvas: &mut Canvas, b: &PageBox, name: Option<&str>) {
    canvas.save_state();
    canvas.set_stroke_color(Color::RED);
    canvas.stroke_rect(b.to_rect());
    if let Some(name) = name.filter(|n| !n.is_empty()) {
        canvas.set_font(StandardFont::Helvetica, Pt::from_f32(DEBUG_LABEL_SIZE));
        canvas.set_fill_color(Color::RED);
        canvas.draw_string(
            b.x0 + Pt::from_f32(2.0),
            b.y1 - Pt::from_f32(8.0),
            name.to_string(),
        );
    }
    canvas.restore_state();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::geometry::{NormBox, denormalize};
    use crate::types::Size;

    fn helv(size: f32) -> TextStyle {
        TextStyle::new(StandardFont::Helvetica, size, Color::BLACK)
    }

    fn page_box(x0: f32, y0: f32, x1: f32, y1: f32) -> PageBox {
        PageBox {
            x0: Pt::from_f32(x0),
            y0: Pt::from_f32(y0),
            x1: Pt::from_f32(x1),
            y1: Pt::from_f32(y1),
        }
    }

    #[test]
    fn empty_text_has_no_lines() {
        let size = Pt::from_f32(9.0);
        let wide = Pt::from_f32(500.0);
        assert!(wrap_text("", StandardFont::Helvetica, size, wide).is_empty());
        assert!(wrap_text("   \n  ", StandardFont::Helvetica, size, wide).is_empty());
    }

    #[test]
    fn wraps_greedily_without_splitting_words() {
        let size = Pt::from_f32(10.0);
        // "aaa" is 16.68pt wide at 10pt Helvetica; two words plus a space is 36.14pt.
        let lines = wrap_text("aaa aaa aaa", StandardFont::Helvetica, size, Pt::from_f32(37.0));
        assert_eq!(lines, vec!["aaa aaa", "aaa"]);
        for line in &lines {
            for word in line.split(' ') {
                assert_eq!(word, "aaa");
            }
        }
    }

    #[test]
    fn oversized_word_gets_its_own_line() {
        let size = Pt::from_f32(10.0);
        let lines = wrap_text(
            "a Supercalifragilistic b",
            StandardFont::Helvetica,
            size,
            Pt::from_f32(30.0),
        );
        assert_eq!(lines, vec!["a", "Supercalifragilistic", "b"]);
    }

    #[test]
    fn newlines_start_new_lines() {
        let lines = wrap_text(
            "Roof: worn\nGutters: loose",
            StandardFont::Helvetica,
            Pt::from_f32(9.0),
            Pt::from_f32(500.0),
        );
        assert_eq!(lines, vec!["Roof: worn", "Gutters: loose"]);
    }

    #[test]
    fn top_alignment_places_first_baseline_below_top_edge() {
        let page = Size::letter();
        let b = denormalize(
            NormBox::from([0.1, 0.8, 0.9, 0.95]),
            page.width.to_f32(),
            page.height.to_f32(),
        );
        let mut canvas = Canvas::new(page);
        let n = draw_text_in_box(&mut canvas, "John Doe", &b, &helv(9.0), VAlign::Top);
        assert_eq!(n, 1);
        let overlay = canvas.finish();
        let (x, y, text) = overlay.drawn_strings().next().expect("string");
        assert_eq!(text, "John Doe");
        let expected_y = 0.95 * 792.0 - 2.0 - 9.0;
        assert!((y.to_f32() - expected_y).abs() < 0.01);
        assert!((x.to_f32() - (0.1 * 612.0 + 2.0)).abs() < 0.01);
    }

    #[test]
    fn bottom_alignment_puts_last_line_at_bottom_padding() {
        let b = page_box(0.0, 100.0, 41.0, 200.0);
        let mut canvas = Canvas::new(Size::letter());
        draw_text_in_box(&mut canvas, "aaa aaa aaa", &b, &helv(10.0), VAlign::Bottom);
        let overlay = canvas.finish();
        let ys: Vec<f32> = overlay.drawn_strings().map(|(_, y, _)| y.to_f32()).collect();
        assert_eq!(ys.len(), 2);
        assert!((ys[1] - 102.0).abs() < 0.01);
        assert!((ys[0] - 114.0).abs() < 0.01);
    }

    #[test]
    fn middle_alignment_centers_the_block() {
        let b = page_box(0.0, 0.0, 200.0, 100.0);
        let size = Pt::from_f32(10.0);
        let lh = Pt::from_f32(12.0);
        // One line: block height 12, first baseline at (100 - 12) / 2 = 44.
        let y = first_baseline(&b, size, lh, 1, VAlign::Middle);
        assert!((y.to_f32() - 44.0).abs() < 0.01);
        // Three lines: block 36 -> bottom of block at 32, first baseline 32 + 24.
        let y = first_baseline(&b, size, lh, 3, VAlign::Middle);
        assert!((y.to_f32() - 56.0).abs() < 0.01);
    }

    #[test]
    fn overflowing_text_is_not_clipped() {
        let b = page_box(0.0, 100.0, 41.0, 110.0);
        let mut canvas = Canvas::new(Size::letter());
        let n = draw_text_in_box(&mut canvas, "aaa aaa aaa aaa aaa", &b, &helv(10.0), VAlign::Top);
        let overlay = canvas.finish();
        assert_eq!(n, 3);
        assert_eq!(overlay.drawn_strings().count(), 3);
        assert!(!overlay.commands.iter().any(|c| matches!(c, Command::ClipRect(_))));
    }

    #[test]
    fn debug_outline_draws_box_and_label_in_isolated_state() {
        let b = page_box(10.0, 10.0, 60.0, 40.0);
        let mut canvas = Canvas::new(Size::letter());
        draw_debug_outline(&mut canvas, &b, Some("client_name"));
        let overlay = canvas.finish();
        assert_eq!(overlay.commands.first(), Some(&Command::SaveState));
        assert_eq!(overlay.commands.last(), Some(&Command::RestoreState));
        assert!(overlay.commands.contains(&Command::StrokeRect(b.to_rect())));
        let (_, y, text) = overlay.drawn_strings().next().expect("label");
        assert_eq!(text, "client_name");
        assert!((y.to_f32() - 32.0).abs() < 0.01);
    }
}
