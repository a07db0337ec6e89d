use serde::Deserialize;

use crate::assets::{ImageFetcher, resolve_image};
use crate::canvas::Canvas;
use crate::font::StandardFont;
use crate::geometry::PageBox;
use crate::text::{TextStyle, VAlign, draw_text_in_box};
use crate::types::{Color, Pt, Rect};

/// Text drawn in place of an image that could not be loaded.
pub const IMAGE_UNAVAILABLE: &str = "Image unavailable";

const PLACEHOLDER_TEXT_SIZE: f32 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    Cover,
    #[default]
    #[serde(other)]
    Contain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Drawn,
    Placeholder,
}

/// Uniformly scaled, centered placement of a `img_w` x `img_h` image in the
/// box. `Contain` stays inside the box; `Cover` fills it and may overhang on
/// one axis.
pub fn fit_image_rect(img_w: u32, img_h: u32, b: &PageBox, fit: FitMode) -> Rect {
    let bw = b.width().to_f32();
    let bh = b.height().to_f32();
    let iw = img_w.max(1) as f32;
    let ih = img_h.max(1) as f32;
    let sx = bw / iw;
    let sy = bh / ih;
    let scale = match fit {
        FitMode::Contain => sx.min(sy),
        FitMode::Cover => sx.max(sy),
    };
    let nw = iw * scale;
    let nh = ih * scale;
    Rect {
        x: Pt::from_f32(b.x0.to_f32() + (bw - nw) / 2.0),
        y: Pt::from_f32(b.y0.to_f32() + (bh - nh) / 2.0),
        width: Pt::from_f32(nw),
        height: Pt::from_f32(nh),
    }
}

/// Draws the image behind `locator` into the box, or a blue placeholder with
/// [`IMAGE_UNAVAILABLE`] when it cannot be loaded. Loading is attempted once.
pub fn draw_image_in_box(
    canvas: &mut Canvas,
    locator: &str,
    b: &PageBox,
    fit: FitMode,
    fetcher: &dyn ImageFetcher,
) -> ImageOutcome {
    let Some(image) = resolve_image(locator, fetcher) else {
        draw_image_placeholder(canvas, b);
        return ImageOutcome::Placeholder;
    };

    let rect = fit_image_rect(image.width, image.height, b, fit);
    match fit {
        FitMode::Contain => canvas.draw_image(rect, image),
        FitMode::Cover => {
            canvas.save_state();
            canvas.clip_rect(b.to_rect());
            canvas.draw_image(rect, image);
            canvas.restore_state();
        }
    }
    ImageOutcome::Drawn
}

pub fn draw_image_placeholder(canvas: &mut Canvas, b: &PageBox) {
    canvas.set_stroke_color(Color::BLUE);
    canvas.stroke_rect(b.to_rect());
    let style = TextStyle::new(StandardFont::Helvetica, PLACEHOLDER_TEXT_SIZE, Color::BLUE);
    draw_text_in_box(canvas, IMAGE_UNAVAILABLE, b, &style, VAlign::Middle);
}
