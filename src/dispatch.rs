use crate::assets::ImageFetcher;
use crate::canvas::{Canvas, Overlay};
use crate::checkbox::draw_checkbox;
use crate::fields::{FieldKind, FieldSpec};
use crate::font::StandardFont;
use crate::geometry::{BoxOrigin, PageBox, denormalize_on_page};
use crate::photo::{ImageOutcome, draw_image_in_box};
use crate::text::{TextStyle, VAlign, draw_debug_outline, draw_text_in_box};
use crate::types::{Color, Size};
use crate::values::ValueMap;

/// What rendering one field amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOutcome {
    Text { lines: usize },
    Checkbox { checked: bool },
    Image(ImageOutcome),
    /// Annotation-only field; never drawn.
    Label,
    /// Field type not known to the renderer; nothing drawn.
    Unknown,
}

impl FieldOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FieldOutcome::Label | FieldOutcome::Unknown)
    }
}

/// Per-run settings shared by every field render.
#[derive(Clone, Copy)]
pub struct RenderContext<'a> {
    pub debug: bool,
    pub fetcher: &'a dyn ImageFetcher,
}

pub fn render_field(
    canvas: &mut Canvas,
    field: &FieldSpec,
    b: &PageBox,
    values: &ValueMap,
    ctx: RenderContext<'_>,
) -> FieldOutcome {
    if field.is_label() {
        return FieldOutcome::Label;
    }

    let value = values.resolve(field);
    let outcome = match &field.kind {
        FieldKind::Text | FieldKind::Multiline => {
            let lines = draw_text_in_box(canvas, &value.as_text(), b, &text_style(field), field.valign);
            FieldOutcome::Text { lines }
        }
        FieldKind::Link => {
            let lines = draw_text_in_box(canvas, &value.as_text(), b, &text_style(field), VAlign::Middle);
            FieldOutcome::Text { lines }
        }
        FieldKind::Checkbox => {
            let checked = value.is_checked();
            draw_checkbox(canvas, checked, b);
            FieldOutcome::Checkbox { checked }
        }
        FieldKind::Image => {
            FieldOutcome::Image(draw_image_in_box(canvas, &value.as_text(), b, field.fit, ctx.fetcher))
        }
        FieldKind::Unknown(kind) => {
            log::warn!("field {:?}: unknown type {:?}, nothing drawn", field.name, kind);
            FieldOutcome::Unknown
        }
        // `is_label` already caught these.
        FieldKind::Label => FieldOutcome::Label,
    };

    if ctx.debug {
        draw_debug_outline(canvas, b, Some(&field.name));
    }
    outcome
}

fn text_style(field: &FieldSpec) -> TextStyle {
    TextStyle::new(
        StandardFont::resolve_or_default(&field.font),
        field.size,
        Color::named(&field.color),
    )
}

/// Overlay for one page together with the outcome of each field on it, in
/// declaration order.
#[derive(Debug)]
pub struct PageOverlay {
    pub overlay: Overlay,
    pub fields: Vec<(String, FieldOutcome)>,
}

pub fn build_overlay(
    page_size: Size,
    fields: &[&FieldSpec],
    values: &ValueMap,
    origin: BoxOrigin,
    ctx: RenderContext<'_>,
) -> PageOverlay {
    let mut canvas = Canvas::new(page_size);
    let fields = fields
        .iter()
        .map(|field| {
            let b = denormalize_on_page(field.bbox, page_size, origin);
            let outcome = render_field(&mut canvas, field, &b, values, ctx);
            (field.name.clone(), outcome)
        })
        .collect();
    PageOverlay {
        overlay: canvas.finish(),
        fields,
    }
}
