mod assets;
mod canvas;
mod checkbox;
mod dispatch;
mod error;
mod fields;
mod finalize;
mod font;
mod geometry;
mod inspection;
mod integrity;
mod metrics;
mod pdf;
mod photo;
mod text;
mod types;
mod values;

use std::path::Path;
use std::time::{Duration, Instant};

pub use assets::{
    HttpImageFetcher, ImageData, ImageFetcher, ImageLoadError, OfflineFetcher,
    decode_image_bytes, resolve_image,
};
pub use canvas::{Canvas, Command, Overlay};
pub use checkbox::draw_checkbox;
pub use dispatch::{FieldOutcome, PageOverlay, RenderContext, build_overlay, render_field};
pub use error::{ReportFillError, Result};
pub use fields::{FieldKind, FieldSpec, LABEL_SUFFIXES, TemplateSpec};
pub use finalize::{
    PageGeometry, PageOutcome, composite_page, finish_document, load_template,
    merge_overlay_onto_page, page_geometry, write_output,
};
pub use font::StandardFont;
pub use geometry::{BoxOrigin, NormBox, PageBox, denormalize, denormalize_on_page};
pub use inspection::{
    SectionSummary, StatusFlags, format_epoch_millis, load_values, section_key, shape_values,
    summarize_sections, unwrap_payload,
};
pub use integrity::{DigestCheck, check_template_digest, sha256_file_hex};
pub use metrics::{FillReport, PageReport};
pub use pdf::overlay_to_pdf;
pub use photo::{FitMode, IMAGE_UNAVAILABLE, ImageOutcome, draw_image_in_box, fit_image_rect};
pub use text::{TextStyle, VAlign, draw_debug_outline, draw_text_in_box, first_baseline, wrap_text};
pub use types::{Color, Pt, Rect, Size};
pub use values::{FieldValue, NOT_FOUND, ValueMap};

pub const DEFAULT_IMAGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOptions {
    /// Outline every field box and label it with the field name.
    pub debug: bool,
    /// Upper bound for each remote image fetch.
    pub image_timeout: Duration,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            debug: false,
            image_timeout: DEFAULT_IMAGE_TIMEOUT,
        }
    }
}

/// Fills a template PDF from a field spec and a value map.
///
/// One run is a single pass over the template's pages: each page gets its
/// own overlay, which is merged (or not) before the next page is looked at.
/// Only a missing or unreadable template is an error; per-field and per-page
/// problems end up in the returned [`FillReport`].
pub struct ReportFiller {
    options: FillOptions,
    fetcher: Box<dyn ImageFetcher>,
}

pub struct ReportFillerBuilder {
    options: FillOptions,
    fetcher: Option<Box<dyn ImageFetcher>>,
}

impl ReportFiller {
    pub fn builder() -> ReportFillerBuilder {
        ReportFillerBuilder::new()
    }

    pub fn options(&self) -> FillOptions {
        self.options
    }

    pub fn fill(
        &self,
        template_path: &Path,
        spec: &TemplateSpec,
        values: &ValueMap,
    ) -> Result<(Vec<u8>, FillReport)> {
        if !template_path.exists() {
            return Err(ReportFillError::MissingInput(template_path.to_path_buf()));
        }
        let started = Instant::now();
        let digest = check_template_digest(template_path, spec.template_sha256.as_deref())?;
        let bytes = std::fs::read(template_path)?;
        let mut template = load_template(&bytes)?;

        let pages = template.get_pages();
        let by_page = spec.fields_by_page();
        let mut orphaned_fields = 0;
        for (number, fields) in &by_page {
            let present = u32::try_from(*number).is_ok_and(|n| pages.contains_key(&n));
            if !present {
                log::warn!(
                    "{} field(s) target page {} but the template has {} page(s); they are not drawn",
                    fields.len(),
                    number,
                    pages.len()
                );
                orphaned_fields += fields.len();
            }
        }

        let ctx = RenderContext {
            debug: self.options.debug,
            fetcher: &*self.fetcher,
        };
        let mut reports = Vec::with_capacity(pages.len());
        for (number, page_id) in pages {
            let page_started = Instant::now();
            let geometry = page_geometry(&template, page_id);
            let fields = by_page
                .get(&i64::from(number))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let page = build_overlay(geometry.size, fields, values, spec.origin, ctx);
            let outcome = composite_page(&mut template, page_id, number, &page.overlay, &geometry);
            reports.push(PageReport::new(
                number,
                &page.fields,
                outcome,
                elapsed_ms(page_started),
            ));
        }

        let out = finish_document(template)?;
        let report = FillReport {
            pages: reports,
            digest,
            orphaned_fields,
            total_render_ms: elapsed_ms(started),
            output_bytes: out.len(),
        };
        log::info!(
            "filled {} page(s): {} merged, {} failed",
            report.pages.len(),
            report.merged_pages(),
            report.failed_pages()
        );
        Ok((out, report))
    }

    /// Like [`ReportFiller::fill`], then writes the result. `out_path` is left
    /// untouched when filling fails.
    pub fn fill_to_file(
        &self,
        template_path: &Path,
        spec: &TemplateSpec,
        values: &ValueMap,
        out_path: &Path,
    ) -> Result<FillReport> {
        let (bytes, report) = self.fill(template_path, spec, values)?;
        write_output(out_path, &bytes)?;
        Ok(report)
    }
}

fn elapsed_ms(since: Instant) -> f64 {
    since.elapsed().as_secs_f64() * 1000.0
}

impl ReportFillerBuilder {
    pub fn new() -> Self {
        Self {
            options: FillOptions::default(),
            fetcher: None,
        }
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.options.debug = enabled;
        self
    }

    pub fn image_timeout(mut self, timeout: Duration) -> Self {
        self.options.image_timeout = timeout;
        self
    }

    pub fn options(mut self, options: FillOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the HTTP client used for remote image locators.
    pub fn image_fetcher(mut self, fetcher: Box<dyn ImageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> Result<ReportFiller> {
        let fetcher: Box<dyn ImageFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Box::new(HttpImageFetcher::new(self.options.image_timeout)?),
        };
        Ok(ReportFiller {
            options: self.options,
            fetcher,
        })
    }
}

impl Default for ReportFillerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
