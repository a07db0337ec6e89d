use crate::dispatch::FieldOutcome;
use crate::finalize::PageOutcome;
use crate::integrity::DigestCheck;
use crate::photo::ImageOutcome;

#[derive(Debug, Clone, PartialEq)]
pub struct PageReport {
    pub page_number: u32,
    pub fields: usize,
    pub drawn: usize,
    pub skipped: usize,
    /// Fields whose type the renderer does not know.
    pub unknown: usize,
    pub image_placeholders: usize,
    pub outcome: PageOutcome,
    pub render_ms: f64,
}

impl PageReport {
    pub fn new(
        page_number: u32,
        fields: &[(String, FieldOutcome)],
        outcome: PageOutcome,
        render_ms: f64,
    ) -> Self {
        let skipped = fields.iter().filter(|(_, o)| o.is_skipped()).count();
        let unknown = fields
            .iter()
            .filter(|(_, o)| *o == FieldOutcome::Unknown)
            .count();
        let image_placeholders = fields
            .iter()
            .filter(|(_, o)| *o == FieldOutcome::Image(ImageOutcome::Placeholder))
            .count();
        Self {
            page_number,
            fields: fields.len(),
            drawn: fields.len() - skipped,
            skipped,
            unknown,
            image_placeholders,
            outcome,
            render_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillReport {
    pub pages: Vec<PageReport>,
    pub digest: DigestCheck,
    /// Fields declared for page numbers the template does not have.
    pub orphaned_fields: usize,
    pub total_render_ms: f64,
    pub output_bytes: usize,
}

impl FillReport {
    pub fn merged_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.outcome == PageOutcome::Merged)
            .count()
    }

    pub fn failed_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.outcome, PageOutcome::MergeFailed(_)))
            .count()
    }
}
