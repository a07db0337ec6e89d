use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ReportFillError, Result};
use crate::geometry::{BoxOrigin, NormBox};
use crate::photo::FitMode;
use crate::text::VAlign;

/// Name suffixes reserved for annotation-only fields that are never drawn.
pub const LABEL_SUFFIXES: [&str; 2] = ["_status_label", "_lbl"];

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldKind {
    #[default]
    Text,
    Multiline,
    Checkbox,
    Image,
    Link,
    Label,
    /// A type string this renderer does not know. Kept so it can be reported.
    Unknown(String),
}

impl From<String> for FieldKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => FieldKind::Text,
            "multiline" => FieldKind::Multiline,
            "checkbox" => FieldKind::Checkbox,
            "image" => FieldKind::Image,
            "link" => FieldKind::Link,
            "label" => FieldKind::Label,
            _ => FieldKind::Unknown(raw),
        }
    }
}

impl<'de> Deserialize<'de> for FieldKind {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(d).map(FieldKind::from)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldSpec {
    #[serde(default)]
    pub name: String,
    /// 1-based template page number. Any integer parses; numbers the
    /// template lacks leave the field inert.
    pub page: i64,
    #[serde(rename = "box")]
    pub bbox: NormBox,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default = "default_font")]
    pub font: String,
    #[serde(default = "default_size")]
    pub size: f32,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub valign: VAlign,
    #[serde(default)]
    pub fit: FitMode,
    #[serde(default)]
    pub placeholder: Option<String>,
}

fn default_font() -> String {
    "Helvetica".to_string()
}

fn default_size() -> f32 {
    9.0
}

fn default_color() -> String {
    "black".to_string()
}

impl FieldSpec {
    /// Label fields annotate the template and are never drawn.
    pub fn is_label(&self) -> bool {
        self.kind == FieldKind::Label
            || LABEL_SUFFIXES.iter().any(|suffix| self.name.ends_with(suffix))
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TemplateSpec {
    #[serde(default)]
    pub template_sha256: Option<String>,
    #[serde(default)]
    pub origin: BoxOrigin,
    pub fields: Vec<FieldSpec>,
}

impl TemplateSpec {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ReportFillError::InvalidSpec(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReportFillError::MissingInput(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Fields grouped by page number, keeping declaration order within a page.
    pub fn fields_by_page(&self) -> BTreeMap<i64, Vec<&FieldSpec>> {
        let mut out: BTreeMap<i64, Vec<&FieldSpec>> = BTreeMap::new();
        for field in &self.fields {
            out.entry(field.page).or_default().push(field);
        }
        out
    }
}
