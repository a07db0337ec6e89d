//! Turns an inspection record into the flat [`ValueMap`] the renderer reads.
//!
//! Every lookup lists its candidate paths in priority order; empty strings and
//! nulls count as absent so the next candidate gets a chance.

use std::path::Path;

use chrono::DateTime;
use serde_json::Value;

use crate::error::{ReportFillError, Result};
use crate::values::{FieldValue, NOT_FOUND, ValueMap};

const MAX_NOTES: usize = 6;
const SECTION_KEY_LEN: usize = 30;
const NO_COMMENTS: &str = "No comments";

/// Which inspection statuses occurred among a section's line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFlags {
    pub inspected: bool,
    pub not_inspected: bool,
    pub not_present: bool,
    pub deficient: bool,
}

impl StatusFlags {
    fn with_status(mut self, status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "I" => self.inspected = true,
            "NI" => self.not_inspected = true,
            "NP" => self.not_present = true,
            "D" => self.deficient = true,
            _ => {}
        }
        self
    }
}

/// Everything the report shows for one section, reduced from its line items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionSummary {
    pub key_base: String,
    pub flags: StatusFlags,
    pub comments: Vec<String>,
    pub photos: Vec<String>,
}

impl SectionSummary {
    fn absorb(mut self, item: &Value) -> Self {
        if let Some(status) = item.get("inspectionStatus").and_then(Value::as_str) {
            self.flags = self.flags.with_status(status);
        }
        for comment in array_at(item, "comments") {
            let label = first_text(comment, &[&["label"], &["title"]]).unwrap_or_default();
            let text = first_text(comment, &[&["text"], &["content"]]).unwrap_or_default();
            match (label.is_empty(), text.is_empty()) {
                (true, true) => {}
                (true, false) => self.comments.push(text.to_string()),
                (false, _) => self.comments.push(format!("{label}: {text}")),
            }
            self.photos.extend(array_at(comment, "photos").filter_map(photo_url));
        }
        self
    }

    fn notes(&self) -> String {
        if self.comments.is_empty() {
            return NO_COMMENTS.to_string();
        }
        self.comments
            .iter()
            .take(MAX_NOTES)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn write_into(&self, out: &mut ValueMap) {
        let base = &self.key_base;
        out.insert(format!("{base}_I"), FieldValue::Bool(self.flags.inspected));
        out.insert(format!("{base}_NI"), FieldValue::Bool(self.flags.not_inspected));
        out.insert(format!("{base}_NP"), FieldValue::Bool(self.flags.not_present));
        out.insert(format!("{base}_D"), FieldValue::Bool(self.flags.deficient));
        out.insert(format!("{base}_notes"), FieldValue::Text(self.notes()));
        if let Some(first) = self.photos.first() {
            out.insert(format!("{base}_photo1"), FieldValue::Locator(first.clone()));
        }
    }
}

/// Accepts either the record itself or a payload wrapping it under `inspection`.
pub fn unwrap_payload(payload: &Value) -> &Value {
    payload.get("inspection").unwrap_or(payload)
}

/// Reads an inspection JSON file and shapes it into field values.
pub fn load_values(path: impl AsRef<Path>) -> Result<ValueMap> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ReportFillError::MissingInput(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)?;
    let payload: Value =
        serde_json::from_str(&raw).map_err(|e| ReportFillError::InvalidValues(e.to_string()))?;
    Ok(shape_values(unwrap_payload(&payload)))
}

pub fn shape_values(record: &Value) -> ValueMap {
    let mut out = ValueMap::new();
    let text_or_missing = |paths: &[&[&str]]| {
        FieldValue::text(first_text(record, paths).unwrap_or(NOT_FOUND))
    };

    out.insert(
        "client_name",
        text_or_missing(&[&["clientInfo", "name"], &["client", "name"]]),
    );
    let date = first_present(record, &[&["schedule", "date"], &["inspection", "date"]])
        .map(format_epoch_millis)
        .unwrap_or_else(|| NOT_FOUND.to_string());
    out.insert("date", FieldValue::Text(date));
    out.insert(
        "address",
        text_or_missing(&[&["address", "fullAddress"], &["property", "address"]]),
    );
    out.insert("inspector", text_or_missing(&[&["inspector", "name"]]));
    out.insert(
        "trec_license",
        text_or_missing(&[&["inspector", "licenseNumber"]]),
    );

    for summary in summarize_sections(record) {
        summary.write_into(&mut out);
    }
    out
}

pub fn summarize_sections(record: &Value) -> Vec<SectionSummary> {
    let sections = non_empty_array(record, "sections").or_else(|| non_empty_array(record, "systems"));
    let Some(sections) = sections else {
        return Vec::new();
    };
    sections
        .iter()
        .map(|section| {
            let name = first_text(section, &[&["title"], &["name"]]).unwrap_or("section");
            let items = non_empty_array(section, "lineItems")
                .or_else(|| non_empty_array(section, "items"))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let start = SectionSummary {
                key_base: section_key(name),
                ..SectionSummary::default()
            };
            items.iter().fold(start, SectionSummary::absorb)
        })
        .collect()
}

/// Lower-cased, spaces to underscores, at most 30 characters.
pub fn section_key(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "_")
        .chars()
        .take(SECTION_KEY_LEN)
        .collect()
}

/// Epoch milliseconds as `YYYY-MM-DD HH:MM AM UTC`; anything unreadable
/// becomes the not-found sentinel.
pub fn format_epoch_millis(value: &Value) -> String {
    let millis = value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64));
    millis
        .and_then(DateTime::from_timestamp_millis)
        .map(|dt| dt.format("%Y-%m-%d %I:%M %p UTC").to_string())
        .unwrap_or_else(|| NOT_FOUND.to_string())
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn first_present<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a Value> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path))
        .find(|v| is_truthy(v))
}

fn first_text<'a>(value: &'a Value, paths: &[&[&str]]) -> Option<&'a str> {
    paths
        .iter()
        .filter_map(|path| lookup(value, path).and_then(Value::as_str))
        .find(|s| !s.is_empty())
}

fn non_empty_array<'a>(value: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .filter(|a| !a.is_empty())
}

fn array_at<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn photo_url(photo: &Value) -> Option<String> {
    match photo {
        Value::String(url) => Some(url.clone()),
        Value::Object(_) => photo
            .get("url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
            .map(str::to_string),
        _ => None,
    }
}
