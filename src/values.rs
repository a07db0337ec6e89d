use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ReportFillError, Result};
use crate::fields::FieldSpec;

/// Drawn for any field that has neither a value nor a field-level placeholder.
/// The same string is used for every field type.
pub const NOT_FOUND: &str = "Data not found in test data";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Text(String),
    /// Where to load an image from: URL, `data:` URI or file path. Flat JSON
    /// strings always parse as `Text`; this variant comes from
    /// [`shape_values`](crate::inspection::shape_values) or direct
    /// construction. Image fields treat `Text` as a locator too.
    Locator(String),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// String form used by text renderers and as an image locator.
    pub fn as_text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            FieldValue::Bool(true) => "True".into(),
            FieldValue::Bool(false) => "False".into(),
            FieldValue::Text(s) | FieldValue::Locator(s) => s.as_str().into(),
        }
    }

    /// Checkbox coercion. Strings count as checked only when they spell out
    /// an affirmative; the not-found sentinel is unchecked.
    pub fn is_checked(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Text(s) | FieldValue::Locator(s) => matches!(
                s.trim().to_ascii_lowercase().as_str(),
                "true" | "yes" | "y" | "x" | "1" | "on" | "checked"
            ),
        }
    }
}

/// Flat field-name to value mapping, read-only during rendering.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ValueMap(BTreeMap<String, FieldValue>);

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Value for the field: the mapped value, else the field's placeholder,
    /// else [`NOT_FOUND`].
    pub fn resolve(&self, field: &FieldSpec) -> FieldValue {
        if let Some(value) = self.0.get(&field.name) {
            return value.clone();
        }
        match &field.placeholder {
            Some(placeholder) => FieldValue::Text(placeholder.clone()),
            None => FieldValue::text(NOT_FOUND),
        }
    }

    /// Reads an already-flat `{ "name": string | bool }` JSON object.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| ReportFillError::InvalidValues(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReportFillError::MissingInput(path.to_path_buf()));
        }
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
}

impl FromIterator<(String, FieldValue)> for ValueMap {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        ValueMap(iter.into_iter().collect())
    }
}
