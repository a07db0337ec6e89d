use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportFillError {
    #[error("missing required file: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("invalid field spec: {0}")]
    InvalidSpec(String),
    #[error("invalid value source: {0}")]
    InvalidValues(String),
    #[error("pdf error: {0}")]
    Pdf(String),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportFillError>;

pub(crate) fn lopdf_err(err: lopdf::Error) -> ReportFillError {
    ReportFillError::Pdf(err.to_string())
}
