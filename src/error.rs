use std::path::PathBuf;
use thiserror::Error;

use crate::ir::normalize::CoordinateError;

/// The main error type for labelport operations.
///
/// These are the failures that stop a whole batch before any file-level work
/// can begin. Problems with the content of a single file are reported as
/// [`AnnotationError`]s inside an [`IoResult`](crate::batch::IoResult).
#[derive(Debug, Error)]
pub enum LabelportError {
    #[error("Failed to read annotation directory {path}: {source}")]
    DirectoryRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create output location {path}: {source}")]
    DestinationCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Unknown annotation format '{0}'; expected 'pascal-voc', 'yolo' or 'json'")]
    UnknownFormat(String),
}

/// A recoverable problem with one annotation file, object or line.
///
/// The batch runner records these against the offending file name and keeps
/// going with the rest of the batch.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing <{tag}> element in <{context}>")]
    MissingElement { tag: String, context: String },

    #[error("invalid <{tag}> value '{raw}'; expected {expected}")]
    InvalidNumber {
        tag: String,
        raw: String,
        expected: &'static str,
    },

    #[error("annotation refers to non-existent image '{0}'")]
    UnknownImage(String),

    #[error("duplicate annotation for image '{0}'")]
    DuplicateImage(String),

    #[error("invalid shape: {0}")]
    Geometry(String),

    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    #[error("line {line}: {message}")]
    Line { line: usize, message: String },

    #[error("category file {path}: {message}")]
    CategoryFile { path: PathBuf, message: String },

    #[error("category '{0}' is not in the category list")]
    UnknownCategory(String),

    #[error("invalid color '{0}'")]
    Color(String),

    #[error("image dimensions of '{0}' are unknown")]
    MissingDimensions(String),

    #[error("could not read image header: {0}")]
    ImageHeader(#[from] imagesize::ImageError),
}
