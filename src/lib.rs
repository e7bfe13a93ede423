//! Labelport: multi-format image annotation import and export.
//!
//! Labelport reads and writes bounding-box and polygon annotations in three
//! formats (Pascal VOC XML, YOLO text and a lossless JSON schema) through one
//! shared in-memory model. Imports run file-parallel, share a concurrent
//! category registry, and report per-file problems instead of failing the
//! whole batch.
//!
//! # Modules
//!
//! - [`ir`]: annotation model, coordinate normalization and format codecs
//! - [`batch`]: batch runner, progress reporting and batch results
//! - [`error`]: error types
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashSet;
//! use std::path::Path;
//!
//! use labelport::batch::{AnnotationFormat, BatchOptions, BatchRunner, Progress};
//! use labelport::ir::{CategoryRegistry, ImageAnnotationData};
//!
//! # fn main() -> Result<(), labelport::LabelportError> {
//! let runner = BatchRunner::new(BatchOptions::from_env())?;
//! let mut registry = CategoryRegistry::new();
//! let images: HashSet<String> = ["img1.jpg".to_string()].into_iter().collect();
//! let progress = Progress::new();
//!
//! let loaded = runner.load(
//!     AnnotationFormat::PascalVoc,
//!     Path::new("annotations/voc"),
//!     &images,
//!     &mut registry,
//!     &progress,
//! )?;
//! println!("{}", loaded.result);
//!
//! let data = ImageAnnotationData::with_registry(loaded.annotations, &registry);
//! let saved = runner.save(AnnotationFormat::Json, &data, Path::new("out"), &progress)?;
//! println!("{saved}");
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
pub mod ir;

pub use batch::{AnnotationFormat, BatchOptions, BatchRunner, IoResult, Progress};
pub use error::{AnnotationError, LabelportError};
