//! Outcome reporting for import, save and metadata batches.
//!
//! An [`IoResult`] is what the UI layer shows after a batch: how many items
//! succeeded, how long it took, and one `(file, message)` row per problem.

use serde::Serialize;
use std::fmt;

use crate::error::AnnotationError;
use crate::ir::ImageAnnotation;

/// Which kind of batch produced a result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Import,
    Save,
    MetadataLoad,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OperationKind::Import => "import",
            OperationKind::Save => "save",
            OperationKind::MetadataLoad => "metadata load",
        })
    }
}

/// One problem, attributed to the file it came from.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct IoErrorEntry {
    pub file_name: String,
    pub message: String,
}

impl IoErrorEntry {
    pub fn new(file_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            message: message.into(),
        }
    }

    pub fn from_error(file_name: impl Into<String>, error: &AnnotationError) -> Self {
        Self::new(file_name, error.to_string())
    }
}

impl fmt::Display for IoErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.file_name, self.message)
    }
}

/// The aggregated outcome of one batch.
///
/// Immutable once built, except for the elapsed time, which the batch timer
/// fills in after the work is done.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IoResult {
    operation: OperationKind,
    success_count: usize,
    elapsed_ms: u64,
    errors: Vec<IoErrorEntry>,
}

impl IoResult {
    pub fn new(operation: OperationKind, success_count: usize, errors: Vec<IoErrorEntry>) -> Self {
        Self {
            operation,
            success_count,
            elapsed_ms: 0,
            errors,
        }
    }

    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }

    pub fn operation(&self) -> OperationKind {
        self.operation
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Errors in the order they were collected. Parallel batches do not
    /// guarantee any particular order.
    pub fn errors(&self) -> &[IoErrorEntry] {
        &self.errors
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Errors sorted by file name, then message.
    pub fn sorted_errors(&self) -> Vec<&IoErrorEntry> {
        let mut sorted: Vec<&IoErrorEntry> = self.errors.iter().collect();
        sorted.sort_by(|a, b| {
            a.file_name
                .cmp(&b.file_name)
                .then_with(|| a.message.cmp(&b.message))
        });
        sorted
    }
}

impl fmt::Display for IoResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} finished in {} ms: {} succeeded, {} error(s)",
            self.operation,
            self.elapsed_ms,
            self.success_count,
            self.errors.len()
        )?;
        for entry in self.sorted_errors() {
            writeln!(f, "  - {}", entry)?;
        }
        Ok(())
    }
}

/// What a codec got out of one file: zero or more annotations (JSON files
/// hold many, VOC and YOLO files one) and the problems it skipped over.
#[derive(Clone, Debug, Default)]
pub struct FileLoad {
    pub annotations: Vec<ImageAnnotation>,
    pub errors: Vec<IoErrorEntry>,
}

impl FileLoad {
    pub fn failed(file_name: impl Into<String>, error: &AnnotationError) -> Self {
        Self {
            annotations: Vec::new(),
            errors: vec![IoErrorEntry::from_error(file_name, error)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_is_set_after_construction() {
        let result = IoResult::new(OperationKind::Save, 3, vec![]).with_elapsed(42);
        assert_eq!(result.elapsed_ms(), 42);
        assert_eq!(result.success_count(), 3);
        assert!(!result.has_errors());
    }

    #[test]
    fn display_lists_errors_sorted() {
        let result = IoResult::new(
            OperationKind::Import,
            1,
            vec![
                IoErrorEntry::new("b.xml", "missing <filename> element in <annotation>"),
                IoErrorEntry::new("a.xml", "malformed XML: unexpected end of stream"),
            ],
        );
        let text = result.to_string();
        assert!(text.starts_with("import finished in 0 ms: 1 succeeded, 2 error(s)"));
        let a = text.find("a.xml").expect("a listed");
        let b = text.find("b.xml").expect("b listed");
        assert!(a < b);
    }

    #[test]
    fn result_serializes_to_json() {
        let result = IoResult::new(
            OperationKind::MetadataLoad,
            0,
            vec![IoErrorEntry::new("x.png", "could not read image header")],
        );
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"operation\":\"metadata_load\""));
        assert!(json.contains("\"file_name\":\"x.png\""));
    }

    #[test]
    fn failed_file_load_carries_one_error() {
        let load = FileLoad::failed("a.xml", &AnnotationError::UnknownImage("a.jpg".into()));
        assert!(load.annotations.is_empty());
        assert_eq!(
            load.errors,
            vec![IoErrorEntry::new(
                "a.xml",
                "annotation refers to non-existent image 'a.jpg'"
            )]
        );
    }
}
