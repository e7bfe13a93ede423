//! Per-image annotation model shared by every codec.
//!
//! Codecs parse into [`ImageAnnotation`]s and serialize from an
//! [`ImageAnnotationData`], which bundles the annotations with the category
//! order and shape counts a save needs.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use super::category::CategoryRef;
use super::registry::CategoryRegistry;
use super::shape::BoundingShapeData;
use crate::error::AnnotationError;

/// Image identity and size.
///
/// `width` and `height` are `None` when the annotation format does not carry
/// them (YOLO); they are filled in once the image header has been read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageMetaData {
    pub file_name: String,
    pub folder_name: String,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub depth: Option<u32>,
}

impl ImageMetaData {
    pub fn new(file_name: impl Into<String>, folder_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            folder_name: folder_name.into(),
            ..Default::default()
        }
    }

    pub fn with_size(mut self, width: f64, height: f64, depth: Option<u32>) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self.depth = depth;
        self
    }

    /// Reads width and height from the image header without decoding pixels.
    pub fn from_image_file(path: &Path) -> Result<Self, AnnotationError> {
        let size = imagesize::size(path)?;
        Ok(Self::new(file_name_of(path), folder_name_of(path)).with_size(
            size.width as f64,
            size.height as f64,
            None,
        ))
    }

    /// Both dimensions, or `None` if either is unknown.
    pub fn dimensions(&self) -> Option<(f64, f64)> {
        self.width.zip(self.height)
    }

    pub fn has_dimensions(&self) -> bool {
        self.dimensions().is_some()
    }

    /// File name without its extension.
    pub fn base_name(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.file_name)
    }
}

/// The last component of `path`, used to attribute errors to a file.
pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// The name of the directory containing `path`, or an empty string.
pub(crate) fn folder_name_of(path: &Path) -> String {
    path.parent()
        .and_then(|parent| parent.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// All shapes annotated on one image.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageAnnotation {
    pub image_meta: ImageMetaData,
    pub shapes: Vec<BoundingShapeData>,
}

impl ImageAnnotation {
    pub fn new(image_meta: ImageMetaData, shapes: Vec<BoundingShapeData>) -> Self {
        Self { image_meta, shapes }
    }

    pub fn file_name(&self) -> &str {
        &self.image_meta.file_name
    }

    /// Number of shapes including nested parts.
    pub fn shape_count(&self) -> usize {
        self.shapes.iter().map(BoundingShapeData::shape_count).sum()
    }

    /// Fills in unknown image dimensions from `image_dir/<file_name>`.
    ///
    /// Returns `Ok(false)` if the dimensions were already known.
    pub fn resolve_dimensions(&mut self, image_dir: &Path) -> Result<bool, AnnotationError> {
        if self.image_meta.has_dimensions() {
            return Ok(false);
        }
        let header = ImageMetaData::from_image_file(&image_dir.join(&self.image_meta.file_name))?;
        self.image_meta.width = header.width;
        self.image_meta.height = header.height;
        Ok(true)
    }
}

/// Everything a save needs: the annotations, the category order (YOLO class
/// indices follow it) and the number of shapes per category.
#[derive(Clone, Debug, Default)]
pub struct ImageAnnotationData {
    pub annotations: Vec<ImageAnnotation>,
    pub categories: Vec<CategoryRef>,
    pub category_shape_counts: BTreeMap<String, usize>,
}

impl ImageAnnotationData {
    /// Uses the categories in the order they first appear in `annotations`.
    pub fn from_annotations(annotations: Vec<ImageAnnotation>) -> Self {
        Self::assemble(annotations, Vec::new())
    }

    /// Uses the registry's category order; categories that only appear in
    /// `annotations` are appended after it.
    pub fn with_registry(annotations: Vec<ImageAnnotation>, registry: &CategoryRegistry) -> Self {
        Self::assemble(annotations, registry.categories().to_vec())
    }

    fn assemble(annotations: Vec<ImageAnnotation>, mut categories: Vec<CategoryRef>) -> Self {
        let mut category_shape_counts = BTreeMap::new();
        for annotation in &annotations {
            for shape in &annotation.shapes {
                shape.for_each_shape(&mut |shape| {
                    let name = shape.category_name();
                    *category_shape_counts.entry(name.to_string()).or_insert(0) += 1;
                    if !categories.iter().any(|c| c.name() == name) {
                        categories.push(Arc::clone(&shape.category));
                    }
                });
            }
        }

        Self {
            annotations,
            categories,
            category_shape_counts,
        }
    }

    /// Position of `name` in the category order.
    pub fn category_index(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.name() == name)
    }

    pub fn shape_count(&self, name: &str) -> usize {
        self.category_shape_counts.get(name).copied().unwrap_or(0)
    }
}
