//! YOLO text reader and writer.
//!
//! A YOLO directory holds one `<stem>.txt` label file per image plus an
//! `object.data` file listing the category names, one per line; a label's
//! class index is the line number of its category in that file.
//!
//! Label files carry neither image dimensions nor tags or parts. Imported
//! annotations therefore have unknown dimensions until
//! [`ImageAnnotation::resolve_dimensions`] is called, and saving drops tags,
//! parts and polygons.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::normalize::{self, RELATIVE_FRACTION_DIGITS};
use super::registry::CategoryReconciler;
use super::shape::{BoundingShapeData, ShapeGeometry};
use super::{
    file_name_of, folder_name_of, BBoxXYXY, CategoryRef, ImageAnnotation, ImageAnnotationData,
    ImageMetaData, Normalized,
};
use crate::batch::{FileLoad, IoErrorEntry};
use crate::error::AnnotationError;

pub const YOLO_LABEL_EXTENSION: &str = "txt";

/// Sidecar file listing the category names.
pub const CATEGORY_FILE_NAME: &str = "object.data";

/// Image extensions tried, in order, when mapping a label file to its image.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// One parsed label line.
#[derive(Clone, Debug, PartialEq)]
pub struct YoloLabel {
    pub class_index: usize,
    pub bbox: BBoxXYXY<Normalized>,
}

/// Reads the category names from `dir/object.data`.
///
/// Blank lines are skipped. A missing file or one without any name is an
/// error for the whole directory.
pub fn read_category_file(dir: &Path) -> Result<Vec<String>, AnnotationError> {
    let path = dir.join(CATEGORY_FILE_NAME);
    let content = fs::read_to_string(&path).map_err(|source| AnnotationError::CategoryFile {
        path: path.clone(),
        message: format!("could not be read: {source}"),
    })?;

    let names: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToOwned::to_owned)
        .collect();

    if names.is_empty() {
        return Err(AnnotationError::CategoryFile {
            path,
            message: "lists no categories".to_string(),
        });
    }
    Ok(names)
}

/// Writes `dir/object.data` with one category name per line.
pub fn write_category_file(
    dir: &Path,
    categories: &[CategoryRef],
) -> Result<PathBuf, AnnotationError> {
    let mut content = String::new();
    for category in categories {
        content.push_str(category.name());
        content.push('\n');
    }

    let path = dir.join(CATEGORY_FILE_NAME);
    fs::write(&path, content)?;
    Ok(path)
}

/// Reads one label file.
///
/// `category_names` is the content of `object.data`. The label file maps to
/// the first `<stem>.<ext>` in `files_to_load`, trying [`IMAGE_EXTENSIONS`]
/// in order; without a match the file is rejected. Bad lines are reported
/// with their line number and skipped.
pub fn read_yolo_file(
    path: &Path,
    category_names: &[String],
    files_to_load: &HashSet<String>,
    reconciler: &CategoryReconciler,
) -> FileLoad {
    let label = file_name_of(path);

    let Some(image_name) = image_for_label(path, files_to_load) else {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let err = AnnotationError::UnknownImage(format!("{stem}.{}", IMAGE_EXTENSIONS[0]));
        log::warn!("{label}: {err}");
        return FileLoad::failed(label, &err);
    };

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => return FileLoad::failed(label, &err.into()),
    };

    let mut shapes = Vec::new();
    let mut errors = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        match parse_label_line(line, idx + 1, category_names.len()) {
            Ok(Some(row)) => {
                let category = reconciler.resolve(&category_names[row.class_index], None);
                shapes.push(BoundingShapeData::new_box(category, row.bbox));
            }
            Ok(None) => {}
            Err(err) => {
                log::debug!("{label}: {err}");
                errors.push(IoErrorEntry::from_error(&label, &err));
            }
        }
    }

    if shapes.is_empty() {
        log::debug!("{label}: no valid lines, skipping");
        return FileLoad {
            annotations: Vec::new(),
            errors,
        };
    }

    FileLoad {
        annotations: vec![ImageAnnotation::new(
            ImageMetaData::new(image_name, folder_name_of(path)),
            shapes,
        )],
        errors,
    }
}

fn image_for_label(path: &Path, files_to_load: &HashSet<String>) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| format!("{stem}.{ext}"))
        .find(|candidate| files_to_load.contains(candidate))
}

/// Parses one `class_index x_center y_center width height` line.
///
/// Blank lines yield `Ok(None)`. The class index must be below
/// `category_count`; the four ratios and the derived corners must lie in
/// `[0, 1]`.
pub fn parse_label_line(
    line: &str,
    line_num: usize,
    category_count: usize,
) -> Result<Option<YoloLabel>, AnnotationError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let line_error = |message: String| AnnotationError::Line {
        line: line_num,
        message,
    };

    // At most 6 tokens, so pathological lines do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() != 5 {
        return Err(line_error(format!(
            "expected 5 values, found {}{}",
            tokens.len(),
            if tokens.len() > 5 { " or more" } else { "" }
        )));
    }

    let class_index = tokens[0].parse::<usize>().map_err(|_| {
        line_error(format!(
            "invalid category index '{}'; expected a non-negative integer",
            tokens[0]
        ))
    })?;
    if class_index >= category_count {
        return Err(line_error(format!(
            "category index {class_index} is out of range for {category_count} categor{}",
            if category_count == 1 { "y" } else { "ies" }
        )));
    }

    let mut values = [0.0; 4];
    for (value, (raw, field)) in values.iter_mut().zip(
        tokens[1..]
            .iter()
            .zip(["x_center", "y_center", "width", "height"]),
    ) {
        *value = raw.parse::<f64>().map_err(|_| {
            line_error(format!("invalid {field} '{raw}'; expected a decimal number"))
        })?;
    }

    let [cx, cy, width, height] = values;
    let bbox = normalize::corners_from_center(cx, cy, width, height)
        .map_err(|err| line_error(err.to_string()))?;

    Ok(Some(YoloLabel { class_index, bbox }))
}

/// Serializes the boxes of one annotation, using the class order of `data`.
///
/// Polygons, tags and parts have no YOLO representation and are skipped.
pub fn to_yolo_string(
    annotation: &ImageAnnotation,
    data: &ImageAnnotationData,
) -> Result<String, AnnotationError> {
    let fmt = |value: f64| normalize::format_decimal(value, RELATIVE_FRACTION_DIGITS);
    let mut out = String::new();
    let mut dropped = 0usize;

    for shape in &annotation.shapes {
        dropped += shape.shape_count() - 1;
        let bbox = match &shape.geometry {
            ShapeGeometry::Box(bbox) => bbox,
            ShapeGeometry::Polygon(_) => {
                dropped += 1;
                continue;
            }
        };

        let class_index = data
            .category_index(shape.category_name())
            .ok_or_else(|| AnnotationError::UnknownCategory(shape.category_name().to_string()))?;
        let (cx, cy, width, height) = bbox.to_cxcywh();
        out.push_str(&format!(
            "{class_index} {} {} {} {}\n",
            fmt(cx),
            fmt(cy),
            fmt(width),
            fmt(height)
        ));
    }

    if dropped > 0 {
        log::debug!(
            "{}: dropped {dropped} polygon/part shape(s) not representable in YOLO",
            annotation.file_name()
        );
    }
    Ok(out)
}

/// Writes `<stem>.txt` into `dir` and returns its path. The file is written
/// even if the annotation has no boxes.
pub fn write_yolo_file(
    annotation: &ImageAnnotation,
    data: &ImageAnnotationData,
    dir: &Path,
) -> Result<PathBuf, AnnotationError> {
    let content = to_yolo_string(annotation, data)?;
    let path = dir.join(format!(
        "{}.{}",
        annotation.image_meta.base_name(),
        YOLO_LABEL_EXTENSION
    ));
    fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ObjectCategory, Polygon, RgbColor};
    use std::sync::Arc;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn load_set(values: &[&str]) -> HashSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn parse_label_line_accepts_valid_rows() {
        let parsed = parse_label_line("1 0.5 0.25 0.2 0.1", 1, 2)
            .expect("parse should succeed")
            .expect("line should produce a row");

        assert_eq!(parsed.class_index, 1);
        assert!(parsed
            .bbox
            .approx_eq(&BBoxXYXY::from_xyxy(0.4, 0.2, 0.6, 0.3), 1e-12));
    }

    #[test]
    fn parse_label_line_skips_blank_rows() {
        assert_eq!(parse_label_line("   ", 2, 1).expect("blank is fine"), None);
    }

    #[test]
    fn parse_label_line_reports_line_numbers() {
        let cases = [
            ("0 0.1 0.2", "expected 5 values, found 3"),
            ("0 0.1 0.2 0.3 0.4 0.5", "expected 5 values, found 6 or more"),
            ("-1 0.5 0.5 0.1 0.1", "invalid category index '-1'"),
            ("2 0.5 0.5 0.1 0.1", "category index 2 is out of range for 2 categories"),
            ("0 abc 0.5 0.1 0.1", "invalid x_center 'abc'"),
            ("0 0.5 0.5 1.5 0.1", "width value 1.5 is outside the range [0, 1]"),
            ("0 0.05 0.5 0.2 0.1", "xmin value"),
        ];

        for (line, expected) in cases {
            let err = parse_label_line(line, 7, 2).expect_err(line);
            let message = err.to_string();
            assert!(message.starts_with("line 7: "), "{message}");
            assert!(message.contains(expected), "{message} should contain {expected}");
        }
    }

    #[test]
    fn category_file_must_list_names() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = read_category_file(temp.path()).unwrap_err();
        assert!(matches!(err, AnnotationError::CategoryFile { .. }));

        fs::write(temp.path().join(CATEGORY_FILE_NAME), "\n  \n").expect("write");
        let err = read_category_file(temp.path()).unwrap_err();
        assert!(err.to_string().contains("lists no categories"));

        fs::write(temp.path().join(CATEGORY_FILE_NAME), "cat\n\n dog \n").expect("write");
        assert_eq!(
            read_category_file(temp.path()).expect("read"),
            names(&["cat", "dog"])
        );
    }

    #[test]
    fn read_yolo_file_builds_one_annotation() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("img1.txt");
        fs::write(&path, "0 0.5 0.5 0.2 0.2\n1 0.3 0.3 0.1 0.1").expect("write labels");

        let reconciler = CategoryReconciler::new();
        let load = read_yolo_file(
            &path,
            &names(&["cat", "dog"]),
            &load_set(&["img1.jpg"]),
            &reconciler,
        );

        assert!(load.errors.is_empty());
        assert_eq!(load.annotations.len(), 1);
        let annotation = &load.annotations[0];
        assert_eq!(annotation.file_name(), "img1.jpg");
        assert_eq!(annotation.image_meta.dimensions(), None);
        assert_eq!(annotation.shapes[0].category_name(), "cat");
        assert_eq!(annotation.shapes[1].category_name(), "dog");
        assert_eq!(reconciler.shape_count("cat"), 1);
        assert_eq!(reconciler.shape_count("dog"), 1);
    }

    #[test]
    fn bad_lines_are_reported_and_skipped() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("img1.txt");
        fs::write(&path, "0 0.5 0.5 0.2 0.2\n\n5 0.5 0.5 0.2 0.2\n0 0.5 x 0.2 0.2\n").expect("write");

        let reconciler = CategoryReconciler::new();
        let load = read_yolo_file(&path, &names(&["cat"]), &load_set(&["img1.jpg"]), &reconciler);

        assert_eq!(load.annotations.len(), 1);
        assert_eq!(load.annotations[0].shapes.len(), 1);
        let messages: Vec<&str> = load.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("line 3: "));
        assert!(messages[1].starts_with("line 4: "));
        assert!(load.errors.iter().all(|e| e.file_name == "img1.txt"));
    }

    #[test]
    fn label_maps_to_jpg_first_then_other_extensions() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("shot.txt");
        fs::write(&path, "0 0.5 0.5 0.2 0.2\n").expect("write");
        let categories = names(&["cat"]);
        let reconciler = CategoryReconciler::new();

        let load = read_yolo_file(&path, &categories, &load_set(&["shot.png", "shot.jpg"]), &reconciler);
        assert_eq!(load.annotations[0].file_name(), "shot.jpg");

        let load = read_yolo_file(&path, &categories, &load_set(&["shot.png"]), &reconciler);
        assert_eq!(load.annotations[0].file_name(), "shot.png");

        let load = read_yolo_file(&path, &categories, &load_set(&["other.jpg"]), &reconciler);
        assert!(load.annotations.is_empty());
        assert_eq!(
            load.errors,
            vec![IoErrorEntry::new(
                "shot.txt",
                "annotation refers to non-existent image 'shot.jpg'"
            )]
        );
    }

    #[test]
    fn writer_uses_class_order_and_drops_unsupported_shapes() {
        let cat = ObjectCategory::new("cat", RgbColor::rgb(1, 1, 1)).into_ref();
        let dog = ObjectCategory::new("dog", RgbColor::rgb(2, 2, 2)).into_ref();
        let dog_box = BoundingShapeData::new_box(Arc::clone(&dog), BBoxXYXY::from_xyxy(0.2, 0.2, 0.4, 0.6))
            .with_tags(["difficult"])
            .with_parts(vec![BoundingShapeData::new_box(
                Arc::clone(&cat),
                BBoxXYXY::from_xyxy(0.25, 0.25, 0.3, 0.3),
            )]);
        let outline = BoundingShapeData::new_polygon(
            Arc::clone(&cat),
            Polygon::from_flat(&[0.1, 0.1, 0.2, 0.1, 0.2, 0.2]).expect("even"),
        );
        let annotation = ImageAnnotation::new(
            ImageMetaData::new("img.jpg", "f"),
            vec![dog_box, outline],
        );
        let mut data = ImageAnnotationData::from_annotations(vec![annotation]);
        data.categories = vec![cat, dog];

        let text = to_yolo_string(&data.annotations[0], &data).expect("serialize");
        assert_eq!(text, "1 0.3 0.4 0.2 0.4\n");

        let temp = tempfile::tempdir().expect("create temp dir");
        let path = write_yolo_file(&data.annotations[0], &data, temp.path()).expect("write");
        assert_eq!(path, temp.path().join("img.txt"));

        let path = write_category_file(temp.path(), &data.categories).expect("write names");
        assert_eq!(fs::read_to_string(path).expect("read"), "cat\ndog\n");
    }

    #[test]
    fn writer_rejects_categories_missing_from_the_class_list() {
        let bird = ObjectCategory::new("bird", RgbColor::rgb(1, 1, 1)).into_ref();
        let annotation = ImageAnnotation::new(
            ImageMetaData::new("img.jpg", "f"),
            vec![BoundingShapeData::new_box(bird, BBoxXYXY::from_xyxy(0.1, 0.1, 0.2, 0.2))],
        );
        let data = ImageAnnotationData::default();
        assert!(matches!(
            to_yolo_string(&annotation, &data),
            Err(AnnotationError::UnknownCategory(name)) if name == "bird"
        ));
    }
}
