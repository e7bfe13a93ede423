//! JSON reader and writer.
//!
//! The only format that round-trips every field of the model: tags, nested
//! parts and explicit category colors. A file holds an array of entries:
//!
//! ```json
//! [
//!   {
//!     "image": { "fileName": "dog.jpg", "folderName": "images", "width": 640.0, "height": 480.0 },
//!     "objects": [
//!       { "name": "dog", "color": "#ff0000", "bndbox": { "minX": 0.1, "minY": 0.2, "maxX": 0.5, "maxY": 0.9 },
//!         "tags": ["difficult"],
//!         "parts": [ { "name": "head", "polygon": [0.1, 0.2, 0.2, 0.2, 0.15, 0.3] } ] }
//!     ]
//!   }
//! ]
//! ```
//!
//! Entries and objects are decoded one at a time, so a malformed entry or
//! object is reported without affecting the rest of the file.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::normalize::{self, RELATIVE_FRACTION_DIGITS};
use super::registry::CategoryReconciler;
use super::shape::{BoundingShapeData, ShapeGeometry};
use super::{
    file_name_of, BBoxXYXY, ImageAnnotation, ImageAnnotationData, ImageMetaData, Polygon,
    RgbColor,
};
use crate::batch::{FileLoad, IoErrorEntry};
use crate::error::AnnotationError;

pub const JSON_EXTENSION: &str = "json";

/// File name used when a save destination is a directory.
pub const DEFAULT_JSON_FILE_NAME: &str = "annotations.json";

/// What one JSON document parsed into.
#[derive(Debug, Default)]
pub struct JsonDocument {
    pub annotations: Vec<ImageAnnotation>,
    /// Entries and objects that were skipped.
    pub entry_errors: Vec<AnnotationError>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonImage {
    file_name: String,
    #[serde(default)]
    folder_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    depth: Option<u32>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonBox {
    min_x: f64,
    min_y: f64,
    max_x: f64,
    max_y: f64,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    image: JsonImage,
    #[serde(default)]
    objects: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawObject {
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    bndbox: Option<JsonBox>,
    #[serde(default)]
    polygon: Option<Vec<f64>>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct EntryOut<'a> {
    image: JsonImage,
    objects: Vec<ObjectOut<'a>>,
}

#[derive(Debug, Serialize)]
struct ObjectOut<'a> {
    name: &'a str,
    color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    bndbox: Option<JsonBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    polygon: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "no_tags")]
    tags: &'a [String],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    parts: Vec<ObjectOut<'a>>,
}

fn no_tags(tags: &&[String]) -> bool {
    tags.is_empty()
}

/// Reads one JSON annotation file.
///
/// Entries whose image is not in `files_to_load`, or that have no objects,
/// are dropped without an error.
pub fn read_json_file(
    path: &Path,
    files_to_load: &HashSet<String>,
    reconciler: &CategoryReconciler,
) -> FileLoad {
    let label = file_name_of(path);
    let entries = File::open(path)
        .map_err(AnnotationError::from)
        .and_then(|file| {
            serde_json::from_reader::<_, Vec<Value>>(BufReader::new(file))
                .map_err(AnnotationError::from)
        });

    match entries {
        Ok(entries) => {
            let document =
                parse_entries(entries, reconciler, |name| files_to_load.contains(name));
            FileLoad {
                annotations: document.annotations,
                errors: document
                    .entry_errors
                    .iter()
                    .map(|err| IoErrorEntry::from_error(&label, err))
                    .collect(),
            }
        }
        Err(err) => {
            log::warn!("{label}: {err}");
            FileLoad::failed(label, &err)
        }
    }
}

/// Parses a JSON document from a string, accepting any image.
pub fn from_json_str(
    json: &str,
    reconciler: &CategoryReconciler,
) -> Result<JsonDocument, AnnotationError> {
    let entries: Vec<Value> = serde_json::from_str(json)?;
    Ok(parse_entries(entries, reconciler, |_| true))
}

/// Writes all annotations to one pretty-printed file.
///
/// If `path` is an existing directory the file is named
/// [`DEFAULT_JSON_FILE_NAME`]. Returns the path written.
pub fn write_json_file(
    data: &ImageAnnotationData,
    path: &Path,
) -> Result<PathBuf, AnnotationError> {
    let path = if path.is_dir() {
        path.join(DEFAULT_JSON_FILE_NAME)
    } else {
        path.to_path_buf()
    };

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &entries_out(data))?;
    writer.flush()?;
    Ok(path)
}

/// Serializes all annotations to a pretty-printed string.
pub fn to_json_string(data: &ImageAnnotationData) -> Result<String, AnnotationError> {
    Ok(serde_json::to_string_pretty(&entries_out(data))?)
}

fn parse_entries(
    entries: Vec<Value>,
    reconciler: &CategoryReconciler,
    accepts_image: impl Fn(&str) -> bool,
) -> JsonDocument {
    let mut document = JsonDocument::default();

    for value in entries {
        let entry = match serde_json::from_value::<RawEntry>(value) {
            Ok(entry) => entry,
            Err(err) => {
                document.entry_errors.push(err.into());
                continue;
            }
        };

        let image = entry.image;
        if !accepts_image(&image.file_name) {
            log::debug!("dropping entry for '{}': image not loaded", image.file_name);
            continue;
        }
        if let (Some(width), Some(height)) = (image.width, image.height) {
            if let Err(err) = normalize::check_image_size(width, height) {
                document.entry_errors.push(err.into());
                continue;
            }
        }

        let mut shapes = Vec::with_capacity(entry.objects.len());
        for object in entry.objects {
            match parse_object(object, reconciler, &mut document.entry_errors) {
                Ok(shape) => shapes.push(shape),
                Err(err) => document.entry_errors.push(err),
            }
        }

        if shapes.is_empty() {
            log::debug!("dropping entry for '{}': no objects", image.file_name);
            continue;
        }

        let mut meta = ImageMetaData::new(image.file_name, image.folder_name);
        meta.width = image.width;
        meta.height = image.height;
        meta.depth = image.depth;
        document.annotations.push(ImageAnnotation::new(meta, shapes));
    }

    document
}

fn parse_object(
    value: Value,
    reconciler: &CategoryReconciler,
    errors: &mut Vec<AnnotationError>,
) -> Result<BoundingShapeData, AnnotationError> {
    let raw: RawObject = serde_json::from_value(value)?;

    let geometry = match (raw.bndbox, raw.polygon) {
        (Some(bndbox), None) => {
            let bbox = BBoxXYXY::from_xyxy(bndbox.min_x, bndbox.min_y, bndbox.max_x, bndbox.max_y);
            normalize::check_relative_bbox(&bbox)?;
            ShapeGeometry::Box(bbox)
        }
        (None, Some(flat)) => {
            let polygon = Polygon::from_flat(&flat).ok_or_else(|| {
                AnnotationError::Geometry(format!(
                    "polygon of '{}' has an odd number of values ({})",
                    raw.name,
                    flat.len()
                ))
            })?;
            if polygon.is_empty() {
                return Err(AnnotationError::Geometry(format!(
                    "polygon of '{}' has no points",
                    raw.name
                )));
            }
            normalize::check_relative_polygon(&polygon)?;
            ShapeGeometry::Polygon(polygon)
        }
        (Some(_), Some(_)) => {
            return Err(AnnotationError::Geometry(format!(
                "object '{}' has both bndbox and polygon",
                raw.name
            )))
        }
        (None, None) => {
            return Err(AnnotationError::Geometry(format!(
                "object '{}' has neither bndbox nor polygon",
                raw.name
            )))
        }
    };

    // An unreadable color is reported but keeps the shape; the category then
    // gets its existing or a random color.
    let color = raw
        .color
        .as_deref()
        .and_then(|raw_color| match RgbColor::parse_web(raw_color) {
            Ok(color) => Some(color),
            Err(err) => {
                log::debug!("ignoring color of '{}': {err}", raw.name);
                errors.push(err);
                None
            }
        });
    let category = reconciler.resolve(&raw.name, color);
    let mut shape = BoundingShapeData::new(category, geometry).with_tags(raw.tags);

    for part in raw.parts {
        match parse_object(part, reconciler, errors) {
            Ok(part) => shape.add_part(part),
            Err(err) => errors.push(err),
        }
    }

    Ok(shape)
}

fn entries_out(data: &ImageAnnotationData) -> Vec<EntryOut<'_>> {
    data.annotations
        .iter()
        .map(|annotation| {
            let meta = &annotation.image_meta;
            EntryOut {
                image: JsonImage {
                    file_name: meta.file_name.clone(),
                    folder_name: meta.folder_name.clone(),
                    width: meta.width,
                    height: meta.height,
                    depth: meta.depth,
                },
                objects: annotation.shapes.iter().map(object_out).collect(),
            }
        })
        .collect()
}

fn object_out(shape: &BoundingShapeData) -> ObjectOut<'_> {
    let truncate = |value: f64| normalize::truncate_decimal(value, RELATIVE_FRACTION_DIGITS);
    let (bndbox, polygon) = match &shape.geometry {
        ShapeGeometry::Box(bbox) => (
            Some(JsonBox {
                min_x: truncate(bbox.xmin()),
                min_y: truncate(bbox.ymin()),
                max_x: truncate(bbox.xmax()),
                max_y: truncate(bbox.ymax()),
            }),
            None,
        ),
        ShapeGeometry::Polygon(polygon) => (
            None,
            Some(polygon.to_flat().into_iter().map(truncate).collect()),
        ),
    };

    ObjectOut {
        name: shape.category_name(),
        color: shape.category.color().to_hex(),
        bndbox,
        polygon,
        tags: &shape.tags,
        parts: shape.parts.iter().map(object_out).collect(),
    }
}
