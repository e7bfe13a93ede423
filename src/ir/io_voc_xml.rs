//! Pascal VOC XML reader and writer.
//!
//! One XML file per image, stored flat in a single directory. Files on disk
//! hold pixel coordinates; the `<size>` header is used to convert them to
//! the image-relative values the model stores.
//!
//! Tags map onto the VOC object elements: `pose: <value>`, `truncated`,
//! `occluded`, `difficult` and `action: <name>`. Any other tag has no VOC
//! element and is dropped on save.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;

use super::normalize::{self, VOC_FRACTION_DIGITS};
use super::registry::CategoryReconciler;
use super::shape::{BoundingShapeData, ShapeGeometry};
use super::{file_name_of, BBoxXYXY, Coord, ImageAnnotation, ImageMetaData, Pixel, Polygon};
use crate::batch::{FileLoad, IoErrorEntry};
use crate::error::AnnotationError;

pub const VOC_XML_EXTENSION: &str = "xml";

/// Appended to the image base name when writing (`dog.jpg` -> `dog_A.xml`).
pub const VOC_FILE_SUFFIX: &str = "_A";

/// Deepest `<part>` nesting that is parsed. Deeper parts are reported and
/// skipped, keeping recursion bounded for arbitrary input.
pub const MAX_PART_DEPTH: usize = 64;

const UNSPECIFIED_POSE: &str = "unspecified";
const FLAG_TAGS: [&str; 3] = ["truncated", "occluded", "difficult"];
const POSE_PREFIX: &str = "pose:";
const ACTION_PREFIX: &str = "action:";

/// What one VOC document parsed into.
#[derive(Debug, Default)]
pub struct VocDocument {
    /// `None` when the document held no valid object.
    pub annotation: Option<ImageAnnotation>,
    /// Objects and parts that were skipped.
    pub object_errors: Vec<AnnotationError>,
}

/// Reads one annotation file.
///
/// The file is rejected as a whole if it is not well-formed, lacks a
/// required header element, or names an image outside `files_to_load`.
/// Invalid objects and parts are reported and skipped individually.
pub fn read_voc_file(
    path: &Path,
    files_to_load: &HashSet<String>,
    reconciler: &CategoryReconciler,
) -> FileLoad {
    let label = file_name_of(path);
    let xml = match fs::read_to_string(path) {
        Ok(xml) => xml,
        Err(err) => return FileLoad::failed(label, &err.into()),
    };

    match parse_voc_document(&xml, reconciler, |name| files_to_load.contains(name)) {
        Ok(document) => {
            if document.annotation.is_none() {
                log::debug!("{label}: no valid objects, skipping");
            }
            FileLoad {
                annotations: document.annotation.into_iter().collect(),
                errors: document
                    .object_errors
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

/// Parses VOC XML from a string, accepting any `<filename>`.
pub fn from_voc_xml_str(
    xml: &str,
    reconciler: &CategoryReconciler,
) -> Result<VocDocument, AnnotationError> {
    parse_voc_document(xml, reconciler, |_| true)
}

/// Parses VOC XML from bytes. The input must be valid UTF-8.
pub fn from_voc_xml_slice(
    bytes: &[u8],
    reconciler: &CategoryReconciler,
) -> Result<VocDocument, AnnotationError> {
    let xml = std::str::from_utf8(bytes)
        .map_err(|source| AnnotationError::Xml(format!("input is not valid UTF-8: {source}")))?;
    from_voc_xml_str(xml, reconciler)
}

/// Writes `<base>_A.xml` into `dir` and returns its path.
pub fn write_voc_file(annotation: &ImageAnnotation, dir: &Path) -> Result<PathBuf, AnnotationError> {
    let xml = to_voc_xml_string(annotation)?;
    let path = dir.join(voc_file_name(&annotation.image_meta));
    fs::write(&path, xml)?;
    Ok(path)
}

/// The file name an annotation is saved under.
pub fn voc_file_name(meta: &ImageMetaData) -> String {
    format!(
        "{}{}.{}",
        meta.base_name(),
        VOC_FILE_SUFFIX,
        VOC_XML_EXTENSION
    )
}

/// Serializes one annotation. Fails if the image size is unknown, since
/// pixel coordinates cannot be computed without it.
pub fn to_voc_xml_string(annotation: &ImageAnnotation) -> Result<String, AnnotationError> {
    let meta = &annotation.image_meta;
    let (width, height) = meta
        .dimensions()
        .ok_or_else(|| AnnotationError::MissingDimensions(meta.file_name.clone()))?;
    normalize::check_image_size(width, height)?;

    let mut xml = XmlWriter::new();
    xml.open("annotation");
    xml.leaf("folder", &meta.folder_name);
    xml.leaf("filename", &meta.file_name);
    xml.open("size");
    xml.leaf("width", &normalize::format_decimal(width, VOC_FRACTION_DIGITS));
    xml.leaf("height", &normalize::format_decimal(height, VOC_FRACTION_DIGITS));
    if let Some(depth) = meta.depth {
        xml.leaf("depth", &depth.to_string());
    }
    xml.close("size");

    for shape in &annotation.shapes {
        write_object(&mut xml, "object", shape, width, height);
    }

    xml.close("annotation");
    Ok(xml.finish())
}

fn parse_voc_document(
    xml: &str,
    reconciler: &CategoryReconciler,
    accepts_image: impl Fn(&str) -> bool,
) -> Result<VocDocument, AnnotationError> {
    let document =
        roxmltree::Document::parse(xml).map_err(|source| AnnotationError::Xml(source.to_string()))?;

    let root = document.root_element();
    if root.tag_name().name() != "annotation" {
        return Err(AnnotationError::MissingElement {
            tag: "annotation".to_string(),
            context: "document".to_string(),
        });
    }

    let file_name = required_child_text(root, "filename")?;
    if !accepts_image(&file_name) {
        return Err(AnnotationError::UnknownImage(file_name));
    }

    let folder_name = optional_child_text(root, "folder").unwrap_or_default();
    let size = required_child_element(root, "size")?;
    let width = parse_required_f64(size, "width")?;
    let height = parse_required_f64(size, "height")?;
    normalize::check_image_size(width, height)?;
    let depth = optional_child_text(size, "depth")
        .map(|raw| {
            raw.parse::<u32>().map_err(|_| AnnotationError::InvalidNumber {
                tag: "depth".to_string(),
                raw,
                expected: "a non-negative integer",
            })
        })
        .transpose()?;

    let mut object_errors = Vec::new();
    let mut shapes = Vec::new();
    for object in child_elements(root, "object") {
        match parse_object(object, 0, width, height, reconciler, &mut object_errors) {
            Ok(shape) => shapes.push(shape),
            Err(err) => object_errors.push(err),
        }
    }

    let annotation = (!shapes.is_empty()).then(|| {
        ImageAnnotation::new(
            ImageMetaData::new(file_name, folder_name).with_size(width, height, depth),
            shapes,
        )
    });

    Ok(VocDocument {
        annotation,
        object_errors,
    })
}

// Parts are only visited once their parent has validated, so an invalid
// object never leaves orphaned parts (or their category counts) behind.
fn parse_object(
    node: Node<'_, '_>,
    depth: usize,
    image_width: f64,
    image_height: f64,
    reconciler: &CategoryReconciler,
    errors: &mut Vec<AnnotationError>,
) -> Result<BoundingShapeData, AnnotationError> {
    let name = required_child_text(node, "name")?;
    let geometry = parse_geometry(node, &name, image_width, image_height)?;
    let tags = parse_tags(node);

    let category = reconciler.resolve(&name, None);
    let mut shape = BoundingShapeData::new(category, geometry).with_tags(tags);

    let mut parts = child_elements(node, "part").peekable();
    if depth >= MAX_PART_DEPTH {
        if parts.peek().is_some() {
            errors.push(AnnotationError::Geometry(format!(
                "parts of '{name}' are nested deeper than {MAX_PART_DEPTH} levels"
            )));
        }
        return Ok(shape);
    }

    for part in parts {
        match parse_object(part, depth + 1, image_width, image_height, reconciler, errors) {
            Ok(part) => shape.add_part(part),
            Err(err) => {
                log::debug!("skipping part of '{name}': {err}");
                errors.push(err);
            }
        }
    }

    Ok(shape)
}

fn parse_geometry(
    node: Node<'_, '_>,
    name: &str,
    image_width: f64,
    image_height: f64,
) -> Result<ShapeGeometry, AnnotationError> {
    let element = node.tag_name().name();
    match (child_element(node, "bndbox"), child_element(node, "polygon")) {
        (Some(bndbox), None) => {
            let bbox = BBoxXYXY::<Pixel>::from_xyxy(
                parse_required_f64(bndbox, "xmin")?,
                parse_required_f64(bndbox, "ymin")?,
                parse_required_f64(bndbox, "xmax")?,
                parse_required_f64(bndbox, "ymax")?,
            );
            Ok(ShapeGeometry::Box(normalize::relative_bbox(
                &bbox,
                image_width,
                image_height,
            )?))
        }
        (None, Some(polygon)) => {
            let polygon = parse_polygon(polygon)?;
            Ok(ShapeGeometry::Polygon(normalize::relative_polygon(
                &polygon,
                image_width,
                image_height,
            )?))
        }
        (Some(_), Some(_)) => Err(AnnotationError::Geometry(format!(
            "<{element}> '{name}' has both <bndbox> and <polygon>"
        ))),
        (None, None) => Err(AnnotationError::Geometry(format!(
            "<{element}> '{name}' has neither <bndbox> nor <polygon>"
        ))),
    }
}

/// Collects `<x>`/`<y>` (or `<x1>`/`<y1>`, ...) children in document order.
fn parse_polygon(node: Node<'_, '_>) -> Result<Polygon<Pixel>, AnnotationError> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();

    for child in node.children().filter(|child| child.is_element()) {
        let tag = child.tag_name().name();
        let values = match axis_of(tag) {
            Some('x') => &mut xs,
            Some(_) => &mut ys,
            None => continue,
        };
        values.push(parse_f64_text(child, tag)?);
    }

    if xs.len() != ys.len() {
        return Err(AnnotationError::Geometry(format!(
            "<polygon> has {} x value(s) but {} y value(s)",
            xs.len(),
            ys.len()
        )));
    }
    if xs.is_empty() {
        return Err(AnnotationError::Geometry(
            "<polygon> has no points".to_string(),
        ));
    }

    Ok(Polygon::new(
        xs.into_iter()
            .zip(ys)
            .map(|(x, y)| Coord::new(x, y))
            .collect(),
    ))
}

fn axis_of(tag: &str) -> Option<char> {
    let mut chars = tag.chars();
    let axis = chars.next().filter(|c| *c == 'x' || *c == 'y')?;
    chars.all(|c| c.is_ascii_digit()).then_some(axis)
}

fn parse_tags(node: Node<'_, '_>) -> Vec<String> {
    let mut tags = Vec::new();

    if let Some(pose) = optional_child_text(node, "pose") {
        if !pose.eq_ignore_ascii_case(UNSPECIFIED_POSE) {
            tags.push(format!("pose: {pose}"));
        }
    }

    for flag in FLAG_TAGS {
        if optional_child_text(node, flag).is_some_and(|value| is_truthy(&value)) {
            tags.push(flag.to_string());
        }
    }

    if let Some(actions) = child_element(node, "actions") {
        for action in actions.children().filter(|child| child.is_element()) {
            if action.text().is_some_and(is_truthy) {
                tags.push(format!("action: {}", action.tag_name().name()));
            }
        }
    }

    tags
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn write_object(
    xml: &mut XmlWriter,
    element: &str,
    shape: &BoundingShapeData,
    image_width: f64,
    image_height: f64,
) {
    let fmt = |value: f64| normalize::format_decimal(value, VOC_FRACTION_DIGITS);

    xml.open(element);
    xml.leaf("name", shape.category_name());

    let tags = VocTags::classify(&shape.tags);
    if let Some(pose) = tags.pose {
        xml.leaf("pose", pose);
    }
    for (flag, set) in FLAG_TAGS.iter().zip(tags.flags) {
        if set {
            xml.leaf(flag, "1");
        }
    }
    if !tags.actions.is_empty() {
        xml.open("actions");
        for action in &tags.actions {
            xml.leaf(action, "1");
        }
        xml.close("actions");
    }

    match &shape.geometry {
        ShapeGeometry::Box(bbox) => {
            let bbox = bbox.to_pixel(image_width, image_height);
            xml.open("bndbox");
            xml.leaf("xmin", &fmt(bbox.xmin()));
            xml.leaf("xmax", &fmt(bbox.xmax()));
            xml.leaf("ymin", &fmt(bbox.ymin()));
            xml.leaf("ymax", &fmt(bbox.ymax()));
            xml.close("bndbox");
        }
        ShapeGeometry::Polygon(polygon) => {
            let polygon = polygon.to_pixel(image_width, image_height);
            xml.open("polygon");
            for (idx, point) in polygon.points().iter().enumerate() {
                xml.leaf(&format!("x{}", idx + 1), &fmt(point.x));
                xml.leaf(&format!("y{}", idx + 1), &fmt(point.y));
            }
            xml.close("polygon");
        }
    }

    for part in &shape.parts {
        write_object(xml, "part", part, image_width, image_height);
    }

    xml.close(element);
}

/// Shape tags sorted into the elements VOC can express.
#[derive(Debug, Default)]
struct VocTags<'a> {
    pose: Option<&'a str>,
    flags: [bool; 3],
    actions: Vec<&'a str>,
}

impl<'a> VocTags<'a> {
    fn classify(tags: &'a [String]) -> Self {
        let mut classified = Self::default();

        for tag in tags {
            let trimmed = tag.trim();
            if let Some(pose) = strip_prefix_ignore_case(trimmed, POSE_PREFIX) {
                let pose = pose.trim();
                if classified.pose.is_none()
                    && !pose.is_empty()
                    && !pose.eq_ignore_ascii_case(UNSPECIFIED_POSE)
                {
                    classified.pose = Some(pose);
                }
            } else if let Some(action) = strip_prefix_ignore_case(trimmed, ACTION_PREFIX) {
                let action = action.trim();
                if !is_xml_name(action) {
                    log::debug!("dropping tag '{tag}': '{action}' is not a valid element name");
                } else if !classified.actions.contains(&action) {
                    classified.actions.push(action);
                }
            } else if let Some(idx) = FLAG_TAGS
                .iter()
                .position(|flag| trimmed.eq_ignore_ascii_case(flag))
            {
                classified.flags[idx] = true;
            } else {
                log::debug!("dropping tag '{tag}': no Pascal VOC element for it");
            }
        }

        classified
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Indented XML builder for the fixed VOC layout.
struct XmlWriter {
    out: String,
    depth: usize,
}

impl XmlWriter {
    fn new() -> Self {
        Self {
            out: String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"),
            depth: 0,
        }
    }

    fn open(&mut self, tag: &str) {
        self.indent();
        self.out.push('<');
        self.out.push_str(tag);
        self.out.push_str(">\n");
        self.depth += 1;
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push_str(">\n");
    }

    fn leaf(&mut self, tag: &str, text: &str) {
        self.indent();
        self.out
            .push_str(&format!("<{tag}>{}</{tag}>\n", xml_escape(text)));
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.out.push_str("  ");
        }
    }

    fn finish(self) -> String {
        self.out
    }
}

fn required_child_element<'a, 'input>(
    node: Node<'a, 'input>,
    tag: &str,
) -> Result<Node<'a, 'input>, AnnotationError> {
    child_element(node, tag).ok_or_else(|| missing(node, tag))
}

fn required_child_text(node: Node<'_, '_>, tag: &str) -> Result<String, AnnotationError> {
    optional_child_text(node, tag).ok_or_else(|| missing(node, tag))
}

fn parse_required_f64(node: Node<'_, '_>, tag: &str) -> Result<f64, AnnotationError> {
    let child = required_child_element(node, tag)?;
    parse_f64_text(child, tag)
}

fn parse_f64_text(node: Node<'_, '_>, tag: &str) -> Result<f64, AnnotationError> {
    let raw = node.text().map(str::trim).unwrap_or_default();
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| AnnotationError::InvalidNumber {
            tag: tag.to_string(),
            raw: raw.to_string(),
            expected: "a decimal number",
        })
}

fn missing(node: Node<'_, '_>, tag: &str) -> AnnotationError {
    AnnotationError::MissingElement {
        tag: tag.to_string(),
        context: node.tag_name().name().to_string(),
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn child_elements<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children()
        .filter(move |child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
