#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};

use labelport::ir::{
    BBoxXYXY, BoundingShapeData, CategoryRef, Coord, ImageAnnotation, ImageMetaData,
    ObjectCategory, Pixel, Polygon, RgbColor,
};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Pixel coordinates are generated on the integer grid, which survives the
/// two-decimal VOC output exactly.
pub const EPS_VOC: f64 = 1e-9;
/// JSON truncates to six fraction digits.
pub const EPS_JSON: f64 = 2e-6;
/// YOLO rounds center and size to six digits; corners pick up both errors.
pub const EPS_YOLO: f64 = 1e-5;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Which shape features a generated annotation may use.
#[derive(Clone, Copy, Debug)]
pub struct ShapeFeatures {
    pub polygons: bool,
    pub parts: bool,
    pub tags: &'static [&'static str],
}

/// Everything the JSON format stores.
pub const JSON_FEATURES: ShapeFeatures = ShapeFeatures {
    polygons: true,
    parts: true,
    tags: &["pose: Left", "difficult", "colour: red", "note: \"a\" & <b>"],
};

/// Tags listed in the order the VOC writer emits them.
pub const VOC_FEATURES: ShapeFeatures = ShapeFeatures {
    polygons: true,
    parts: true,
    tags: &["pose: Left", "truncated", "occluded", "difficult", "action: jumping"],
};

pub const YOLO_FEATURES: ShapeFeatures = ShapeFeatures {
    polygons: false,
    parts: false,
    tags: &[],
};

const CATEGORY_NAMES: [&str; 5] = ["cat", "dog", "person", "car", "traffic light"];

type ShapeSeed = (u8, bool, Vec<u32>, u8);
type ObjectSeed = (ShapeSeed, Vec<ShapeSeed>);

/// Annotations for 1..=`max_images` distinct images, each with
/// 1..=`max_shapes` top-level shapes.
pub fn arb_annotations(
    max_images: usize,
    max_shapes: usize,
    features: ShapeFeatures,
) -> BoxedStrategy<Vec<ImageAnnotation>> {
    assert!(max_images > 0, "max_images must be > 0");
    assert!(max_shapes > 0, "max_shapes must be > 0");

    proptest::collection::hash_map(
        image_file_name_strategy(),
        (2u32..=4096, 2u32..=4096, any::<bool>()),
        1..=max_images,
    )
    .prop_flat_map(move |images| {
        let mut rows: Vec<(String, (u32, u32, bool))> = images.into_iter().collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        let count = rows.len();
        (
            Just(rows),
            proptest::collection::vec(
                proptest::collection::vec(object_seed_strategy(), 1..=max_shapes),
                count..=count,
            ),
        )
    })
    .prop_map(move |(rows, seeds)| build_annotations(rows, seeds, features))
    .boxed()
}

pub fn file_names(annotations: &[ImageAnnotation]) -> HashSet<String> {
    annotations
        .iter()
        .map(|annotation| annotation.file_name().to_string())
        .collect()
}

/// Shapes per category name, nested parts included.
pub fn category_counts(annotations: &[ImageAnnotation]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for annotation in annotations {
        for shape in &annotation.shapes {
            shape.for_each_shape(&mut |shape| {
                *counts.entry(shape.category_name().to_string()).or_insert(0) += 1;
            });
        }
    }
    counts
}

pub fn sorted_by_file_name(mut annotations: Vec<ImageAnnotation>) -> Vec<ImageAnnotation> {
    annotations.sort_by(|a, b| a.file_name().cmp(b.file_name()));
    annotations
}

/// Compares file names and shape trees, with geometry within `eps`.
pub fn assert_annotations_close(
    left: &[ImageAnnotation],
    right: &[ImageAnnotation],
    eps: f64,
) -> Result<(), String> {
    if left.len() != right.len() {
        return Err(format!(
            "annotation count mismatch: left={} right={}",
            left.len(),
            right.len()
        ));
    }

    for (a, b) in left.iter().zip(right) {
        if a.file_name() != b.file_name() {
            return Err(format!(
                "file name mismatch: '{}' vs '{}'",
                a.file_name(),
                b.file_name()
            ));
        }
        assert_shapes_close(&a.shapes, &b.shapes, eps)
            .map_err(|message| format!("{}: {message}", a.file_name()))?;
    }
    Ok(())
}

fn assert_shapes_close(
    left: &[BoundingShapeData],
    right: &[BoundingShapeData],
    eps: f64,
) -> Result<(), String> {
    if left.len() != right.len() {
        return Err(format!(
            "shape count mismatch: left={} right={}",
            left.len(),
            right.len()
        ));
    }

    for (a, b) in left.iter().zip(right) {
        if a.category_name() != b.category_name() {
            return Err(format!(
                "category mismatch: '{}' vs '{}'",
                a.category_name(),
                b.category_name()
            ));
        }
        if a.tags != b.tags {
            return Err(format!("tag mismatch: {:?} vs {:?}", a.tags, b.tags));
        }
        if !a.geometry.approx_eq(&b.geometry, eps) {
            return Err(format!(
                "geometry of '{}' differs beyond {eps}: {:?} vs {:?}",
                a.category_name(),
                a.geometry,
                b.geometry
            ));
        }
        assert_shapes_close(&a.parts, &b.parts, eps)?;
    }
    Ok(())
}

fn shape_seed_strategy() -> impl Strategy<Value = ShapeSeed> {
    (
        any::<u8>(),
        any::<bool>(),
        proptest::collection::vec(any::<u32>(), 12..=12),
        any::<u8>(),
    )
}

fn object_seed_strategy() -> impl Strategy<Value = ObjectSeed> {
    (
        shape_seed_strategy(),
        proptest::collection::vec(shape_seed_strategy(), 0..=2),
    )
}

fn image_file_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z0-9_]{1,12}\\.jpg")
        .expect("valid filename regex")
        .boxed()
}

fn build_annotations(
    rows: Vec<(String, (u32, u32, bool))>,
    seeds: Vec<Vec<ObjectSeed>>,
    features: ShapeFeatures,
) -> Vec<ImageAnnotation> {
    let categories: HashMap<&str, CategoryRef> = CATEGORY_NAMES
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let shade = (idx * 50) as u8;
            (*name, ObjectCategory::new(*name, RgbColor::rgb(shade, 255 - shade, 128)).into_ref())
        })
        .collect();

    rows.into_iter()
        .zip(seeds)
        .map(|((file_name, (width, height, with_depth)), objects)| {
            let shapes = objects
                .into_iter()
                .map(|(seed, part_seeds)| {
                    let mut shape = build_shape(&seed, width, height, features, &categories);
                    if features.parts {
                        shape.set_parts(
                            part_seeds
                                .iter()
                                .map(|part| build_shape(part, width, height, features, &categories))
                                .collect(),
                        );
                    }
                    shape
                })
                .collect();

            let depth = with_depth.then_some(3);
            ImageAnnotation::new(
                ImageMetaData::new(file_name, "images").with_size(
                    width as f64,
                    height as f64,
                    depth,
                ),
                shapes,
            )
        })
        .collect()
}

fn build_shape(
    seed: &ShapeSeed,
    width: u32,
    height: u32,
    features: ShapeFeatures,
    categories: &HashMap<&str, CategoryRef>,
) -> BoundingShapeData {
    let (category_seed, polygon, coords, tag_mask) = seed;
    let name = CATEGORY_NAMES[*category_seed as usize % CATEGORY_NAMES.len()];
    let category = categories[name].clone();
    let (w, h) = (width as f64, height as f64);

    let shape = if features.polygons && *polygon {
        let count = 3 + coords[0] as usize % 4;
        let points = coords[..count * 2]
            .chunks_exact(2)
            .map(|pair| Coord::<Pixel>::new((pair[0] % (width + 1)) as f64, (pair[1] % (height + 1)) as f64))
            .collect();
        BoundingShapeData::new_polygon(category, Polygon::new(points).to_normalized(w, h))
    } else {
        let bbox = bbox_from_seed(width, height, coords[0], coords[1], coords[2], coords[3]);
        BoundingShapeData::new_box(category, bbox.to_normalized(w, h))
    };

    let tags = features
        .tags
        .iter()
        .enumerate()
        .filter(|(idx, _)| tag_mask & (1 << idx) != 0)
        .map(|(_, tag)| *tag);
    shape.with_tags(tags)
}

fn bbox_from_seed(width: u32, height: u32, sx: u32, sy: u32, sw: u32, sh: u32) -> BBoxXYXY<Pixel> {
    let xmin = sx % (width - 1);
    let ymin = sy % (height - 1);
    let xmax = xmin + 1 + (sw % (width - xmin));
    let ymax = ymin + 1 + (sh % (height - ymin));

    BBoxXYXY::from_xyxy(xmin as f64, ymin as f64, xmax as f64, ymax as f64)
}
