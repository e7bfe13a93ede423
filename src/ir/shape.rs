//! Labeled shapes and their part hierarchy.

use std::hash::{Hash, Hasher};

use super::bbox::BBoxXYXY;
use super::category::CategoryRef;
use super::normalize::COORDINATE_EPSILON;
use super::polygon::Polygon;
use super::Normalized;

/// The geometry of a shape, always in image-relative coordinates.
#[derive(Clone, Debug)]
pub enum ShapeGeometry {
    Box(BBoxXYXY<Normalized>),
    Polygon(Polygon<Normalized>),
}

impl ShapeGeometry {
    /// Short lowercase name used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ShapeGeometry::Box(_) => "box",
            ShapeGeometry::Polygon(_) => "polygon",
        }
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        match (self, other) {
            (ShapeGeometry::Box(a), ShapeGeometry::Box(b)) => a.approx_eq(b, eps),
            (ShapeGeometry::Polygon(a), ShapeGeometry::Polygon(b)) => a.approx_eq(b, eps),
            _ => false,
        }
    }
}

/// A labeled region with optional tags and nested part shapes.
///
/// `parts` is an owned tree: a "person" box may contain "head" and "hand"
/// parts, which may contain parts of their own. Equality compares geometry
/// within [`COORDINATE_EPSILON`], since shapes that went through a text
/// format pick up rounding error.
#[derive(Clone, Debug)]
pub struct BoundingShapeData {
    pub category: CategoryRef,
    pub geometry: ShapeGeometry,
    pub tags: Vec<String>,
    pub parts: Vec<BoundingShapeData>,
}

impl BoundingShapeData {
    pub fn new(category: CategoryRef, geometry: ShapeGeometry) -> Self {
        Self {
            category,
            geometry,
            tags: Vec::new(),
            parts: Vec::new(),
        }
    }

    pub fn new_box(category: CategoryRef, bbox: BBoxXYXY<Normalized>) -> Self {
        Self::new(category, ShapeGeometry::Box(bbox))
    }

    pub fn new_polygon(category: CategoryRef, polygon: Polygon<Normalized>) -> Self {
        Self::new(category, ShapeGeometry::Polygon(polygon))
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.push(tag.into());
    }

    pub fn set_parts(&mut self, parts: Vec<BoundingShapeData>) {
        self.parts = parts;
    }

    pub fn with_parts(mut self, parts: Vec<BoundingShapeData>) -> Self {
        self.parts = parts;
        self
    }

    pub fn add_part(&mut self, part: BoundingShapeData) {
        self.parts.push(part);
    }

    pub fn category_name(&self) -> &str {
        self.category.name()
    }

    pub fn as_box(&self) -> Option<&BBoxXYXY<Normalized>> {
        match &self.geometry {
            ShapeGeometry::Box(bbox) => Some(bbox),
            ShapeGeometry::Polygon(_) => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&Polygon<Normalized>> {
        match &self.geometry {
            ShapeGeometry::Polygon(polygon) => Some(polygon),
            ShapeGeometry::Box(_) => None,
        }
    }

    /// This shape plus all of its descendants.
    pub fn shape_count(&self) -> usize {
        1 + self.parts.iter().map(Self::shape_count).sum::<usize>()
    }

    /// Visits this shape and then every descendant, depth first.
    pub fn for_each_shape<'a>(&'a self, visit: &mut impl FnMut(&'a BoundingShapeData)) {
        visit(self);
        for part in &self.parts {
            part.for_each_shape(visit);
        }
    }
}

impl PartialEq for BoundingShapeData {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category
            && self.tags == other.tags
            && self.geometry.approx_eq(&other.geometry, COORDINATE_EPSILON)
            && self.parts == other.parts
    }
}

// Geometry is left out of the hash: tolerant equality is not transitive, so
// only the exactly-compared fields can feed the hasher.
impl Hash for BoundingShapeData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.category.hash(state);
        self.tags.hash(state);
        self.geometry.kind().hash(state);
        self.parts.hash(state);
    }
}
