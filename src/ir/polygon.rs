//! Closed polygons as ordered point lists.

use super::bbox::BBoxXYXY;
use super::coord::Coord;
use super::coord::{Normalized, Pixel};

/// An ordered list of vertices.
///
/// On disk polygons are flat `[x0, y0, x1, y1, ...]` lists; storing points
/// keeps the even-length invariant in the type.
#[derive(Clone, PartialEq)]
pub struct Polygon<TSpace> {
    points: Vec<Coord<TSpace>>,
}

impl<TSpace> Polygon<TSpace> {
    pub fn new(points: Vec<Coord<TSpace>>) -> Self {
        Self { points }
    }

    /// Builds a polygon from a flat coordinate list.
    ///
    /// Returns `None` when the list has odd length.
    pub fn from_flat(values: &[f64]) -> Option<Self> {
        if values.len() % 2 != 0 {
            return None;
        }
        Some(Self::new(
            values
                .chunks_exact(2)
                .map(|pair| Coord::new(pair[0], pair[1]))
                .collect(),
        ))
    }

    pub fn points(&self) -> &[Coord<TSpace>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Flattens back into `[x0, y0, x1, y1, ...]`.
    pub fn to_flat(&self) -> Vec<f64> {
        self.points.iter().flat_map(|p| [p.x, p.y]).collect()
    }

    /// Smallest axis-aligned box containing every vertex.
    pub fn bounding_box(&self) -> Option<BBoxXYXY<TSpace>> {
        let (first, rest) = self.points.split_first()?;
        let mut bbox = BBoxXYXY::from_xyxy(first.x, first.y, first.x, first.y);
        for point in rest {
            bbox.include(point);
        }
        Some(bbox)
    }

    /// Point-wise comparison with an absolute tolerance.
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.points.len() == other.points.len()
            && self
                .points
                .iter()
                .zip(&other.points)
                .all(|(a, b)| a.approx_eq(b, eps))
    }
}

impl<TSpace> std::fmt::Debug for Polygon<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.points.iter().map(|p| (p.x, p.y)))
            .finish()
    }
}

impl Polygon<Pixel> {
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> Polygon<Normalized> {
        Polygon::new(
            self.points
                .iter()
                .map(|p| p.divided(image_width, image_height))
                .collect(),
        )
    }
}

impl Polygon<Normalized> {
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> Polygon<Pixel> {
        Polygon::new(
            self.points
                .iter()
                .map(|p| p.scaled(image_width, image_height))
                .collect(),
        )
    }
}
