//! Axis-aligned boxes.

use std::fmt;
use std::marker::PhantomData;

use super::coord::{Coord, Normalized, Pixel};

/// A box given by its left, top, right and bottom edges.
///
/// Ordering and range are not enforced here; every box a codec produces has
/// been through [`normalize`](super::normalize) first.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    xmin: f64,
    ymin: f64,
    xmax: f64,
    ymax: f64,
    space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            space: PhantomData,
        }
    }

    pub fn from_corners(min: Coord<TSpace>, max: Coord<TSpace>) -> Self {
        Self::from_xyxy(min.x, min.y, max.x, max.y)
    }

    /// The YOLO layout: center point plus full width and height.
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::from_xyxy(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn ymin(&self) -> f64 {
        self.ymin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    pub fn ymax(&self) -> f64 {
        self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// `(cx, cy, width, height)`
    pub fn to_cxcywh(&self) -> (f64, f64, f64, f64) {
        (
            (self.xmin + self.xmax) / 2.0,
            (self.ymin + self.ymax) / 2.0,
            self.width(),
            self.height(),
        )
    }

    /// Top-left and bottom-right corners.
    pub fn corners(&self) -> (Coord<TSpace>, Coord<TSpace>) {
        (
            Coord::new(self.xmin, self.ymin),
            Coord::new(self.xmax, self.ymax),
        )
    }

    /// Grows the box to cover `point`.
    pub fn include(&mut self, point: &Coord<TSpace>) {
        self.xmin = self.xmin.min(point.x);
        self.ymin = self.ymin.min(point.y);
        self.xmax = self.xmax.max(point.x);
        self.ymax = self.ymax.max(point.y);
    }

    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        let (min, max) = self.corners();
        let (other_min, other_max) = other.corners();
        min.approx_eq(&other_min, eps) && max.approx_eq(&other_max, eps)
    }
}

impl<TSpace> fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BBox[{}, {} .. {}, {}]",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

impl BBoxXYXY<Pixel> {
    /// Divides by the image size without range checks.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> BBoxXYXY<Normalized> {
        let (min, max) = self.corners();
        BBoxXYXY::from_corners(
            min.divided(image_width, image_height),
            max.divided(image_width, image_height),
        )
    }
}

impl BBoxXYXY<Normalized> {
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> BBoxXYXY<Pixel> {
        let (min, max) = self.corners();
        BBoxXYXY::from_corners(
            min.scaled(image_width, image_height),
            max.scaled(image_width, image_height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_form_round_trips() {
        let bbox: BBoxXYXY<Normalized> = BBoxXYXY::from_cxcywh(0.5, 0.5, 0.2, 0.4);
        assert!(bbox.approx_eq(&BBoxXYXY::from_xyxy(0.4, 0.3, 0.6, 0.7), 1e-12));

        let (cx, cy, w, h) = bbox.to_cxcywh();
        for (got, want) in [(cx, 0.5), (cy, 0.5), (w, 0.2), (h, 0.4)] {
            assert!((got - want).abs() < 1e-12, "{got} != {want}");
        }
    }

    #[test]
    fn include_grows_to_cover_points() {
        let mut bbox: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(10.0, 10.0, 10.0, 10.0);
        bbox.include(&Coord::new(4.0, 30.0));
        bbox.include(&Coord::new(12.0, 2.0));
        assert_eq!(
            (bbox.xmin(), bbox.ymin(), bbox.xmax(), bbox.ymax()),
            (4.0, 2.0, 12.0, 30.0)
        );
        assert_eq!((bbox.width(), bbox.height()), (8.0, 28.0));
    }

    #[test]
    fn pixel_and_relative_conversions_invert() {
        let px: BBoxXYXY<Pixel> = BBoxXYXY::from_xyxy(10.0, 10.0, 20.0, 20.0);
        let rel = px.to_normalized(100.0, 50.0);
        assert_eq!(
            (rel.xmin(), rel.ymin(), rel.xmax(), rel.ymax()),
            (0.1, 0.2, 0.2, 0.4)
        );
        assert!(rel.to_pixel(100.0, 50.0).approx_eq(&px, 1e-9));
    }
}
