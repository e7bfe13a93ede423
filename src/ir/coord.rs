//! Points and the coordinate spaces they live in.
//!
//! Shapes are stored image-relative while Pascal VOC files hold pixels. The
//! two uninhabited marker types below tag every point and box, so converting
//! between them always goes through an explicit, size-aware call.

use std::fmt;
use std::marker::PhantomData;

/// Absolute pixel positions, origin at the top-left corner of the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Image-relative positions in `[0, 1]` along each axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Normalized {}

/// A 2D point tagged with its coordinate space.
#[derive(Clone, Copy, PartialEq)]
pub struct Coord<TSpace> {
    pub x: f64,
    pub y: f64,
    space: PhantomData<TSpace>,
}

impl<TSpace> Coord<TSpace> {
    #[inline]
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            space: PhantomData,
        }
    }

    /// Component-wise comparison with an absolute tolerance.
    #[inline]
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        (self.x - other.x).abs() <= eps && (self.y - other.y).abs() <= eps
    }

    #[inline]
    pub(crate) fn scaled<TOther>(&self, sx: f64, sy: f64) -> Coord<TOther> {
        Coord::new(self.x * sx, self.y * sy)
    }

    // Division rather than multiplying by the reciprocal: `30 / 300` must
    // come out as exactly `0.1`.
    #[inline]
    pub(crate) fn divided<TOther>(&self, dx: f64, dy: f64) -> Coord<TOther> {
        Coord::new(self.x / dx, self.y / dy)
    }
}

impl<TSpace> fmt::Debug for Coord<TSpace> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approx_eq_is_absolute_per_axis() {
        let a: Coord<Normalized> = Coord::new(0.1, 0.2);
        assert!(a.approx_eq(&Coord::new(0.1000004, 0.1999996), 1e-6));
        assert!(!a.approx_eq(&Coord::new(0.1, 0.2001), 1e-6));
    }

    #[test]
    fn conversions_change_the_space() {
        let px: Coord<Pixel> = Coord::new(30.0, 50.0);
        let rel: Coord<Normalized> = px.divided(300.0, 200.0);
        assert_eq!((rel.x, rel.y), (0.1, 0.25));

        let back: Coord<Pixel> = rel.scaled(300.0, 200.0);
        assert!(back.approx_eq(&px, 1e-9));
        assert_eq!(format!("{back:?}"), "(30, 50)");
    }
}
