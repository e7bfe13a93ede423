//! Conversion between pixel and image-relative coordinates, plus the range
//! checks every codec applies before a shape enters the model.
//!
//! All functions are pure: decimal formatting is parameterized by precision
//! instead of going through shared formatter state, so codecs can call them
//! from any worker thread.

use thiserror::Error;

use super::bbox::BBoxXYXY;
use super::polygon::Polygon;
use super::{Normalized, Pixel};

/// Absolute tolerance for comparing relative coordinates.
///
/// Also the overshoot allowed on YOLO-derived box corners, which pick up
/// rounding error from the six-digit center/size values on disk.
pub const COORDINATE_EPSILON: f64 = 1e-6;

/// Fraction digits used when writing Pascal VOC pixel values.
pub const VOC_FRACTION_DIGITS: usize = 2;

/// Fraction digits used when writing YOLO ratios and JSON coordinates.
pub const RELATIVE_FRACTION_DIGITS: usize = 6;

/// A coordinate failed validation.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CoordinateError {
    #[error("{what} value {value} is not a finite number")]
    NotFinite { what: String, value: f64 },

    #[error("{what} value {value} is outside the range [0, {max}]")]
    OutOfRange { what: String, value: f64, max: f64 },

    #[error("{lower} ({lower_value}) is greater than {upper} ({upper_value})")]
    Unordered {
        lower: &'static str,
        lower_value: f64,
        upper: &'static str,
        upper_value: f64,
    },

    #[error("invalid image size {width}x{height}")]
    InvalidImageSize { width: f64, height: f64 },
}

/// Checks a pixel coordinate against `[0, dimension]`.
pub fn check_absolute(value: f64, dimension: f64, what: &str) -> Result<f64, CoordinateError> {
    check_range(value, dimension, what, 0.0)
}

/// Checks a relative coordinate against `[0, 1]`.
pub fn check_relative(value: f64, what: &str) -> Result<f64, CoordinateError> {
    check_range(value, 1.0, what, 0.0)
}

/// Like [`check_relative`], but accepts values up to `tolerance` outside the
/// range and clamps them back in.
pub fn check_relative_within(
    value: f64,
    what: &str,
    tolerance: f64,
) -> Result<f64, CoordinateError> {
    check_range(value, 1.0, what, tolerance).map(|v| v.clamp(0.0, 1.0))
}

fn check_range(value: f64, max: f64, what: &str, tolerance: f64) -> Result<f64, CoordinateError> {
    if !value.is_finite() {
        return Err(CoordinateError::NotFinite {
            what: what.to_string(),
            value,
        });
    }
    if value < -tolerance || value > max + tolerance {
        return Err(CoordinateError::OutOfRange {
            what: what.to_string(),
            value,
            max,
        });
    }
    Ok(value)
}

/// Checks that both image dimensions are finite and positive.
pub fn check_image_size(width: f64, height: f64) -> Result<(), CoordinateError> {
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(CoordinateError::InvalidImageSize { width, height })
    }
}

fn check_ordered<TSpace>(bbox: &BBoxXYXY<TSpace>) -> Result<(), CoordinateError> {
    if bbox.xmin() > bbox.xmax() {
        return Err(CoordinateError::Unordered {
            lower: "xmin",
            lower_value: bbox.xmin(),
            upper: "xmax",
            upper_value: bbox.xmax(),
        });
    }
    if bbox.ymin() > bbox.ymax() {
        return Err(CoordinateError::Unordered {
            lower: "ymin",
            lower_value: bbox.ymin(),
            upper: "ymax",
            upper_value: bbox.ymax(),
        });
    }
    Ok(())
}

/// Validates a pixel box against the image size and converts it to
/// relative coordinates.
pub fn relative_bbox(
    bbox: &BBoxXYXY<Pixel>,
    image_width: f64,
    image_height: f64,
) -> Result<BBoxXYXY<Normalized>, CoordinateError> {
    check_image_size(image_width, image_height)?;
    check_absolute(bbox.xmin(), image_width, "xmin")?;
    check_absolute(bbox.xmax(), image_width, "xmax")?;
    check_absolute(bbox.ymin(), image_height, "ymin")?;
    check_absolute(bbox.ymax(), image_height, "ymax")?;
    check_ordered(bbox)?;
    Ok(bbox.to_normalized(image_width, image_height))
}

/// Validates a box that is already in relative coordinates.
pub fn check_relative_bbox(bbox: &BBoxXYXY<Normalized>) -> Result<(), CoordinateError> {
    check_relative(bbox.xmin(), "minX")?;
    check_relative(bbox.ymin(), "minY")?;
    check_relative(bbox.xmax(), "maxX")?;
    check_relative(bbox.ymax(), "maxY")?;
    check_ordered(bbox)
}

/// Validates a pixel polygon against the image size and converts it to
/// relative coordinates.
pub fn relative_polygon(
    polygon: &Polygon<Pixel>,
    image_width: f64,
    image_height: f64,
) -> Result<Polygon<Normalized>, CoordinateError> {
    check_image_size(image_width, image_height)?;
    for (idx, point) in polygon.points().iter().enumerate() {
        check_absolute(point.x, image_width, &format!("x{}", idx + 1))?;
        check_absolute(point.y, image_height, &format!("y{}", idx + 1))?;
    }
    Ok(polygon.to_normalized(image_width, image_height))
}

/// Validates a polygon that is already in relative coordinates.
pub fn check_relative_polygon(polygon: &Polygon<Normalized>) -> Result<(), CoordinateError> {
    for (idx, point) in polygon.points().iter().enumerate() {
        check_relative(point.x, &format!("x{}", idx + 1))?;
        check_relative(point.y, &format!("y{}", idx + 1))?;
    }
    Ok(())
}

/// Derives box corners from YOLO center/size ratios.
///
/// All four inputs must be in `[0, 1]`, and so must each derived corner
/// (within [`COORDINATE_EPSILON`], after which the corner is clamped).
pub fn corners_from_center(
    cx: f64,
    cy: f64,
    width: f64,
    height: f64,
) -> Result<BBoxXYXY<Normalized>, CoordinateError> {
    check_relative(cx, "x_center")?;
    check_relative(cy, "y_center")?;
    check_relative(width, "width")?;
    check_relative(height, "height")?;

    let raw = BBoxXYXY::<Normalized>::from_cxcywh(cx, cy, width, height);
    Ok(BBoxXYXY::from_xyxy(
        check_relative_within(raw.xmin(), "xmin", COORDINATE_EPSILON)?,
        check_relative_within(raw.ymin(), "ymin", COORDINATE_EPSILON)?,
        check_relative_within(raw.xmax(), "xmax", COORDINATE_EPSILON)?,
        check_relative_within(raw.ymax(), "ymax", COORDINATE_EPSILON)?,
    ))
}

/// Renders `value` with at most `max_fraction_digits` fraction digits.
///
/// Rounds to the requested precision, then drops trailing zeros and a bare
/// decimal point, always with `.` as the separator (`12.50` becomes `12.5`,
/// `3.00` becomes `3`).
pub fn format_decimal(value: f64, max_fraction_digits: usize) -> String {
    let mut rendered = format!("{:.*}", max_fraction_digits, value);
    if rendered.contains('.') {
        let trimmed_len = rendered.trim_end_matches('0').trim_end_matches('.').len();
        rendered.truncate(trimmed_len);
    }
    if rendered == "-0" {
        rendered = "0".to_string();
    }
    rendered
}

/// Cuts `value` down to `digits` fraction digits, rounding toward zero.
///
/// The value is rendered with a few guard digits first, so binary noise like
/// `0.5699999999999999` for `0.57` does not lose a whole unit in the last
/// place.
pub fn truncate_decimal(value: f64, digits: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let rendered = format!("{:.*}", digits + 3, value);
    let cut = match rendered.find('.') {
        Some(dot) if digits == 0 => &rendered[..dot],
        Some(dot) => &rendered[..dot + 1 + digits],
        None => rendered.as_str(),
    };
    cut.parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_decimal_trims_like_pattern_formatting() {
        assert_eq!(format_decimal(12.5, 2), "12.5");
        assert_eq!(format_decimal(3.0, 2), "3");
        assert_eq!(format_decimal(10.126, 2), "10.13");
        assert_eq!(format_decimal(0.1234564, 6), "0.123456");
        assert_eq!(format_decimal(-0.0001, 2), "0");
        assert_eq!(format_decimal(120.0, 0), "120");
    }

    #[test]
    fn truncate_decimal_rounds_toward_zero() {
        assert_eq!(truncate_decimal(0.1234567, 6), 0.123456);
        assert_eq!(truncate_decimal(0.57, 6), 0.57);
        assert_eq!(truncate_decimal(1.0, 6), 1.0);
        assert_eq!(truncate_decimal(0.9999999, 6), 0.999999);
        assert_eq!(truncate_decimal(42.9, 0), 42.0);
    }

    #[test]
    fn relative_bbox_divides_by_image_size() {
        let bbox = BBoxXYXY::<Pixel>::from_xyxy(10.0, 10.0, 20.0, 20.0);
        let rel = relative_bbox(&bbox, 100.0, 100.0).expect("valid box");
        assert!(rel.approx_eq(&BBoxXYXY::from_xyxy(0.1, 0.1, 0.2, 0.2), 1e-12));
    }

    #[test]
    fn relative_bbox_rejects_out_of_bounds_and_unordered() {
        let outside = BBoxXYXY::<Pixel>::from_xyxy(10.0, 10.0, 120.0, 20.0);
        assert!(matches!(
            relative_bbox(&outside, 100.0, 100.0),
            Err(CoordinateError::OutOfRange { .. })
        ));

        let unordered = BBoxXYXY::<Pixel>::from_xyxy(50.0, 10.0, 20.0, 20.0);
        assert!(matches!(
            relative_bbox(&unordered, 100.0, 100.0),
            Err(CoordinateError::Unordered { lower: "xmin", .. })
        ));

        let bbox = BBoxXYXY::<Pixel>::from_xyxy(0.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            relative_bbox(&bbox, 0.0, 100.0),
            Err(CoordinateError::InvalidImageSize { .. })
        ));
    }

    #[test]
    fn bounds_are_inclusive() {
        let full = BBoxXYXY::<Pixel>::from_xyxy(0.0, 0.0, 100.0, 50.0);
        let rel = relative_bbox(&full, 100.0, 50.0).expect("edges are allowed");
        assert_eq!(rel.xmax(), 1.0);
        assert_eq!(rel.ymax(), 1.0);
        assert!(check_relative(1.0, "x").is_ok());
        assert!(check_relative(1.0000001, "x").is_err());
        assert!(check_relative(f64::NAN, "x").is_err());
    }

    #[test]
    fn corners_from_center_checks_each_corner() {
        let bbox = corners_from_center(0.5, 0.5, 0.2, 0.2).expect("inside image");
        assert!(bbox.approx_eq(&BBoxXYXY::from_xyxy(0.4, 0.4, 0.6, 0.6), 1e-12));

        let err = corners_from_center(0.05, 0.5, 0.2, 0.2).unwrap_err();
        assert!(matches!(err, CoordinateError::OutOfRange { ref what, .. } if what == "xmin"));

        assert!(corners_from_center(1.2, 0.5, 0.1, 0.1).is_err());
    }

    #[test]
    fn corners_from_center_clamps_rounding_overshoot() {
        let bbox = corners_from_center(0.061728, 0.5, 0.123457, 0.2).expect("within tolerance");
        assert_eq!(bbox.xmin(), 0.0);
    }

    #[test]
    fn relative_polygon_checks_every_point() {
        let polygon = Polygon::<Pixel>::from_flat(&[0.0, 0.0, 50.0, 20.0, 10.0, 40.0]).expect("even");
        let rel = relative_polygon(&polygon, 100.0, 40.0).expect("valid");
        assert_eq!(rel.to_flat(), vec![0.0, 0.0, 0.5, 0.5, 0.1, 1.0]);

        let bad = Polygon::<Pixel>::from_flat(&[0.0, 0.0, 50.0, 41.0]).expect("even");
        let err = relative_polygon(&bad, 100.0, 40.0).unwrap_err();
        assert!(matches!(err, CoordinateError::OutOfRange { ref what, .. } if what == "y2"));
    }
}
