//! Annotation model and format codecs.
//!
//! Every codec parses into and serializes from the same model:
//! [`ImageAnnotation`]s holding trees of [`BoundingShapeData`], whose
//! geometry is always stored in image-relative coordinates.
//!
//! # Design Principles
//!
//! 1. **Typed coordinate spaces**: [`Pixel`] and [`Normalized`] markers keep
//!    absolute and relative values apart; only [`normalize`] converts
//!    between them, and it validates while doing so.
//!
//! 2. **Shared categories**: shapes hold a [`CategoryRef`]; during an import
//!    all of them come from one [`CategoryReconciler`], so each name maps to
//!    exactly one category instance.
//!
//! 3. **Recoverable parsing**: a malformed object, part or line is reported
//!    and skipped; it never takes its siblings or its file down with it.
//!
//! # Example
//!
//! ```
//! use labelport::ir::{
//!     BBoxXYXY, BoundingShapeData, ImageAnnotation, ImageMetaData, ObjectCategory, RgbColor,
//! };
//!
//! let person = ObjectCategory::new("person", RgbColor::rgb(200, 40, 40)).into_ref();
//! let head = ObjectCategory::new("head", RgbColor::rgb(40, 200, 40)).into_ref();
//!
//! let mut shape = BoundingShapeData::new_box(person, BBoxXYXY::from_xyxy(0.1, 0.1, 0.5, 0.9));
//! shape.set_parts(vec![BoundingShapeData::new_box(
//!     head,
//!     BBoxXYXY::from_xyxy(0.2, 0.1, 0.3, 0.25),
//! )]);
//!
//! let annotation = ImageAnnotation::new(
//!     ImageMetaData::new("street.jpg", "images").with_size(640.0, 480.0, Some(3)),
//!     vec![shape],
//! );
//! assert_eq!(annotation.shape_count(), 2);
//! ```

mod bbox;
mod category;
mod color;
mod coord;
pub mod io_json;
pub mod io_voc_xml;
pub mod io_yolo;
mod model;
pub mod normalize;
mod polygon;
mod registry;
mod shape;

pub use bbox::BBoxXYXY;
pub use category::{CategoryRef, ObjectCategory};
pub use color::RgbColor;
pub use coord::{Coord, Normalized, Pixel};
pub use model::{ImageAnnotation, ImageAnnotationData, ImageMetaData};
pub use polygon::Polygon;
pub use registry::{CategoryReconciler, CategoryRegistry, ReconciledCategories};
pub use shape::{BoundingShapeData, ShapeGeometry};

pub(crate) use model::{file_name_of, folder_name_of};
