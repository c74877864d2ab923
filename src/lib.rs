//! # PDF Overlay
//!
//! Bake overlay annotations into existing PDFs, with optional page removal.
//!
//! The crate takes a source PDF buffer, an ordered list of annotation records
//! (text, rectangles, images, freehand paths) authored against viewport
//! coordinates, and a set of zero-based page indices to delete, and produces
//! a new PDF buffer. One malformed annotation never corrupts or aborts the
//! batch: per-item problems are logged and reported, while only an unloadable
//! source or a failed serialization is fatal.
//!
//! ## Core pieces
//!
//! - [`engine::apply`]: the mutation engine. Validate, map coordinates,
//!   dispatch to draw primitives, delete pages, serialize.
//! - [`annotation`]: the wire record schema and the validated annotation
//!   sum type.
//! - [`geometry`]: viewport-space (top-left origin, y down) to document
//!   space (bottom-left origin, y up) mapping.
//! - [`color`]: tolerant `#RRGGBB` parsing that degrades instead of failing.
//! - [`plan`]: descending-order page deletion planning.
//! - [`surface`]: the document capability surface trait and its `lopdf`
//!   backend; the engine never touches PDF structure directly.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_overlay::{apply, AnnotationRecord};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let source = std::fs::read("input.pdf")?;
//! let annotations = vec![
//!     AnnotationRecord::text("note-1", 1, 50.0, 100.0, "Reviewed"),
//!     AnnotationRecord::rect("hl-1", 1, 10.0, 10.0, 200.0, 16.0).with_color("#ffff00"),
//! ];
//! let output = apply(&source, &annotations, &[2])?;
//! std::fs::write("output.pdf", &output.bytes)?;
//! println!("{} annotations applied", output.report.applied());
//! # Ok(())
//! # }
//! ```
//!
//! ## License
//!
//! Licensed under either of Apache License, Version 2.0 or MIT license, at
//! your option.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Leaf components
pub mod color;
pub mod geometry;
pub mod path_data;
pub mod plan;

// Annotation schema and validation
pub mod annotation;

// Document capability surface
pub mod surface;

// The mutation engine
pub mod engine;

// Re-exports
pub use annotation::{
    Annotation, AnnotationKind, AnnotationRecord, ImageAnnotation, PathAnnotation,
    RectAnnotation, Rejection, TextAnnotation,
};
pub use color::Color;
pub use engine::{
    apply, apply_with, AnnotationOutcome, AnnotationStatus, ApplyReport, MutationOutput,
    SkipReason,
};
pub use error::{Error, Result};
pub use geometry::Point;
pub use path_data::{parse_path_data, PathCommand, PathDataError};
pub use surface::{
    DocumentSurface, FontHandle, ImageHandle, LopdfSurface, RasterFormat, StandardFont,
    SurfaceError,
};

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.starts_with("0."));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "pdf_overlay");
    }
}
