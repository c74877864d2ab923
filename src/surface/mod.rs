//! Document capability surface.
//!
//! The mutation engine never touches PDF structure directly; every document
//! operation it needs (load, per-page geometry, font and image embedding, draw
//! primitives, page removal, save) goes through the [`DocumentSurface`] trait.
//! The default implementation is [`LopdfSurface`]; tests substitute recording
//! fakes to observe draw calls without rendering anything.

mod lopdf_backend;

pub use lopdf_backend::LopdfSurface;

use crate::color::Color;
use crate::geometry::Point;
use crate::path_data::PathCommand;

/// Errors raised by a document surface. The engine decides which tier they
/// land in: load/font/save failures become fatal, everything else is isolated
/// to the item that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The input bytes are not a parseable PDF.
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),

    /// Encrypted documents are refused by the default backend.
    #[error("encrypted documents are not supported")]
    Encrypted,

    /// The document contains no pages.
    #[error("document has no pages")]
    Empty,

    /// A page index outside the document's current range.
    #[error("page index {index} out of range (page count {count})")]
    PageOutOfRange {
        /// Requested zero-based page index
        index: usize,
        /// Page count at the time of the call
        count: usize,
    },

    /// Font embedding failed.
    #[error("font error: {0}")]
    Font(String),

    /// Image decoding or embedding failed.
    #[error("image error: {0}")]
    Image(String),

    /// The page tree is malformed in a way that prevents drawing.
    #[error("malformed page structure: {0}")]
    Structure(String),

    /// Serializing the document failed.
    #[error("failed to serialize document: {0}")]
    Save(String),
}

/// Baseline fonts every backend can embed without external font files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    /// Helvetica, the baseline for text annotations.
    Helvetica,
}

/// Raster formats accepted for image annotation payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    /// PNG payload
    Png,
    /// JPEG payload
    Jpeg,
}

/// Opaque handle to a font embedded in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontHandle(pub(crate) u64);

/// Opaque handle to a raster image embedded in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageHandle(pub(crate) u64);

/// The set of document operations the mutation engine consumes.
///
/// One surface value corresponds to one loaded document; it is owned by a
/// single `apply` invocation, mutated in place by sequential calls, and
/// consumed exactly once by [`DocumentSurface::save`]. Page indices are
/// zero-based; document coordinates are bottom-left origin, y up.
pub trait DocumentSurface: Sized {
    /// Load a document from its serialized bytes.
    fn load(bytes: &[u8]) -> Result<Self, SurfaceError>;

    /// Number of pages currently in the document.
    fn page_count(&self) -> usize;

    /// Width and height of a page in document units.
    fn page_size(&self, index: usize) -> Result<(f32, f32), SurfaceError>;

    /// Embed a baseline font, returning a handle reusable across pages.
    fn embed_standard_font(&mut self, font: StandardFont) -> Result<FontHandle, SurfaceError>;

    /// Embed a raster image, returning a handle reusable across pages.
    fn embed_raster_image(
        &mut self,
        bytes: &[u8],
        format: RasterFormat,
    ) -> Result<ImageHandle, SurfaceError>;

    /// Draw a text run with its baseline starting at `at`.
    fn draw_text(
        &mut self,
        page: usize,
        text: &str,
        at: Point,
        size: f32,
        font: FontHandle,
        color: Color,
    ) -> Result<(), SurfaceError>;

    /// Draw a filled rectangle anchored at its bottom-left corner.
    fn draw_filled_rect(
        &mut self,
        page: usize,
        at: Point,
        width: f32,
        height: f32,
        color: Color,
        opacity: f32,
    ) -> Result<(), SurfaceError>;

    /// Draw an embedded image into the box anchored at its bottom-left corner.
    fn draw_image(
        &mut self,
        page: usize,
        image: ImageHandle,
        at: Point,
        width: f32,
        height: f32,
    ) -> Result<(), SurfaceError>;

    /// Stroke a path whose commands are interpreted relative to `at`, with
    /// path-space y growing downward (viewport orientation).
    fn draw_stroked_path(
        &mut self,
        page: usize,
        commands: &[PathCommand],
        at: Point,
        color: Color,
        stroke_width: f32,
    ) -> Result<(), SurfaceError>;

    /// Remove a page. Callers are expected to remove in descending index
    /// order so earlier removals do not shift later indices.
    fn remove_page(&mut self, index: usize) -> Result<(), SurfaceError>;

    /// Consume the surface and serialize the document to bytes.
    fn save(self) -> Result<Vec<u8>, SurfaceError>;
}
