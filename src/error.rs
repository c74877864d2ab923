//! Error types for the mutation engine.
//!
//! Only the fatal tier lives here: failures that abort a whole `apply` call
//! and produce no output document. Per-annotation problems (invalid records,
//! out-of-range pages, broken image payloads) are reported through
//! [`crate::engine::ApplyReport`] instead and never surface as an `Error`.

use crate::surface::SurfaceError;

/// Result type alias for mutation engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort an entire `apply` call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source document could not be loaded or parsed.
    #[error("failed to load source document: {0}")]
    Load(#[source] SurfaceError),

    /// The baseline text font could not be embedded.
    #[error("failed to embed baseline font: {0}")]
    Font(#[source] SurfaceError),

    /// The mutated document could not be serialized to bytes.
    #[error("failed to serialize output document: {0}")]
    Save(#[source] SurfaceError),
}
