// THEORY:
// Every fallible operation in the crate reports through `SortError`. Failures that
// belong to collaborators (image decoding, file I/O, JSON) are wrapped unmodified so
// callers can inspect the original cause. Conditions that are part of normal
// operation are deliberately absent: an empty raster is not an error, it simply
// yields an empty reading order.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, SortError>;

#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// A component came back from contour extraction with no pixels (M00 = 0).
    #[error("Component {label} has zero area; centroid is undefined")]
    DegenerateComponent { label: u32 },

    /// Neither the centroid nor any pixel of the component lies on a row band.
    #[error("Component {label} does not overlap any row band")]
    UnassignedRow { label: u32 },

    /// Foreground is left on the working raster but no component could be traced.
    #[error("{remaining} foreground pixels remain but no component was extracted")]
    UnextractedForeground { remaining: usize },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}
