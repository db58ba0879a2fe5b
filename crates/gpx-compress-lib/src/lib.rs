//! GPX Compress Library - Byte-Budgeted Track Reduction
//!
//! This library shrinks a GPX track recording until its serialization fits a
//! byte budget, keeping as much of the path as possible. The serialized size is
//! measured for real on every trial; a size estimate only seeds the search.
//!
//! # Architecture
//!
//! - **[`Track`]**: Immutable point arena plus a point-less document skeleton
//! - **[`Selection`]**: Retained point indices per segment (one per trial)
//! - **[`geometry`]**: Planar point-to-segment distance and Douglas-Peucker
//! - **[`Decimation`] / [`Simplification`]**: The two [`ReductionStrategy`] policies
//! - **[`BudgetSearch`]**: Bisection over the strategy parameter against the budget
//! - **[`TrackCodec`]**: Parse/serialize collaborator, implemented by [`GpxCodec`],
//!   which writes a selection by cutting dropped points out of the input text
//!
//! # Example
//! ```no_run
//! use gpx_compress_lib::{Method, NoProgress, compress};
//!
//! let bytes = std::fs::read("ride.gpx").unwrap();
//! let outcome = compress(&bytes, 5 * 1024 * 1024, Method::Simplification, &mut NoProgress).unwrap();
//! if let Some(result) = outcome.into_result() {
//!     std::fs::write("ride_compressed.gpx", &result.serialized_bytes).unwrap();
//! }
//! ```

mod codec;
mod estimate;
pub mod geometry;
mod progress;
mod search;
mod selection;
mod strategy;
mod track;

// Public API exports
pub use codec::{GpxCodec, TrackCodec};
pub use estimate::{DEFAULT_ESTIMATE_MARGIN, SizeEstimate, estimate_overhead};
pub use progress::{NoProgress, ProgressSink, format_size};
pub use search::{
    BudgetSearch, DEFAULT_GOOD_ENOUGH_RATIO, DEFAULT_MAX_ITERATIONS, EpsilonBracket,
    ReductionResult, SearchConfig, SearchOutcome, SearchPhase, TrialParameter, compress,
};
pub use selection::Selection;
pub use strategy::{Decimation, Method, ReductionStrategy, Simplification};
pub use track::{SegmentSpan, Track};

/// Error types for track compression
#[derive(Debug, thiserror::Error)]
pub enum CompressError {
    #[error("GPX parsing error: {0}")]
    Parse(#[source] gpx::errors::GpxError),

    #[error("GPX serialization error: {0}")]
    Serialize(#[source] gpx::errors::GpxError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Search cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, CompressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that all public types are accessible
        let _: fn(SearchConfig) -> BudgetSearch = BudgetSearch::with_config;
        let _: fn() -> SearchConfig = SearchConfig::default;
        let _: fn(&[geo::Coord<f64>], f64) -> Vec<usize> = geometry::simplify;
    }

    #[test]
    fn test_error_display() {
        assert_eq!(CompressError::Cancelled.to_string(), "Search cancelled");
        assert_eq!(
            CompressError::InvalidParameter("budget".to_string()).to_string(),
            "Invalid parameter: budget"
        );
    }
}
