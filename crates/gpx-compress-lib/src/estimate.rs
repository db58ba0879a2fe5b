//! Size estimation from a single full serialization
//!
//! The estimate only seeds the search. Every trial is measured for real, so a
//! poor estimate costs iterations, never correctness.

use crate::TrackCodec;

/// Bytes kept back from the budget when turning it into a point count
pub const DEFAULT_ESTIMATE_MARGIN: usize = 1024;

/// Split of a serialized track into structural overhead and per-point cost
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SizeEstimate {
    /// Bytes not attributable to any point (header, metadata, closing tags ...)
    pub fixed_overhead_bytes: usize,
    /// Average marginal bytes per point
    pub avg_bytes_per_point: f64,
    /// Number of points the estimate was taken over
    pub total_points: usize,
}

impl SizeEstimate {
    /// Point count expected to fit in `budget` bytes, keeping `margin` bytes spare
    ///
    /// Clamped to `[1, total_points]`; returns 0 only for an empty track.
    pub fn point_count_for(&self, budget: usize, margin: usize) -> usize {
        if self.total_points == 0 {
            return 0;
        }
        if self.avg_bytes_per_point <= 0.0 {
            return self.total_points;
        }
        let available = budget.saturating_sub(self.fixed_overhead_bytes + margin);
        let count = (available as f64 / self.avg_bytes_per_point).floor() as usize;
        count.clamp(1, self.total_points)
    }

    /// Predicted serialized size for `points` retained points
    pub fn predicted_size(&self, points: usize) -> usize {
        self.fixed_overhead_bytes + (points as f64 * self.avg_bytes_per_point).round() as usize
    }
}

/// Estimate fixed overhead and average bytes per point from one full serialization
pub fn estimate_overhead<C: TrackCodec + ?Sized>(
    codec: &C,
    full_bytes: &[u8],
    total_points: usize,
) -> SizeEstimate {
    let fixed_overhead_bytes = codec.fixed_overhead_len(full_bytes).min(full_bytes.len());
    let avg_bytes_per_point = if total_points == 0 {
        0.0
    } else {
        (full_bytes.len() - fixed_overhead_bytes) as f64 / total_points as f64
    };

    tracing::debug!(
        fixed_overhead_bytes,
        avg_bytes_per_point,
        total_points,
        "Estimated serialized size split"
    );

    SizeEstimate {
        fixed_overhead_bytes,
        avg_bytes_per_point,
        total_points,
    }
}
