//! Index selections over a track's point arena

use crate::Track;

/// The points retained by one trial, as segment-local indices
///
/// A selection is a lightweight view over an immutable [`Track`]: it never owns
/// or copies waypoints. Each inner vector is sorted ascending and holds indices
/// relative to the start of the matching segment.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selection {
    segments: Vec<Vec<usize>>,
}

impl Selection {
    /// Create a selection from per-segment index lists
    pub fn from_segments(segments: Vec<Vec<usize>>) -> Self {
        Self { segments }
    }

    /// Select every point of the track
    pub fn all(track: &Track) -> Self {
        Self {
            segments: track.segments().iter().map(|s| (0..s.len()).collect()).collect(),
        }
    }

    /// Select only the first and last point of every segment
    pub fn anchors(track: &Track) -> Self {
        Self {
            segments: track
                .segments()
                .iter()
                .map(|s| match s.len() {
                    0 => Vec::new(),
                    1 => vec![0],
                    n => vec![0, n - 1],
                })
                .collect(),
        }
    }

    /// Retained indices for each segment
    #[inline]
    pub fn segments(&self) -> &[Vec<usize>] {
        &self.segments
    }

    /// Get the number of retained points
    pub fn len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    /// Check if no point is retained
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(Vec::is_empty)
    }

    /// Check that every non-empty segment keeps its first and last point
    pub fn keeps_anchors(&self, track: &Track) -> bool {
        track.segments().len() == self.segments.len()
            && track
                .segments()
                .iter()
                .zip(&self.segments)
                .all(|(span, kept)| {
                    span.is_empty()
                        || (kept.first() == Some(&0) && kept.last() == Some(&(span.len() - 1)))
                })
    }
}
