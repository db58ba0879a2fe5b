//! Point-selection policies
//!
//! Each strategy maps a track and its single control parameter to a
//! [`Selection`]. Both always keep the first and last point of every segment.

use crate::{CompressError, Result, Selection, Track, geometry};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

/// A point-selection policy driven by one parameter
pub trait ReductionStrategy {
    /// The control parameter searched over
    type Parameter: Copy + fmt::Debug;

    /// Select the points to retain for `parameter`
    ///
    /// Fails with [`CompressError::InvalidParameter`] for a parameter outside
    /// the strategy's domain.
    fn apply(&self, track: &Track, parameter: Self::Parameter) -> Result<Selection>;
}

/// Keep every Nth point of each segment
///
/// The parameter is the desired point count `k`, with `1 <= k <= N` (any `k`
/// is accepted as 1 for an empty track). The stride is
/// `max(1, floor(N / k))` over the whole track and is applied to segment-local
/// indices, so a larger `k` never retains fewer points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Decimation;

impl Decimation {
    /// Stride used for a target of `k` points out of `total_points`
    #[inline]
    pub fn stride(total_points: usize, k: usize) -> usize {
        (total_points / k.max(1)).max(1)
    }
}

impl ReductionStrategy for Decimation {
    type Parameter = usize;

    fn apply(&self, track: &Track, k: usize) -> Result<Selection> {
        let n = track.total_points();
        if k == 0 || k > n.max(1) {
            return Err(CompressError::InvalidParameter(format!(
                "point count must be in [1, {}], got {}",
                n.max(1),
                k
            )));
        }

        let stride = Self::stride(n, k);
        Ok(Selection::from_segments(
            track
                .segments()
                .iter()
                .map(|span| {
                    let last = span.len().saturating_sub(1);
                    (0..span.len())
                        .filter(|&j| j % stride == 0 || j == last)
                        .collect()
                })
                .collect(),
        ))
    }
}

/// Douglas-Peucker on every segment independently
///
/// The parameter is the tolerance in degrees and must be positive (infinity
/// keeps only the anchors). A larger tolerance never retains more points.
/// Segments are simplified in parallel.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simplification;

impl ReductionStrategy for Simplification {
    type Parameter = f64;

    fn apply(&self, track: &Track, epsilon: f64) -> Result<Selection> {
        #[cfg(feature = "profiling")]
        profiling::scope!("strategy::simplification");

        if epsilon.is_nan() || epsilon <= 0.0 {
            return Err(CompressError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                epsilon
            )));
        }

        Ok(Selection::from_segments(
            track
                .segments()
                .par_iter()
                .map(|span| geometry::simplify(track.segment_coords(span), epsilon))
                .collect(),
        ))
    }
}

/// Which strategy the budget search drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Method {
    /// Uniform decimation, searched over the target point count
    Decimation,
    /// Geometric simplification, searched over the tolerance
    #[default]
    Simplification,
}

impl Method {
    /// All methods, in display order
    pub const ALL: [Method; 2] = [Method::Decimation, Method::Simplification];

    /// Short name used on the command line
    pub fn name(self) -> &'static str {
        match self {
            Method::Decimation => "basic",
            Method::Simplification => "smart",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" | "decimate" | "decimation" => Ok(Method::Decimation),
            "smart" | "simplify" | "simplification" | "douglas-peucker" => {
                Ok(Method::Simplification)
            }
            other => Err(format!(
                "unknown method '{}', expected 'basic' or 'smart'",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpx::{Gpx, TrackSegment, Waypoint};

    fn create_test_waypoint(lat: f64, lon: f64) -> Waypoint {
        Waypoint::new(geo::Point::new(lon, lat))
    }

    /// Wavy segments of the given lengths
    fn create_test_track(segment_lengths: &[usize]) -> Track {
        let mut gpx = Gpx::default();
        let mut track = gpx::Track::default();
        for (s, &len) in segment_lengths.iter().enumerate() {
            let mut segment = TrackSegment::default();
            for i in 0..len {
                let t = i as f64 * 0.01;
                segment.points.push(create_test_waypoint(
                    45.0 + s as f64 * 0.1 + (t * 7.0).sin() * 0.002,
                    7.0 + t * 0.01,
                ));
            }
            track.segments.push(segment);
        }
        gpx.tracks.push(track);
        Track::new(gpx)
    }

    #[test]
    fn test_decimation_k_equals_n_keeps_everything() {
        let track = create_test_track(&[40, 17, 2]);
        let selection = Decimation.apply(&track, track.total_points()).unwrap();
        assert_eq!(selection, Selection::all(&track));
    }

    #[test]
    fn test_decimation_k_one_keeps_anchors_only() {
        let track = create_test_track(&[40, 17, 2, 1]);
        let selection = Decimation.apply(&track, 1).unwrap();
        assert_eq!(selection, Selection::anchors(&track));
    }

    #[test]
    fn test_decimation_stride() {
        assert_eq!(Decimation::stride(100, 10), 10);
        assert_eq!(Decimation::stride(100, 30), 3);
        assert_eq!(Decimation::stride(100, 100), 1);
        assert_eq!(Decimation::stride(100, 0), 100);
        assert_eq!(Decimation::stride(0, 5), 1);
    }

    #[test]
    fn test_decimation_applies_stride_per_segment() {
        let track = create_test_track(&[7, 5]);
        // N = 12, k = 4 -> stride 3
        let selection = Decimation.apply(&track, 4).unwrap();
        assert_eq!(selection.segments(), &[vec![0, 3, 6], vec![0, 3, 4]]);
    }

    #[test]
    fn test_decimation_keeps_anchors() {
        let track = create_test_track(&[33, 3, 1, 58, 2]);
        for k in 1..=track.total_points() {
            assert!(Decimation.apply(&track, k).unwrap().keeps_anchors(&track));
        }
    }

    #[test]
    fn test_decimation_monotonic_in_k() {
        let track = create_test_track(&[2, 3, 1, 2, 11, 30, 3]);
        let mut previous = 0;
        for k in 1..=track.total_points() {
            let count = Decimation.apply(&track, k).unwrap().len();
            assert!(count >= previous, "k = {} retained {} < {}", k, count, previous);
            previous = count;
        }
        assert_eq!(previous, track.total_points());
    }

    #[test]
    fn test_simplification_keeps_anchors_and_short_segments() {
        let track = create_test_track(&[100, 2, 1, 0]);
        let selection = Simplification.apply(&track, 1.0).unwrap();
        assert_eq!(selection.segments(), &[vec![0, 99], vec![0, 1], vec![0], vec![]]);
        assert!(selection.keeps_anchors(&track));
    }

    #[test]
    fn test_simplification_monotonic_in_epsilon() {
        let track = create_test_track(&[500, 250]);
        let mut previous = usize::MAX;
        for epsilon in [1e-9, 1e-6, 1e-5, 1e-4, 5e-4, 1e-3, 1e-2] {
            let selection = Simplification.apply(&track, epsilon).unwrap();
            assert!(selection.keeps_anchors(&track));
            assert!(selection.len() <= previous);
            previous = selection.len();
        }
    }

    #[test]
    fn test_out_of_range_parameters_rejected() {
        let track = create_test_track(&[40, 17]);
        for k in [0, track.total_points() + 1] {
            let result = Decimation.apply(&track, k);
            assert!(matches!(result, Err(CompressError::InvalidParameter(_))), "k = {}", k);
        }
        for epsilon in [0.0, -1.0, f64::NAN, f64::NEG_INFINITY] {
            let result = Simplification.apply(&track, epsilon);
            assert!(
                matches!(result, Err(CompressError::InvalidParameter(_))),
                "epsilon = {}",
                epsilon
            );
        }

        let empty = create_test_track(&[]);
        assert!(Decimation.apply(&empty, 1).unwrap().is_empty());
        assert_eq!(
            Simplification.apply(&track, f64::INFINITY).unwrap(),
            Selection::anchors(&track)
        );
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("basic".parse::<Method>(), Ok(Method::Decimation));
        assert_eq!("Smart".parse::<Method>(), Ok(Method::Simplification));
        assert_eq!("simplify".parse::<Method>(), Ok(Method::Simplification));
        assert!("zip".parse::<Method>().is_err());
        for method in Method::ALL {
            assert_eq!(method.to_string().parse::<Method>(), Ok(method));
        }
    }
}
