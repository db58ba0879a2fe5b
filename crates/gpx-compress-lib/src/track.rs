//! Track storage module
//!
//! This module provides the `Track` struct: an immutable arena of parsed GPX
//! points plus a point-less skeleton of the document, so that reduced copies
//! can be rebuilt from an index selection without cloning the whole tree.
//! A track read from bytes also keeps the original text, so a reduced copy can
//! be cut out of it without touching anything but the dropped points.

use crate::{CompressError, Result, Selection};
use geo::{Coord, Rect};
use std::ops::Range;

/// Location of one GPX track segment inside the point arena
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SegmentSpan {
    /// Index of the track in the document
    pub track_index: usize,
    /// Index of the segment in the track
    pub segment_index: usize,
    /// Range of this segment's points in the arena
    pub points: Range<usize>,
}

impl SegmentSpan {
    /// Number of points in the segment
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the segment has no points
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// A parsed GPX track recording, split into a skeleton and a flat point arena
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Track {
    /// The original document with every track segment emptied
    skeleton: gpx::Gpx,
    /// All track points in document order
    waypoints: Vec<gpx::Waypoint>,
    /// Planar coordinates (x = longitude, y = latitude) parallel to `waypoints`
    coords: Vec<Coord<f64>>,
    /// One span per track segment, in document order
    segments: Vec<SegmentSpan>,
    /// Longitude/latitude bounding box (None if there are no points)
    bounding_box: Option<Rect<f64>>,
    /// Document text the track was parsed from, if any
    source: Option<SourceText>,
}

/// Original document text and the byte range of every point element in it
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct SourceText {
    bytes: Vec<u8>,
    /// One range per arena point, ascending and non-overlapping
    point_regions: Vec<Range<usize>>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Track {
    /// Create a new Track from GPX data
    ///
    /// Every other part of the document (metadata, waypoints, routes, track
    /// names, per-point extensions) is carried along untouched. The document is
    /// written back as GPX 1.1, the only version the writer supports.
    pub fn new(mut gpx_data: gpx::Gpx) -> Self {
        #[cfg(feature = "profiling")]
        profiling::scope!("track::new");

        if gpx_data.version != gpx::GpxVersion::Gpx11 {
            tracing::debug!(
                "Upgrading GPX version {:?} to 1.1 for output",
                gpx_data.version
            );
            gpx_data.version = gpx::GpxVersion::Gpx11;
        }

        let mut waypoints = Vec::new();
        let mut segments = Vec::new();

        for (track_index, track) in gpx_data.tracks.iter_mut().enumerate() {
            for (segment_index, segment) in track.segments.iter_mut().enumerate() {
                let start = waypoints.len();
                waypoints.append(&mut segment.points);
                segments.push(SegmentSpan {
                    track_index,
                    segment_index,
                    points: start..waypoints.len(),
                });
            }
        }

        let coords: Vec<Coord<f64>> = waypoints.iter().map(|w| w.point().0).collect();
        let bounding_box = Self::compute_bounding_box(&coords);

        Track {
            skeleton: gpx_data,
            waypoints,
            coords,
            segments,
            bounding_box,
            source: None,
        }
    }

    /// Attach the text this track was parsed from
    ///
    /// `point_regions` holds the byte range of every point in arena order.
    /// Removing a point's range from `bytes` must leave a valid document
    /// without that point.
    pub fn with_source(
        mut self,
        bytes: Vec<u8>,
        point_regions: Vec<Range<usize>>,
    ) -> Result<Self> {
        if point_regions.len() != self.total_points() {
            return Err(CompressError::InvalidParameter(format!(
                "{} point regions for {} points",
                point_regions.len(),
                self.total_points()
            )));
        }
        let mut previous_end = 0;
        for region in &point_regions {
            if region.start < previous_end
                || region.start > region.end
                || region.end > bytes.len()
            {
                return Err(CompressError::InvalidParameter(format!(
                    "point region {:?} is out of order or out of bounds",
                    region
                )));
            }
            previous_end = region.end;
        }

        self.source = Some(SourceText {
            bytes,
            point_regions,
        });
        Ok(self)
    }

    /// Check if the original document text is available
    #[inline]
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    fn compute_bounding_box(coords: &[Coord<f64>]) -> Option<Rect<f64>> {
        let first = *coords.first()?;
        let (mut min, mut max) = (first, first);
        for c in coords {
            min.x = min.x.min(c.x);
            min.y = min.y.min(c.y);
            max.x = max.x.max(c.x);
            max.y = max.y.max(c.y);
        }
        Some(Rect::new(min, max))
    }

    /// Get total number of points across all tracks and segments
    #[inline]
    pub fn total_points(&self) -> usize {
        self.waypoints.len()
    }

    /// Get the segment spans in document order
    #[inline]
    pub fn segments(&self) -> &[SegmentSpan] {
        &self.segments
    }

    /// Planar coordinates of one segment's points
    #[inline]
    pub fn segment_coords(&self, span: &SegmentSpan) -> &[Coord<f64>] {
        &self.coords[span.points.clone()]
    }

    /// Get a specific waypoint by its arena index
    #[inline]
    pub fn waypoint(&self, index: usize) -> Option<&gpx::Waypoint> {
        self.waypoints.get(index)
    }

    /// Longitude/latitude bounding box, `None` for a track without points
    #[inline]
    pub fn bounding_box(&self) -> Option<Rect<f64>> {
        self.bounding_box
    }

    /// Length of the bounding box diagonal in degrees (0 for empty or single-location tracks)
    pub fn extent(&self) -> f64 {
        self.bounding_box
            .map(|bbox| bbox.width().hypot(bbox.height()))
            .unwrap_or(0.0)
    }

    /// Rebuild a GPX document holding only the selected points
    ///
    /// Points are cloned; the arena itself is never modified.
    pub fn materialize(&self, selection: &Selection) -> gpx::Gpx {
        #[cfg(feature = "profiling")]
        profiling::scope!("track::materialize");

        let mut gpx_data = self.skeleton.clone();
        for (span, retained) in self.segments.iter().zip(selection.segments()) {
            let points = &mut gpx_data.tracks[span.track_index].segments[span.segment_index].points;
            points.reserve_exact(retained.len());
            points.extend(
                retained
                    .iter()
                    .map(|&i| self.waypoints[span.points.start + i].clone()),
            );
        }
        gpx_data
    }

    /// Cut the unselected points out of the original text
    ///
    /// Returns `None` for a track built in memory. Everything outside the
    /// dropped point elements is copied unchanged.
    pub fn splice(&self, selection: &Selection) -> Option<Vec<u8>> {
        #[cfg(feature = "profiling")]
        profiling::scope!("track::splice");

        let source = self.source.as_ref()?;
        let mut out = Vec::with_capacity(source.bytes.len());
        let mut pos = 0;
        for (span, retained) in self.segments.iter().zip(selection.segments()) {
            let mut retained = retained.iter().peekable();
            for local in 0..span.len() {
                if retained.next_if_eq(&&local).is_some() {
                    continue;
                }
                let region = &source.point_regions[span.points.start + local];
                out.extend_from_slice(&source.bytes[pos..region.start]);
                pos = region.end;
            }
        }
        out.extend_from_slice(&source.bytes[pos..]);
        Some(out)
    }

    /// Rebuild the complete original document
    pub fn to_gpx(&self) -> gpx::Gpx {
        self.materialize(&Selection::all(self))
    }
}

impl From<gpx::Gpx> for Track {
    fn from(gpx_data: gpx::Gpx) -> Self {
        Track::new(gpx_data)
    }
}
