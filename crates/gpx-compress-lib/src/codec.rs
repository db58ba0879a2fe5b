//! Conversion between raw bytes and tracks
//!
//! The search measures every trial with a real serialization, so the codec is
//! the single source of truth for output size.

use crate::{CompressError, Result, Selection, Track};
use std::ops::Range;

/// Parser/serializer pair used to read tracks and measure trials
pub trait TrackCodec {
    /// Parse raw bytes into a track
    fn parse(&self, bytes: &[u8]) -> Result<Track>;

    /// Serialize the points of `track` retained by `selection`.
    /// Must be deterministic for a given track and selection.
    fn serialize(&self, track: &Track, selection: &Selection) -> Result<Vec<u8>>;

    /// Byte length of `bytes` once every point-encoding region is removed
    fn fixed_overhead_len(&self, bytes: &[u8]) -> usize;
}

/// GPX codec backed by the `gpx` crate
///
/// Parsed tracks keep the input text: a selection is written by cutting the
/// dropped `<trkpt>` elements out of it, so everything else (extensions,
/// timestamps, formatting, unknown elements) comes out byte for byte. Tracks
/// built in memory are written as GPX 1.1 with [`gpx::write`].
#[derive(Clone, Copy, Debug, Default)]
pub struct GpxCodec;

const TRKPT_OPEN: &[u8] = b"<trkpt";
const TRKPT_CLOSE: &[u8] = b"</trkpt>";

impl GpxCodec {
    /// Write a whole document with the `gpx` crate
    pub fn write(&self, gpx_data: &gpx::Gpx) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        gpx::write(gpx_data, &mut out).map_err(CompressError::Serialize)?;
        Ok(out)
    }
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TrackCodec for GpxCodec {
    fn parse(&self, bytes: &[u8]) -> Result<Track> {
        let gpx_data = gpx::read(bytes).map_err(CompressError::Parse)?;
        let track = Track::new(gpx_data);

        let regions = point_regions(bytes);
        if regions.len() != track.total_points() {
            tracing::warn!(
                "Found {} <trkpt> elements for {} parsed points, output will be rewritten",
                regions.len(),
                track.total_points()
            );
            return Ok(track);
        }
        track.with_source(bytes.to_vec(), regions)
    }

    fn serialize(&self, track: &Track, selection: &Selection) -> Result<Vec<u8>> {
        match track.splice(selection) {
            Some(bytes) => Ok(bytes),
            None => self.write(&track.materialize(selection)),
        }
    }

    fn fixed_overhead_len(&self, bytes: &[u8]) -> usize {
        let points: usize = point_regions(bytes).iter().map(|r| r.len()).sum();
        bytes.len() - points
    }
}

/// Byte range of every `<trkpt>` element in document order.
/// Each range starts at the whitespace leading up to the element.
fn point_regions(bytes: &[u8]) -> Vec<Range<usize>> {
    let mut regions = Vec::new();
    let mut pos = 0;
    while let Some(open) = find(bytes, TRKPT_OPEN, pos) {
        // `<trkptFoo` is another element
        let next = bytes.get(open + TRKPT_OPEN.len()).copied();
        if !matches!(next, Some(b'>' | b'/' | b' ' | b'\t' | b'\r' | b'\n')) {
            pos = open + TRKPT_OPEN.len();
            continue;
        }
        let Some(end) = point_region_end(bytes, open) else {
            break;
        };
        // Indentation before each point belongs to the point
        let mut start = open;
        while start > pos && bytes[start - 1].is_ascii_whitespace() {
            start -= 1;
        }
        regions.push(start..end);
        pos = end;
    }
    regions
}

/// End (exclusive) of the `<trkpt ...>...</trkpt>` or `<trkpt .../>` element starting at `start`
fn point_region_end(bytes: &[u8], start: usize) -> Option<usize> {
    let tag_end = find(bytes, b">", start)?;
    if bytes[tag_end - 1] == b'/' {
        return Some(tag_end + 1);
    }
    find(bytes, TRKPT_CLOSE, tag_end).map(|close| close + TRKPT_CLOSE.len())
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| from + i)
}
