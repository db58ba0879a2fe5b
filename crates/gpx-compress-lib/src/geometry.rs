//! Planar geometry kernel used by the simplification strategy
//!
//! Coordinates are `geo::Coord` with x = longitude and y = latitude, both in degrees.
//! Distances are measured in that flat plane without any geodesic correction: only
//! their relative magnitudes matter when comparing against a tolerance.

use geo::Coord;

/// Distance from `point` to the segment `[line_start, line_end]`
///
/// The projection of `point` onto the line is clamped to the segment, so points
/// beyond either end measure to the nearest endpoint. A zero-length segment
/// measures to its single location.
#[inline]
pub fn perpendicular_distance(
    point: Coord<f64>,
    line_start: Coord<f64>,
    line_end: Coord<f64>,
) -> f64 {
    let dx = line_end.x - line_start.x;
    let dy = line_end.y - line_start.y;

    let length_sq = dx * dx + dy * dy;
    if length_sq == 0.0 {
        return (point.x - line_start.x).hypot(point.y - line_start.y);
    }

    let (px, py) = (point.x - line_start.x, point.y - line_start.y);
    let t = (px * dx + py * dy) / length_sq;
    if t <= 0.0 {
        return px.hypot(py);
    }
    if t >= 1.0 {
        return (point.x - line_end.x).hypot(point.y - line_end.y);
    }

    // Inside the segment: |cross| / |chord| is exactly zero for collinear input
    (px * dy - py * dx).abs() / length_sq.sqrt()
}

/// Ramer-Douglas-Peucker simplification returning the retained indices in ascending order
///
/// Polylines with fewer than 3 points are returned whole. Otherwise the first and
/// last index are always retained, and an interior point is retained when it is
/// the farthest point (lowest index on ties) from its local chord and that
/// distance exceeds `epsilon`.
///
/// Uses an explicit work stack, so arbitrarily long polylines cannot overflow.
pub fn simplify(points: &[Coord<f64>], epsilon: f64) -> Vec<usize> {
    let n = points.len();
    if n < 3 {
        return (0..n).collect();
    }

    let mut keep = vec![false; n];
    keep[0] = true;
    keep[n - 1] = true;

    let mut stack = vec![(0usize, n - 1)];
    while let Some((first, last)) = stack.pop() {
        if last - first < 2 {
            continue;
        }

        let (start, end) = (points[first], points[last]);
        let mut max_dist = 0.0;
        let mut max_index = first;
        for (i, &p) in points.iter().enumerate().take(last).skip(first + 1) {
            let dist = perpendicular_distance(p, start, end);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }

        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((max_index, last));
            stack.push((first, max_index));
        }
    }

    keep.iter()
        .enumerate()
        .filter_map(|(i, &k)| k.then_some(i))
        .collect()
}
