//! Stroke simplification for physics collision shapes.
//!
//! Freehand strokes carry hundreds of points; a collision polygon wants a
//! handful. `simplify_to_range` searches Douglas-Peucker error thresholds
//! until the vertex count lands inside a target band, and the helpers below
//! turn the result into a convex polygon.
//!
//! Everything here is a pure function over point slices.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Collision polygons with a smaller area than this are rejected.
pub const MIN_SHAPE_AREA: f64 = 1e-3;

/// Parameters for the threshold search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimplifyParams {
    /// Fewest vertices wanted. Default: **4**.
    pub low_target: usize,
    /// Most vertices wanted. Default: **8**, the usual vertex cap of a
    /// convex collision polygon.
    pub high_target: usize,
    /// Smallest error threshold the search may use. Default: **0.5**.
    pub err_low: f64,
    /// Largest error threshold the search may use. Default: **64.0**.
    pub err_high: f64,
    /// Threshold step between attempts. Default: **0.5**.
    pub increment: f64,
    /// Threshold of the first attempt, clamped into `[err_low, err_high]`.
    /// Default: **0.5**, so the first in-band result is also the most detailed.
    pub initial_error: f64,
}

impl Default for SimplifyParams {
    fn default() -> Self {
        Self {
            low_target: 4,
            high_target: 8,
            err_low: 0.5,
            err_high: 64.0,
            increment: 0.5,
            initial_error: 0.5,
        }
    }
}

impl SimplifyParams {
    /// How many vertices `count` is away from the target band (0 inside it).
    pub fn band_distance(&self, count: usize) -> usize {
        if count < self.low_target {
            self.low_target - count
        } else {
            count.saturating_sub(self.high_target)
        }
    }
}

/// Result of `simplify_to_range`.
#[derive(Debug, Clone, PartialEq)]
pub struct Simplified {
    pub points: Vec<Point>,
    /// Error threshold that produced `points`.
    pub threshold: f64,
    /// Whether the vertex count is inside `[low_target, high_target]`.
    pub in_range: bool,
}

/// Simplify `points` so the vertex count falls inside the target band.
///
/// Starts at `initial_error`, then steps the threshold down when the result
/// has too few vertices and up when it has too many. Stops when the count is
/// in range, a threshold bound is reached, or the search turns around (the
/// band sits between two adjacent thresholds). Returns the best attempt:
/// closest to the band, ties going to the lower vertex count.
pub fn simplify_to_range(points: &[Point], params: &SimplifyParams) -> Simplified {
    if points.len() < 3 {
        return Simplified {
            points: points.to_vec(),
            threshold: 0.0,
            in_range: false,
        };
    }

    let (lo, hi) = (params.err_low.min(params.err_high), params.err_low.max(params.err_high));
    let mut threshold = params.initial_error.clamp(lo, hi);
    let searchable = params.increment.is_finite() && params.increment > 0.0;

    let mut best: Option<Simplified> = None;
    let mut direction = 0i8;

    loop {
        let candidate = douglas_peucker(points, threshold);
        let count = candidate.len();
        let miss = params.band_distance(count);

        let better = match &best {
            None => true,
            Some(b) => {
                let best_miss = params.band_distance(b.points.len());
                miss < best_miss || (miss == best_miss && count < b.points.len())
            }
        };
        if better {
            best = Some(Simplified {
                points: candidate,
                threshold,
                in_range: miss == 0,
            });
        }

        if miss == 0 || !searchable {
            break;
        }

        // Too few vertices → more detail (lower threshold), and vice versa.
        let step: i8 = if count < params.low_target { -1 } else { 1 };
        if direction != 0 && step != direction {
            break;
        }
        direction = step;

        let next = (threshold + f64::from(step) * params.increment).clamp(lo, hi);
        if next == threshold {
            break;
        }
        threshold = next;
    }

    // `best` is always set by the first iteration.
    best.unwrap_or_else(|| Simplified {
        points: points.to_vec(),
        threshold,
        in_range: false,
    })
}

/// Ramer-Douglas-Peucker polyline simplification.
///
/// Endpoints are always kept; a fully collinear input collapses to them.
pub fn douglas_peucker(points: &[Point], tolerance: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_kept(points, 0, points.len() - 1, tolerance, &mut keep);

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

fn mark_kept(points: &[Point], first: usize, last: usize, tolerance: f64, keep: &mut [bool]) {
    if last <= first + 1 {
        return;
    }
    let mut max_dist = 0.0;
    let mut max_index = first;
    for i in first + 1..last {
        let dist = segment_distance(points[i], points[first], points[last]);
        if dist > max_dist {
            max_dist = dist;
            max_index = i;
        }
    }
    if max_dist > tolerance {
        keep[max_index] = true;
        mark_kept(points, first, max_index, tolerance, keep);
        mark_kept(points, max_index, last, tolerance, keep);
    }
}

/// Distance from `p` to the segment `a`–`b` (to `a` itself when the segment
/// is degenerate, as in a closed loop whose ends meet).
pub fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.hypot2();
    if len_sq == 0.0 {
        return (p - a).hypot();
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).hypot()
}

/// Convex hull (Andrew's monotone chain), counter-clockwise, without
/// repeating the first vertex. Collinear points are dropped.
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.iter().copied().filter(|p| p.is_finite()).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    let turn = |o: Point, a: Point, b: Point| (a - o).cross(b - o);
    let mut hull: Vec<Point> = Vec::with_capacity(pts.len() * 2);

    for &p in &pts {
        while hull.len() >= 2 && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}

/// Drop vertices of a convex polygon until at most `max_vertices` remain
/// (never below 3), each time removing the vertex whose triangle with its
/// neighbours has the least area. Ties go to the earliest vertex.
pub fn trim_convex(points: &[Point], max_vertices: usize) -> Vec<Point> {
    let limit = max_vertices.max(3);
    let mut poly = points.to_vec();
    while poly.len() > limit {
        let n = poly.len();
        let cost = |i: usize| {
            let (prev, next) = (poly[(i + n - 1) % n], poly[(i + 1) % n]);
            ((poly[i] - prev).cross(next - prev) * 0.5).abs()
        };
        let mut cheapest = 0;
        for i in 1..n {
            if cost(i) < cost(cheapest) {
                cheapest = i;
            }
        }
        poly.remove(cheapest);
    }
    poly
}

/// Signed area (positive for counter-clockwise winding).
pub fn polygon_area(points: &[Point]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice += p.x * q.y - q.x * p.y;
    }
    twice * 0.5
}

/// Area centroid of a simple polygon; falls back to the vertex average for
/// degenerate input.
pub fn polygon_centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let area = polygon_area(points);
    if area.abs() < f64::EPSILON {
        let sum = points.iter().fold(kurbo::Vec2::ZERO, |acc, p| acc + p.to_vec2());
        return Some((sum / points.len() as f64).to_point());
    }
    let (mut cx, mut cy) = (0.0, 0.0);
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        let cross = p.x * q.y - q.x * p.y;
        cx += (p.x + q.x) * cross;
        cy += (p.y + q.y) * cross;
    }
    let k = 1.0 / (6.0 * area);
    Some(Point::new(cx * k, cy * k))
}

/// Whether a polygon is unusable as a collision shape.
pub fn is_degenerate_shape(points: &[Point]) -> bool {
    points.len() < 3 || polygon_area(points).abs() < MIN_SHAPE_AREA
}
