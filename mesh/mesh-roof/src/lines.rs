//! Line classification and line-based intersections.
//!
//! Every routine here is built on [`nearest_point_of_lines`], which
//! classifies two infinite lines before any parameter is trusted. Segment
//! and ray variants then clamp the parameters to their own domains. None of
//! these functions fail: unresolved configurations come back as `None`.

// Standard mathematical variable names for the closest-point solve
#![allow(clippy::many_single_char_names)]

use nalgebra::{Point3, Vector3};

/// Sines of angles below this are treated as parallel directions.
const PARALLEL_EPSILON: f64 = 1e-9;

/// How two infinite lines relate to each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LineRelation {
    /// Parallel, distinct lines.
    Parallel,
    /// Both lines are the same line.
    Coaxial,
    /// The lines meet; parameters locate the meeting point on each line.
    Crossing {
        /// Parameter along the first line.
        param_a: f64,
        /// Parameter along the second line.
        param_b: f64,
    },
    /// The lines pass each other; parameters locate the closest points.
    Skew {
        /// Parameter along the first line.
        param_a: f64,
        /// Parameter along the second line.
        param_b: f64,
    },
}

/// Classify the lines `origin_a + s * dir_a` and `origin_b + t * dir_b`.
///
/// `tolerance` is the largest distance at which the lines still count as
/// meeting (or as coaxial when parallel). Zero-length directions classify
/// as [`LineRelation::Parallel`].
#[must_use]
pub fn nearest_point_of_lines(
    origin_a: &Point3<f64>,
    dir_a: &Vector3<f64>,
    origin_b: &Point3<f64>,
    dir_b: &Vector3<f64>,
    tolerance: f64,
) -> LineRelation {
    let a = dir_a.dot(dir_a);
    let c = dir_b.dot(dir_b);
    if a <= f64::EPSILON || c <= f64::EPSILON {
        return LineRelation::Parallel;
    }

    let w0 = origin_a - origin_b;
    let b = dir_a.dot(dir_b);
    let d = dir_a.dot(&w0);
    let e = dir_b.dot(&w0);

    let sin = dir_a.cross(dir_b).norm() / (a.sqrt() * c.sqrt());
    if sin < PARALLEL_EPSILON {
        // Distance from origin_b to line a decides parallel vs coaxial.
        let s = -d / a;
        let gap = (origin_a + dir_a * s - origin_b).norm();
        return if gap <= tolerance {
            LineRelation::Coaxial
        } else {
            LineRelation::Parallel
        };
    }

    let denom = a.mul_add(c, -(b * b));
    let param_a = b.mul_add(e, -(c * d)) / denom;
    let param_b = a.mul_add(e, -(b * d)) / denom;

    let gap = (origin_a + dir_a * param_a) - (origin_b + dir_b * param_b);
    if gap.norm() <= tolerance {
        LineRelation::Crossing { param_a, param_b }
    } else {
        LineRelation::Skew { param_a, param_b }
    }
}

/// Parameter of the projection of `point` onto the line `origin + s * dir`.
fn project_param(origin: &Point3<f64>, dir: &Vector3<f64>, point: &Point3<f64>) -> f64 {
    (point - origin).dot(dir) / dir.dot(dir)
}

/// Parameter slack equivalent to a distance `tolerance` along `dir`.
fn param_slack(dir: &Vector3<f64>, tolerance: f64) -> f64 {
    tolerance / dir.norm()
}

/// Intersect segments `a0→a1` and `b0→b1`.
///
/// Returns the parameters in `[0, 1]` of the meeting point on each segment.
/// Overlapping coaxial segments report the first point of `a` that is also
/// on `b`.
#[must_use]
pub fn line_segment_line_segment_intersection(
    a0: &Point3<f64>,
    a1: &Point3<f64>,
    b0: &Point3<f64>,
    b1: &Point3<f64>,
    tolerance: f64,
) -> Option<(f64, f64)> {
    let dir_a = a1 - a0;
    let dir_b = b1 - b0;

    match nearest_point_of_lines(a0, &dir_a, b0, &dir_b, tolerance) {
        LineRelation::Crossing { param_a, param_b } => {
            let slack_a = param_slack(&dir_a, tolerance);
            let slack_b = param_slack(&dir_b, tolerance);
            let inside_a = (-slack_a..=1.0 + slack_a).contains(&param_a);
            let inside_b = (-slack_b..=1.0 + slack_b).contains(&param_b);
            (inside_a && inside_b).then(|| (param_a.clamp(0.0, 1.0), param_b.clamp(0.0, 1.0)))
        }
        LineRelation::Coaxial => {
            let t0 = project_param(a0, &dir_a, b0);
            let t1 = project_param(a0, &dir_a, b1);
            let lo = t0.min(t1).max(0.0);
            let hi = t0.max(t1).min(1.0);
            if lo > hi + param_slack(&dir_a, tolerance) {
                return None;
            }
            let point = a0 + dir_a * lo;
            Some((lo, project_param(b0, &dir_b, &point).clamp(0.0, 1.0)))
        }
        LineRelation::Parallel | LineRelation::Skew { .. } => None,
    }
}

/// Intersect the ray `origin + s * dir` (`s ≥ 0`) with segment `b0→b1`.
///
/// Returns the ray parameter and the segment parameter in `[0, 1]`. When the
/// segment lies on the ray, the segment point nearest the ray origin that is
/// still ahead of it is reported.
#[must_use]
pub fn ray_line_segment_intersection(
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
    b0: &Point3<f64>,
    b1: &Point3<f64>,
    tolerance: f64,
) -> Option<(f64, f64)> {
    let dir_b = b1 - b0;

    match nearest_point_of_lines(origin, dir, b0, &dir_b, tolerance) {
        LineRelation::Crossing { param_a, param_b } => {
            let slack_a = param_slack(dir, tolerance);
            let slack_b = param_slack(&dir_b, tolerance);
            let ahead = param_a >= -slack_a;
            let inside = (-slack_b..=1.0 + slack_b).contains(&param_b);
            (ahead && inside).then(|| (param_a.max(0.0), param_b.clamp(0.0, 1.0)))
        }
        LineRelation::Coaxial => {
            let t0 = project_param(origin, dir, b0);
            let t1 = project_param(origin, dir, b1);
            if t0.max(t1) < -param_slack(dir, tolerance) {
                return None;
            }
            let s = t0.min(t1).max(0.0);
            let point = origin + dir * s;
            Some((s, project_param(b0, &dir_b, &point).clamp(0.0, 1.0)))
        }
        LineRelation::Parallel | LineRelation::Skew { .. } => None,
    }
}

/// Intersect the rays `origin_a + s * dir_a` and `origin_b + s * dir_b`.
///
/// Crossing rays report their geometric meeting parameters, both `≥ 0`.
/// Coaxial rays are solved as a 1-D problem along the shared line with the
/// parameter read as a common clock: the result is the parameter at which
/// both rays reach the same point, if they ever do.
#[must_use]
pub fn ray_ray_intersection(
    origin_a: &Point3<f64>,
    dir_a: &Vector3<f64>,
    origin_b: &Point3<f64>,
    dir_b: &Vector3<f64>,
    tolerance: f64,
) -> Option<(f64, f64)> {
    match nearest_point_of_lines(origin_a, dir_a, origin_b, dir_b, tolerance) {
        LineRelation::Crossing { param_a, param_b } => {
            let ahead_a = param_a >= -param_slack(dir_a, tolerance);
            let ahead_b = param_b >= -param_slack(dir_b, tolerance);
            (ahead_a && ahead_b).then(|| (param_a.max(0.0), param_b.max(0.0)))
        }
        LineRelation::Coaxial => {
            // origin_b = origin_a + reach * dir_a, dir_b = rate * dir_a
            let a = dir_a.dot(dir_a);
            let reach = (origin_b - origin_a).dot(dir_a) / a;
            let rate = dir_b.dot(dir_a) / a;
            let closing = 1.0 - rate;
            if closing.abs() < PARALLEL_EPSILON {
                return None;
            }
            let s = reach / closing;
            (s >= -param_slack(dir_a, tolerance)).then(|| (s.max(0.0), s.max(0.0)))
        }
        LineRelation::Parallel | LineRelation::Skew { .. } => None,
    }
}
