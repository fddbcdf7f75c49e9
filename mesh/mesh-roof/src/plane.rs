//! Planes and plane intersections.
//!
//! A [`Plane`] holds a unit normal and the signed distance of the plane from
//! the origin; a point `p` lies on the plane when `normal · p == distance`.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Denominators below this are treated as zero.
const PARALLEL_EPSILON: f64 = 1e-12;

/// An oriented plane in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plane {
    /// Unit normal vector.
    pub normal: Vector3<f64>,
    /// Distance from the origin along `normal`.
    pub distance: f64,
}

impl Plane {
    /// Create a plane from a (not necessarily unit) normal and distance.
    ///
    /// The distance is rescaled along with the normal, so `n · p == d` keeps
    /// describing the same set of points.
    #[must_use]
    pub fn new(normal: Vector3<f64>, distance: f64) -> Self {
        let norm = normal.norm();
        Self {
            normal: normal / norm,
            distance: distance / norm,
        }
    }

    /// Create the plane through `point` with the given normal.
    #[must_use]
    pub fn from_point_normal(point: &Point3<f64>, normal: &Vector3<f64>) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            distance: normal.dot(&point.coords),
        }
    }

    /// Signed distance of `point` from the plane (positive on the normal side).
    #[must_use]
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&point.coords) - self.distance
    }

    /// Whether `point` lies on the plane within `tolerance`.
    #[must_use]
    pub fn contains(&self, point: &Point3<f64>, tolerance: f64) -> bool {
        self.signed_distance(point).abs() <= tolerance
    }
}

/// Relative pose of two planes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlaneRelation {
    /// Normals are parallel and the planes are distinct.
    Parallel,
    /// The planes coincide.
    Coplanar,
    /// The planes meet along a line.
    Intersecting {
        /// A point on the line (the one closest to the world origin).
        origin: Point3<f64>,
        /// Unit direction of the line, `a.normal × b.normal` normalized.
        direction: Vector3<f64>,
    },
}

/// Ray parameter at which `origin + t * direction` meets `plane`.
///
/// Returns `None` when the ray runs parallel to the plane. The parameter may
/// be negative; callers clamp it to their own domain.
#[must_use]
pub fn line_plane_intersection(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    plane: &Plane,
) -> Option<f64> {
    let denom = plane.normal.dot(direction);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    Some(-plane.signed_distance(origin) / denom)
}

/// Classify two planes and return their intersection line if they meet.
///
/// `tolerance` bounds both the sine of the angle between the normals and the
/// offset between parallel planes.
#[must_use]
pub fn plane_plane_intersection(a: &Plane, b: &Plane, tolerance: f64) -> PlaneRelation {
    let direction = a.normal.cross(&b.normal);
    let sin_sq = direction.norm_squared();

    if sin_sq < tolerance * tolerance {
        let offset = if a.normal.dot(&b.normal) >= 0.0 {
            a.distance - b.distance
        } else {
            a.distance + b.distance
        };
        return if offset.abs() <= tolerance {
            PlaneRelation::Coplanar
        } else {
            PlaneRelation::Parallel
        };
    }

    // Point on both planes nearest the origin.
    let origin = (b.normal.cross(&direction) * a.distance
        + direction.cross(&a.normal) * b.distance)
        / sin_sq;

    PlaneRelation::Intersecting {
        origin: Point3::from(origin),
        direction: direction / sin_sq.sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_normalizes() {
        let plane = Plane::new(Vector3::new(0.0, 0.0, 2.0), 4.0);
        assert_relative_eq!(plane.normal.norm(), 1.0);
        assert_relative_eq!(plane.distance, 2.0);
        assert!(plane.contains(&Point3::new(5.0, -3.0, 2.0), 1e-12));
    }

    #[test]
    fn test_signed_distance() {
        let plane = Plane::from_point_normal(&Point3::new(0.0, 0.0, 1.0), &Vector3::z());
        assert_relative_eq!(plane.signed_distance(&Point3::new(1.0, 1.0, 3.0)), 2.0);
        assert_relative_eq!(plane.signed_distance(&Point3::new(4.0, 0.0, 0.5)), -0.5);
    }

    #[test]
    fn test_line_plane() {
        let plane = Plane::new(Vector3::z(), 2.0);
        let t = line_plane_intersection(&Point3::origin(), &Vector3::new(1.0, 0.0, 0.5), &plane);
        assert_relative_eq!(t.unwrap_or(f64::NAN), 4.0);

        let parallel = line_plane_intersection(&Point3::origin(), &Vector3::x(), &plane);
        assert!(parallel.is_none());
    }

    #[test]
    fn test_plane_plane_intersecting() {
        let a = Plane::new(Vector3::new(0.0, -1.0, 1.0), 1.0 / 2.0_f64.sqrt());
        let b = Plane::new(Vector3::new(0.0, 1.0, 1.0), 1.0 / 2.0_f64.sqrt());
        match plane_plane_intersection(&a, &b, 1e-9) {
            PlaneRelation::Intersecting { origin, direction } => {
                assert!(a.contains(&origin, 1e-9));
                assert!(b.contains(&origin, 1e-9));
                assert_relative_eq!(direction.x.abs(), 1.0, epsilon = 1e-12);
            }
            other => panic!("expected intersection, got {other:?}"),
        }
    }

    #[test]
    fn test_plane_plane_parallel_and_coplanar() {
        let a = Plane::new(Vector3::z(), 1.0);
        let b = Plane::new(Vector3::z(), 2.0);
        let c = Plane::new(-Vector3::z(), -1.0);
        assert_eq!(plane_plane_intersection(&a, &b, 1e-9), PlaneRelation::Parallel);
        assert_eq!(plane_plane_intersection(&a, &c, 1e-9), PlaneRelation::Coplanar);
    }
}
