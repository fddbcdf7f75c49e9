//! Local polygon frame.
//!
//! The roof is built in a frame whose XY plane is the polygon plane and
//! whose Z axis points toward the roof. Every vertex is reprojected into
//! that frame before the wavefront simulation starts; the frame's matrix is
//! reported with the result so callers can map the roof back.

// Vertex counts don't overflow in practice
#![allow(clippy::cast_precision_loss)]

use nalgebra::{Matrix4, Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{RoofError, RoofResult};

/// An orthonormal frame anchored on the polygon plane.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LocalFrame {
    /// Frame origin in world coordinates (the polygon's vertex centroid).
    pub origin: Point3<f64>,
    /// Local X axis: direction of the first polygon edge.
    pub x_axis: Vector3<f64>,
    /// Local Y axis, `z_axis × x_axis`.
    pub y_axis: Vector3<f64>,
    /// Local Z axis: polygon normal, on the roof side.
    pub z_axis: Vector3<f64>,
}

impl LocalFrame {
    /// Build a frame from an origin, a normal, and an in-plane hint.
    ///
    /// The hint is orthogonalized against the normal; a hint parallel to the
    /// normal falls back to an arbitrary perpendicular.
    #[must_use]
    pub fn from_normal_and_hint(
        origin: Point3<f64>,
        normal: Vector3<f64>,
        hint: Vector3<f64>,
    ) -> Self {
        let z_axis = normal.normalize();
        let in_plane = hint - z_axis * hint.dot(&z_axis);
        let x_axis = if in_plane.norm() > 1e-10 {
            in_plane.normalize()
        } else {
            let perp = if z_axis.x.abs() < 0.9 {
                Vector3::x()
            } else {
                Vector3::y()
            };
            z_axis.cross(&perp).normalize()
        };
        let y_axis = z_axis.cross(&x_axis);
        Self {
            origin,
            x_axis,
            y_axis,
            z_axis,
        }
    }

    /// Transform a local point to world coordinates.
    #[must_use]
    pub fn local_to_world(&self, local: &Point3<f64>) -> Point3<f64> {
        self.origin + self.x_axis * local.x + self.y_axis * local.y + self.z_axis * local.z
    }

    /// Transform a world point to local coordinates.
    #[must_use]
    pub fn world_to_local(&self, world: &Point3<f64>) -> Point3<f64> {
        let v = world - self.origin;
        Point3::new(v.dot(&self.x_axis), v.dot(&self.y_axis), v.dot(&self.z_axis))
    }

    /// Homogeneous local-to-world matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix4<f64> {
        let (x, y, z, o) = (self.x_axis, self.y_axis, self.z_axis, self.origin);
        Matrix4::new(
            x.x, y.x, z.x, o.x, //
            x.y, y.y, z.y, o.y, //
            x.z, y.z, z.z, o.z, //
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

/// Area-weighted polygon normal (Newell's method).
///
/// The length is twice the polygon area; the direction follows the
/// right-hand rule around the vertex order.
#[must_use]
pub fn newell_normal(polygon: &[Point3<f64>]) -> Vector3<f64> {
    let n = polygon.len();
    let mut normal = Vector3::zeros();
    for i in 0..n {
        let a = &polygon[i];
        let b = &polygon[(i + 1) % n];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    normal
}

/// Vertex centroid of a polygon.
#[must_use]
pub fn vertex_centroid(polygon: &[Point3<f64>]) -> Point3<f64> {
    let sum = polygon
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / polygon.len() as f64)
}

/// Largest distance of any vertex from the plane through the centroid with
/// the given unit normal.
#[must_use]
pub fn planarity_deviation(polygon: &[Point3<f64>], unit_normal: &Vector3<f64>) -> f64 {
    let centroid = vertex_centroid(polygon);
    polygon
        .iter()
        .map(|p| (p - centroid).dot(unit_normal).abs())
        .fold(0.0, f64::max)
}

/// Check that a polygon is usable and planar, returning its unit normal.
///
/// # Errors
///
/// - [`RoofError::TooFewVertices`] for fewer than 3 vertices
/// - [`RoofError::NonFiniteVertex`] for NaN or infinite coordinates
/// - [`RoofError::DegenerateEdge`] for an edge shorter than `tolerance`
/// - [`RoofError::NotPlanar`] when the polygon encloses no area or a vertex
///   is further than `tolerance` from the best-fit plane
pub fn check_planarity(polygon: &[Point3<f64>], tolerance: f64) -> RoofResult<Vector3<f64>> {
    let n = polygon.len();
    if n < 3 {
        return Err(RoofError::TooFewVertices { actual: n });
    }
    if let Some(index) = polygon
        .iter()
        .position(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()))
    {
        return Err(RoofError::NonFiniteVertex { index });
    }
    if let Some(index) = (0..n).find(|&i| (polygon[(i + 1) % n] - polygon[i]).norm() <= tolerance)
    {
        return Err(RoofError::DegenerateEdge { index });
    }

    let normal = newell_normal(polygon);
    let area2 = normal.norm();
    if area2 <= tolerance * tolerance {
        return Err(RoofError::NotPlanar {
            deviation: f64::INFINITY,
            tolerance,
        });
    }
    let normal = normal / area2;

    let deviation = planarity_deviation(polygon, &normal);
    if deviation > tolerance {
        return Err(RoofError::NotPlanar {
            deviation,
            tolerance,
        });
    }
    Ok(normal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<Point3<f64>> {
        vec![
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn test_newell_normal_ccw() {
        let n = newell_normal(&square());
        assert_relative_eq!(n.z, 8.0); // twice the area
        assert_relative_eq!(n.x, 0.0);
    }

    #[test]
    fn test_check_planarity_ok() {
        let normal = check_planarity(&square(), 1e-6);
        assert!(normal.is_ok_and(|n| (n.z - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_check_planarity_rejects() {
        let mut bent = square();
        bent[2].z = 0.5;
        assert!(matches!(
            check_planarity(&bent, 1e-4),
            Err(RoofError::NotPlanar { .. })
        ));

        assert!(matches!(
            check_planarity(&square()[..2], 1e-4),
            Err(RoofError::TooFewVertices { actual: 2 })
        ));

        let mut dup = square();
        dup[1] = dup[0];
        assert!(matches!(
            check_planarity(&dup, 1e-4),
            Err(RoofError::DegenerateEdge { index: 0 })
        ));

        let mut nan = square();
        nan[3].y = f64::NAN;
        assert!(matches!(
            check_planarity(&nan, 1e-4),
            Err(RoofError::NonFiniteVertex { index: 3 })
        ));
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = LocalFrame::from_normal_and_hint(
            Point3::new(1.0, 2.0, 3.0),
            Vector3::new(1.0, 1.0, 1.0),
            Vector3::x(),
        );
        let world = Point3::new(-4.0, 0.5, 7.0);
        let back = frame.local_to_world(&frame.world_to_local(&world));
        assert_relative_eq!(back, world, epsilon = 1e-12);

        let local = Point3::new(0.3, -0.2, 1.5);
        let via_matrix = frame.to_matrix().transform_point(&local);
        assert_relative_eq!(via_matrix, frame.local_to_world(&local), epsilon = 1e-12);
    }

    #[test]
    fn test_frame_axes_orthonormal() {
        let frame = LocalFrame::from_normal_and_hint(Point3::origin(), Vector3::z(), Vector3::z());
        assert_relative_eq!(frame.x_axis.dot(&frame.z_axis), 0.0);
        assert_relative_eq!(frame.y_axis.norm(), 1.0);
        assert_relative_eq!(frame.x_axis.cross(&frame.y_axis), frame.z_axis, epsilon = 1e-12);
    }
}
