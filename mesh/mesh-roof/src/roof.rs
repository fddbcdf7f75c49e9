//! Roof construction entry points.

// Vertex indices don't overflow u32 in practice
#![allow(clippy::cast_possible_truncation)]

use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::error::{RoofError, RoofResult};
use crate::frame::{check_planarity, vertex_centroid, LocalFrame};
use crate::params::RoofParams;
use crate::result::{FacetTrace, RoofSkeleton};
use crate::wavefront::Wavefront;

/// Build a constant-pitch roof over a planar polygon.
///
/// The polygon is reprojected into its own plane, its straight skeleton is
/// computed by shrinking the edges inward at unit speed, and every edge's
/// roof facet is traced from the skeleton. The result is expressed in the
/// polygon's local frame; [`RoofSkeleton::transform`] maps it back.
///
/// # Arguments
///
/// * `polygon` - Vertices of a simple planar polygon, in either winding
/// * `params` - Construction parameters
///
/// # Errors
///
/// - [`RoofError::InvalidParams`] if `params` fail validation
/// - [`RoofError::TooFewVertices`], [`RoofError::NonFiniteVertex`],
///   [`RoofError::DegenerateEdge`] or [`RoofError::NotPlanar`] for unusable
///   input; no simulation work is done in these cases
/// - [`RoofError::ManyfoldCollision`] when more than two wavefronts meet at
///   one point
/// - [`RoofError::FacetTraceFailed`] when a facet loop cannot be closed and
///   `params.strict_facets` is set
///
/// # Example
///
/// ```
/// use mesh_roof::{build_roof, Point3, RoofParams};
///
/// let square = vec![
///     Point3::new(-1.0, -1.0, 0.0),
///     Point3::new(1.0, -1.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(-1.0, 1.0, 0.0),
/// ];
/// let roof = build_roof(&square, &RoofParams::default()).unwrap();
/// assert_eq!(roof.face_count(), 4);
/// assert!((roof.apex_height() - 1.0).abs() < 1e-6);
/// ```
pub fn build_roof(polygon: &[Point3<f64>], params: &RoofParams) -> RoofResult<RoofSkeleton> {
    params.validate()?;
    let normal = check_planarity(polygon, params.tolerance)?;
    let n = polygon.len();

    // Wind the polygon counter-clockwise around `up`.
    let reversed = normal.dot(&params.up) < 0.0;
    let (normal, working): (Vector3<f64>, Vec<Point3<f64>>) = if reversed {
        (-normal, polygon.iter().rev().copied().collect())
    } else {
        (normal, polygon.to_vec())
    };

    let frame = LocalFrame::from_normal_and_hint(
        vertex_centroid(&working),
        normal,
        working[1] - working[0],
    );
    let local: Vec<Point3<f64>> = working
        .iter()
        .map(|p| {
            let l = frame.world_to_local(p);
            Point3::new(l.x, l.y, 0.0)
        })
        .collect();

    info!(
        vertices = n,
        pitch = format!("{:.2}", params.pitch.to_degrees()),
        reversed,
        "Starting roof construction"
    );

    let mut wavefront = Wavefront::new(&local, params);
    wavefront.run()?;
    debug!(
        events = wavefront.events.len(),
        discarded = wavefront.discarded,
        trail_crossings = wavefront.trail_crossings,
        "Wavefront collapsed"
    );
    let traces = wavefront.reconstruct();

    // Internal vertex j is input vertex original(j); internal edge j runs
    // backwards along input edge n - 2 - j when the winding was flipped.
    let original = |j: usize| if reversed { n - 1 - j } else { j };
    let internal_edge = |i: usize| if reversed { (2 * n - 2 - i) % n } else { i };

    let mut vertices = vec![Point3::origin(); n];
    for (j, p) in local.iter().enumerate() {
        vertices[original(j)] = *p;
    }

    let mut faces = Vec::with_capacity(n);
    let mut facets = Vec::with_capacity(n);
    let mut planes = Vec::with_capacity(n);
    for i in 0..n {
        let k = internal_edge(i);
        let trace = traces[k].clone();
        if let FacetTrace::Aborted { reason, .. } = &trace {
            if params.strict_facets {
                return Err(RoofError::FacetTraceFailed {
                    facet: i,
                    reason: reason.clone(),
                });
            }
            warn!(facet = i, %reason, "Facet loop left open");
        }

        let mut face = Vec::with_capacity(trace.vertices().len());
        face.push(original(k) as u32);
        face.push(original((k + 1) % n) as u32);
        for point in trace.vertices().iter().skip(2) {
            face.push(weld(&mut vertices, point, params.tolerance));
        }
        faces.push(face);
        facets.push(trace);
        planes.push(wavefront.slabs[k].plane);
    }

    let skeleton = RoofSkeleton {
        transform: frame.to_matrix(),
        frame,
        vertices,
        edges: Vec::new(),
        faces,
        facets,
        planes,
        events: wavefront.events,
        discarded_candidates: wavefront.discarded,
        reversed_input: reversed,
    };

    info!(
        faces = skeleton.face_count(),
        vertices = skeleton.vertex_count(),
        events = skeleton.events.len(),
        apex = format!("{:.4}", skeleton.apex_height()),
        "Roof construction complete"
    );

    Ok(skeleton)
}

/// Build a roof with default parameters.
///
/// # Errors
///
/// See [`build_roof`].
pub fn build_roof_default(polygon: &[Point3<f64>]) -> RoofResult<RoofSkeleton> {
    build_roof(polygon, &RoofParams::default())
}

/// Index of the vertex within `tolerance` of `point`, adding it if needed.
fn weld(vertices: &mut Vec<Point3<f64>>, point: &Point3<f64>, tolerance: f64) -> u32 {
    if let Some(index) = vertices.iter().position(|v| (v - point).norm() <= tolerance) {
        return index as u32;
    }
    vertices.push(*point);
    (vertices.len() - 1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> Vec<Point3<f64>> {
        let h = 3.0_f64.sqrt();
        vec![
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, h, 0.0),
        ]
    }

    #[test]
    fn test_triangle_single_apex() {
        let roof = build_roof_default(&triangle());
        let Ok(roof) = roof else {
            panic!("triangle roof failed: {roof:?}");
        };
        assert_eq!(roof.face_count(), 3);
        assert_eq!(roof.vertex_count(), 4);
        for face in &roof.faces {
            assert_eq!(face.len(), 3);
            assert_eq!(face[2], 3);
        }
        // Inradius of a side-2 equilateral triangle is 1/sqrt(3).
        assert_relative_eq!(roof.apex_height(), 1.0 / 3.0_f64.sqrt(), epsilon = 1e-6);
    }

    #[test]
    fn test_weld_reuses_close_points() {
        let mut vertices = vec![Point3::origin()];
        assert_eq!(weld(&mut vertices, &Point3::new(1e-7, 0.0, 0.0), 1e-4), 0);
        assert_eq!(weld(&mut vertices, &Point3::new(1.0, 0.0, 0.0), 1e-4), 1);
        assert_eq!(vertices.len(), 2);
    }

    #[test]
    fn test_rejects_invalid_input() {
        // Three points are always coplanar; bend one corner of a square.
        let bent = vec![
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.25),
            Point3::new(-1.0, 1.0, 0.0),
        ];
        assert!(matches!(
            build_roof_default(&bent),
            Err(RoofError::NotPlanar { .. })
        ));
        assert!(matches!(
            build_roof(&triangle(), &RoofParams::default().with_tolerance(-1.0)),
            Err(RoofError::InvalidParams(_))
        ));
    }

    #[test]
    fn test_clockwise_input_faces_follow_input_edges() {
        let mut cw = triangle();
        cw.reverse();
        let Ok(roof) = build_roof_default(&cw) else {
            panic!("clockwise triangle failed");
        };
        assert!(roof.reversed_input);
        for (i, face) in roof.faces.iter().enumerate() {
            let next = ((i + 1) % 3) as u32;
            assert!(face.contains(&(i as u32)));
            assert!(face.contains(&next));
        }
        for (i, p) in cw.iter().enumerate() {
            let world = roof.frame.local_to_world(&roof.vertices[i]);
            assert_relative_eq!(world, *p, epsilon = 1e-9);
        }
    }
}
