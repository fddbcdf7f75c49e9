//! Roof construction result types.

// Counts don't overflow in practice
#![allow(clippy::cast_precision_loss)]

use nalgebra::{Matrix4, Point3};
use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::collision::CollisionKind;
use crate::frame::LocalFrame;
use crate::plane::Plane;

/// Why a facet loop could not be closed.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TraceAbort {
    /// No boundary segment continues from the current point.
    #[error("no boundary segment continues from ({:.4}, {:.4}, {:.4})", at.x, at.y, at.z)]
    NoContinuation {
        /// Point where the walk got stuck (local frame).
        at: Point3<f64>,
    },

    /// The walk came back to a point it had already passed.
    #[error("walk revisited ({:.4}, {:.4}, {:.4})", at.x, at.y, at.z)]
    Revisited {
        /// The repeated point (local frame).
        at: Point3<f64>,
    },

    /// Every boundary segment was used without reaching the edge's end.
    #[error("boundary segments exhausted after {steps} steps")]
    Exhausted {
        /// Number of segments walked.
        steps: usize,
    },
}

/// Outcome of tracing one facet's vertex loop.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FacetTrace {
    /// The loop closed.
    Complete {
        /// Loop vertices (local frame), starting with the edge's endpoints.
        vertices: Vec<Point3<f64>>,
    },
    /// The walk stopped early.
    Aborted {
        /// Vertices reached before the walk stopped.
        vertices: Vec<Point3<f64>>,
        /// Why the walk stopped.
        reason: TraceAbort,
    },
}

impl FacetTrace {
    /// Loop vertices, complete or partial.
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        match self {
            Self::Complete { vertices } | Self::Aborted { vertices, .. } => vertices,
        }
    }

    /// Whether the loop closed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete { .. })
    }
}

/// One collision as it was resolved, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResolvedEvent {
    /// Simulation time (inward offset distance) of the collision.
    pub time: f64,
    /// What kind of collision it was.
    pub kind: CollisionKind,
    /// Collision point on the polygon plane (local frame).
    pub point: Point3<f64>,
    /// Number of wavefronts consumed.
    pub loosers: usize,
    /// Number of wavefronts spawned.
    pub children: usize,
}

/// A constructed roof.
///
/// Vertices are expressed in the polygon's local frame; `transform` maps
/// them to world coordinates. The first `n` vertices are the input polygon
/// vertices in input order, and face `i` is the roof facet rising from
/// input edge `i → i + 1`, wound counter-clockwise seen from above.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoofSkeleton {
    /// Local-to-world transform.
    pub transform: Matrix4<f64>,
    /// The local frame `transform` was built from.
    pub frame: LocalFrame,
    /// Roof vertices in the local frame.
    pub vertices: Vec<Point3<f64>>,
    /// Explicit edge list (currently always empty).
    pub edges: Vec<[u32; 2]>,
    /// One index loop per input edge.
    pub faces: Vec<Vec<u32>>,
    /// Trace outcome per face.
    pub facets: Vec<FacetTrace>,
    /// Supporting plane per face (local frame).
    pub planes: Vec<Plane>,
    /// Resolved collisions in resolution order.
    pub events: Vec<ResolvedEvent>,
    /// Candidates discarded as stale when they reached the queue front.
    pub discarded_candidates: usize,
    /// Whether the input winding was reversed to face `up`.
    pub reversed_input: bool,
}

impl RoofSkeleton {
    /// Number of faces (always the number of input edges).
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of distinct vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Vertices mapped to world coordinates.
    #[must_use]
    pub fn world_vertices(&self) -> Vec<Point3<f64>> {
        self.vertices
            .iter()
            .map(|p| self.frame.local_to_world(p))
            .collect()
    }

    /// Vertex positions of face `index` (local frame).
    #[must_use]
    pub fn face_points(&self, index: usize) -> Vec<Point3<f64>> {
        self.faces
            .get(index)
            .map(|face| face.iter().map(|&i| self.vertices[i as usize]).collect())
            .unwrap_or_default()
    }

    /// Supporting plane of face `index` (local frame).
    #[must_use]
    pub fn facet_plane(&self, index: usize) -> Option<&Plane> {
        self.planes.get(index)
    }

    /// Height of the highest roof vertex above the polygon plane.
    #[must_use]
    pub fn apex_height(&self) -> f64 {
        self.vertices.iter().map(|p| p.z).fold(0.0, f64::max)
    }

    /// Whether every facet loop closed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.facets.iter().all(FacetTrace::is_complete)
    }

    /// Number of resolved events of one kind.
    #[must_use]
    pub fn event_count(&self, kind: CollisionKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }
}

impl std::fmt::Display for RoofSkeleton {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Roof: {} faces, {} vertices, apex {:.4}, {} events ({} merge, {} split, {} boundary, {} closure), {} discarded",
            self.face_count(),
            self.vertex_count(),
            self.apex_height(),
            self.events.len(),
            self.event_count(CollisionKind::Merge),
            self.event_count(CollisionKind::Split),
            self.event_count(CollisionKind::Boundary),
            self.event_count(CollisionKind::Closure),
            self.discarded_candidates
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facet_trace_accessors() {
        let complete = FacetTrace::Complete {
            vertices: vec![Point3::origin(), Point3::new(1.0, 0.0, 0.0)],
        };
        assert!(complete.is_complete());
        assert_eq!(complete.vertices().len(), 2);

        let aborted = FacetTrace::Aborted {
            vertices: vec![Point3::origin()],
            reason: TraceAbort::Exhausted { steps: 3 },
        };
        assert!(!aborted.is_complete());
        assert!(format!("{}", TraceAbort::Exhausted { steps: 3 }).contains('3'));
    }
}
