//! Error types for roof construction.

use thiserror::Error;

use crate::result::TraceAbort;

/// Result type for roof construction.
pub type RoofResult<T> = Result<T, RoofError>;

/// Errors that can occur while building a roof.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoofError {
    /// The polygon has too few vertices to enclose an area.
    #[error("polygon needs at least 3 vertices, got {actual}")]
    TooFewVertices {
        /// Number of vertices provided.
        actual: usize,
    },

    /// A vertex has a NaN or infinite coordinate.
    #[error("vertex {index} has a non-finite coordinate")]
    NonFiniteVertex {
        /// Index of the offending vertex.
        index: usize,
    },

    /// An edge is shorter than the tolerance.
    #[error("edge {index} is degenerate (zero length)")]
    DegenerateEdge {
        /// Index of the edge (from vertex `index` to `index + 1`).
        index: usize,
    },

    /// The polygon does not lie in a single plane.
    #[error("Polygon is not planar / level (deviation {deviation:.3e} exceeds tolerance {tolerance:.3e})")]
    NotPlanar {
        /// Largest distance of a vertex from the best-fit plane.
        deviation: f64,
        /// Tolerance that was exceeded.
        tolerance: f64,
    },

    /// More than two wavefronts met at one point and time.
    #[error("Manyfold collision at t={time:.6}: {count} wavefronts meet")]
    ManyfoldCollision {
        /// Simulation time of the collision.
        time: f64,
        /// Number of wavefronts that met.
        count: usize,
    },

    /// A facet loop could not be closed.
    #[error("facet {facet} could not be traced: {reason}")]
    FacetTraceFailed {
        /// Index of the facet (same as its polygon edge).
        facet: usize,
        /// Why the tracer stopped.
        reason: TraceAbort,
    },

    /// Parameters are out of range.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RoofError::NotPlanar {
            deviation: 0.5,
            tolerance: 1e-4,
        };
        assert!(format!("{err}").starts_with("Polygon is not planar / level"));

        let err = RoofError::ManyfoldCollision {
            time: 1.0,
            count: 3,
        };
        assert!(format!("{err}").starts_with("Manyfold collision"));

        let err = RoofError::TooFewVertices { actual: 2 };
        assert!(format!("{err}").contains('2'));
    }
}
