//! Constant-pitch roof construction over planar polygons.
//!
//! This crate builds the roof of a simple planar polygon from its straight
//! skeleton: every polygon edge rises inward at the same pitch, and the
//! lines where neighbouring roof facets meet (hips, valleys, ridges) are
//! found by simulating the polygon's edges moving inward at unit speed.
//!
//! # Features
//!
//! - **Roof construction**: one planar facet per polygon edge, convex or not
//! - **Configurable pitch**: any pitch strictly between 0° and 90°
//! - **Typed failures**: non-planar input, unsupported multi-way collisions,
//!   and facet loops that cannot be closed are reported as [`RoofError`]s
//! - **Event log**: every resolved skeleton event, in time order
//! - **Geometry kernel**: tolerant plane and line intersection primitives
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//! - CLI tools
//! - Web applications (WASM)
//! - Servers
//! - Other game engines
//!
//! # Example
//!
//! ```
//! use mesh_roof::{build_roof, Point3, RoofParams};
//!
//! // An L-shaped floor plan
//! let plan = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(2.0, 0.0, 0.0),
//!     Point3::new(2.0, 1.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(1.0, 2.0, 0.0),
//!     Point3::new(0.0, 2.0, 0.0),
//! ];
//!
//! let roof = build_roof(&plan, &RoofParams::default()).unwrap();
//! println!("{roof}");
//! assert_eq!(roof.face_count(), 6);
//!
//! // Map the roof back into world space
//! let world = roof.world_vertices();
//! assert_eq!(world.len(), roof.vertex_count());
//! ```
//!
//! # Coordinate System
//!
//! Results are expressed in the polygon's local frame:
//! - X: along the first polygon edge
//! - Y: in the polygon plane, toward the interior side of X
//! - Z: polygon normal, on the side the roof rises toward
//!
//! [`RoofSkeleton::transform`] maps local coordinates to world coordinates.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod collision;
mod error;
mod frame;
mod lightcycle;
mod lines;
mod params;
mod plane;
mod queue;
mod result;
mod roof;
mod slab;
mod wavefront;

// Re-export main types and functions
pub use collision::{Collision, CollisionKind, CollisionState};
pub use error::{RoofError, RoofResult};
pub use frame::{check_planarity, newell_normal, planarity_deviation, vertex_centroid, LocalFrame};
pub use lightcycle::{Immunity, Lightcycle};
pub use lines::{
    line_segment_line_segment_intersection, nearest_point_of_lines, ray_line_segment_intersection,
    ray_ray_intersection, LineRelation,
};
pub use params::RoofParams;
pub use plane::{line_plane_intersection, plane_plane_intersection, Plane, PlaneRelation};
pub use queue::{EventQueue, QueueEntry};
pub use result::{FacetTrace, ResolvedEvent, RoofSkeleton, TraceAbort};
pub use roof::{build_roof, build_roof_default};
pub use slab::{Slab, SlabIntersection};
pub use wavefront::Wavefront;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, Vector3};
