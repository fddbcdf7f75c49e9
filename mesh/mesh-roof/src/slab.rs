//! Slabs: the half-planes rising from each polygon edge.
//!
//! Every polygon edge spawns a slab, the plane through the edge tilted
//! inward by the roof pitch. During the wavefront simulation a slab only
//! records which lightcycles bound it; once the simulation is done the
//! boundary segments shared with its neighbours are collected on it and
//! [`Slab::calculate_vertices_from_intersections`] walks them into the
//! facet's vertex loop.

use nalgebra::{Point3, Vector3};

use crate::lightcycle::Lightcycle;
use crate::lines::{ray_line_segment_intersection, ray_ray_intersection};
use crate::plane::{plane_plane_intersection, Plane, PlaneRelation};
use crate::result::{FacetTrace, TraceAbort};

/// A bounded piece of the line where two slabs meet.
///
/// The segment runs from `origin + begin_param * direction` to
/// `origin + end_param * direction`; `direction` is a unit vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlabIntersection {
    /// First slab on the segment.
    pub prev_slab: usize,
    /// Second slab on the segment (equal to `prev_slab` for frozen fronts).
    pub next_slab: usize,
    /// Point on the supporting line.
    pub origin: Point3<f64>,
    /// Unit direction of the supporting line.
    pub direction: Vector3<f64>,
    /// Parameter of the segment start.
    pub begin_param: f64,
    /// Parameter of the segment end.
    pub end_param: f64,
}

impl SlabIntersection {
    /// Segment between two explicit points.
    #[must_use]
    pub fn from_points(
        prev_slab: usize,
        next_slab: usize,
        from: Point3<f64>,
        to: Point3<f64>,
    ) -> Self {
        let delta = to - from;
        let length = delta.norm();
        let direction = if length > 0.0 {
            delta / length
        } else {
            Vector3::zeros()
        };
        Self {
            prev_slab,
            next_slab,
            origin: from,
            direction,
            begin_param: 0.0,
            end_param: length,
        }
    }

    /// Start point.
    #[must_use]
    pub fn start_point(&self) -> Point3<f64> {
        self.origin + self.direction * self.begin_param
    }

    /// End point.
    #[must_use]
    pub fn end_point(&self) -> Point3<f64> {
        self.origin + self.direction * self.end_param
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.end_param - self.begin_param).abs()
    }

    /// Whether the segment borders `slab`.
    #[must_use]
    pub const fn bounds(&self, slab: usize) -> bool {
        self.prev_slab == slab || self.next_slab == slab
    }

    /// The endpoint opposite to the one within `tolerance` of `point`.
    #[must_use]
    pub fn continues_from(&self, point: &Point3<f64>, tolerance: f64) -> Option<Point3<f64>> {
        let (start, end) = (self.start_point(), self.end_point());
        if (start - point).norm() <= tolerance {
            Some(end)
        } else if (end - point).norm() <= tolerance {
            Some(start)
        } else {
            None
        }
    }
}

/// The tilted half-plane rising from one polygon edge.
#[derive(Debug, Clone)]
pub struct Slab {
    /// Index of the slab (and of its polygon edge).
    pub index: usize,
    /// Edge start on the polygon plane.
    pub start: Point3<f64>,
    /// Edge end on the polygon plane.
    pub end: Point3<f64>,
    /// Unit edge direction.
    pub edge: Vector3<f64>,
    /// Unit in-plane normal pointing into the polygon.
    pub inward: Vector3<f64>,
    /// Unit direction of steepest ascent within the slab.
    pub slope: Vector3<f64>,
    /// Supporting plane; the normal points away from the roof interior.
    pub plane: Plane,
    /// Slab before this one around the polygon.
    pub prev_slab: usize,
    /// Slab after this one around the polygon.
    pub next_slab: usize,
    /// Lightcycles whose `next_slab` is this slab.
    pub prev_lightcycles: Vec<usize>,
    /// Lightcycles whose `prev_slab` is this slab.
    pub next_lightcycles: Vec<usize>,
    /// Boundary segments collected for loop tracing.
    pub slab_intersections: Vec<SlabIntersection>,
    /// Boundary vertices; the traced facet loop once tracing succeeded.
    pub vertices: Vec<Point3<f64>>,
}

impl Slab {
    /// Build slab `index` of a polygon with `count` edges.
    ///
    /// `normal` is the unit polygon normal on the roof side and `pitch` the
    /// roof pitch in radians. The polygon must be counter-clockwise around
    /// `normal`.
    #[must_use]
    pub fn new(
        index: usize,
        count: usize,
        start: Point3<f64>,
        end: Point3<f64>,
        normal: &Vector3<f64>,
        pitch: f64,
    ) -> Self {
        let edge = (end - start).normalize();
        let inward = normal.cross(&edge);
        let (sin, cos) = pitch.sin_cos();
        let plane = Plane::from_point_normal(&start, &(normal * cos - inward * sin));
        let slope = (inward * cos + normal * sin).normalize();

        Self {
            index,
            start,
            end,
            edge,
            inward,
            slope,
            plane,
            prev_slab: (index + count - 1) % count,
            next_slab: (index + 1) % count,
            prev_lightcycles: Vec::new(),
            next_lightcycles: Vec::new(),
            slab_intersections: Vec::new(),
            vertices: Vec::new(),
        }
    }

    /// Whether this slab's edge passes outside a collision point.
    ///
    /// `in_dir` is the travel direction of a lightcycle bounding the edge,
    /// `out_dir` points from that lightcycle to the collision point. The
    /// answer is `true` when `out_dir` lies on the same side of `in_dir` as
    /// the slab's edge direction.
    #[must_use]
    pub fn is_outer_of_collision(
        &self,
        in_dir: &Vector3<f64>,
        out_dir: &Vector3<f64>,
        normal: &Vector3<f64>,
    ) -> bool {
        let side = in_dir.cross(normal);
        side.dot(out_dir) * side.dot(&self.edge) > 0.0
    }

    /// Boundary vertices, or the bare edge before any were collected.
    fn boundary(&self) -> Vec<Point3<f64>> {
        if self.vertices.len() >= 2 {
            self.vertices.clone()
        } else {
            vec![self.start, self.end]
        }
    }

    /// Hits of the ray `origin + s * dir` with the slab boundary.
    ///
    /// The boundary is the vertex chain closed off by two rays climbing
    /// along `slope` from its first and last vertex. Each hit is reported as
    /// `(boundary piece, ray parameter)`, sorted by parameter, with hits
    /// closer than `tolerance` merged. Piece `0` is the leading ray, piece
    /// `k` the chain segment ending at vertex `k`, and piece `len` the
    /// trailing ray.
    #[must_use]
    pub fn ray_boundary_intersection(
        &self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
        tolerance: f64,
    ) -> Vec<(usize, f64)> {
        let chain = self.boundary();
        let last = chain.len() - 1;
        let mut hits = Vec::new();

        if let Some((s, _)) = ray_ray_intersection(origin, dir, &chain[0], &self.slope, tolerance) {
            hits.push((0, s));
        }
        for k in 1..=last {
            if let Some((s, _)) =
                ray_line_segment_intersection(origin, dir, &chain[k - 1], &chain[k], tolerance)
            {
                hits.push((k, s));
            }
        }
        if let Some((s, _)) =
            ray_ray_intersection(origin, dir, &chain[last], &self.slope, tolerance)
        {
            hits.push((last + 1, s));
        }

        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        let slack = tolerance / dir.norm();
        hits.dedup_by(|later, earlier| (later.1 - earlier.1).abs() <= slack);
        hits
    }

    /// Parameter range of the line `origin + s * dir` inside the boundary.
    ///
    /// Anchored lines start at `origin`; free lines are cast both ways.
    fn clip_range(
        &self,
        origin: &Point3<f64>,
        dir: &Vector3<f64>,
        anchored: bool,
        tolerance: f64,
    ) -> Option<(f64, f64)> {
        let forward = self.ray_boundary_intersection(origin, dir, tolerance);
        if anchored {
            return forward.last().map(|&(_, s)| (0.0, s));
        }
        let backward = self.ray_boundary_intersection(origin, &-dir, tolerance);
        let params = forward
            .iter()
            .map(|&(_, s)| s)
            .chain(backward.iter().map(|&(_, s)| -s));
        params.fold(None, |range, s| match range {
            None => Some((s, s)),
            Some((lo, hi)) => Some((f64::min(lo, s), f64::max(hi, s))),
        })
    }

    /// The boundary segment this slab shares with `other`, if any.
    ///
    /// Adjacent slabs meet along a ray climbing from their shared polygon
    /// vertex. Other pairs meet along the full plane-plane line, clipped to
    /// both slabs' boundaries. Segments not longer than `tolerance` are
    /// dropped.
    #[must_use]
    pub fn calculate_slab_intersection(
        &self,
        other: &Self,
        tolerance: f64,
    ) -> Option<SlabIntersection> {
        let PlaneRelation::Intersecting { origin, direction } =
            plane_plane_intersection(&self.plane, &other.plane, tolerance)
        else {
            return None;
        };
        let direction = if direction.dot(&self.slope) < 0.0 {
            -direction
        } else {
            direction
        };

        let shared = if self.next_slab == other.index {
            Some(self.end)
        } else if self.prev_slab == other.index {
            Some(self.start)
        } else {
            None
        };
        let (origin, anchored) = shared.map_or((origin, false), |vertex| (vertex, true));

        let (lo_a, hi_a) = self.clip_range(&origin, &direction, anchored, tolerance)?;
        let (lo_b, hi_b) = other.clip_range(&origin, &direction, anchored, tolerance)?;
        let begin_param = lo_a.max(lo_b);
        let end_param = hi_a.min(hi_b);

        (end_param - begin_param > tolerance).then_some(SlabIntersection {
            prev_slab: self.index,
            next_slab: other.index,
            origin,
            direction,
            begin_param,
            end_param,
        })
    }

    /// Ridge segment between `from` and `to`, both on this slab and `other`.
    ///
    /// The segment is expressed on the slabs' plane-plane line; when the
    /// planes do not intersect cleanly the two points are joined directly.
    #[must_use]
    pub fn ridge_with(
        &self,
        other: &Self,
        from: Point3<f64>,
        to: Point3<f64>,
        tolerance: f64,
    ) -> SlabIntersection {
        match plane_plane_intersection(&self.plane, &other.plane, tolerance) {
            PlaneRelation::Intersecting { origin, direction } => SlabIntersection {
                prev_slab: self.index,
                next_slab: other.index,
                origin,
                direction,
                begin_param: (from - origin).dot(&direction),
                end_param: (to - origin).dot(&direction),
            },
            PlaneRelation::Parallel | PlaneRelation::Coplanar => {
                SlabIntersection::from_points(self.index, other.index, from, to)
            }
        }
    }

    /// Whether some collected segment touches `point`.
    #[must_use]
    pub fn has_intersection_at(&self, point: &Point3<f64>, tolerance: f64) -> bool {
        self.slab_intersections
            .iter()
            .any(|s| s.continues_from(point, tolerance).is_some())
    }

    /// Rough boundary from the lightcycles that bound this slab.
    ///
    /// Terminal points of lightcycles on the start side come first (in
    /// reverse), then the edge, then terminal points on the end side.
    pub fn calculate_vertices_from_lightcycles(&mut self, lightcycles: &[Lightcycle]) {
        let mut vertices =
            Vec::with_capacity(self.prev_lightcycles.len() + self.next_lightcycles.len() + 2);
        for &id in self.prev_lightcycles.iter().rev() {
            if let Some(point) = lightcycles[id].terminal_point() {
                vertices.push(point);
            }
        }
        vertices.push(self.start);
        vertices.push(self.end);
        for &id in &self.next_lightcycles {
            if let Some(point) = lightcycles[id].terminal_point() {
                vertices.push(point);
            }
        }
        self.vertices = vertices;
    }

    /// Signed turn from `heading` to `next`, measured within the slab.
    ///
    /// Positive turns are to the left of `heading` seen from above the slab.
    fn turn_angle(&self, heading: &Vector3<f64>, next: &Vector3<f64>) -> f64 {
        let (hu, hv) = (heading.dot(&self.edge), heading.dot(&self.slope));
        let (nu, nv) = (next.dot(&self.edge), next.dot(&self.slope));
        hu.mul_add(nv, -(hv * nu)).atan2(hu.mul_add(nu, hv * nv))
    }

    /// Walk the collected boundary segments into the facet loop.
    ///
    /// The walk starts at the edge start and follows segments endpoint to
    /// endpoint until it reaches the edge end. Where several segments
    /// continue from one point the sharpest right turn wins, which keeps the
    /// facet interior on the walk's right. On success the loop (edge start,
    /// edge end, then the walked points in reverse) becomes the slab's
    /// vertex list and the collected segments are released.
    pub fn calculate_vertices_from_intersections(&mut self, tolerance: f64) -> FacetTrace {
        let segments: Vec<SlabIntersection> = self
            .slab_intersections
            .iter()
            .filter(|s| s.length() > tolerance)
            .copied()
            .collect();
        let mut used = vec![false; segments.len()];
        let mut walked: Vec<Point3<f64>> = Vec::new();
        let mut pivot = self.start;
        let mut heading = self.start - self.end;

        for step in 0..=segments.len() {
            if step > 0 && (pivot - self.end).norm() <= tolerance {
                walked.pop();
                let mut vertices = vec![self.start, self.end];
                vertices.extend(walked.iter().rev());
                vertices.dedup_by(|b, a| (*b - *a).norm() <= tolerance);
                self.vertices = vertices.clone();
                self.slab_intersections.clear();
                return FacetTrace::Complete { vertices };
            }

            let next = segments
                .iter()
                .enumerate()
                .filter(|(i, _)| !used[*i])
                .filter_map(|(i, s)| s.continues_from(&pivot, tolerance).map(|p| (i, p)))
                .min_by(|(_, a), (_, b)| {
                    self.turn_angle(&heading, &(a - pivot))
                        .total_cmp(&self.turn_angle(&heading, &(b - pivot)))
                });

            let Some((i, point)) = next else {
                return FacetTrace::Aborted {
                    vertices: self.partial_loop(&walked),
                    reason: TraceAbort::NoContinuation { at: pivot },
                };
            };
            used[i] = true;
            let end_reached = (point - self.end).norm() <= tolerance;
            if !end_reached
                && std::iter::once(&self.start)
                    .chain(walked.iter())
                    .any(|p| (p - point).norm() <= tolerance)
            {
                return FacetTrace::Aborted {
                    vertices: self.partial_loop(&walked),
                    reason: TraceAbort::Revisited { at: point },
                };
            }
            heading = point - pivot;
            pivot = point;
            walked.push(point);
        }

        FacetTrace::Aborted {
            vertices: self.partial_loop(&walked),
            reason: TraceAbort::Exhausted {
                steps: segments.len(),
            },
        }
    }

    fn partial_loop(&self, walked: &[Point3<f64>]) -> Vec<Point3<f64>> {
        let mut vertices = vec![self.start, self.end];
        vertices.extend(walked.iter().rev());
        vertices
    }
}
