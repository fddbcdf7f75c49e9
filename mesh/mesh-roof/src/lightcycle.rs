//! Lightcycles: the moving vertices of the shrinking polygon.
//!
//! A lightcycle sits where two slabs meet on the wavefront and travels
//! along the bisector of their edges so that it stays on both slabs as the
//! wavefront moves inward. Simulation time is the inward offset distance,
//! so a lightcycle started at `start_time` from `ground_origin` sits at
//! `ground_origin + ground_velocity * (t - start_time)` on the polygon plane
//! and at height `climb * t` on the roof.
//!
//! In 3D a lightcycle is a ray whose parameter equals elapsed time, which
//! lets ray-ray and ray-plane intersections be read directly as arrival
//! times.

use nalgebra::{Point3, Vector3};
use tracing::trace;

use crate::collision::{Collision, CollisionKind};
use crate::lines::ray_ray_intersection;
use crate::plane::line_plane_intersection;
use crate::slab::{Slab, SlabIntersection};

/// `1 + cos` of the angle between two slab normals below which the slabs
/// are treated as antiparallel.
const STALL_EPSILON: f64 = 1e-10;

/// Cross products below this count as collinear edges.
const REFLEX_EPSILON: f64 = 1e-12;

/// Slabs a lightcycle can never collide with (the two it runs between).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Immunity {
    /// Slab on the lightcycle's previous side.
    pub prev_slab: usize,
    /// Slab on the lightcycle's next side.
    pub next_slab: usize,
}

impl Immunity {
    /// Whether `slab` is one of the immune slabs.
    #[must_use]
    pub const fn covers(&self, slab: usize) -> bool {
        self.prev_slab == slab || self.next_slab == slab
    }
}

/// A moving wavefront vertex between two slabs.
#[derive(Debug, Clone)]
pub struct Lightcycle {
    /// Slab on the incoming side.
    pub prev_slab: usize,
    /// Slab on the outgoing side.
    pub next_slab: usize,
    /// Simulation time at which the lightcycle started.
    pub start_time: f64,
    /// Start position on the polygon plane.
    pub ground_origin: Point3<f64>,
    /// Velocity on the polygon plane per unit of simulation time.
    pub ground_velocity: Vector3<f64>,
    /// Rise per unit of simulation time (polygon normal times climb).
    pub ground_normal: Vector3<f64>,
    /// The lightcycle moves into the polygon.
    pub inwards: bool,
    /// The lightcycle sits at a reflex corner.
    pub reflex: bool,
    /// The two slabs face each other exactly; the lightcycle cannot move.
    pub stalled: bool,
    /// Slabs excluded from polygon collisions.
    pub immunity: Immunity,
    /// Collision that consumed the lightcycle.
    pub collision: Option<usize>,
    /// Simulation time at which the lightcycle was consumed.
    pub end_time: Option<f64>,
    /// Roof segment traced by the lightcycle, once consumed.
    pub slab_intersection: Option<SlabIntersection>,
    /// Previous lightcycle on the same wavefront loop.
    pub prev_lightcycle: usize,
    /// Next lightcycle on the same wavefront loop.
    pub next_lightcycle: usize,
}

impl Lightcycle {
    /// Start a lightcycle between `prev` and `next` at `position`.
    ///
    /// `normal` is the unit polygon normal and `climb` the rise per unit of
    /// inward offset. Loop links point at the lightcycle's own id until the
    /// caller links it.
    #[must_use]
    pub fn new(
        id: usize,
        prev: &Slab,
        next: &Slab,
        position: Point3<f64>,
        start_time: f64,
        normal: &Vector3<f64>,
        climb: f64,
    ) -> Self {
        let (n_a, n_b) = (prev.inward, next.inward);
        let denom = 1.0 + n_a.dot(&n_b);
        let stalled = denom <= STALL_EPSILON;
        let ground_velocity = if stalled {
            Vector3::zeros()
        } else {
            (n_a + n_b) / denom
        };

        Self {
            prev_slab: prev.index,
            next_slab: next.index,
            start_time,
            ground_origin: position,
            ground_velocity,
            ground_normal: normal * climb,
            inwards: !stalled && ground_velocity.dot(&(n_a + n_b)) > 0.0,
            reflex: prev.edge.cross(&next.edge).dot(normal) < -REFLEX_EPSILON,
            stalled,
            immunity: Immunity {
                prev_slab: prev.index,
                next_slab: next.index,
            },
            collision: None,
            end_time: None,
            slab_intersection: None,
            prev_lightcycle: id,
            next_lightcycle: id,
        }
    }

    /// Whether the lightcycle is still on the wavefront.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.end_time.is_none()
    }

    /// Ground speed; `1 / cos(θ/2)` for a corner turning by `θ`.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.ground_velocity.norm()
    }

    /// Position on the polygon plane at simulation time `time`.
    #[must_use]
    pub fn position_at(&self, time: f64) -> Point3<f64> {
        self.ground_origin + self.ground_velocity * (time - self.start_time)
    }

    /// Start of the 3D ray.
    #[must_use]
    pub fn origin(&self) -> Point3<f64> {
        self.ground_origin + self.ground_normal * self.start_time
    }

    /// Direction of the 3D ray; the ray parameter is elapsed time.
    #[must_use]
    pub fn direction(&self) -> Vector3<f64> {
        self.ground_velocity + self.ground_normal
    }

    /// 3D roof point reached at simulation time `time`.
    #[must_use]
    pub fn point_at(&self, time: f64) -> Point3<f64> {
        self.position_at(time) + self.ground_normal * time
    }

    /// 3D roof point where the lightcycle was consumed.
    #[must_use]
    pub fn terminal_point(&self) -> Option<Point3<f64>> {
        self.end_time.map(|t| self.point_at(t))
    }

    /// Candidate meetings with other live lightcycles.
    ///
    /// Every crossing of this lightcycle's ray with another's is classified
    /// by [`Collision::between`]: simultaneous arrivals come back as ties,
    /// the rest as trail crossings with a winner. Stalled lightcycles and
    /// pairs meeting at their shared start are skipped.
    #[must_use]
    pub fn collide_with_lightcycles(
        &self,
        id: usize,
        existing: &[Self],
        tolerance: f64,
        arrival_tolerance: f64,
    ) -> Vec<Collision> {
        if self.stalled || !self.is_live() {
            return Vec::new();
        }
        let (origin, direction) = (self.origin(), self.direction());

        existing
            .iter()
            .enumerate()
            .filter(|&(other_id, other)| other_id != id && other.is_live() && !other.stalled)
            .filter_map(|(other_id, other)| {
                let (s, t) = ray_ray_intersection(
                    &origin,
                    &direction,
                    &other.origin(),
                    &other.direction(),
                    tolerance,
                )?;
                if s * direction.norm() <= tolerance && t * other.direction().norm() <= tolerance {
                    return None;
                }
                let first_time = self.start_time + s;
                let second_time = other.start_time + t;
                let point = self.position_at(first_time);
                trace!(id, other_id, first_time, second_time, "lightcycle rays cross");
                let mut collision = Collision::between(
                    id,
                    first_time,
                    other_id,
                    second_time,
                    point,
                    arrival_tolerance,
                );
                if collision.is_tie()
                    && (self.next_lightcycle == other_id || other.next_lightcycle == id)
                {
                    collision.kind = CollisionKind::Merge;
                }
                Some(collision)
            })
            .collect()
    }

    /// Candidate hits of a reflex lightcycle with other slabs' planes.
    ///
    /// Convex lightcycles never split an opposite front and return nothing.
    /// Only planes approached from below, ahead of the lightcycle, count.
    #[must_use]
    pub fn collide_with_polygon(&self, id: usize, slabs: &[Slab], tolerance: f64) -> Vec<Collision> {
        if !self.reflex || self.stalled || !self.is_live() {
            return Vec::new();
        }
        let (origin, direction) = (self.origin(), self.direction());
        let slack = tolerance / direction.norm();

        slabs
            .iter()
            .filter(|slab| !self.immunity.covers(slab.index))
            .filter(|slab| slab.plane.normal.dot(&direction) > REFLEX_EPSILON)
            .filter(|slab| slab.plane.signed_distance(&origin) <= tolerance)
            .filter_map(|slab| {
                let s = line_plane_intersection(&origin, &direction, &slab.plane)?;
                (s >= -slack).then(|| {
                    let time = self.start_time + s.max(0.0);
                    Collision::boundary(id, slab.index, time, self.position_at(time))
                })
            })
            .collect()
    }

    /// Roof segment from the start to the consumption point.
    ///
    /// Only consumed, inward-moving lightcycles that travelled further than
    /// `tolerance` produce one.
    #[must_use]
    pub fn calculate_slab_intersection(&self, tolerance: f64) -> Option<SlabIntersection> {
        let end_time = self.end_time?;
        if self.stalled || !self.inwards {
            return None;
        }
        let direction = self.direction();
        let end_param = (end_time - self.start_time) * direction.norm();
        (end_param > tolerance).then(|| SlabIntersection {
            prev_slab: self.prev_slab,
            next_slab: self.next_slab,
            origin: self.origin(),
            direction: direction.normalize(),
            begin_param: 0.0,
            end_param,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_4;

    fn slabs(points: &[Point3<f64>]) -> Vec<Slab> {
        let n = points.len();
        (0..n)
            .map(|i| Slab::new(i, n, points[i], points[(i + 1) % n], &Vector3::z(), FRAC_PI_4))
            .collect()
    }

    fn corners(slabs: &[Slab], points: &[Point3<f64>]) -> Vec<Lightcycle> {
        let n = slabs.len();
        let mut cycles: Vec<Lightcycle> = (0..n)
            .map(|i| {
                Lightcycle::new(
                    i,
                    &slabs[(i + n - 1) % n],
                    &slabs[i],
                    points[i],
                    0.0,
                    &Vector3::z(),
                    1.0,
                )
            })
            .collect();
        for i in 0..n {
            cycles[i].next_lightcycle = (i + 1) % n;
            cycles[(i + 1) % n].prev_lightcycle = i;
        }
        cycles
    }

    fn square() -> Vec<Point3<f64>> {
        vec![
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
        ]
    }

    fn l_shape() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ]
    }

    #[test]
    fn test_corner_velocity() {
        let points = square();
        let slabs = slabs(&points);
        let cycles = corners(&slabs, &points);
        let corner = &cycles[0];
        assert_relative_eq!(corner.ground_velocity, Vector3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(corner.speed(), 2.0_f64.sqrt(), epsilon = 1e-12);
        assert!(corner.inwards);
        assert!(!corner.reflex);
        assert!(!corner.stalled);
        assert_relative_eq!(corner.point_at(1.0), Point3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_antiparallel_slabs_stall() {
        let points = square();
        let slabs = slabs(&points);
        let stalled = Lightcycle::new(
            0,
            &slabs[0],
            &slabs[2],
            Point3::origin(),
            1.0,
            &Vector3::z(),
            1.0,
        );
        assert!(stalled.stalled);
        assert_relative_eq!(stalled.position_at(5.0), Point3::origin());
        assert!(stalled.calculate_slab_intersection(1e-9).is_none());
    }

    #[test]
    fn test_square_corners_meet_at_center() {
        let points = square();
        let slabs = slabs(&points);
        let cycles = corners(&slabs, &points);
        let found = cycles[0].collide_with_lightcycles(0, &cycles, 1e-9, 1e-9);

        // Neighbours meet at the apex as merges; the opposite corner as a split.
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(Collision::is_tie));
        for collision in &found {
            assert_relative_eq!(collision.looser_time, 1.0, epsilon = 1e-9);
            assert_relative_eq!(collision.point, Point3::origin(), epsilon = 1e-9);
        }
        let merges = found.iter().filter(|c| c.kind == CollisionKind::Merge).count();
        assert_eq!(merges, 2);
    }

    #[test]
    fn test_reflex_corner_hits_opposite_planes() {
        let points = l_shape();
        let slabs = slabs(&points);
        let cycles = corners(&slabs, &points);
        let reflex = &cycles[3];
        assert!(reflex.reflex);
        assert!(!cycles[0].reflex);
        assert!(cycles[0].collide_with_polygon(0, &slabs, 1e-9).is_empty());

        let hits = reflex.collide_with_polygon(3, &slabs, 1e-9);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|c| c.opposite_slab.is_some_and(|o| o == 0 || o == 5)));
        for hit in &hits {
            assert_relative_eq!(hit.looser_time, 0.5, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_terminal_segment() {
        let points = square();
        let slabs = slabs(&points);
        let mut cycles = corners(&slabs, &points);
        cycles[0].end_time = Some(1.0);
        let Some(segment) = cycles[0].calculate_slab_intersection(1e-9) else {
            panic!("consumed corner must leave a hip");
        };
        assert_relative_eq!(segment.start_point(), Point3::new(-1.0, -1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(segment.end_point(), Point3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
        assert!(cycles[1].calculate_slab_intersection(1e-9).is_none());
    }
}
