//! The shrinking wavefront and its event loop.
//!
//! All simulation state lives in flat arenas indexed by `usize`: slabs,
//! lightcycles, and collisions refer to each other by index only. Live
//! lightcycles form closed loops through their `prev_lightcycle` and
//! `next_lightcycle` links, one loop per connected piece of the wavefront.

use nalgebra::{Point3, Vector3};
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::collision::{Collision, CollisionKind, CollisionState};
use crate::error::{RoofError, RoofResult};
use crate::lightcycle::Lightcycle;
use crate::params::RoofParams;
use crate::queue::EventQueue;
use crate::result::{FacetTrace, ResolvedEvent};
use crate::slab::{Slab, SlabIntersection};

/// Simulation state for one roof.
#[derive(Debug)]
pub struct Wavefront {
    /// One slab per polygon edge.
    pub slabs: Vec<Slab>,
    /// Every lightcycle ever spawned.
    pub lightcycles: Vec<Lightcycle>,
    /// Every collision ever predicted.
    pub collisions: Vec<Collision>,
    /// Ridge and frozen-front segments produced by closed loops.
    pub ridges: Vec<SlabIntersection>,
    /// Resolved collisions in order.
    pub events: Vec<ResolvedEvent>,
    /// Polygon normal (always +Z in the local frame).
    pub normal: Vector3<f64>,
    /// Rise per unit of inward offset.
    pub climb: f64,
    /// Distance tolerance.
    pub tolerance: f64,
    /// Arrival-time tolerance.
    pub arrival_tolerance: f64,
    /// Current simulation time.
    pub now: f64,
    /// Candidates dropped when they reached the queue front.
    pub discarded: usize,
    /// Ray crossings that were not simultaneous arrivals.
    pub trail_crossings: usize,
    /// Loops still open when the queue ran dry.
    pub unresolved_loops: usize,
    queue: EventQueue,
}

impl Wavefront {
    /// Set up the initial wavefront of a counter-clockwise polygon lying in
    /// the XY plane.
    #[must_use]
    pub fn new(polygon: &[Point3<f64>], params: &RoofParams) -> Self {
        let n = polygon.len();
        let normal = Vector3::z();
        let slabs = (0..n)
            .map(|i| Slab::new(i, n, polygon[i], polygon[(i + 1) % n], &normal, params.pitch))
            .collect();

        let mut wavefront = Self {
            slabs,
            lightcycles: Vec::with_capacity(3 * n),
            collisions: Vec::new(),
            ridges: Vec::new(),
            events: Vec::new(),
            normal,
            climb: params.climb(),
            tolerance: params.tolerance,
            arrival_tolerance: params.arrival_tolerance,
            now: 0.0,
            discarded: 0,
            trail_crossings: 0,
            unresolved_loops: 0,
            queue: EventQueue::new(),
        };

        for (i, vertex) in polygon.iter().enumerate() {
            wavefront.spawn((i + n - 1) % n, i, *vertex);
        }
        for i in 0..n {
            wavefront.link(i, (i + 1) % n);
        }
        wavefront
    }

    /// Start a lightcycle between two slabs at the current time.
    pub fn spawn(&mut self, prev_slab: usize, next_slab: usize, position: Point3<f64>) -> usize {
        let id = self.lightcycles.len();
        let lightcycle = Lightcycle::new(
            id,
            &self.slabs[prev_slab],
            &self.slabs[next_slab],
            position,
            self.now,
            &self.normal,
            self.climb,
        );
        trace!(id, prev_slab, next_slab, stalled = lightcycle.stalled, "spawned lightcycle");
        self.lightcycles.push(lightcycle);
        self.slabs[next_slab].prev_lightcycles.push(id);
        self.slabs[prev_slab].next_lightcycles.push(id);
        id
    }

    /// Make `b` follow `a` on its loop.
    pub fn link(&mut self, a: usize, b: usize) {
        self.lightcycles[a].next_lightcycle = b;
        self.lightcycles[b].prev_lightcycle = a;
    }

    /// Consume lightcycle `id` at the current time.
    pub fn terminate(&mut self, id: usize, collision: usize) {
        let lightcycle = &mut self.lightcycles[id];
        lightcycle.end_time = Some(self.now);
        lightcycle.collision = Some(collision);
    }

    /// Members of the loop through `start`, in `next` order.
    #[must_use]
    pub fn loop_members(&self, start: usize) -> Vec<usize> {
        let mut members = vec![start];
        let mut current = self.lightcycles[start].next_lightcycle;
        while current != start && members.len() <= self.lightcycles.len() {
            members.push(current);
            current = self.lightcycles[current].next_lightcycle;
        }
        members
    }

    /// Whether `a` and `b` are on the same loop.
    #[must_use]
    pub fn same_loop(&self, a: usize, b: usize) -> bool {
        self.loop_members(a).contains(&b)
    }

    /// Queue every collision predicted for the initial wavefront.
    fn seed(&mut self) {
        for id in 0..self.lightcycles.len() {
            let found = self.lightcycles[id].collide_with_lightcycles(
                id,
                &self.lightcycles,
                self.tolerance,
                self.arrival_tolerance,
            );
            // Pairs are symmetric; keep each once.
            for collision in found {
                if collision.loosers.iter().chain(collision.winner.iter()).all(|&p| p >= id) {
                    self.enqueue(collision);
                }
            }
            for collision in
                self.lightcycles[id].collide_with_polygon(id, &self.slabs, self.tolerance)
            {
                self.enqueue(collision);
            }
        }
    }

    /// Queue every collision predicted for a new lightcycle.
    fn discover(&mut self, id: usize) {
        let lightcycle = &self.lightcycles[id];
        let mut found = lightcycle.collide_with_lightcycles(
            id,
            &self.lightcycles,
            self.tolerance,
            self.arrival_tolerance,
        );
        found.extend(lightcycle.collide_with_polygon(id, &self.slabs, self.tolerance));
        for collision in found {
            self.enqueue(collision);
        }
    }

    /// Queue a candidate; trail crossings are only counted.
    fn enqueue(&mut self, collision: Collision) {
        if !collision.is_tie() {
            self.trail_crossings += 1;
            trace!(
                winner = ?collision.winner,
                looser = ?collision.loosers.first(),
                time = collision.looser_time,
                "trail crossing ignored"
            );
            return;
        }
        let id = self.collisions.len();
        let time = collision.looser_time.max(self.now);
        self.queue.push(time, collision.kind, id);
        self.collisions.push(collision);
    }

    /// Close tiny loops among `children` and predict collisions for the rest.
    pub fn settle(&mut self, children: &[usize]) {
        for &child in children {
            if !self.lightcycles[child].is_live() {
                continue;
            }
            if self.loop_members(child).len() <= 2 {
                self.close_loop(child);
            } else {
                self.merge_coincident(child);
                self.discover(child);
            }
        }
    }

    /// Queue an immediate merge with any loop neighbour already sitting on
    /// `child`'s spawn point.
    ///
    /// The front between them has shrunk to nothing, so they must merge
    /// even when their rays give no usable crossing (stalled lightcycles,
    /// or two lightcycles spawned at the same instant).
    fn merge_coincident(&mut self, child: usize) {
        let lightcycle = &self.lightcycles[child];
        let here = lightcycle.position_at(self.now);
        let pairs = [
            (lightcycle.prev_lightcycle, child),
            (child, lightcycle.next_lightcycle),
        ];
        for (a, b) in pairs {
            let other = if a == child { b } else { a };
            let there = self.lightcycles[other].position_at(self.now);
            if (there - here).norm() > self.tolerance {
                continue;
            }
            trace!(a, b, time = self.now, "coincident neighbours");
            let mut collision =
                Collision::between(a, self.now, b, self.now, here, self.arrival_tolerance);
            collision.kind = CollisionKind::Merge;
            self.enqueue(collision);
        }
    }

    /// Close the loop through `start` at the current time.
    ///
    /// A two-member loop whose members have drifted apart leaves a ridge
    /// between the two slabs it still separates.
    fn close_loop(&mut self, start: usize) {
        let members = self.loop_members(start);
        let id = self.collisions.len();
        let positions: Vec<Point3<f64>> = members
            .iter()
            .map(|&m| self.lightcycles[m].position_at(self.now))
            .collect();
        let roof_points: Vec<Point3<f64>> = members
            .iter()
            .map(|&m| self.lightcycles[m].point_at(self.now))
            .collect();

        if let ([a, b], [pa, pb]) = (members.as_slice(), roof_points.as_slice()) {
            if (pa - pb).norm() > self.tolerance {
                let first = self.lightcycles[*a].next_slab;
                let second = self.lightcycles[*b].next_slab;
                let ridge =
                    self.slabs[first].ridge_with(&self.slabs[second], *pa, *pb, self.tolerance);
                debug!(first, second, length = ridge.length(), "ridge closed");
                self.ridges.push(ridge);
            }
        }

        for &m in &members {
            self.terminate(m, id);
        }
        let collision = Collision::closure(&members, self.now, positions[0]);
        self.record(&collision, members.len(), 0);
        self.collisions.push(collision);
    }

    /// Freeze a loop the event loop never closed.
    ///
    /// Each remaining front becomes a segment on its own slab so that the
    /// facet can still be traced.
    fn freeze_loop(&mut self, start: usize) {
        let members = self.loop_members(start);
        let id = self.collisions.len();
        warn!(
            members = members.len(),
            time = self.now,
            "wavefront loop left open, freezing it"
        );
        self.unresolved_loops += 1;

        for (k, &a) in members.iter().enumerate() {
            let b = members[(k + 1) % members.len()];
            let pa = self.lightcycles[a].point_at(self.now);
            let pb = self.lightcycles[b].point_at(self.now);
            if (pa - pb).norm() > self.tolerance {
                let slab = self.lightcycles[a].next_slab;
                self.ridges.push(SlabIntersection::from_points(slab, slab, pa, pb));
            }
        }

        let point = self.lightcycles[start].position_at(self.now);
        for &m in &members {
            self.terminate(m, id);
        }
        let collision = Collision::closure(&members, self.now, point);
        self.record(&collision, members.len(), 0);
        self.collisions.push(collision);
    }

    fn record(&mut self, collision: &Collision, loosers: usize, children: usize) {
        self.events.push(ResolvedEvent {
            time: self.now,
            kind: collision.kind,
            point: collision.point,
            loosers,
            children,
        });
    }

    /// Live lightcycles (other than `participants`) at `point` right now must
    /// form a chain with the participants along their loop.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::ManyfoldCollision`] when some coincident
    /// lightcycle is not chained to the participants.
    pub fn check_manyfold(&self, participants: &[usize], point: &Point3<f64>) -> RoofResult<()> {
        let coincident: Vec<usize> = self
            .lightcycles
            .iter()
            .enumerate()
            .filter(|(i, lc)| {
                lc.is_live()
                    && !participants.contains(i)
                    && (lc.position_at(self.now) - point).norm() <= self.tolerance
            })
            .map(|(i, _)| i)
            .collect();
        if coincident.is_empty() {
            return Ok(());
        }

        let mut chained: SmallVec<[usize; 8]> = participants.iter().copied().collect();
        for &p in participants {
            let mut current = self.lightcycles[p].prev_lightcycle;
            while coincident.contains(&current) && !chained.contains(&current) {
                chained.push(current);
                current = self.lightcycles[current].prev_lightcycle;
            }
            let mut current = self.lightcycles[p].next_lightcycle;
            while coincident.contains(&current) && !chained.contains(&current) {
                chained.push(current);
                current = self.lightcycles[current].next_lightcycle;
            }
        }

        if coincident.iter().all(|c| chained.contains(c)) {
            debug!(
                time = self.now,
                extra = coincident.len(),
                "coincident lightcycles chained to collision"
            );
            Ok(())
        } else {
            Err(RoofError::ManyfoldCollision {
                time: self.now,
                count: participants.len() + coincident.len(),
            })
        }
    }

    /// The pair `(x, y)` on `reflex`'s loop bounding the front of slab
    /// `opposite` around `point`, if the point lies strictly inside it.
    #[must_use]
    pub fn find_bracket(
        &self,
        reflex: usize,
        opposite: usize,
        point: &Point3<f64>,
    ) -> Option<(usize, usize)> {
        let slab = &self.slabs[opposite];
        for x in self.loop_members(reflex) {
            let y = self.lightcycles[x].next_lightcycle;
            if x == reflex || y == reflex || self.lightcycles[x].next_slab != opposite {
                continue;
            }
            let (lx, ly) = (&self.lightcycles[x], &self.lightcycles[y]);
            let (px, py) = (lx.position_at(self.now), ly.position_at(self.now));
            if (point - px).norm() <= self.tolerance || (point - py).norm() <= self.tolerance {
                // A vertex arriving here is a lightcycle meeting instead.
                return None;
            }
            let dx = if lx.stalled { slab.inward } else { lx.ground_velocity };
            let dy = if ly.stalled { slab.inward } else { ly.ground_velocity };
            if slab.is_outer_of_collision(&dx, &(point - px), &self.normal)
                && !slab.is_outer_of_collision(&dy, &(point - py), &self.normal)
            {
                return Some((x, y));
            }
        }
        None
    }

    /// Run the event loop until the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::ManyfoldCollision`] when more than two
    /// wavefronts meet at one point and time.
    pub fn run(&mut self) -> RoofResult<()> {
        self.seed();
        debug!(queued = self.queue.len(), "wavefront seeded");

        while let Some(entry) = self.queue.pop() {
            let id = entry.collision;
            if !self.collisions[id].check_candidate(&self.lightcycles) {
                self.collisions[id].state = CollisionState::Discarded;
                self.discarded += 1;
                continue;
            }

            self.now = self.now.max(entry.time);
            let mark = self.events.len();
            let mut collision = self.collisions[id].clone();
            if collision.collide(id, self)? {
                debug!(id, kind = ?collision.kind, time = self.now, "collision resolved");
                self.events.insert(
                    mark,
                    ResolvedEvent {
                        time: self.now,
                        kind: collision.kind,
                        point: collision.point,
                        loosers: collision.loosers.len(),
                        children: collision.children.len(),
                    },
                );
            } else {
                collision.state = CollisionState::Discarded;
                self.discarded += 1;
            }
            self.collisions[id] = collision;
        }

        let open: Vec<usize> = (0..self.lightcycles.len())
            .filter(|&i| self.lightcycles[i].is_live())
            .collect();
        for id in open {
            if self.lightcycles[id].is_live() {
                self.freeze_loop(id);
            }
        }
        Ok(())
    }

    /// Collect boundary segments on every slab and trace each facet loop.
    ///
    /// Returns one trace per slab, in slab order.
    pub fn reconstruct(&mut self) -> Vec<FacetTrace> {
        let tolerance = self.tolerance;

        for id in 0..self.lightcycles.len() {
            let segment = self.lightcycles[id].calculate_slab_intersection(tolerance);
            if let Some(segment) = segment {
                self.attach(segment);
            }
            self.lightcycles[id].slab_intersection = segment;
        }
        for ridge in std::mem::take(&mut self.ridges) {
            self.attach(ridge);
            self.ridges.push(ridge);
        }

        let lightcycles = &self.lightcycles;
        for slab in &mut self.slabs {
            slab.calculate_vertices_from_lightcycles(lightcycles);
        }

        // Every facet walk starts on the hip at its edge start.
        for i in 0..self.slabs.len() {
            let (start, prev) = (self.slabs[i].start, self.slabs[i].prev_slab);
            if self.slabs[i].has_intersection_at(&start, tolerance) {
                continue;
            }
            if let Some(hip) = self.slabs[i].calculate_slab_intersection(&self.slabs[prev], tolerance)
            {
                debug!(slab = i, "seeding facet walk with computed hip");
                self.attach(hip);
            }
        }

        (0..self.slabs.len()).map(|i| self.trace_slab(i)).collect()
    }

    fn attach(&mut self, segment: SlabIntersection) {
        self.slabs[segment.prev_slab].slab_intersections.push(segment);
        if segment.next_slab != segment.prev_slab {
            self.slabs[segment.next_slab].slab_intersections.push(segment);
        }
    }

    /// Trace one facet, retrying once with plane-plane segments against
    /// every non-adjacent slab if the collected segments leave a gap.
    fn trace_slab(&mut self, index: usize) -> FacetTrace {
        let tolerance = self.tolerance;
        let trace = self.slabs[index].calculate_vertices_from_intersections(tolerance);
        if trace.is_complete() {
            return trace;
        }

        let slab = &self.slabs[index];
        let known = &slab.slab_intersections;
        let extra: Vec<SlabIntersection> = self
            .slabs
            .iter()
            .filter(|other| {
                other.index != index && other.index != slab.prev_slab && other.index != slab.next_slab
            })
            .filter_map(|other| slab.calculate_slab_intersection(other, tolerance))
            .filter(|candidate| {
                !known.iter().any(|k| {
                    k.continues_from(&candidate.start_point(), tolerance)
                        .is_some_and(|p| (p - candidate.end_point()).norm() <= tolerance)
                })
            })
            .collect();
        if extra.is_empty() {
            return trace;
        }

        debug!(slab = index, extra = extra.len(), "retrying facet walk");
        self.slabs[index].slab_intersections.extend(extra);
        self.slabs[index].calculate_vertices_from_intersections(tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn run(points: &[(f64, f64)]) -> Wavefront {
        let polygon: Vec<Point3<f64>> = points.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect();
        let mut wavefront = Wavefront::new(&polygon, &RoofParams::default());
        assert!(wavefront.run().is_ok());
        wavefront
    }

    #[test]
    fn test_initial_loop() {
        let polygon = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let wavefront = Wavefront::new(&polygon, &RoofParams::default());
        assert_eq!(wavefront.loop_members(0), vec![0, 1, 2]);
        assert!(wavefront.same_loop(2, 1));
        assert_eq!(wavefront.slabs[1].prev_lightcycles, vec![1]);
        assert_eq!(wavefront.slabs[1].next_lightcycles, vec![2]);
    }

    #[test]
    fn test_square_collapses_to_point() {
        let wavefront = run(&[(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)]);
        assert!(wavefront.lightcycles.iter().all(|lc| !lc.is_live()));
        assert!(wavefront.ridges.is_empty());
        assert_eq!(wavefront.unresolved_loops, 0);
        for event in &wavefront.events {
            assert_relative_eq!(event.time, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_rectangle_leaves_ridge() {
        let wavefront = run(&[(-1.0, -0.5), (1.0, -0.5), (1.0, 0.5), (-1.0, 0.5)]);
        assert_eq!(wavefront.ridges.len(), 1);
        assert_relative_eq!(wavefront.ridges[0].length(), 1.0, epsilon = 1e-9);
        assert_eq!(wavefront.unresolved_loops, 0);
    }

    #[test]
    fn test_reflex_polygon_splits() {
        let wavefront = run(&[
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 1.0),
            (1.0, 1.0),
            (1.0, 2.0),
            (0.0, 2.0),
        ]);
        assert!(wavefront.events.iter().any(|e| e.kind == CollisionKind::Split));
        assert_eq!(wavefront.ridges.len(), 2);
        assert_eq!(wavefront.unresolved_loops, 0);
        let mut last = 0.0;
        for event in &wavefront.events {
            assert!(event.time >= last);
            last = event.time;
        }
    }

    #[test]
    fn test_manyfold_detected() {
        let polygon = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let mut wavefront = Wavefront::new(&polygon, &RoofParams::default());
        // A stray lightcycle parked on vertex 0 is not part of its loop.
        let stray = wavefront.spawn(0, 1, Point3::new(0.0, 0.0, 0.0));
        wavefront.link(stray, stray);
        let result = wavefront.check_manyfold(&[1, 2], &Point3::new(0.0, 0.0, 0.0));
        assert!(matches!(result, Err(RoofError::ManyfoldCollision { .. })));
        assert!(wavefront.check_manyfold(&[0, stray], &Point3::new(0.0, 0.0, 0.0)).is_ok());
    }
}
