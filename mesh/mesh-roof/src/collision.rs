//! Collisions between wavefront pieces.
//!
//! A [`Collision`] starts life as a candidate: a predicted meeting of two
//! lightcycles, or of a reflex lightcycle with the plane of an opposite
//! slab. Candidates are queued by time and re-checked when they reach the
//! front of the queue, because an earlier collision may already have
//! consumed one of the participants. A candidate that survives the check is
//! resolved by [`Collision::collide`], which consumes the loosers, spawns
//! the child lightcycles, and splices them into the wavefront loops.

use nalgebra::Point3;
use smallvec::{smallvec, SmallVec};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::RoofResult;
use crate::lightcycle::Lightcycle;
use crate::wavefront::Wavefront;

/// What happens at a collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionKind {
    /// Two neighbouring lightcycles meet; their shared front vanishes.
    Merge,
    /// Two lightcycles on different parts of one loop meet; the loop splits.
    Split,
    /// A reflex lightcycle runs into an opposite front; the loop splits.
    Boundary,
    /// A loop shrank to two lightcycles and closed off.
    Closure,
}

impl CollisionKind {
    /// Processing priority among candidates at equal times (lower first).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Merge => 0,
            Self::Split => 1,
            Self::Boundary => 2,
            Self::Closure => 3,
        }
    }
}

/// Lifecycle of a collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CollisionState {
    /// Predicted, not yet examined.
    Candidate,
    /// Applied to the wavefront.
    Resolved,
    /// Found stale or invalid and dropped.
    Discarded,
}

/// A predicted or resolved collision.
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    /// What kind of collision this is.
    pub kind: CollisionKind,
    /// Arrival time of the winner (equal to `looser_time` for ties).
    pub winner_time: f64,
    /// Arrival time of the loosers; the collision's queue time.
    pub looser_time: f64,
    /// Lightcycle that passed first, for trail crossings.
    pub winner: Option<usize>,
    /// Lightcycles consumed by the collision.
    pub loosers: SmallVec<[usize; 2]>,
    /// Lightcycles spawned by the collision.
    pub children: SmallVec<[usize; 2]>,
    /// Collision point on the polygon plane.
    pub point: Point3<f64>,
    /// Slab hit by a boundary collision.
    pub opposite_slab: Option<usize>,
    /// Lifecycle state.
    pub state: CollisionState,
}

impl Collision {
    /// Classify two lightcycles reaching `point`.
    ///
    /// Arrivals within `arrival_tolerance` form a tie: both are loosers and
    /// there is no winner. Otherwise the earlier arrival is the winner and
    /// only the later one is a looser, running into the winner's trail.
    #[must_use]
    pub fn between(
        first: usize,
        first_time: f64,
        second: usize,
        second_time: f64,
        point: Point3<f64>,
        arrival_tolerance: f64,
    ) -> Self {
        let (winner, winner_time, loosers, looser_time) =
            if (first_time - second_time).abs() <= arrival_tolerance {
                let time = first_time.max(second_time);
                (None, time, smallvec![first, second], time)
            } else if first_time < second_time {
                (Some(first), first_time, smallvec![second], second_time)
            } else {
                (Some(second), second_time, smallvec![first], first_time)
            };

        Self {
            kind: CollisionKind::Split,
            winner_time,
            looser_time,
            winner,
            loosers,
            children: SmallVec::new(),
            point: Point3::new(point.x, point.y, 0.0),
            opposite_slab: None,
            state: CollisionState::Candidate,
        }
    }

    /// A reflex lightcycle reaching the plane of slab `opposite`.
    #[must_use]
    pub fn boundary(looser: usize, opposite: usize, time: f64, point: Point3<f64>) -> Self {
        Self {
            kind: CollisionKind::Boundary,
            winner_time: time,
            looser_time: time,
            winner: None,
            loosers: smallvec![looser],
            children: SmallVec::new(),
            point: Point3::new(point.x, point.y, 0.0),
            opposite_slab: Some(opposite),
            state: CollisionState::Candidate,
        }
    }

    /// A loop closing off with the given members.
    #[must_use]
    pub fn closure(members: &[usize], time: f64, point: Point3<f64>) -> Self {
        Self {
            kind: CollisionKind::Closure,
            winner_time: time,
            looser_time: time,
            winner: None,
            loosers: members.iter().copied().collect(),
            children: SmallVec::new(),
            point,
            opposite_slab: None,
            state: CollisionState::Resolved,
        }
    }

    /// Whether every participant arrives at once.
    #[must_use]
    pub fn is_tie(&self) -> bool {
        self.winner.is_none()
    }

    /// Whether the candidate can still happen.
    ///
    /// It can when it has not been examined yet, every looser is still on
    /// the wavefront, and the winner (if any) has not been consumed.
    #[must_use]
    pub fn check_candidate(&self, lightcycles: &[Lightcycle]) -> bool {
        self.state == CollisionState::Candidate
            && self.winner.map_or(true, |w| lightcycles[w].is_live())
            && self.loosers.iter().all(|&l| lightcycles[l].is_live())
    }

    /// Apply the collision to the wavefront.
    ///
    /// The kind is re-derived from the current loop structure: two
    /// lightcycles that have become neighbours merge, two on one loop split
    /// it, and two on different loops can no longer meet. A boundary hit is
    /// only applied when the hit point lies between the two lightcycles
    /// bounding the opposite front. Returns `false` when the collision turns
    /// out not to apply.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::ManyfoldCollision`](crate::RoofError::ManyfoldCollision)
    /// when other lightcycles reach the point at the same time without
    /// forming a chain with the participants.
    pub fn collide(&mut self, id: usize, wavefront: &mut Wavefront) -> RoofResult<bool> {
        let children = match self.kind {
            CollisionKind::Merge | CollisionKind::Split => {
                let [a, b] = self.loosers[..] else {
                    return Ok(false);
                };
                if wavefront.lightcycles[a].next_lightcycle == b {
                    self.kind = CollisionKind::Merge;
                    self.merge(id, a, b, wavefront)?
                } else if wavefront.lightcycles[b].next_lightcycle == a {
                    self.kind = CollisionKind::Merge;
                    self.merge(id, b, a, wavefront)?
                } else if wavefront.same_loop(a, b) {
                    self.kind = CollisionKind::Split;
                    self.split(id, a, b, wavefront)?
                } else {
                    debug!(id, a, b, "lightcycles no longer share a loop");
                    return Ok(false);
                }
            }
            CollisionKind::Boundary => {
                let (Some(opposite), &[reflex]) = (self.opposite_slab, self.loosers.as_slice()) else {
                    return Ok(false);
                };
                let Some((x, y)) = wavefront.find_bracket(reflex, opposite, &self.point) else {
                    debug!(id, reflex, opposite, "boundary hit outside the opposite front");
                    return Ok(false);
                };
                self.split_front(id, reflex, opposite, (x, y), wavefront)?
            }
            CollisionKind::Closure => return Ok(false),
        };

        self.children = children;
        self.state = CollisionState::Resolved;
        Ok(true)
    }

    /// `a` is directly followed by `b`; one child replaces both.
    fn merge(
        &self,
        id: usize,
        a: usize,
        b: usize,
        wavefront: &mut Wavefront,
    ) -> RoofResult<SmallVec<[usize; 2]>> {
        wavefront.check_manyfold(&[a, b], &self.point)?;
        let (before, prev_slab) = {
            let lc = &wavefront.lightcycles[a];
            (lc.prev_lightcycle, lc.prev_slab)
        };
        let (after, next_slab) = {
            let lc = &wavefront.lightcycles[b];
            (lc.next_lightcycle, lc.next_slab)
        };

        let child = wavefront.spawn(prev_slab, next_slab, self.point);
        wavefront.terminate(a, id);
        wavefront.terminate(b, id);
        wavefront.link(before, child);
        wavefront.link(child, after);
        wavefront.settle(&[child]);
        Ok(smallvec![child])
    }

    /// `a` and `b` meet from different parts of one loop.
    fn split(
        &self,
        id: usize,
        a: usize,
        b: usize,
        wavefront: &mut Wavefront,
    ) -> RoofResult<SmallVec<[usize; 2]>> {
        wavefront.check_manyfold(&[a, b], &self.point)?;
        let la = wavefront.lightcycles[a].clone();
        let lb = wavefront.lightcycles[b].clone();

        let first = wavefront.spawn(la.prev_slab, lb.next_slab, self.point);
        let second = wavefront.spawn(lb.prev_slab, la.next_slab, self.point);
        wavefront.terminate(a, id);
        wavefront.terminate(b, id);
        wavefront.link(la.prev_lightcycle, first);
        wavefront.link(first, lb.next_lightcycle);
        wavefront.link(lb.prev_lightcycle, second);
        wavefront.link(second, la.next_lightcycle);
        wavefront.settle(&[first, second]);
        Ok(smallvec![first, second])
    }

    /// `reflex` hits the front of `opposite` between `x` and `y`.
    fn split_front(
        &self,
        id: usize,
        reflex: usize,
        opposite: usize,
        (x, y): (usize, usize),
        wavefront: &mut Wavefront,
    ) -> RoofResult<SmallVec<[usize; 2]>> {
        wavefront.check_manyfold(&[reflex], &self.point)?;
        let lr = wavefront.lightcycles[reflex].clone();

        let first = wavefront.spawn(lr.prev_slab, opposite, self.point);
        let second = wavefront.spawn(opposite, lr.next_slab, self.point);
        wavefront.terminate(reflex, id);
        wavefront.link(lr.prev_lightcycle, first);
        wavefront.link(first, y);
        wavefront.link(x, second);
        wavefront.link(second, lr.next_lightcycle);
        wavefront.settle(&[first, second]);
        Ok(smallvec![first, second])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_between_tie() {
        let c = Collision::between(0, 1.0, 1, 1.0 + 1e-9, Point3::new(1.0, 2.0, 3.0), 1e-6);
        assert!(c.is_tie());
        assert_eq!(c.loosers.as_slice(), &[0, 1]);
        assert!((c.point.z).abs() < f64::EPSILON);
    }

    #[test]
    fn test_between_winner() {
        let c = Collision::between(4, 2.0, 7, 1.0, Point3::origin(), 1e-6);
        assert_eq!(c.winner, Some(7));
        assert_eq!(c.loosers.as_slice(), &[4]);
        assert!((c.winner_time - 1.0).abs() < f64::EPSILON);
        assert!((c.looser_time - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_boundary_and_closure() {
        let b = Collision::boundary(3, 5, 0.5, Point3::new(0.5, 0.5, 0.5));
        assert_eq!(b.kind, CollisionKind::Boundary);
        assert_eq!(b.opposite_slab, Some(5));
        assert!(b.is_tie());

        let c = Collision::closure(&[1, 2], 1.0, Point3::origin());
        assert_eq!(c.state, CollisionState::Resolved);
        assert_eq!(c.loosers.len(), 2);
    }

    #[test]
    fn test_kind_rank_order() {
        assert!(CollisionKind::Merge.rank() < CollisionKind::Split.rank());
        assert!(CollisionKind::Split.rank() < CollisionKind::Boundary.rank());
        assert!(CollisionKind::Boundary.rank() < CollisionKind::Closure.rank());
    }
}
