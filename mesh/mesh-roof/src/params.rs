//! Roof construction parameters and presets.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{RoofError, RoofResult};

/// Parameters for roof construction.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RoofParams {
    /// Distance tolerance used by every geometric comparison.
    pub tolerance: f64,

    /// Two arrival times closer than this are treated as simultaneous.
    pub arrival_tolerance: f64,

    /// Roof pitch in radians, measured from the polygon plane.
    pub pitch: f64,

    /// Side of the polygon plane the roof rises toward.
    pub up: Vector3<f64>,

    /// Requested roof height.
    ///
    /// Accepted for interface compatibility but not consumed by the
    /// construction: the height follows from the pitch and the polygon.
    pub height: Option<f64>,

    /// Fail the whole run when a facet loop cannot be closed.
    ///
    /// When `false`, the partial loop is kept and reported through
    /// [`FacetTrace::Aborted`](crate::FacetTrace::Aborted).
    pub strict_facets: bool,
}

impl Default for RoofParams {
    fn default() -> Self {
        Self {
            tolerance: 1e-4,
            arrival_tolerance: 1e-4,
            pitch: std::f64::consts::FRAC_PI_4,
            up: Vector3::z(),
            height: None,
            strict_facets: true,
        }
    }
}

impl RoofParams {
    /// Shallow 22.5° roof.
    #[must_use]
    pub fn low_pitch() -> Self {
        Self::default().with_pitch_degrees(22.5)
    }

    /// Steep 60° roof.
    #[must_use]
    pub fn steep() -> Self {
        Self::default().with_pitch_degrees(60.0)
    }

    /// Set the distance tolerance (arrival tolerance follows it).
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self.arrival_tolerance = tolerance;
        self
    }

    /// Set the pitch in degrees.
    #[must_use]
    pub fn with_pitch_degrees(mut self, degrees: f64) -> Self {
        self.pitch = degrees.to_radians();
        self
    }

    /// Set the up direction.
    #[must_use]
    pub fn with_up(mut self, up: Vector3<f64>) -> Self {
        self.up = up;
        self
    }

    /// Set the (currently unused) roof height.
    #[must_use]
    pub const fn with_height(mut self, height: f64) -> Self {
        self.height = Some(height);
        self
    }

    /// Choose whether aborted facet traces fail the run.
    #[must_use]
    pub const fn with_strict_facets(mut self, strict: bool) -> Self {
        self.strict_facets = strict;
        self
    }

    /// Climb per unit of inward offset, `tan(pitch)`.
    #[must_use]
    pub fn climb(&self) -> f64 {
        self.pitch.tan()
    }

    /// Check that every parameter is usable.
    ///
    /// # Errors
    ///
    /// Returns [`RoofError::InvalidParams`] for non-positive tolerances, a
    /// pitch outside the open range (0°, 90°), or a zero `up` vector.
    pub fn validate(&self) -> RoofResult<()> {
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            return Err(RoofError::InvalidParams(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.arrival_tolerance > 0.0 && self.arrival_tolerance.is_finite()) {
            return Err(RoofError::InvalidParams(format!(
                "arrival tolerance must be positive, got {}",
                self.arrival_tolerance
            )));
        }
        if !(self.pitch > 0.0 && self.pitch < std::f64::consts::FRAC_PI_2) {
            return Err(RoofError::InvalidParams(format!(
                "pitch must be between 0 and 90 degrees, got {:.3}",
                self.pitch.to_degrees()
            )));
        }
        if self.up.norm() <= f64::EPSILON {
            return Err(RoofError::InvalidParams("up vector is zero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_params() {
        let params = RoofParams::default();
        assert_relative_eq!(params.climb(), 1.0, epsilon = 1e-12);
        assert!(params.height.is_none());
        assert!(params.strict_facets);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        assert!(RoofParams::low_pitch().climb() < 1.0);
        assert!(RoofParams::steep().climb() > 1.0);
    }

    #[test]
    fn test_builder() {
        let params = RoofParams::default()
            .with_tolerance(1e-6)
            .with_pitch_degrees(30.0)
            .with_height(3.0)
            .with_strict_facets(false);

        assert_relative_eq!(params.tolerance, 1e-6);
        assert_relative_eq!(params.arrival_tolerance, 1e-6);
        assert_relative_eq!(params.pitch, 30.0_f64.to_radians());
        assert_eq!(params.height, Some(3.0));
        assert!(!params.strict_facets);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(RoofParams::default().with_tolerance(0.0).validate().is_err());
        assert!(RoofParams::default().with_pitch_degrees(95.0).validate().is_err());
        assert!(RoofParams::default().with_pitch_degrees(-5.0).validate().is_err());
        assert!(RoofParams::default()
            .with_up(Vector3::zeros())
            .validate()
            .is_err());
    }
}
