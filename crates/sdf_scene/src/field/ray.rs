//! Rays, hits and sphere-tracing configuration.
use glam::Vec3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A ray with a unit-length direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    /// Start point.
    pub origin: Vec3,
    /// Unit direction, or zero for a degenerate ray.
    pub direction: Vec3,
}

impl Ray {
    /// Creates a ray, normalizing `direction`. A zero direction stays zero and never hits.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Point at distance `t` along the ray.
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Where a ray met the surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// First marched point closer to the surface than the hit threshold.
    pub point: Vec3,
    /// Surface normal at `point`.
    pub normal: Vec3,
    /// Distance travelled along the ray.
    pub distance: f32,
    /// Number of marching steps taken.
    pub steps: u32,
}

/// Sphere tracing limits.
#[non_exhaustive]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayMarchConfig {
    /// Travel distance after which the ray counts as a miss.
    pub max_distance: f32,
    /// Upper bound on field evaluations per ray.
    pub max_iterations: u32,
    /// Field value below which the ray counts as a hit.
    pub surface_distance: f32,
}

impl Default for RayMarchConfig {
    fn default() -> Self {
        Self {
            max_distance: 350.0,
            max_iterations: 256,
            surface_distance: 0.001,
        }
    }
}

impl RayMarchConfig {
    /// Creates a new [`RayMarchConfig`] with the given miss distance.
    pub fn new(max_distance: f32) -> Self {
        Self {
            max_distance,
            ..Default::default()
        }
    }

    /// Sets the miss distance.
    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = max_distance;
        self
    }

    /// Sets the iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the hit threshold.
    pub fn with_surface_distance(mut self, surface_distance: f32) -> Self {
        self.surface_distance = surface_distance;
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) {
            return Err(Error::InvalidConfig("max_distance must be finite and > 0".into()));
        }
        if self.max_iterations == 0 {
            return Err(Error::InvalidConfig("max_iterations must be > 0".into()));
        }
        if !(self.surface_distance.is_finite() && self.surface_distance > 0.0) {
            return Err(Error::InvalidConfig(
                "surface_distance must be finite and > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_direction_is_normalized() {
        let ray = Ray::new(Vec3::ZERO, Vec3::new(0.0, 0.0, -4.0));
        assert_eq!(ray.direction, Vec3::NEG_Z);
        assert_eq!(ray.at(2.5), Vec3::new(0.0, 0.0, -2.5));
    }

    #[test]
    fn default_config_matches_documented_limits() {
        let config = RayMarchConfig::default();
        assert_eq!(config.max_distance, 350.0);
        assert_eq!(config.max_iterations, 256);
        assert_eq!(config.surface_distance, 0.001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_degenerate_limits() {
        assert!(RayMarchConfig::new(0.0).validate().is_err());
        assert!(RayMarchConfig::default()
            .with_max_iterations(0)
            .validate()
            .is_err());
        assert!(RayMarchConfig::default()
            .with_surface_distance(f32::NAN)
            .validate()
            .is_err());
    }
}
