//! Scene-wide settings and their exported form.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Floor applied to the normal smoothing of an exported settings record.
pub const MIN_GROUP_SMOOTHING: f32 = 1e-5;

/// Scene-wide settings.
#[non_exhaustive]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    /// Tap distance used when estimating surface normals.
    pub normal_smoothing: f32,
    /// Distance over which thickness is sampled for subsurface shading.
    pub thickness_max_distance: f32,
    pub thickness_falloff: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            normal_smoothing: 0.015,
            thickness_max_distance: 0.0,
            thickness_falloff: 0.0,
        }
    }
}

impl Settings {
    /// Creates new [`Settings`] with the given normal smoothing.
    pub fn new(normal_smoothing: f32) -> Self {
        Self {
            normal_smoothing,
            ..Default::default()
        }
    }

    /// Sets the normal smoothing.
    pub fn with_normal_smoothing(mut self, normal_smoothing: f32) -> Self {
        self.normal_smoothing = normal_smoothing;
        self
    }

    /// Sets the thickness sampling distance.
    pub fn with_thickness_max_distance(mut self, thickness_max_distance: f32) -> Self {
        self.thickness_max_distance = thickness_max_distance;
        self
    }

    /// Sets the thickness falloff.
    pub fn with_thickness_falloff(mut self, thickness_falloff: f32) -> Self {
        self.thickness_falloff = thickness_falloff;
        self
    }

    /// Validates the settings, returning an error if any value is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("normal_smoothing", self.normal_smoothing),
            ("thickness_max_distance", self.thickness_max_distance),
            ("thickness_falloff", self.thickness_falloff),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(Error::InvalidConfig(format!("{name} must be finite")));
            }
            if value < 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be >= 0")));
            }
        }
        Ok(())
    }
}

/// Exported settings record handed to consumers and the evaluator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsData {
    pub normal_smoothing: f32,
    pub thickness_max_distance: f32,
    pub thickness_falloff: f32,
}

impl Default for SettingsData {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for SettingsData {
    fn from(s: &Settings) -> Self {
        Self {
            normal_smoothing: s.normal_smoothing.max(MIN_GROUP_SMOOTHING),
            thickness_max_distance: s.thickness_max_distance,
            thickness_falloff: s.thickness_falloff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert_eq!(settings.normal_smoothing, 0.015);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn builder_sets_fields() {
        let settings = Settings::new(0.05)
            .with_thickness_max_distance(2.0)
            .with_thickness_falloff(0.5);
        assert_eq!(settings.normal_smoothing, 0.05);
        assert_eq!(settings.thickness_max_distance, 2.0);
        assert_eq!(settings.thickness_falloff, 0.5);
    }

    #[test]
    fn validate_rejects_negative_and_non_finite() {
        assert!(Settings::new(-0.1).validate().is_err());
        assert!(Settings::default()
            .with_thickness_falloff(f32::INFINITY)
            .validate()
            .is_err());
    }

    #[test]
    fn export_floors_normal_smoothing() {
        let data = SettingsData::from(&Settings::new(0.0));
        assert_eq!(data.normal_smoothing, MIN_GROUP_SMOOTHING);

        let data = SettingsData::from(&Settings::new(0.2));
        assert_eq!(data.normal_smoothing, 0.2);
    }
}
