use crate::error::{CollisionError, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Scenario-level knobs of the collision stage. They size the fixed per-world buffers and tune the
/// broad phase and the reference convex routine; none of them change per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionSettings {
    /// Direction the broad phase sweeps along. Normalized on use.
    pub sweep_direction: [f32; 3],
    /// Capacity of each world's overlap pair buffer. Pairs past it are dropped and reported.
    pub max_overlaps_per_world: usize,
    /// Number of contact slots per world. Contacts past it are dropped and reported.
    pub max_contacts_per_world: usize,
    /// Sweep worker pool size as a multiple of the total geom count across all worlds.
    pub sweep_oversubscription: usize,
    /// Number of threads used by the parallel stages. Zero selects the available parallelism.
    pub worker_threads: usize,
    /// Convergence tolerance of the Minkowski portal refinement.
    pub mpr_tolerance: f32,
    /// Iteration cap of the Minkowski portal refinement.
    pub mpr_iterations: usize,
}

impl Default for CollisionSettings {
    fn default() -> Self {
        Self {
            sweep_direction: [0.5935, 0.7790, 0.1235],
            max_overlaps_per_world: 1024,
            max_contacts_per_world: 512,
            sweep_oversubscription: 5,
            worker_threads: 0,
            mpr_tolerance: 1.0e-6,
            mpr_iterations: 50,
        }
    }
}

impl CollisionSettings {
    /// Parses settings from JSON. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Checks that every knob is usable.
    pub fn validate(&self) -> Result<()> {
        let direction = Vec3::from_array(self.sweep_direction);
        if !direction.is_finite() || direction.length_squared() == 0.0 {
            return Err(CollisionError::InvalidSettings {
                reason: format!(
                    "sweep direction {:?} must be finite and nonzero",
                    self.sweep_direction
                ),
            });
        }
        if self.max_overlaps_per_world == 0 {
            return Err(CollisionError::InvalidSettings {
                reason: "max_overlaps_per_world must be positive".to_string(),
            });
        }
        if self.max_contacts_per_world == 0 {
            return Err(CollisionError::InvalidSettings {
                reason: "max_contacts_per_world must be positive".to_string(),
            });
        }
        if self.sweep_oversubscription == 0 {
            return Err(CollisionError::InvalidSettings {
                reason: "sweep_oversubscription must be positive".to_string(),
            });
        }
        if !(self.mpr_tolerance.is_finite() && self.mpr_tolerance > 0.0) {
            return Err(CollisionError::InvalidSettings {
                reason: format!("mpr_tolerance {} must be positive", self.mpr_tolerance),
            });
        }
        if self.mpr_iterations == 0 {
            return Err(CollisionError::InvalidSettings {
                reason: "mpr_iterations must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Unit sweep direction.
    #[inline]
    pub fn normalized_sweep_direction(&self) -> Vec3 {
        Vec3::from_array(self.sweep_direction).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = CollisionSettings::default();
        settings.validate().unwrap();
        assert!((settings.normalized_sweep_direction().length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings = CollisionSettings::from_json(r#"{ "max_overlaps_per_world": 7 }"#).unwrap();
        assert_eq!(settings.max_overlaps_per_world, 7);
        assert_eq!(settings.sweep_oversubscription, 5);
    }

    #[test]
    fn rejects_unusable_values() {
        let zero_direction = CollisionSettings {
            sweep_direction: [0.0; 3],
            ..Default::default()
        };
        assert!(zero_direction.validate().is_err());
        assert!(CollisionSettings::from_json(r#"{ "sweep_oversubscription": 0 }"#).is_err());
        assert!(matches!(
            CollisionSettings::from_json("{ not json"),
            Err(CollisionError::Config(_))
        ));
    }
}
