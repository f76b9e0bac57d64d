use crate::planning::PlanningError;
use serde::{Deserialize, Serialize};
use std::fs;

/// Which way the viewpoints are offset relative to the oriented plane normal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalSign {
    #[default]
    AsFit,
    Flipped,
}

impl NormalSign {
    pub fn factor(self) -> f64 {
        match self {
            NormalSign::AsFit => 1.0,
            NormalSign::Flipped => -1.0,
        }
    }
}

/// Parameters of one planning run.
///
/// Missing keys in a YAML file take the defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// Offset from each target along the plane normal, meters.
    pub standoff_distance: f64,
    pub normal_sign: NormalSign,
    /// Cruise speed, m/s.
    pub max_velocity: f64,
    /// Battery at the start waypoint, percent.
    pub battery_capacity: f64,
    /// Maximum spacing between emitted waypoints along a leg, meters.
    pub interpolation_spacing: f64,
    /// Hover time at every target, seconds.
    pub scan_dwell_seconds: f64,
    /// Battery percent spent per meter flown.
    pub battery_drain_per_meter: f64,
    /// Battery percent spent per second hovering.
    pub battery_drain_per_second_hover: f64,
    /// Upper bound on full 2-opt passes; `None` runs to a local optimum.
    pub max_2opt_passes: Option<usize>,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        PlanningConfig {
            standoff_distance: 2.0,
            normal_sign: NormalSign::AsFit,
            max_velocity: 2.0,
            battery_capacity: 100.0,
            interpolation_spacing: 2.0,
            scan_dwell_seconds: 3.0,
            battery_drain_per_meter: 0.1,
            battery_drain_per_second_hover: 0.05,
            max_2opt_passes: None,
        }
    }
}

impl PlanningConfig {
    /// Checks every field against its admissible range.
    pub fn validate(&self) -> Result<(), PlanningError> {
        fn positive(name: &str, value: f64) -> Result<(), PlanningError> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(PlanningError::InvalidConfiguration(format!(
                    "{name} must be positive and finite, got {value}"
                )))
            }
        }
        fn non_negative(name: &str, value: f64) -> Result<(), PlanningError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(PlanningError::InvalidConfiguration(format!(
                    "{name} must be non-negative and finite, got {value}"
                )))
            }
        }

        positive("standoff_distance", self.standoff_distance)?;
        positive("max_velocity", self.max_velocity)?;
        positive("battery_capacity", self.battery_capacity)?;
        positive("interpolation_spacing", self.interpolation_spacing)?;
        non_negative("scan_dwell_seconds", self.scan_dwell_seconds)?;
        non_negative("battery_drain_per_meter", self.battery_drain_per_meter)?;
        non_negative(
            "battery_drain_per_second_hover",
            self.battery_drain_per_second_hover,
        )?;
        if self.max_2opt_passes == Some(0) {
            return Err(PlanningError::InvalidConfiguration(
                "max_2opt_passes must be a positive integer when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Parses and validates a configuration from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self, PlanningError> {
        let config: PlanningConfig = serde_yaml::from_str(contents)
            .map_err(|e| PlanningError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a YAML file.
    pub fn load_from_yaml(path: &str) -> Result<Self, PlanningError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            PlanningError::InvalidConfiguration(format!("cannot read {path}: {e}"))
        })?;
        Self::from_yaml_str(&contents)
    }
}
