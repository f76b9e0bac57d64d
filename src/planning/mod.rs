//! The `planning` module turns reconstructed targets into a flyable inspection path.
//!
//! The stages run strictly in sequence:
//! 1. [`standoff`] offsets every target along the plane normal to a [`Viewpoint`].
//! 2. [`tour`] orders the viewpoints with nearest-neighbor construction and
//!    open-path 2-opt improvement.
//! 3. [`trajectory`] expands the ordered viewpoints into timed, battery-annotated
//!    [`Waypoint`]s.
//!
//! [`mission::MissionPlanner`] chains these stages behind triangulation and
//! plane estimation. Fatal problems are reported as [`PlanningError`]; conditions
//! the caller may choose to accept are returned as [`PlanningWarning`]s next to
//! the result.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod mission;
pub mod standoff;
pub mod tour;
pub mod trajectory;

pub use config::{NormalSign, PlanningConfig};
pub use mission::{MissionPlan, MissionPlanner};
pub use standoff::{project_standoff, Viewpoint};
pub use tour::{path_length, TourOptimizer};
pub use trajectory::{expand_trajectory, Trajectory, Waypoint, WaypointKind};

use crate::camera::CameraError;
use crate::geometry::GeometryError;

#[derive(thiserror::Error, Debug)]
pub enum PlanningError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Target identifier {0} appears more than once")]
    DuplicateTarget(String),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Non-fatal condition raised during a planning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanningWarning {
    /// Detections dropped because the other view had no partner for them.
    UnmatchedCorrespondence {
        first_view: usize,
        second_view: usize,
    },
    /// Projected battery fell below zero; the trajectory is still complete.
    BatteryExhaustion {
        /// Index of the first waypoint with negative battery.
        first_waypoint: usize,
        final_battery: f64,
    },
}

impl std::fmt::Display for PlanningWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanningWarning::UnmatchedCorrespondence {
                first_view,
                second_view,
            } => write!(
                f,
                "{first_view} detection(s) in the first view and {second_view} in the second view had no match"
            ),
            PlanningWarning::BatteryExhaustion {
                first_waypoint,
                final_battery,
            } => write!(
                f,
                "battery is exhausted at waypoint {first_waypoint} and ends at {final_battery:.2}%"
            ),
        }
    }
}
