//! Expansion of an ordered tour into a timed trajectory.
//!
//! Every leg from the current position to the next viewpoint is flown in a
//! straight line. Legs longer than the interpolation spacing are split into
//! equal segments with one `intermediate` waypoint per interior split point.
//! Arriving at a viewpoint adds the final segment plus the scan dwell and
//! emits a `target` waypoint. Time and battery are accumulated in a single
//! left-to-right pass.

use crate::geometry::Orientation;
use crate::planning::{PlanningConfig, PlanningError, PlanningWarning, Viewpoint};
use log::{debug, info, warn};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    Start,
    Intermediate,
    Target,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub position: Point3<f64>,
    pub orientation: Orientation,
    pub kind: WaypointKind,
    /// Elapsed mission time in seconds.
    pub time: f64,
    /// Remaining battery in percent; negative when the mission overdraws it.
    pub battery: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barcode_position: Option<Point3<f64>>,
}

/// Ordered waypoints of one mission, starting with the `start` waypoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Trajectory {
    pub waypoints: Vec<Waypoint>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// The `target` waypoints in visiting order.
    pub fn targets(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints
            .iter()
            .filter(|w| w.kind == WaypointKind::Target)
    }

    pub fn total_time(&self) -> f64 {
        self.waypoints.last().map_or(0.0, |w| w.time)
    }

    pub fn final_battery(&self) -> Option<f64> {
        self.waypoints.last().map(|w| w.battery)
    }

    /// Length of the polyline through all waypoints.
    pub fn total_distance(&self) -> f64 {
        self.waypoints
            .windows(2)
            .map(|pair| (pair[1].position - pair[0].position).norm())
            .sum()
    }

    /// Index of the first waypoint whose remaining battery is negative.
    pub fn first_exhausted_waypoint(&self) -> Option<usize> {
        self.waypoints.iter().position(|w| w.battery < 0.0)
    }

    /// Battery warning for this trajectory, if the mission overdraws the battery.
    pub fn battery_warning(&self) -> Option<PlanningWarning> {
        let first_waypoint = self.first_exhausted_waypoint()?;
        Some(PlanningWarning::BatteryExhaustion {
            first_waypoint,
            final_battery: self.final_battery().unwrap_or_default(),
        })
    }
}

/// Expands `ordered` viewpoints, flown from `start`, into a [`Trajectory`].
///
/// The start waypoint has neutral attitude, intermediate waypoints face along
/// their leg and target waypoints face the barcode they scan. A leg of length
/// `d` greater than `interpolation_spacing` gets `n = floor(d / spacing)`
/// intermediate waypoints at fractions `k / (n + 1)`, so the leg is cut into
/// `n + 1` equal segments, each shorter than the spacing. Waypoints are not
/// placed at exact multiples of the spacing: a 6 m leg at 2 m spacing gets
/// three intermediates 1.5 m apart, not two at 2 m and 4 m.
///
/// # Errors
///
/// [`PlanningError::InvalidConfiguration`] if `config` fails validation.
/// Battery exhaustion is not an error; see [`Trajectory::battery_warning`].
pub fn expand_trajectory(
    start: &Point3<f64>,
    ordered: &[Viewpoint],
    config: &PlanningConfig,
) -> Result<Trajectory, PlanningError> {
    config.validate()?;

    let mut waypoints = Vec::with_capacity(1 + ordered.len());
    let mut current = *start;
    let mut time = 0.0;
    let mut battery = config.battery_capacity;

    waypoints.push(Waypoint {
        position: current,
        orientation: Orientation::default(),
        kind: WaypointKind::Start,
        time,
        battery,
        target_id: None,
        barcode_position: None,
    });

    for viewpoint in ordered {
        let direction = viewpoint.position - current;
        let distance = direction.norm();
        let heading = Orientation::from_direction(&direction);

        let intermediates = if distance > config.interpolation_spacing {
            (distance / config.interpolation_spacing).floor() as usize
        } else {
            0
        };
        let segment = distance / (intermediates + 1) as f64;
        let segment_time = segment / config.max_velocity;
        let segment_drain = segment * config.battery_drain_per_meter;

        for k in 1..=intermediates {
            let ratio = k as f64 / (intermediates + 1) as f64;
            time += segment_time;
            battery -= segment_drain;
            waypoints.push(Waypoint {
                position: current + direction * ratio,
                orientation: heading,
                kind: WaypointKind::Intermediate,
                time,
                battery,
                target_id: None,
                barcode_position: None,
            });
        }

        time += segment_time + config.scan_dwell_seconds;
        battery -= segment_drain + config.scan_dwell_seconds * config.battery_drain_per_second_hover;

        debug!(
            "Leg to {}: {:.2} m, {} intermediate waypoint(s), arrival at {:.2} s with {:.2}% battery",
            viewpoint.target_id, distance, intermediates, time, battery
        );

        waypoints.push(Waypoint {
            position: viewpoint.position,
            orientation: viewpoint.facing_orientation(),
            kind: WaypointKind::Target,
            time,
            battery,
            target_id: Some(viewpoint.target_id.clone()),
            barcode_position: Some(viewpoint.barcode_position),
        });

        current = viewpoint.position;
    }

    let trajectory = Trajectory { waypoints };
    info!(
        "Trajectory with {} waypoints: {:.2} m, {:.2} s, {:.2}% battery remaining",
        trajectory.len(),
        trajectory.total_distance(),
        trajectory.total_time(),
        battery
    );
    if let Some(warning) = trajectory.battery_warning() {
        warn!("{}", warning);
    }
    Ok(trajectory)
}
