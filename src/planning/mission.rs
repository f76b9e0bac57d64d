//! End-to-end planning run.
//!
//! ```text
//! correspondences ─► Triangulator ─► points ─► fit_plane ─► normal
//!                                                              │
//!              trajectory ◄─ expand ◄─ TourOptimizer ◄─ standoff ◄┘
//! ```

use crate::camera::{CameraPose, Intrinsics};
use crate::detection::{match_by_id, Detection2D, MatchReport};
use crate::geometry::{fit_plane, BarcodePoint3D, ObservationPlane, Triangulator};
use crate::planning::standoff::project_all;
use crate::planning::{
    expand_trajectory, PlanningConfig, PlanningError, PlanningWarning, TourOptimizer, Trajectory,
    Viewpoint,
};
use log::info;
use nalgebra::{Point3, Vector3};
use serde::Serialize;
use std::collections::HashSet;

/// Result of a successful planning run.
#[derive(Debug, Clone, Serialize)]
pub struct MissionPlan {
    pub points: Vec<BarcodePoint3D>,
    /// The fitted plane, oriented toward the observing cameras; absent when
    /// the caller supplied the approach normal directly.
    pub plane: Option<ObservationPlane>,
    /// Viewpoints in visiting order.
    pub viewpoints: Vec<Viewpoint>,
    pub trajectory: Trajectory,
    pub warnings: Vec<PlanningWarning>,
}

/// Runs triangulation, plane estimation and path planning for one mission.
///
/// A planner owns no per-run state; every call builds its own points, plane
/// and trajectory.
#[derive(Debug, Clone)]
pub struct MissionPlanner {
    triangulator: Triangulator,
    config: PlanningConfig,
}

impl MissionPlanner {
    pub fn new(intrinsics: Intrinsics, config: PlanningConfig) -> Result<Self, PlanningError> {
        config.validate()?;
        Ok(MissionPlanner {
            triangulator: Triangulator::new(intrinsics),
            config,
        })
    }

    /// Plans from two detection lists paired by target identifier.
    pub fn plan_from_detections(
        &self,
        pose1: &CameraPose,
        pose2: &CameraPose,
        first: &[Detection2D],
        second: &[Detection2D],
        start: &Point3<f64>,
    ) -> Result<MissionPlan, PlanningError> {
        let report = match_by_id(first, second);
        self.plan_from_matches(pose1, pose2, &report, start)
    }

    /// Plans from an already computed match report.
    ///
    /// Unmatched detections become a warning. The fitted normal is oriented
    /// toward the midpoint of the two camera centers before `normal_sign` is
    /// applied, so `as_fit` places the viewpoints on the side the targets were
    /// photographed from.
    pub fn plan_from_matches(
        &self,
        pose1: &CameraPose,
        pose2: &CameraPose,
        report: &MatchReport,
        start: &Point3<f64>,
    ) -> Result<MissionPlan, PlanningError> {
        let mut warnings = Vec::new();
        if report.has_unmatched() {
            warnings.push(PlanningWarning::UnmatchedCorrespondence {
                first_view: report.unmatched_first,
                second_view: report.unmatched_second,
            });
        }

        let points =
            self.triangulator
                .triangulate_all(pose1, pose2, &report.correspondences)?;
        ensure_unique_targets(&points)?;

        let cameras = Point3::from((pose1.center().coords + pose2.center().coords) / 2.0);
        let plane = fit_plane(&points)?.oriented_toward(&cameras);
        info!(
            "Observation plane through ({:.3}, {:.3}, {:.3}) with normal ({:.3}, {:.3}, {:.3})",
            plane.centroid.x,
            plane.centroid.y,
            plane.centroid.z,
            plane.normal.x,
            plane.normal.y,
            plane.normal.z
        );

        let mut plan = self.plan_from_points(points, &plane.normal, start)?;
        plan.plane = Some(plane);
        warnings.append(&mut plan.warnings);
        plan.warnings = warnings;
        Ok(plan)
    }

    /// Plans from reconstructed points and a known approach normal.
    ///
    /// No plane is fitted, so this also serves missions with fewer than three targets.
    pub fn plan_from_points(
        &self,
        points: Vec<BarcodePoint3D>,
        normal: &Vector3<f64>,
        start: &Point3<f64>,
    ) -> Result<MissionPlan, PlanningError> {
        ensure_unique_targets(&points)?;
        let viewpoints = project_all(
            &points,
            normal,
            self.config.normal_sign,
            self.config.standoff_distance,
        )?;
        let (viewpoints, trajectory) = self.plan_viewpoints(viewpoints, start)?;

        let warnings = trajectory.battery_warning().into_iter().collect();
        Ok(MissionPlan {
            points,
            plane: None,
            viewpoints,
            trajectory,
            warnings,
        })
    }

    /// Orders `viewpoints` and expands them; returns them in visiting order.
    pub fn plan_viewpoints(
        &self,
        viewpoints: Vec<Viewpoint>,
        start: &Point3<f64>,
    ) -> Result<(Vec<Viewpoint>, Trajectory), PlanningError> {
        let order = TourOptimizer::new(self.config.max_2opt_passes).optimize(start, &viewpoints);

        let ordered: Vec<Viewpoint> = order.iter().map(|&idx| viewpoints[idx].clone()).collect();

        let trajectory = expand_trajectory(start, &ordered, &self.config)?;
        Ok((ordered, trajectory))
    }
}

fn ensure_unique_targets(points: &[BarcodePoint3D]) -> Result<(), PlanningError> {
    let mut seen = HashSet::new();
    for point in points {
        if !seen.insert(point.target_id.as_str()) {
            return Err(PlanningError::DuplicateTarget(point.target_id.clone()));
        }
    }
    Ok(())
}
