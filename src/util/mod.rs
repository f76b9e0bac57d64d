use crate::planning::{MissionPlan, Trajectory, WaypointKind};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Ensure the output directory exists
pub fn ensure_output_dir(output_dir: &Path) -> Result<(), UtilError> {
    if !output_dir.exists() {
        fs::create_dir_all(output_dir).map_err(|e| {
            UtilError::InvalidParams(format!("Failed to create output directory: {e}"))
        })?;
    }
    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum UtilError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("IO Error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("JSON Error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("CSV Error: {0}")]
    CsvError(#[from] csv::Error),
}

/// One flattened trajectory row, as written to CSV.
#[derive(Debug, Serialize)]
struct WaypointRow<'a> {
    index: usize,
    kind: WaypointKind,
    x: f64,
    y: f64,
    z: f64,
    roll: f64,
    pitch: f64,
    yaw: f64,
    time: f64,
    battery: f64,
    target_id: &'a str,
    barcode_x: Option<f64>,
    barcode_y: Option<f64>,
    barcode_z: Option<f64>,
}

/// Writes the whole plan (points, plane, viewpoints, trajectory, warnings) as pretty JSON.
pub fn export_plan_json(plan: &MissionPlan, path: &Path) -> Result<(), UtilError> {
    let json = serde_json::to_string_pretty(plan)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

/// Writes one CSV row per waypoint.
pub fn export_trajectory_csv(trajectory: &Trajectory, path: &Path) -> Result<(), UtilError> {
    let mut writer = csv::Writer::from_path(path)?;
    for (index, wp) in trajectory.waypoints.iter().enumerate() {
        writer.serialize(WaypointRow {
            index,
            kind: wp.kind,
            x: wp.position.x,
            y: wp.position.y,
            z: wp.position.z,
            roll: wp.orientation.roll,
            pitch: wp.orientation.pitch,
            yaw: wp.orientation.yaw,
            time: wp.time,
            battery: wp.battery,
            target_id: wp.target_id.as_deref().unwrap_or(""),
            barcode_x: wp.barcode_position.map(|p| p.x),
            barcode_y: wp.barcode_position.map(|p| p.y),
            barcode_z: wp.barcode_position.map(|p| p.z),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Prints a table of the target waypoints and the mission totals.
pub fn display_plan_summary(plan: &MissionPlan) {
    let trajectory = &plan.trajectory;

    println!("\n📋 MISSION SUMMARY");
    println!("==================");
    println!("Targets triangulated : {}", plan.points.len());
    if let Some(plane) = &plan.plane {
        println!(
            "Plane normal         : ({:.3}, {:.3}, {:.3})",
            plane.normal.x, plane.normal.y, plane.normal.z
        );
    }
    println!("Waypoints            : {}", trajectory.len());
    println!("Path length          : {:.2} m", trajectory.total_distance());
    println!("Mission time         : {:.1} s", trajectory.total_time());
    println!(
        "Battery remaining    : {:.1}%",
        trajectory.final_battery().unwrap_or_default()
    );

    println!(
        "\n{:<16} | {:>24} | {:>8} | {:>8} | {:>8}",
        "Target", "Position (m)", "Yaw (°)", "Time (s)", "Battery"
    );
    println!("{:-<16}-+-{:-<24}-+-{:-<8}-+-{:-<8}-+-{:-<8}", "", "", "", "", "");
    for wp in trajectory.targets() {
        println!(
            "{:<16} | {:>7.2}, {:>7.2}, {:>7.2} | {:>8.1} | {:>8.1} | {:>7.1}%",
            wp.target_id.as_deref().unwrap_or("?"),
            wp.position.x,
            wp.position.y,
            wp.position.z,
            wp.orientation.yaw.to_degrees(),
            wp.time,
            wp.battery
        );
    }

    if plan.warnings.is_empty() {
        println!("\n✅ No planning warnings");
    } else {
        println!("\n⚠️  Planning warnings:");
        for warning in &plan.warnings {
            println!("   - {warning}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Intrinsics;
    use crate::geometry::BarcodePoint3D;
    use crate::planning::{MissionPlanner, PlanningConfig};
    use nalgebra::{Point3, Vector3};

    fn sample_plan() -> MissionPlan {
        let intrinsics = Intrinsics::new(500.0, 500.0, 320.0, 240.0).unwrap();
        let planner = MissionPlanner::new(intrinsics, PlanningConfig::default()).unwrap();
        planner
            .plan_from_points(
                vec![
                    BarcodePoint3D::new("a", Point3::new(0.0, 0.0, 5.0)),
                    BarcodePoint3D::new("b", Point3::new(6.0, 0.0, 5.0)),
                ],
                &-Vector3::z(),
                &Point3::origin(),
            )
            .unwrap()
    }

    #[test]
    fn test_export_plan_json_and_csv() {
        let plan = sample_plan();
        let dir = std::env::temp_dir().join(format!("inspection-planner-{}", std::process::id()));
        ensure_output_dir(&dir).unwrap();

        let json_path = dir.join("plan.json");
        export_plan_json(&plan, &json_path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&json_path).unwrap()).unwrap();
        let waypoints = value["trajectory"]["waypoints"].as_array().unwrap();
        assert_eq!(waypoints.len(), plan.trajectory.len());
        assert_eq!(waypoints[0]["kind"], "start");
        assert_eq!(waypoints.last().unwrap()["target_id"], "b");

        let csv_path = dir.join("trajectory.csv");
        export_trajectory_csv(&plan.trajectory, &csv_path).unwrap();
        let mut reader = csv::Reader::from_path(&csv_path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "index");
        assert_eq!(&headers[1], "kind");
        assert_eq!(reader.records().count(), plan.trajectory.len());

        fs::remove_dir_all(&dir).unwrap();
    }
}
