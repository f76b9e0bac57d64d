//! Inspection flight planner
//!
//! Reads a mission description (camera intrinsics, the two camera poses and the
//! detector boxes of both images), plans the inspection path and writes it out.
//!
//! Usage:
//! ```bash
//! cargo run --release -- \
//!   --mission samples/mission.yaml \
//!   --config samples/planning.yaml \
//!   --output output
//! ```

use clap::Parser;
use inspection_planner::camera::{CameraPose, Intrinsics};
use inspection_planner::detection::{
    detections_from_boxes, match_by_id, match_by_proximity, BoundingBox,
};
use inspection_planner::planning::{MissionPlanner, PlanningConfig};
use inspection_planner::util;
use log::info;
use nalgebra::{Matrix3, Point3, Vector3};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Instant;

/// Inspection path planning tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the mission description YAML file
    #[arg(short = 'm', long)]
    mission: PathBuf,

    /// Camera YAML file (`cam0.intrinsics`), overrides intrinsics in the mission file
    #[arg(short = 'c', long)]
    camera: Option<PathBuf>,

    /// Planning configuration YAML file, overrides `config` in the mission file
    #[arg(short = 'p', long)]
    config: Option<PathBuf>,

    /// Output directory for plan.json and trajectory.csv
    #[arg(short = 'o', long, default_value = "output")]
    output: PathBuf,

    /// Pair detections by pixel proximity within this radius instead of by identifier
    #[arg(short = 'r', long)]
    match_radius: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PoseInput {
    #[serde(default = "identity_rows")]
    rotation: [[f64; 3]; 3],
    #[serde(default)]
    translation: [f64; 3],
}

fn identity_rows() -> [[f64; 3]; 3] {
    [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]
}

impl PoseInput {
    fn to_pose(&self) -> Result<CameraPose, inspection_planner::CameraError> {
        let r = &self.rotation;
        let rotation = Matrix3::new(
            r[0][0], r[0][1], r[0][2], //
            r[1][0], r[1][1], r[1][2], //
            r[2][0], r[2][1], r[2][2],
        );
        CameraPose::new(rotation, Vector3::from(self.translation))
    }
}

#[derive(Debug, Deserialize)]
struct MissionInput {
    #[serde(default)]
    intrinsics: Option<Intrinsics>,
    first_pose: PoseInput,
    second_pose: PoseInput,
    first_view: Vec<BoundingBox>,
    second_view: Vec<BoundingBox>,
    #[serde(default)]
    start: Option<[f64; 3]>,
    #[serde(default)]
    min_confidence: f64,
    #[serde(default)]
    config: Option<PlanningConfig>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let cli = Cli::parse();

    println!("🛩️  INSPECTION PATH PLANNER");
    println!("==========================");
    println!("Mission file: {:?}", cli.mission);
    info!("Loading mission from {:?}", cli.mission);

    let contents = std::fs::read_to_string(&cli.mission)?;
    let mission: MissionInput = serde_yaml::from_str(&contents)?;

    let intrinsics = match (&cli.camera, mission.intrinsics) {
        (Some(path), _) => Intrinsics::load_from_yaml(&path.to_string_lossy())?,
        (None, Some(intrinsics)) => Intrinsics::new(
            intrinsics.fx,
            intrinsics.fy,
            intrinsics.cx,
            intrinsics.cy,
        )?,
        (None, None) => {
            return Err("no intrinsics: pass --camera or set `intrinsics` in the mission file".into())
        }
    };

    let config = match (&cli.config, mission.config) {
        (Some(path), _) => PlanningConfig::load_from_yaml(&path.to_string_lossy())?,
        (None, Some(config)) => config,
        (None, None) => PlanningConfig::default(),
    };
    info!("Planning configuration: {:?}", config);

    let pose1 = mission.first_pose.to_pose()?;
    let pose2 = mission.second_pose.to_pose()?;
    let first = detections_from_boxes(&mission.first_view, mission.min_confidence);
    let second = detections_from_boxes(&mission.second_view, mission.min_confidence);
    let start = mission
        .start
        .map(Point3::from)
        .unwrap_or_else(|| Point3::new(0.0, 0.0, 2.0));

    let report = match cli.match_radius {
        Some(radius) => match_by_proximity(&first, &second, radius),
        None => match_by_id(&first, &second),
    };
    println!(
        "Matched {} target(s) across the two views",
        report.correspondences.len()
    );

    let planner = MissionPlanner::new(intrinsics, config)?;
    let timer = Instant::now();
    let plan = planner.plan_from_matches(&pose1, &pose2, &report, &start)?;
    info!(
        "Planning finished in {:.2} ms",
        timer.elapsed().as_secs_f64() * 1000.0
    );

    util::display_plan_summary(&plan);

    util::ensure_output_dir(&cli.output)?;
    let json_path = cli.output.join("plan.json");
    let csv_path = cli.output.join("trajectory.csv");
    util::export_plan_json(&plan, &json_path)?;
    util::export_trajectory_csv(&plan.trajectory, &csv_path)?;
    println!("\n💾 Plan written to {:?} and {:?}", json_path, csv_path);

    Ok(())
}
