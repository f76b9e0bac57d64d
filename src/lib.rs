//! Inspection Planner Library
//!
//! Plans an offline inspection flight over barcode targets seen in two
//! calibrated images. The pipeline is:
//! - Correspondence of detector boxes across the two views ([`detection`])
//! - Linear two-view triangulation of each target ([`geometry::Triangulator`])
//! - Best-fit observation plane and standoff viewpoints ([`geometry::fit_plane`],
//!   [`planning::standoff`])
//! - Nearest-neighbor + 2-opt visiting order ([`planning::TourOptimizer`])
//! - Timed, battery-annotated waypoint expansion ([`planning::expand_trajectory`])
//!
//! All computation is synchronous and performs no I/O; exporting and display
//! helpers used by the command-line tool live in [`util`].

pub mod camera;
pub mod detection;
pub mod geometry;
pub mod planning;
pub mod util;

// Re-export commonly used types
pub use camera::{CameraError, CameraPose, Intrinsics, PinholeCamera};

pub use detection::{BoundingBox, Correspondence, Detection2D, MatchReport};

pub use geometry::{BarcodePoint3D, GeometryError, ObservationPlane, Orientation, Triangulator};

pub use planning::{
    MissionPlan, MissionPlanner, NormalSign, PlanningConfig, PlanningError, PlanningWarning,
    TourOptimizer, Trajectory, Viewpoint, Waypoint, WaypointKind,
};
