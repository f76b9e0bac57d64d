//! Geometric reconstruction of inspection targets.
//!
//! This module turns matched pixel observations into [`BarcodePoint3D`]s
//! ([`triangulation`]), fits the [`ObservationPlane`] they lie on ([`plane`])
//! and provides the direction-to-attitude conversion shared by the planner.

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

pub mod plane;
pub mod triangulation;

pub use plane::{fit_plane, ObservationPlane};
pub use triangulation::Triangulator;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
    #[error("At least 3 points are required to fit a plane, found {found}")]
    InsufficientPoints { found: usize },
}

/// A reconstructed target position in the local world frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarcodePoint3D {
    pub target_id: String,
    pub position: Point3<f64>,
    /// Mean pixel reprojection error over both views, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprojection_error: Option<f64>,
}

impl BarcodePoint3D {
    pub fn new(target_id: impl Into<String>, position: Point3<f64>) -> Self {
        BarcodePoint3D {
            target_id: target_id.into(),
            position,
            reprojection_error: None,
        }
    }
}

/// Vehicle attitude in radians. Roll is never commanded by the planner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Orientation {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl Orientation {
    /// Attitude that points the vehicle's forward axis along `direction`.
    ///
    /// `yaw = atan2(dy, dx)`, `pitch = atan2(-dz, sqrt(dx² + dy²))`, `roll = 0`.
    /// A (near) zero vector yields the neutral attitude.
    ///
    /// ```rust
    /// use inspection_planner::geometry::Orientation;
    /// use nalgebra::Vector3;
    ///
    /// let down = Orientation::from_direction(&Vector3::new(0.0, 0.0, -1.0));
    /// assert!((down.pitch - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    /// ```
    pub fn from_direction(direction: &Vector3<f64>) -> Self {
        let norm = direction.norm();
        if norm <= f64::EPSILON {
            return Orientation::default();
        }
        let d = direction / norm;
        Orientation {
            roll: 0.0,
            pitch: (-d.z).atan2(d.x.hypot(d.y)),
            yaw: d.y.atan2(d.x),
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.roll, self.pitch, self.yaw]
    }
}
