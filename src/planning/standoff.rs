//! Standoff projection of targets to observation viewpoints.

use crate::geometry::{BarcodePoint3D, Orientation};
use crate::planning::{NormalSign, PlanningError};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Where the vehicle hovers to scan one target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewpoint {
    pub target_id: String,
    /// Hover position, `barcode + sign * normal * standoff_distance`.
    pub position: Point3<f64>,
    /// The target the viewpoint looks at.
    pub barcode_position: Point3<f64>,
}

impl Viewpoint {
    /// Attitude that faces the barcode from the hover position.
    pub fn facing_orientation(&self) -> Orientation {
        Orientation::from_direction(&(self.barcode_position - self.position))
    }
}

/// Offsets `point` along `normal` by `standoff_distance`.
///
/// `normal` is renormalized, so any non-zero vector is accepted.
///
/// # Errors
///
/// [`PlanningError::InvalidConfiguration`] when the distance is not a positive
/// finite number or the normal has zero length.
pub fn project_standoff(
    point: &BarcodePoint3D,
    normal: &Vector3<f64>,
    sign: NormalSign,
    standoff_distance: f64,
) -> Result<Viewpoint, PlanningError> {
    if !(standoff_distance.is_finite() && standoff_distance > 0.0) {
        return Err(PlanningError::InvalidConfiguration(format!(
            "standoff_distance must be positive, got {standoff_distance}"
        )));
    }
    let unit = normal.try_normalize(f64::EPSILON).ok_or_else(|| {
        PlanningError::InvalidConfiguration("plane normal has zero length".to_string())
    })?;

    Ok(Viewpoint {
        target_id: point.target_id.clone(),
        position: point.position + unit * (sign.factor() * standoff_distance),
        barcode_position: point.position,
    })
}

/// Projects every target with the same normal and distance.
pub fn project_all(
    points: &[BarcodePoint3D],
    normal: &Vector3<f64>,
    sign: NormalSign,
    standoff_distance: f64,
) -> Result<Vec<Viewpoint>, PlanningError> {
    points
        .iter()
        .map(|p| project_standoff(p, normal, sign, standoff_distance))
        .collect()
}
