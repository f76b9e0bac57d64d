//! Best-fit plane through the reconstructed targets.

use crate::geometry::{BarcodePoint3D, GeometryError};
use nalgebra::{DMatrix, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Least-squares plane through a set of targets.
///
/// The sign of `normal` is whatever the decomposition produced; callers that
/// care which side of the plane they are on must orient it explicitly with
/// [`ObservationPlane::oriented_toward`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPlane {
    pub centroid: Point3<f64>,
    pub normal: Vector3<f64>,
}

impl ObservationPlane {
    /// Signed distance of `point` from the plane along `normal`.
    pub fn signed_distance(&self, point: &Point3<f64>) -> f64 {
        self.normal.dot(&(*point - self.centroid))
    }

    /// Returns the plane with its normal pointing to the side containing `reference`.
    ///
    /// A reference lying on the plane leaves the normal unchanged.
    pub fn oriented_toward(&self, reference: &Point3<f64>) -> ObservationPlane {
        let normal = if self.signed_distance(reference) < 0.0 {
            -self.normal
        } else {
            self.normal
        };
        ObservationPlane {
            centroid: self.centroid,
            normal,
        }
    }
}

/// Fits a plane to the targets.
///
/// The centroid is the mean position. The normal is the right singular vector
/// of the centered N×3 point matrix with the smallest singular value, i.e. the
/// direction of least variance.
///
/// # Errors
///
/// [`GeometryError::InsufficientPoints`] for fewer than three points, and
/// [`GeometryError::DegenerateGeometry`] when every point lies on one line
/// so that no unique plane exists.
pub fn fit_plane(points: &[BarcodePoint3D]) -> Result<ObservationPlane, GeometryError> {
    if points.len() < 3 {
        return Err(GeometryError::InsufficientPoints {
            found: points.len(),
        });
    }

    let n = points.len() as f64;
    let centroid = Point3::from(
        points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.position.coords)
            / n,
    );

    let centered = DMatrix::from_fn(points.len(), 3, |r, c| {
        points[r].position[c] - centroid[c]
    });

    let svd = centered.svd(false, true);
    let v_t = svd.v_t.ok_or_else(|| {
        GeometryError::DegenerateGeometry("SVD did not produce right singular vectors".into())
    })?;

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&i, &j| svd.singular_values[i].total_cmp(&svd.singular_values[j]));
    let largest = svd.singular_values[order[order.len() - 1]];
    let middle = svd.singular_values[order[1]];
    if !(largest > 0.0) || middle <= 1e-12 * largest {
        return Err(GeometryError::DegenerateGeometry(
            "points are coincident or colinear, the plane is not unique".to_string(),
        ));
    }

    let row = v_t.row(order[0]);
    let normal = Vector3::new(row[0], row[1], row[2]).normalize();

    Ok(ObservationPlane { centroid, normal })
}
