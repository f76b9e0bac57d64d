//! Implements a posed pinhole camera.
//!
//! [`PinholeCamera`] pairs the process-wide [`Intrinsics`] with one
//! [`CameraPose`] and projects world points into pixel coordinates. It is the
//! forward model behind the triangulation residuals and the synthetic views
//! used in tests.

use crate::camera::{CameraError, CameraPose, Intrinsics};
use nalgebra::{Point2, Point3};

/// A pinhole camera placed in the world frame.
///
/// # Examples
///
/// ```rust
/// use inspection_planner::camera::{CameraPose, Intrinsics, PinholeCamera};
/// use nalgebra::Point3;
///
/// let intrinsics = Intrinsics::new(500.0, 500.0, 320.0, 240.0).unwrap();
/// let camera = PinholeCamera::new(&intrinsics, CameraPose::identity());
///
/// let pixel = camera.project(&Point3::new(0.1, 0.2, 1.0)).unwrap();
/// // u = 500 * 0.1 / 1.0 + 320 = 370
/// // v = 500 * 0.2 / 1.0 + 240 = 340
/// assert!((pixel.x - 370.0).abs() < 1e-9);
/// assert!((pixel.y - 340.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct PinholeCamera<'a> {
    intrinsics: &'a Intrinsics,
    pose: CameraPose,
}

impl<'a> PinholeCamera<'a> {
    pub fn new(intrinsics: &'a Intrinsics, pose: CameraPose) -> Self {
        PinholeCamera { intrinsics, pose }
    }

    /// Projects a world point to pixel coordinates.
    ///
    /// Applies `u = fx * X / Z + cx`, `v = fy * Y / Z + cy` to the point
    /// expressed in the camera frame. Unlike a bounded sensor model, pixels
    /// outside the image are returned as-is; detections are not clipped here.
    ///
    /// # Errors
    ///
    /// * [`CameraError::PointBehindCamera`]: the camera-frame depth is not positive.
    pub fn project(&self, point: &Point3<f64>) -> Result<Point2<f64>, CameraError> {
        let p = self.pose.transform_point(point);
        if p.z < f64::EPSILON.sqrt() {
            return Err(CameraError::PointBehindCamera);
        }
        let u = self.intrinsics.fx * p.x / p.z + self.intrinsics.cx;
        let v = self.intrinsics.fy * p.y / p.z + self.intrinsics.cy;
        Ok(Point2::new(u, v))
    }

    /// Euclidean pixel distance between the projection of `point` and `observed`.
    pub fn reprojection_error(
        &self,
        point: &Point3<f64>,
        observed: &Point2<f64>,
    ) -> Result<f64, CameraError> {
        let projected = self.project(point)?;
        Ok((projected - *observed).norm())
    }
}
