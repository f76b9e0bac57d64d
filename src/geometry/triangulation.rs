//! Two-view linear triangulation.
//!
//! Each view contributes two rows to a 4×4 homogeneous system built from its
//! projection matrix `P = K [R | t]`:
//!
//! ```text
//! u * P₃ - P₁
//! v * P₃ - P₂
//! ```
//!
//! The point is the right singular vector of the smallest singular value,
//! dehomogenized by its fourth coordinate. Pairs whose viewing rays are
//! nearly parallel, and solutions that land behind either camera, are
//! rejected before they reach the planner.

use crate::camera::{CameraPose, Intrinsics, PinholeCamera};
use crate::detection::Correspondence;
use crate::geometry::{BarcodePoint3D, GeometryError};
use log::debug;
use nalgebra::{Matrix3x4, Matrix4, Point2, Point3, RowVector4, Vector3};

/// Minimum distance between the two camera centers, in world units.
const MIN_BASELINE: f64 = 1e-9;
/// Minimum angle between the two viewing rays, in radians (about 0.06°).
const MIN_PARALLAX: f64 = 1e-3;
/// Smallest camera-frame depth accepted for a triangulated point.
const MIN_DEPTH: f64 = 1.5e-8;
/// Smallest acceptable |w| of the unit-norm homogeneous solution.
const MIN_HOMOGENEOUS_SCALE: f64 = 1e-12;

/// Direct linear transform triangulator bound to one set of intrinsics.
///
/// The intrinsics are captured at construction and never change afterwards,
/// so a single instance can be shared across threads for independent pairs.
#[derive(Debug, Clone)]
pub struct Triangulator {
    intrinsics: Intrinsics,
}

impl Triangulator {
    pub fn new(intrinsics: Intrinsics) -> Self {
        Triangulator { intrinsics }
    }

    pub fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    /// Reconstructs the world point observed at `pixel1` in `pose1` and `pixel2` in `pose2`.
    ///
    /// # Errors
    ///
    /// [`GeometryError::DegenerateGeometry`] when the camera centers coincide,
    /// when the viewing rays subtend less than about 0.06° (the target is
    /// colinear with the baseline or too far away for the baseline), when the
    /// solution lies at infinity, or when it has non-positive depth in either
    /// view.
    pub fn triangulate_point(
        &self,
        pose1: &CameraPose,
        pose2: &CameraPose,
        pixel1: &Point2<f64>,
        pixel2: &Point2<f64>,
    ) -> Result<Point3<f64>, GeometryError> {
        let baseline = (pose1.center() - pose2.center()).norm();
        if baseline < MIN_BASELINE {
            return Err(GeometryError::DegenerateGeometry(format!(
                "camera centers coincide (baseline {baseline:.3e})"
            )));
        }

        let ray1 = self.viewing_ray(pose1, pixel1);
        let ray2 = self.viewing_ray(pose2, pixel2);
        let parallax = ray1.cross(&ray2).norm().atan2(ray1.dot(&ray2));
        if parallax < MIN_PARALLAX {
            return Err(GeometryError::DegenerateGeometry(format!(
                "viewing rays are nearly parallel (parallax {parallax:.3e} rad)"
            )));
        }

        let p1 = pose1.projection_matrix(&self.intrinsics);
        let p2 = pose2.projection_matrix(&self.intrinsics);

        let a = Matrix4::from_rows(&[
            dlt_row(&p1, pixel1.x, 0),
            dlt_row(&p1, pixel1.y, 1),
            dlt_row(&p2, pixel2.x, 0),
            dlt_row(&p2, pixel2.y, 1),
        ]);

        let svd = a.svd(false, true);
        let v_t = svd.v_t.ok_or_else(|| {
            GeometryError::DegenerateGeometry("SVD did not produce right singular vectors".into())
        })?;

        let smallest = svd.singular_values.imin();
        let xh = v_t.row(smallest);
        let w = xh[3];
        if w.abs() < MIN_HOMOGENEOUS_SCALE || !w.is_finite() {
            return Err(GeometryError::DegenerateGeometry(format!(
                "homogeneous scale {w:.3e} is too small to dehomogenize"
            )));
        }

        let point = Point3::new(xh[0] / w, xh[1] / w, xh[2] / w);
        for (view, pose) in [("first", pose1), ("second", pose2)] {
            let depth = pose.transform_point(&point).z;
            if depth < MIN_DEPTH {
                return Err(GeometryError::DegenerateGeometry(format!(
                    "point lies behind the {view} camera (depth {depth:.3})"
                )));
            }
        }

        Ok(point)
    }

    /// World-frame unit direction of the ray through `pixel`.
    fn viewing_ray(&self, pose: &CameraPose, pixel: &Point2<f64>) -> Vector3<f64> {
        let normalized = Vector3::new(
            (pixel.x - self.intrinsics.cx) / self.intrinsics.fx,
            (pixel.y - self.intrinsics.cy) / self.intrinsics.fy,
            1.0,
        );
        (pose.rotation().transpose() * normalized).normalize()
    }

    /// Triangulates one correspondence and records its mean reprojection error.
    pub fn triangulate(
        &self,
        pose1: &CameraPose,
        pose2: &CameraPose,
        correspondence: &Correspondence,
    ) -> Result<BarcodePoint3D, GeometryError> {
        let position = self.triangulate_point(
            pose1,
            pose2,
            &correspondence.first,
            &correspondence.second,
        )?;

        let residual = |pose: &CameraPose, observed: &Point2<f64>| {
            PinholeCamera::new(&self.intrinsics, pose.clone())
                .reprojection_error(&position, observed)
                .map_err(|e| GeometryError::DegenerateGeometry(e.to_string()))
        };
        let reprojection_error = 0.5
            * (residual(pose1, &correspondence.first)?
                + residual(pose2, &correspondence.second)?);

        debug!(
            "Triangulated {} at ({:.3}, {:.3}, {:.3}), reprojection error {:.3} px",
            correspondence.target_id, position.x, position.y, position.z, reprojection_error
        );

        Ok(BarcodePoint3D {
            target_id: correspondence.target_id.clone(),
            position,
            reprojection_error: Some(reprojection_error),
        })
    }

    /// Triangulates every correspondence of a view pair independently.
    ///
    /// The first degenerate correspondence aborts the batch.
    pub fn triangulate_all(
        &self,
        pose1: &CameraPose,
        pose2: &CameraPose,
        correspondences: &[Correspondence],
    ) -> Result<Vec<BarcodePoint3D>, GeometryError> {
        correspondences
            .iter()
            .map(|c| {
                self.triangulate(pose1, pose2, c).map_err(|e| match e {
                    GeometryError::DegenerateGeometry(msg) => GeometryError::DegenerateGeometry(
                        format!("target {}: {msg}", c.target_id),
                    ),
                    other => other,
                })
            })
            .collect()
    }
}

fn dlt_row(p: &Matrix3x4<f64>, coord: f64, axis: usize) -> RowVector4<f64> {
    p.row(2) * coord - p.row(axis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix3, Rotation3, Vector3};

    fn drone_intrinsics() -> Intrinsics {
        Intrinsics::new(2804.051, 2804.051, 2010.41, 1512.734).unwrap()
    }

    fn project(intrinsics: &Intrinsics, pose: &CameraPose, point: &Point3<f64>) -> Point2<f64> {
        PinholeCamera::new(intrinsics, pose.clone())
            .project(point)
            .unwrap()
    }

    #[test]
    fn test_triangulate_round_trip() {
        let intrinsics = drone_intrinsics();
        let triangulator = Triangulator::new(intrinsics.clone());

        let pose1 = CameraPose::identity();
        let pose2 =
            CameraPose::from_center(Matrix3::identity(), &Point3::new(1.0, 0.0, 0.0)).unwrap();

        let truth = [
            Point3::new(0.3, -0.2, 5.0),
            Point3::new(-1.0, 0.5, 8.0),
            Point3::new(2.0, 1.0, 12.0),
        ];
        for point in &truth {
            let x1 = project(&intrinsics, &pose1, point);
            let x2 = project(&intrinsics, &pose2, point);
            let estimate = triangulator
                .triangulate_point(&pose1, &pose2, &x1, &x2)
                .unwrap();
            let relative = (estimate - point).norm() / point.coords.norm();
            assert!(relative < 1e-6, "relative error {relative} for {point}");
        }
    }

    #[test]
    fn test_triangulate_rotated_cameras() {
        let intrinsics = drone_intrinsics();
        let triangulator = Triangulator::new(intrinsics.clone());

        let truth = Point3::new(0.5, 0.25, 6.0);
        let pose1 = CameraPose::from_center(
            Rotation3::from_euler_angles(0.0, 0.1, 0.0).into_inner(),
            &Point3::new(-1.0, 0.0, 0.0),
        )
        .unwrap();
        let pose2 = CameraPose::from_center(
            Rotation3::from_euler_angles(0.05, -0.15, 0.02).into_inner(),
            &Point3::new(1.5, 0.3, -0.5),
        )
        .unwrap();

        let correspondence = Correspondence {
            target_id: "palette_1".to_string(),
            first: project(&intrinsics, &pose1, &truth),
            second: project(&intrinsics, &pose2, &truth),
        };

        let point = triangulator
            .triangulate(&pose1, &pose2, &correspondence)
            .unwrap();
        assert_eq!(point.target_id, "palette_1");
        assert_relative_eq!(point.position, truth, epsilon = 1e-6);
        assert!(point.reprojection_error.unwrap() < 1e-4);
    }

    #[test]
    fn test_triangulate_coincident_centers() {
        let triangulator = Triangulator::new(drone_intrinsics());
        let pose = CameraPose::identity();

        let result = triangulator.triangulate_point(
            &pose,
            &pose,
            &Point2::new(2000.0, 1500.0),
            &Point2::new(2020.0, 1520.0),
        );
        assert!(matches!(result, Err(GeometryError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_triangulate_colinear_target() {
        let intrinsics = drone_intrinsics();
        let triangulator = Triangulator::new(intrinsics.clone());

        // Second camera sits one meter behind the first on the optical axis,
        // so the target at (0, 0, 5) is colinear with the baseline.
        let pose1 = CameraPose::identity();
        let pose2 = CameraPose::new(Matrix3::identity(), Vector3::new(0.0, 0.0, 1.0)).unwrap();
        let target = Point3::new(0.0, 0.0, 5.0);

        let result = triangulator.triangulate_point(
            &pose1,
            &pose2,
            &project(&intrinsics, &pose1, &target),
            &project(&intrinsics, &pose2, &target),
        );
        assert!(matches!(result, Err(GeometryError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_triangulate_noisy_colinear_target() {
        let intrinsics = drone_intrinsics();
        let triangulator = Triangulator::new(intrinsics.clone());

        // Second camera one meter behind the first on the optical axis, with
        // half a pixel of detector noise in the second view.
        let pose1 = CameraPose::identity();
        let pose2 =
            CameraPose::from_center(Matrix3::identity(), &Point3::new(0.0, 0.0, -1.0)).unwrap();
        let principal = Point2::new(intrinsics.cx, intrinsics.cy);

        let result = triangulator.triangulate_point(
            &pose1,
            &pose2,
            &principal,
            &Point2::new(intrinsics.cx + 0.5, intrinsics.cy),
        );
        assert!(matches!(result, Err(GeometryError::DegenerateGeometry(_))));
    }

    #[test]
    fn test_triangulate_point_behind_cameras() {
        let triangulator = Triangulator::new(drone_intrinsics());

        // Side-by-side cameras with negative disparity: the rays only meet
        // behind both image planes.
        let pose1 = CameraPose::identity();
        let pose2 =
            CameraPose::from_center(Matrix3::identity(), &Point3::new(1.0, 0.0, 0.0)).unwrap();
        let correspondence = Correspondence {
            target_id: "palette_2".to_string(),
            first: Point2::new(1700.0, 1500.0),
            second: Point2::new(2050.0, 1500.0),
        };

        match triangulator.triangulate(&pose1, &pose2, &correspondence) {
            Err(GeometryError::DegenerateGeometry(msg)) => assert!(msg.contains("behind")),
            other => panic!("expected a point behind the cameras, got {other:?}"),
        }
    }

    #[test]
    fn test_triangulate_all_names_failing_target() {
        let triangulator = Triangulator::new(drone_intrinsics());
        let pose = CameraPose::identity();
        let correspondences = vec![Correspondence {
            target_id: "palette_7".to_string(),
            first: Point2::new(2000.0, 1500.0),
            second: Point2::new(2000.0, 1500.0),
        }];

        match triangulator.triangulate_all(&pose, &pose, &correspondences) {
            Err(GeometryError::DegenerateGeometry(msg)) => assert!(msg.contains("palette_7")),
            other => panic!("expected degenerate geometry, got {other:?}"),
        }
    }
}
