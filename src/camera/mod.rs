//! Calibrated camera primitives used by the triangulation stage.
//!
//! A camera is split into its intrinsic calibration ([`Intrinsics`]), which is
//! fixed for the whole process, and a per-image extrinsic [`CameraPose`]. The
//! two are combined into a 3×4 projection matrix `K [R | t]` when a view is
//! triangulated or projected.

use nalgebra::{Matrix3, Matrix3x4, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use yaml_rust::YamlLoader;

pub mod pinhole;

pub use pinhole::PinholeCamera;

/// Pinhole intrinsic parameters (focal lengths and principal point, in pixels).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum CameraError {
    #[error("Focal length must be positive")]
    FocalLengthMustBePositive,
    #[error("Principal point must be finite")]
    PrincipalPointMustBeFinite,
    #[error("Invalid camera pose: {0}")]
    InvalidPose(String),
    #[error("z is close to zero or negative, point is behind the camera")]
    PointBehindCamera,
    #[error("Invalid camera parameters: {0}")]
    InvalidParams(String),
    #[error("Failed to load YAML: {0}")]
    YamlError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CameraError {
    fn from(err: std::io::Error) -> Self {
        CameraError::IOError(err.to_string())
    }
}

impl From<yaml_rust::ScanError> for CameraError {
    fn from(err: yaml_rust::ScanError) -> Self {
        CameraError::YamlError(err.to_string())
    }
}

impl Intrinsics {
    /// Builds validated intrinsics from focal lengths and principal point.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraError> {
        let intrinsics = Intrinsics { fx, fy, cx, cy };
        validation::validate_intrinsics(&intrinsics)?;
        Ok(intrinsics)
    }

    /// Extracts intrinsics from an upper-triangular calibration matrix.
    ///
    /// Skew is not modelled; a non-zero `K[(0, 1)]` is rejected.
    pub fn from_matrix(k: &Matrix3<f64>) -> Result<Self, CameraError> {
        if k[(0, 1)].abs() > f64::EPSILON
            || k[(1, 0)].abs() > f64::EPSILON
            || k[(2, 0)].abs() > f64::EPSILON
            || k[(2, 1)].abs() > f64::EPSILON
            || (k[(2, 2)] - 1.0).abs() > f64::EPSILON
        {
            return Err(CameraError::InvalidParams(
                "calibration matrix must be of the form [[fx, 0, cx], [0, fy, cy], [0, 0, 1]]"
                    .to_string(),
            ));
        }
        Self::new(k[(0, 0)], k[(1, 1)], k[(0, 2)], k[(1, 2)])
    }

    /// The 3×3 calibration matrix `K`.
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Loads intrinsics from a YAML file.
    ///
    /// The file is expected to contain a `cam0` document with an
    /// `intrinsics: [fx, fy, cx, cy]` array. Extra keys are ignored.
    ///
    /// # Errors
    ///
    /// * [`CameraError::IOError`] if the file cannot be read.
    /// * [`CameraError::YamlError`] if the content is not valid YAML.
    /// * [`CameraError::InvalidParams`] if the `intrinsics` array is missing or malformed.
    /// * Validation errors such as [`CameraError::FocalLengthMustBePositive`].
    pub fn load_from_yaml(path: &str) -> Result<Self, CameraError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Parses intrinsics from YAML text, see [`Intrinsics::load_from_yaml`].
    pub fn from_yaml_str(contents: &str) -> Result<Self, CameraError> {
        let docs = YamlLoader::load_from_str(contents)?;
        let doc = docs
            .first()
            .ok_or_else(|| CameraError::YamlError("empty YAML document".to_string()))?;

        let intrinsics_yaml = doc["cam0"]["intrinsics"].as_vec().ok_or_else(|| {
            CameraError::InvalidParams("YAML missing 'intrinsics' or not an array".to_string())
        })?;
        if intrinsics_yaml.len() < 4 {
            return Err(CameraError::InvalidParams(format!(
                "expected 4 intrinsic values, found {}",
                intrinsics_yaml.len()
            )));
        }

        let value = |idx: usize, name: &str| {
            let item = &intrinsics_yaml[idx];
            item.as_f64()
                .or_else(|| item.as_i64().map(|v| v as f64))
                .ok_or_else(|| CameraError::InvalidParams(format!("Invalid {name}: not a float")))
        };

        Self::new(
            value(0, "fx")?,
            value(1, "fy")?,
            value(2, "cx")?,
            value(3, "cy")?,
        )
    }

    /// Saves intrinsics in the layout read by [`Intrinsics::load_from_yaml`].
    pub fn save_to_yaml(&self, path: &str) -> Result<(), CameraError> {
        let yaml = serde_yaml::to_value(serde_yaml::Mapping::from_iter([(
            serde_yaml::Value::String("cam0".to_string()),
            serde_yaml::to_value(serde_yaml::Mapping::from_iter([
                (
                    serde_yaml::Value::String("camera_model".to_string()),
                    serde_yaml::Value::String("pinhole".to_string()),
                ),
                (
                    serde_yaml::Value::String("intrinsics".to_string()),
                    serde_yaml::to_value(vec![self.fx, self.fy, self.cx, self.cy])
                        .map_err(|e| CameraError::YamlError(e.to_string()))?,
                ),
            ]))
            .map_err(|e| CameraError::YamlError(e.to_string()))?,
        )]))
        .map_err(|e| CameraError::YamlError(e.to_string()))?;

        let yaml_string =
            serde_yaml::to_string(&yaml).map_err(|e| CameraError::YamlError(e.to_string()))?;

        let mut file = fs::File::create(path)?;
        file.write_all(yaml_string.as_bytes())?;

        Ok(())
    }
}

/// Rigid world-to-camera transform: `x_cam = R * x_world + t`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    rotation: Matrix3<f64>,
    translation: Vector3<f64>,
}

impl CameraPose {
    /// Creates a pose, checking that `rotation` is a proper rotation matrix.
    pub fn new(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Result<Self, CameraError> {
        validation::validate_rotation(&rotation)?;
        if !translation.iter().all(|v| v.is_finite()) {
            return Err(CameraError::InvalidPose(
                "translation must be finite".to_string(),
            ));
        }
        Ok(CameraPose {
            rotation,
            translation,
        })
    }

    /// Camera at the world origin looking down +z.
    pub fn identity() -> Self {
        CameraPose {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Builds a pose from a homogeneous 4×4 transform (only the top 3×4 block is read).
    pub fn from_homogeneous(transform: &Matrix4<f64>) -> Result<Self, CameraError> {
        let rotation = transform.fixed_view::<3, 3>(0, 0).into_owned();
        let translation = transform.fixed_view::<3, 1>(0, 3).into_owned();
        Self::new(rotation, translation)
    }

    /// Builds a pose for a camera located at `center` in the world frame.
    pub fn from_center(rotation: Matrix3<f64>, center: &Point3<f64>) -> Result<Self, CameraError> {
        let translation = -(rotation * center.coords);
        Self::new(rotation, translation)
    }

    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn translation(&self) -> &Vector3<f64> {
        &self.translation
    }

    /// The `[R | t]` extrinsic block.
    pub fn extrinsic_matrix(&self) -> Matrix3x4<f64> {
        let mut rt = Matrix3x4::zeros();
        rt.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        rt.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        rt
    }

    /// Projection matrix `K [R | t]` for this pose.
    pub fn projection_matrix(&self, intrinsics: &Intrinsics) -> Matrix3x4<f64> {
        intrinsics.matrix() * self.extrinsic_matrix()
    }

    /// Camera center in world coordinates, `-Rᵀ t`.
    pub fn center(&self) -> Point3<f64> {
        Point3::from(-(self.rotation.transpose() * self.translation))
    }

    /// Maps a world point into the camera frame.
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * point.coords + self.translation)
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::identity()
    }
}

/// Common validation functions for camera parameters
pub mod validation {
    use super::*;

    const ROTATION_TOLERANCE: f64 = 1e-6;

    pub fn validate_intrinsics(intrinsics: &Intrinsics) -> Result<(), CameraError> {
        if !(intrinsics.fx > 0.0 && intrinsics.fy > 0.0) {
            return Err(CameraError::FocalLengthMustBePositive);
        }
        if !intrinsics.cx.is_finite() || !intrinsics.cy.is_finite() {
            return Err(CameraError::PrincipalPointMustBeFinite);
        }
        Ok(())
    }

    pub fn validate_rotation(rotation: &Matrix3<f64>) -> Result<(), CameraError> {
        if !rotation.iter().all(|v| v.is_finite()) {
            return Err(CameraError::InvalidPose(
                "rotation must be finite".to_string(),
            ));
        }
        let orthogonality = (rotation.transpose() * rotation - Matrix3::identity()).norm();
        if orthogonality > ROTATION_TOLERANCE {
            return Err(CameraError::InvalidPose(format!(
                "rotation is not orthonormal (|RᵀR - I| = {orthogonality:.3e})"
            )));
        }
        if (rotation.determinant() - 1.0).abs() > ROTATION_TOLERANCE {
            return Err(CameraError::InvalidPose(
                "rotation must have determinant +1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Rotation3;

    fn drone_intrinsics() -> Intrinsics {
        Intrinsics::new(2804.051, 2804.051, 2010.41, 1512.734).unwrap()
    }

    #[test]
    fn test_intrinsics_load_from_yaml() {
        let intrinsics = Intrinsics::load_from_yaml("samples/intrinsics.yaml").unwrap();

        assert_eq!(intrinsics.fx, 2804.051);
        assert_eq!(intrinsics.fy, 2804.051);
        assert_eq!(intrinsics.cx, 2010.41);
        assert_eq!(intrinsics.cy, 1512.734);
    }

    #[test]
    fn test_intrinsics_save_and_reload() {
        let intrinsics = drone_intrinsics();
        let path = std::env::temp_dir().join(format!(
            "inspection-planner-intrinsics-{}.yaml",
            std::process::id()
        ));
        let path = path.to_string_lossy().to_string();

        intrinsics.save_to_yaml(&path).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("camera_model: pinhole"));

        let reloaded = Intrinsics::load_from_yaml(&path).unwrap();
        assert_eq!(reloaded, intrinsics);

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_intrinsics_rejects_non_positive_focal_length() {
        let result = Intrinsics::new(0.0, 500.0, 320.0, 240.0);
        assert!(matches!(result, Err(CameraError::FocalLengthMustBePositive)));

        let result = Intrinsics::from_yaml_str("cam0:\n  intrinsics: [-1.0, 1.0, 0.0, 0.0]\n");
        assert!(matches!(result, Err(CameraError::FocalLengthMustBePositive)));
    }

    #[test]
    fn test_intrinsics_yaml_missing_field() {
        let result = Intrinsics::from_yaml_str("cam0:\n  resolution: [640, 480]\n");
        assert!(matches!(result, Err(CameraError::InvalidParams(_))));
    }

    #[test]
    fn test_intrinsics_matrix_round_trip() {
        let intrinsics = drone_intrinsics();
        let k = intrinsics.matrix();
        assert_eq!(k[(0, 2)], 2010.41);
        assert_eq!(k[(2, 2)], 1.0);
        assert_eq!(Intrinsics::from_matrix(&k).unwrap(), intrinsics);
    }

    #[test]
    fn test_pose_center_and_projection() {
        let rotation = Rotation3::from_euler_angles(0.1, -0.2, 0.3).into_inner();
        let center = Point3::new(1.0, 2.0, -3.0);
        let pose = CameraPose::from_center(rotation, &center).unwrap();

        assert_relative_eq!(pose.center(), center, epsilon = 1e-12);
        assert_relative_eq!(
            pose.transform_point(&center),
            Point3::origin(),
            epsilon = 1e-12
        );

        let p = pose.projection_matrix(&drone_intrinsics());
        let expected = drone_intrinsics().matrix() * pose.extrinsic_matrix();
        assert_relative_eq!(p, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_pose_from_homogeneous() {
        let mut transform = Matrix4::identity();
        transform[(0, 3)] = 1.0;
        let pose = CameraPose::from_homogeneous(&transform).unwrap();
        assert_relative_eq!(pose.center(), Point3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_pose_rejects_non_rotation() {
        let scaled = Matrix3::identity() * 2.0;
        assert!(matches!(
            CameraPose::new(scaled, Vector3::zeros()),
            Err(CameraError::InvalidPose(_))
        ));

        let reflection = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, -1.0));
        assert!(matches!(
            CameraPose::new(reflection, Vector3::zeros()),
            Err(CameraError::InvalidPose(_))
        ));
    }
}
