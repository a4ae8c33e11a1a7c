use crate::detection::domain::detection_algorithm::{DetectionAlgorithm, DetectionError};
use crate::detection::domain::operation_mode::OperationMode;

use super::edge_detector::{EdgeDetector, EdgeDetectorConfig};
use super::feature_cascade_detector::{CascadeDetectorConfig, FeatureCascadeDetector};

/// Create a detection algorithm for the given mode.
///
/// Cascade modes resolve and load their model files here, so a missing or
/// malformed cascade is reported before any worker starts.
pub fn build_algorithm(
    mode: OperationMode,
    edge: &EdgeDetectorConfig,
    cascade: &CascadeDetectorConfig,
) -> Result<Box<dyn DetectionAlgorithm>, DetectionError> {
    let algorithm: Box<dyn DetectionAlgorithm> = match mode {
        OperationMode::Edges => Box::new(EdgeDetector::new(*edge)?),
        OperationMode::Faces | OperationMode::FacesAndEyes => Box::new(
            FeatureCascadeDetector::from_config(cascade, mode.includes_eyes())?,
        ),
    };
    log::info!("Using {} detection", algorithm.name());
    Ok(algorithm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const BAR_CASCADE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bar_cascade.xml");

    fn write_cascade(dir: &TempDir, name: &str) {
        std::fs::copy(BAR_CASCADE, dir.path().join(name)).unwrap();
    }

    fn cascade_config(dir: &TempDir) -> CascadeDetectorConfig {
        CascadeDetectorConfig {
            cascade_dir: Some(dir.path().to_path_buf()),
            ..CascadeDetectorConfig::default()
        }
    }

    #[test]
    fn test_edges_mode_needs_no_cascades() {
        let dir = TempDir::new().unwrap();
        let algorithm = build_algorithm(
            OperationMode::Edges,
            &EdgeDetectorConfig::default(),
            &cascade_config(&dir),
        )
        .unwrap();
        assert_eq!(algorithm.name(), "edges");
    }

    #[test]
    fn test_faces_mode_loads_face_cascade_only() {
        let dir = TempDir::new().unwrap();
        write_cascade(&dir, &CascadeDetectorConfig::default().face_cascade);

        let algorithm = build_algorithm(
            OperationMode::Faces,
            &EdgeDetectorConfig::default(),
            &cascade_config(&dir),
        )
        .unwrap();

        assert_eq!(algorithm.name(), "faces");
    }

    #[test]
    fn test_eyes_mode_loads_both_cascades() {
        let dir = TempDir::new().unwrap();
        let config = cascade_config(&dir);
        write_cascade(&dir, &config.face_cascade);
        write_cascade(&dir, &config.eye_cascade);

        let algorithm =
            build_algorithm(OperationMode::FacesAndEyes, &EdgeDetectorConfig::default(), &config)
                .unwrap();

        assert_eq!(algorithm.name(), "faces_and_eyes");
    }

    #[test]
    fn test_eyes_mode_without_eye_cascade_fails() {
        let dir = TempDir::new().unwrap();
        let mut config = cascade_config(&dir);
        config.eye_cascade = "missing_eyes.xml".into();
        write_cascade(&dir, &config.face_cascade);

        let result =
            build_algorithm(OperationMode::FacesAndEyes, &EdgeDetectorConfig::default(), &config);

        assert!(matches!(result, Err(DetectionError::Asset(_))));
    }

    #[test]
    fn test_invalid_edge_config_fails() {
        let dir = TempDir::new().unwrap();
        let edge = EdgeDetectorConfig {
            kernel_size: 7,
            ..EdgeDetectorConfig::default()
        };
        let result = build_algorithm(OperationMode::Edges, &edge, &cascade_config(&dir));
        assert!(matches!(result, Err(DetectionError::InvalidParameter(_))));
    }
}
