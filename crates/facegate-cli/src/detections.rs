use facegate_core::{CaptureError, DescriptorSource, Detection};
use std::path::PathBuf;

/// Face detections written by the external vision pipeline.
///
/// The file holds a JSON array of `{ "score": f32, "descriptor": [f32; D] }`
/// for the most recent frame and is re-read on every capture.
pub struct DetectionFile {
    path: PathBuf,
}

impl DetectionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DescriptorSource for DetectionFile {
    fn detect(&mut self) -> Result<Vec<Detection>, CaptureError> {
        let src = std::fs::read_to_string(&self.path)
            .map_err(|e| CaptureError::Source(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&src)
            .map_err(|e| CaptureError::Source(format!("{}: {e}", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facegate_core::capture_descriptor;
    use std::io::Write;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_reads_best_face() {
        let file = write(
            r#"[
                { "score": 0.71, "descriptor": [0.1, 0.2] },
                { "score": 0.93, "descriptor": [0.3, 0.4] }
            ]"#,
        );
        let mut source = DetectionFile::new(file.path());
        assert_eq!(capture_descriptor(&mut source).unwrap().values, vec![0.3, 0.4]);
    }

    #[test]
    fn test_empty_frame() {
        let file = write("[]");
        let mut source = DetectionFile::new(file.path());
        assert_eq!(capture_descriptor(&mut source), Err(CaptureError::NoFaceDetected));
    }

    #[test]
    fn test_rereads_latest_contents() {
        let file = write("[]");
        let mut source = DetectionFile::new(file.path());
        assert!(capture_descriptor(&mut source).is_err());

        std::fs::write(file.path(), r#"[{ "score": 0.9, "descriptor": [1.0] }]"#).unwrap();
        assert_eq!(capture_descriptor(&mut source).unwrap().values, vec![1.0]);
    }

    #[test]
    fn test_missing_file_is_source_error() {
        let mut source = DetectionFile::new("/nonexistent/facegate/detections.json");
        assert!(matches!(source.detect(), Err(CaptureError::Source(_))));
    }

    #[test]
    fn test_malformed_json_is_source_error() {
        let file = write("{ not json");
        let mut source = DetectionFile::new(file.path());
        assert!(matches!(source.detect(), Err(CaptureError::Source(_))));
    }
}
