//! Chart Cropper
//! Runs the detector on a page render and persists the crop plus a
//! bounding-box verification image.

use super::error_log::{ErrorLog, ErrorRecord};
use super::ExtractError;
use crate::detect::{CandidateRegion, ChartRegionDetector};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

const CROP_FAILURE: &str = "Image identified but cropping failed - No suitable plot contour detected";

/// Result of one extraction attempt.
#[derive(Debug, Clone)]
pub enum Extraction {
    /// Chart found; crop and annotated copy written.
    Cropped {
        region: CandidateRegion,
        crop_path: PathBuf,
        bbox_path: PathBuf,
    },
    /// No chart (or the crop could not be written); the original is handed back.
    Uncropped { original: DynamicImage },
}

/// Writes crops to `output_dir` and verification images to `logs_dir`.
pub struct ChartCropper<'a> {
    output_dir: PathBuf,
    logs_dir: PathBuf,
    error_log: Option<&'a ErrorLog>,
}

impl<'a> ChartCropper<'a> {
    pub fn new(output_dir: &Path, logs_dir: &Path, error_log: Option<&'a ErrorLog>) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            logs_dir: logs_dir.to_path_buf(),
            error_log,
        }
    }

    /// Detect and crop. `stem` names the outputs (`<stem>_cropped.png`,
    /// `<stem>_bbox.png`); failures are logged against `document` and `source`.
    pub fn extract(
        &self,
        image: DynamicImage,
        document: &str,
        stem: &str,
        source: &Path,
    ) -> Extraction {
        let Some(region) = ChartRegionDetector::detect(&image) else {
            info!("No suitable plot detected in {}. Skipping cropping.", source.display());
            self.log_failure(document, source, CROP_FAILURE);
            return Extraction::Uncropped { original: image };
        };

        match self.save(&image, &region, stem) {
            Ok((crop_path, bbox_path)) => {
                info!("Cropped image saved to {}", crop_path.display());
                Extraction::Cropped {
                    region,
                    crop_path,
                    bbox_path,
                }
            }
            Err(e) => {
                warn!("Failed to save crop for {}: {}", stem, e);
                self.log_failure(document, source, &format!("Error saving cropped image: {e}"));
                Extraction::Uncropped { original: image }
            }
        }
    }

    /// Crop an image file on disk. Returns the crop path and `true`, or the
    /// original path and `false` when decoding or detection fails.
    pub fn extract_file(&self, path: &Path) -> (PathBuf, bool) {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());

        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                warn!("Failed to decode {}: {}", path.display(), e);
                self.log_failure(&stem, path, &format!("Error decoding image: {e}"));
                return (path.to_path_buf(), false);
            }
        };

        match self.extract(image, &stem, &stem, path) {
            Extraction::Cropped { crop_path, .. } => (crop_path, true),
            Extraction::Uncropped { .. } => (path.to_path_buf(), false),
        }
    }

    fn save(
        &self,
        image: &DynamicImage,
        region: &CandidateRegion,
        stem: &str,
    ) -> Result<(PathBuf, PathBuf), ExtractError> {
        fs::create_dir_all(&self.output_dir)?;
        fs::create_dir_all(&self.logs_dir)?;

        let crop_path = self.output_dir.join(format!("{stem}_cropped.png"));
        ChartRegionDetector::crop(image, region).save(&crop_path)?;

        let bbox_path = self.logs_dir.join(format!("{stem}_bbox.png"));
        ChartRegionDetector::annotate(image, region).save(&bbox_path)?;
        info!("Bounding box visualization saved to {}", bbox_path.display());

        Ok((crop_path, bbox_path))
    }

    fn log_failure(&self, document: &str, source: &Path, error: &str) {
        if let Some(log) = self.error_log {
            let record = ErrorRecord::now(document, source, error)
                .pages_checked(1)
                .keywords(vec!["Cropping failure".to_string()]);
            log.record(&record);
        }
    }
}
