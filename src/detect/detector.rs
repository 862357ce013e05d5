//! Chart Region Detector
//! Finds the largest plausible chart rectangle in a rendered page.
//!
//! Steps:
//! 1. Grayscale + inverted binary threshold (charts render darker than paper)
//! 2. External contours, sorted by enclosed area
//! 3. First contour inside the area and aspect-ratio window wins
//!
//! The window constants are fixed policy. Scanned or dark-themed pages defeat
//! the threshold and simply produce no detection.

use super::region::{binarize, external_regions, CandidateRegion, FOREGROUND_CUTOFF};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

/// Regions smaller than this fraction of the page are noise.
pub const MIN_AREA_FRACTION: f64 = 0.02;
/// Regions larger than this fraction of the page are the page itself.
pub const MAX_AREA_FRACTION: f64 = 0.95;
/// Narrowest accepted width/height ratio.
pub const MIN_ASPECT_RATIO: f64 = 0.1;
/// Widest accepted width/height ratio.
pub const MAX_ASPECT_RATIO: f64 = 8.0;

/// Outline colour and thickness for the verification image
const OUTLINE: Rgba<u8> = Rgba([255, 0, 0, 255]);
const OUTLINE_WIDTH: u32 = 3;

pub struct ChartRegionDetector;

impl ChartRegionDetector {
    /// All external foreground regions, largest first, unfiltered.
    pub fn candidates(image: &DynamicImage) -> Vec<CandidateRegion> {
        let binary = binarize(image, FOREGROUND_CUTOFF);
        external_regions(&binary)
    }

    /// Detect the chart region, or `None` when nothing plausible exists.
    pub fn detect(image: &DynamicImage) -> Option<CandidateRegion> {
        let total_area = image.width() as f64 * image.height() as f64;
        if total_area == 0.0 {
            return None;
        }

        Self::candidates(image)
            .into_iter()
            .find(|region| Self::accepts(region, total_area))
    }

    /// Area and aspect-ratio window check.
    pub fn accepts(region: &CandidateRegion, total_area: f64) -> bool {
        if region.area < total_area * MIN_AREA_FRACTION
            || region.area > total_area * MAX_AREA_FRACTION
        {
            return false;
        }

        let aspect = region.bbox.aspect_ratio();
        (MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&aspect)
    }

    /// Crop the image to the region's bounding box.
    pub fn crop(image: &DynamicImage, region: &CandidateRegion) -> DynamicImage {
        let b = region.bbox;
        image.crop_imm(b.x, b.y, b.width, b.height)
    }

    /// Copy of the image with the bounding box outlined in red.
    pub fn annotate(image: &DynamicImage, region: &CandidateRegion) -> RgbaImage {
        let mut canvas = image.to_rgba8();
        let b = region.bbox;

        // Outline grows inward like a stroked rectangle of [x, x + w] x [y, y + h]
        for inset in 0..OUTLINE_WIDTH {
            let w = (b.width + 1).saturating_sub(2 * inset);
            let h = (b.height + 1).saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((b.x + inset) as i32, (b.y + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, OUTLINE);
        }

        canvas
    }
}
