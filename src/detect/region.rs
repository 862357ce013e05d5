//! Candidate Region Module
//! Binarization and external contour extraction for page renders.

use image::{DynamicImage, GrayImage};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::point::Point;
use serde::Serialize;

/// Pixels brighter than this are page background.
pub const FOREGROUND_CUTOFF: u8 = 240;

/// Smallest axis-aligned rectangle enclosing a region, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

/// A connected foreground area considered as a possible chart location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateRegion {
    pub bbox: BoundingBox,
    /// Pixels enclosed by the traced outer border, border included.
    pub area: f64,
}

impl CandidateRegion {
    /// Build a region from the traced border points of one contour.
    pub fn from_points(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);
        for p in points.iter().skip(1) {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        Some(Self {
            bbox: BoundingBox {
                x: min_x.max(0) as u32,
                y: min_y.max(0) as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            },
            area: filled_area(points),
        })
    }
}

/// Grayscale, then mark everything at or below `cutoff` as foreground (255).
pub fn binarize(image: &DynamicImage, cutoff: u8) -> GrayImage {
    threshold(&image.to_luma8(), cutoff, ThresholdType::BinaryInverted)
}

/// External contours of a binary image, largest area first.
///
/// Holes and borders nested inside other components are skipped. The sort is
/// stable, so equal areas keep trace order and repeated runs agree.
pub fn external_regions(binary: &GrayImage) -> Vec<CandidateRegion> {
    let mut regions: Vec<CandidateRegion> = find_contours::<i32>(binary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(|c| CandidateRegion::from_points(&c.points))
        .collect();

    regions.sort_by(|a, b| {
        b.area
            .partial_cmp(&a.area)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    regions
}

/// Pixel count of the region bounded by a traced border.
///
/// The border pixels are lattice points, so Pick's theorem gives
/// `interior + boundary = shoelace + boundary / 2 + 1`. Spurs traced out and
/// back add no shoelace area but still count their pixels.
fn filled_area(points: &[Point<i32>]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }

    let edges = || points.iter().zip(points.iter().cycle().skip(1));
    let twice: i64 = edges()
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    let boundary: i64 = edges()
        .map(|(a, b)| gcd((b.x - a.x).unsigned_abs(), (b.y - a.y).unsigned_abs()) as i64)
        .sum();

    (twice.abs() + boundary) as f64 / 2.0 + 1.0
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
