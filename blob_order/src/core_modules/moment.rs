// THEORY:
// The `moment` module holds the geometric measurements taken from a single
// component: raw image moments, the centroid derived from them, the axis-aligned
// bounding rectangle and the polygon area of the component's contour.
//
// Two different areas exist on purpose:
// - `RawMoments::m00` counts pixels. It is exact and is the denominator for the
//   centroid.
// - `contour_area` runs the shoelace formula over the traced boundary, which passes
//   through pixel centres. A 10x10 square therefore measures 81, not 100. This is
//   the value the largest-component selection ranks by.

use crate::core_modules::binary_raster::BinaryRaster;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel units. `x`/`y` is the top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingRect {
    /// Last row covered by the rectangle (inclusive); `None` when it has no height.
    pub fn bottom(&self) -> Option<u32> {
        self.height.checked_sub(1).map(|h| self.y.saturating_add(h))
    }

    /// Last column covered by the rectangle (inclusive); `None` when it has no width.
    pub fn right(&self) -> Option<u32> {
        self.width.checked_sub(1).map(|w| self.x.saturating_add(w))
    }
}

/// Centre of mass in real-valued pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

impl Centroid {
    /// Nearest pixel, clamped into a `width x height` grid.
    pub fn to_pixel(&self, width: u32, height: u32) -> (u32, u32) {
        let clamp = |v: f64, len: u32| v.round().clamp(0.0, len.saturating_sub(1) as f64) as u32;
        (clamp(self.x, width), clamp(self.y, height))
    }
}

/// Zeroth and first order moments of a binary pixel set.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawMoments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl RawMoments {
    pub fn accumulate(&mut self, x: u32, y: u32) {
        self.m00 += 1.0;
        self.m10 += x as f64;
        self.m01 += y as f64;
    }

    /// `None` when the set is empty and the ratios are undefined.
    pub fn centroid(&self) -> Option<Centroid> {
        if self.m00 == 0.0 {
            return None;
        }
        Some(Centroid {
            x: self.m10 / self.m00,
            y: self.m01 / self.m00,
        })
    }
}

/// Moments and extent of every foreground pixel in a raster, gathered in one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComponentSummary {
    pub moments: RawMoments,
    pub bounding_rect: Option<BoundingRect>,
}

impl ComponentSummary {
    pub fn measure(mask: &BinaryRaster) -> Self {
        let mut moments = RawMoments::default();
        let mut min_x = u32::MAX;
        let mut min_y = u32::MAX;
        let mut max_x = 0;
        let mut max_y = 0;

        let width = mask.width() as usize;
        for (i, &value) in mask.as_raw().iter().enumerate() {
            if value == 0 {
                continue;
            }
            let x = (i % width) as u32;
            let y = (i / width) as u32;
            moments.accumulate(x, y);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        let bounding_rect = (moments.m00 > 0.0).then(|| BoundingRect {
            x: min_x,
            y: min_y,
            width: max_x - min_x + 1,
            height: max_y - min_y + 1,
        });

        Self {
            moments,
            bounding_rect,
        }
    }

    pub fn pixel_area(&self) -> u64 {
        self.moments.m00 as u64
    }
}

/// Signed polygon area of a closed contour (shoelace). Positive for
/// counter-clockwise traversal in a y-up frame.
pub fn signed_contour_area(points: &[(i32, i32)]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0f64;
    for i in 0..n {
        let (x0, y0) = points[i];
        let (x1, y1) = points[(i + 1) % n];
        twice_area += x0 as f64 * y1 as f64 - x1 as f64 * y0 as f64;
    }
    twice_area * 0.5
}

/// Unsigned polygon area of a closed contour.
pub fn contour_area(points: &[(i32, i32)]) -> f64 {
    signed_contour_area(points).abs()
}
