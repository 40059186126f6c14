// THEORY:
// The `BinaryRaster` is the lowest layer of the ordering system. It is a "dumb" data
// container: a 2-D grid where every pixel is either foreground or background.
//
// Key architectural principles:
// 1.  **Normalized Storage**: Pixels are stored in an `image::GrayImage` as 255
//     (foreground) or 0 (background). Any non-zero input value is treated as
//     foreground, so rasters produced by other tools can be wrapped directly.
// 2.  **In-Place Mutation**: The ordering loop peels components off one at a time.
//     `subtract` performs the pixel-wise set-difference in place so the working
//     raster never has to be re-allocated.
// 3.  **Thresholding Adapter**: Decoding and thresholding are not the raster's job,
//     but `from_luma_otsu` gives callers the same Otsu + inversion step the
//     reference scripts use, so a decoded photo can be turned into a raster in one
//     call.

use crate::error::{Result, SortError};
use image::{GrayImage, Luma};

pub const FOREGROUND: u8 = 255;
pub const BACKGROUND: u8 = 0;

/// A foreground/background pixel grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryRaster {
    image: GrayImage,
}

impl BinaryRaster {
    /// Creates an all-background raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: GrayImage::new(width, height),
        }
    }

    /// Builds a raster by asking `f` whether each pixel is foreground.
    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let image = GrayImage::from_fn(width, height, |x, y| {
            Luma([if f(x, y) { FOREGROUND } else { BACKGROUND }])
        });
        Self { image }
    }

    /// Wraps a grayscale image, treating every non-zero pixel as foreground.
    pub fn from_gray(gray: &GrayImage) -> Self {
        let mut image = gray.clone();
        for pixel in image.pixels_mut() {
            pixel[0] = if pixel[0] > 0 { FOREGROUND } else { BACKGROUND };
        }
        Self { image }
    }

    /// Binarizes a grayscale image at Otsu's level.
    ///
    /// With `invert` set, pixels at or below the level become foreground (dark ink on
    /// a light page); otherwise pixels strictly above it do.
    pub fn from_luma_otsu(gray: &GrayImage, invert: bool) -> Self {
        let level = imageproc::contrast::otsu_level(gray);
        let mut image = GrayImage::new(gray.width(), gray.height());
        for (src, dst) in gray.pixels().zip(image.pixels_mut()) {
            let above = src[0] > level;
            dst[0] = if above != invert { FOREGROUND } else { BACKGROUND };
        }
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Returns `false` for coordinates outside the raster.
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.image.get_pixel(x, y)[0] != BACKGROUND
    }

    pub fn set(&mut self, x: u32, y: u32, foreground: bool) {
        let value = if foreground { FOREGROUND } else { BACKGROUND };
        self.image.put_pixel(x, y, Luma([value]));
    }

    /// Marks a rectangle as foreground, clipped to the raster bounds.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for py in y..y_end {
            for px in x..x_end {
                self.image.put_pixel(px, py, Luma([FOREGROUND]));
            }
        }
    }

    pub fn foreground_count(&self) -> usize {
        self.image.as_raw().iter().filter(|&&v| v != BACKGROUND).count()
    }

    pub fn is_empty(&self) -> bool {
        self.image.as_raw().iter().all(|&v| v == BACKGROUND)
    }

    /// Clears every pixel that is foreground in `other` (`self = self - other`).
    pub fn subtract(&mut self, other: &BinaryRaster) -> Result<()> {
        if self.dimensions() != other.dimensions() {
            return Err(SortError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            });
        }
        for (dst, &src) in self.image.iter_mut().zip(other.image.as_raw().iter()) {
            if src != BACKGROUND {
                *dst = BACKGROUND;
            }
        }
        Ok(())
    }

    /// Row-major pixel bytes, one per pixel.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_gray(self) -> GrayImage {
        self.image
    }
}

impl From<GrayImage> for BinaryRaster {
    fn from(gray: GrayImage) -> Self {
        Self::from_gray(&gray)
    }
}
