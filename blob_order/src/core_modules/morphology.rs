// THEORY:
// Binary morphology with rectangular structuring elements. The row labeler only ever
// needs a wide, flat rectangle ("bridge") to merge blobs that sit on the same line.
//
// 1.  **Library Operators**: On a 0/255 raster, grayscale dilation (window maximum)
//     and erosion (window minimum) are exactly binary dilation and erosion, so both
//     run on `imageproc::morphology` with a filled rectangular `Mask`.
// 2.  **Anchor**: The element is anchored at (`width / 2`, `height / 2`). For an
//     even side the window reaches one pixel further left (or up) than right.
// 3.  **Border Handling**: Pixels outside the raster are ignored rather than treated
//     as background or foreground. Erosion near an edge therefore only looks at the
//     part of the window that lies inside the image.
// 4.  **Size Limit**: `imageproc` masks are at most 511 pixels on a side, so larger
//     elements are rejected when they are built.

use crate::core_modules::binary_raster::BinaryRaster;
use crate::error::{Result, SortError};
use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

/// Largest supported side length of a structuring element.
pub const MAX_ELEMENT_SIDE: u32 = 511;

/// The two primitive operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphOp {
    Dilate,
    Erode,
}

/// A filled rectangle anchored at (`width / 2`, `height / 2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuringElement {
    width: u32,
    height: u32,
}

impl StructuringElement {
    /// Both sides must lie in `1..=MAX_ELEMENT_SIDE`.
    pub fn rect(width: u32, height: u32) -> Result<Self> {
        let valid = 1..=MAX_ELEMENT_SIDE;
        if !valid.contains(&width) || !valid.contains(&height) {
            return Err(SortError::InvalidConfig(format!(
                "structuring element {width}x{height} must have sides between 1 and {MAX_ELEMENT_SIDE}"
            )));
        }
        Ok(Self { width, height })
    }

    /// A single-row element; never bridges vertically.
    pub fn horizontal(width: u32) -> Result<Self> {
        Self::rect(width, 1)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn mask(&self) -> Mask {
        let footprint = GrayImage::from_pixel(self.width, self.height, Luma([255]));
        // Sides are at most 511, so both anchors fit in a u8.
        Mask::from_image(&footprint, (self.width / 2) as u8, (self.height / 2) as u8)
    }
}

pub fn dilate(raster: &BinaryRaster, element: StructuringElement, passes: u32) -> BinaryRaster {
    morph(raster, element, MorphOp::Dilate, passes)
}

pub fn erode(raster: &BinaryRaster, element: StructuringElement, passes: u32) -> BinaryRaster {
    morph(raster, element, MorphOp::Erode, passes)
}

/// Applies `op` with `element` the requested number of times.
pub fn morph(
    raster: &BinaryRaster,
    element: StructuringElement,
    op: MorphOp,
    passes: u32,
) -> BinaryRaster {
    if passes == 0 || raster.width() == 0 || raster.height() == 0 {
        return raster.clone();
    }

    let mask = element.mask();
    let mut image = raster.as_gray().clone();
    for _ in 0..passes {
        image = match op {
            MorphOp::Dilate => grayscale_dilate(&image, &mask),
            MorphOp::Erode => grayscale_erode(&image, &mask),
        };
    }
    BinaryRaster::from(image)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_bits(raster: &BinaryRaster, y: u32) -> Vec<bool> {
        (0..raster.width()).map(|x| raster.is_foreground(x, y)).collect()
    }

    #[test]
    fn horizontal_dilation_spreads_along_the_row_only() {
        let mut raster = BinaryRaster::new(11, 3);
        raster.set(5, 1, true);

        let dilated = dilate(&raster, StructuringElement::horizontal(5).unwrap(), 1);
        assert_eq!(dilated.foreground_count(), 5);
        for x in 3..=7 {
            assert!(dilated.is_foreground(x, 1));
        }
        assert!(!dilated.is_foreground(5, 0));
        assert!(!dilated.is_foreground(5, 2));
    }

    #[test]
    fn even_width_anchor_is_off_centre() {
        let mut raster = BinaryRaster::new(9, 1);
        raster.set(4, 0, true);

        // Offsets [-2, 1]: a pixel at 4 is reached from x in 3..=6.
        let dilated = dilate(&raster, StructuringElement::horizontal(4).unwrap(), 1);
        assert_eq!(
            row_bits(&dilated, 0),
            vec![false, false, false, true, true, true, true, false, false]
        );
    }

    #[test]
    fn erosion_undoes_a_single_dilation_of_an_isolated_run() {
        let mut raster = BinaryRaster::new(20, 1);
        raster.fill_rect(8, 0, 3, 1);
        let element = StructuringElement::horizontal(5).unwrap();

        let closed = erode(&dilate(&raster, element, 1), element, 1);
        assert_eq!(closed, raster);
    }

    #[test]
    fn dilation_bridges_gaps_narrower_than_the_element() {
        let mut raster = BinaryRaster::new(30, 1);
        raster.fill_rect(2, 0, 4, 1);
        raster.fill_rect(12, 0, 4, 1);
        let element = StructuringElement::horizontal(9).unwrap();

        let bridged = erode(&dilate(&raster, element, 1), element, 1);
        assert!((2..16).all(|x| bridged.is_foreground(x, 0)));
    }

    #[test]
    fn erosion_ignores_out_of_bounds_neighbours() {
        let mut raster = BinaryRaster::new(6, 1);
        raster.fill_rect(0, 0, 3, 1);

        let eroded = erode(&raster, StructuringElement::horizontal(3).unwrap(), 1);
        // x = 0 only sees {0, 1} inside the raster, both set.
        assert_eq!(
            row_bits(&eroded, 0),
            vec![true, true, false, false, false, false]
        );
    }

    #[test]
    fn rectangle_spreads_along_both_axes() {
        let mut raster = BinaryRaster::new(9, 9);
        raster.set(4, 4, true);

        let dilated = dilate(&raster, StructuringElement::rect(3, 5).unwrap(), 1);
        assert_eq!(dilated.foreground_count(), 15);
        assert!(dilated.is_foreground(3, 2));
        assert!(dilated.is_foreground(5, 6));
        assert!(!dilated.is_foreground(4, 1));
    }

    #[test]
    fn element_sides_are_bounded() {
        assert!(StructuringElement::horizontal(MAX_ELEMENT_SIDE).is_ok());
        assert!(matches!(
            StructuringElement::horizontal(MAX_ELEMENT_SIDE + 1),
            Err(SortError::InvalidConfig(_))
        ));
        assert!(StructuringElement::rect(0, 1).is_err());
        assert!(StructuringElement::rect(3, 0).is_err());
    }

    #[test]
    fn widest_element_spreads_to_both_edges() {
        let mut raster = BinaryRaster::new(600, 1);
        raster.set(300, 0, true);

        let dilated = dilate(&raster, StructuringElement::horizontal(MAX_ELEMENT_SIDE).unwrap(), 1);
        // Offsets [-255, 255].
        assert_eq!(dilated.foreground_count(), 511);
        assert!(dilated.is_foreground(45, 0));
        assert!(dilated.is_foreground(555, 0));
        assert!(!dilated.is_foreground(44, 0));
    }

    #[test]
    fn zero_sized_raster_is_returned_unchanged() {
        let raster = BinaryRaster::new(0, 0);
        let element = StructuringElement::horizontal(7).unwrap();
        assert_eq!(dilate(&raster, element, 2), raster);
    }

    #[test]
    fn repeated_passes_compound() {
        let mut raster = BinaryRaster::new(21, 1);
        raster.set(10, 0, true);

        let dilated = dilate(&raster, StructuringElement::horizontal(3).unwrap(), 3);
        assert_eq!(dilated.foreground_count(), 7);
    }
}
