// THEORY:
// The `BlobDetector` is the engine of the extraction layer. Given a binary raster
// with any number of components, it isolates the single largest one and hands it
// back as its own raster, leaving the input untouched.
//
// Key architectural principles & algorithm steps:
// 1.  **Contour Source Seam**: Border tracing is a library capability, not ours. The
//     `ContourSource` trait asks only for the outer border of every 8-connected
//     component in a deterministic order. `ImageprocContours` fulfils it with
//     `imageproc::contours::find_contours`; tests can plug in their own. The
//     tracer only starts an outer border at a pixel with a background pixel to its
//     left, so the raster is traced inside a one-pixel background frame and the
//     points are shifted back afterwards.
// 2.  **Area Ranking**: Each outer contour is ranked by its polygon area. The
//     strictly-greater comparison means that on an exact tie the contour that came
//     first in tracing order wins. Any consistent tie-break is acceptable because
//     extraction order never changes the final reading order.
// 3.  **Pixel Recovery**: The contour only describes the boundary. The component's
//     pixels are recovered with an 8-connected flood fill seeded on the contour's
//     first point, which reproduces the component exactly, holes included.
// 4.  **Caller Owns Mutation**: The extractor never writes to its input. Removing
//     the component from the working raster is the ordering engine's job.

use crate::core_modules::binary_raster::BinaryRaster;

pub mod blob_detector {
    use super::*;
    use crate::core_modules::moment::contour_area;
    use image::GrayImage;
    use imageproc::contours::{BorderType, find_contours};
    use std::collections::VecDeque;

    /// 8-neighbourhood offsets.
    const NEIGHBOURS_8: [(i32, i32); 8] = [
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
    ];

    /// Supplies the outer boundary of every connected foreground component.
    pub trait ContourSource {
        /// Ordered boundary points, one list per component, in a deterministic order.
        fn outer_contours(&self, raster: &BinaryRaster) -> Vec<Vec<(i32, i32)>>;
    }

    /// Contour tracing backed by `imageproc` (Suzuki-Abe border following).
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ImageprocContours;

    impl ContourSource for ImageprocContours {
        fn outer_contours(&self, raster: &BinaryRaster) -> Vec<Vec<(i32, i32)>> {
            find_contours::<i32>(&framed(raster))
                .into_iter()
                .filter(|contour| contour.border_type == BorderType::Outer)
                .map(|contour| contour.points.iter().map(|p| (p.x - 1, p.y - 1)).collect())
                .collect()
        }
    }

    /// Copy of `raster` surrounded by a one-pixel background border.
    fn framed(raster: &BinaryRaster) -> GrayImage {
        let (width, height) = raster.dimensions();
        BinaryRaster::from_fn(width + 2, height + 2, |x, y| {
            x >= 1 && y >= 1 && raster.is_foreground(x - 1, y - 1)
        })
        .into_gray()
    }

    /// A single connected component pulled out of a raster.
    #[derive(Debug, Clone)]
    pub struct Component {
        /// Outer boundary in tracing order.
        pub contour: Vec<(i32, i32)>,
        /// Polygon area enclosed by `contour`.
        pub contour_area: f64,
        /// A raster, same size as the source, holding only this component's pixels.
        pub mask: BinaryRaster,
    }

    /// Finds and isolates the largest component of a raster.
    #[derive(Debug, Clone, Default)]
    pub struct LargestComponentExtractor<S = ImageprocContours> {
        source: S,
    }

    impl LargestComponentExtractor {
        pub fn new() -> Self {
            Self {
                source: ImageprocContours,
            }
        }
    }

    impl<S: ContourSource> LargestComponentExtractor<S> {
        pub fn with_source(source: S) -> Self {
            Self { source }
        }

        /// Returns the component with the largest contour area, or `None` when the
        /// raster holds no foreground.
        pub fn extract(&self, raster: &BinaryRaster) -> Option<Component> {
            let contours = self.source.outer_contours(raster);

            let mut best: Option<(usize, f64)> = None;
            for (index, contour) in contours.iter().enumerate() {
                if contour.is_empty() {
                    continue;
                }
                let area = contour_area(contour);
                match best {
                    Some((_, best_area)) if area <= best_area => {}
                    _ => best = Some((index, area)),
                }
            }

            let (index, area) = best?;
            let contour = contours.into_iter().nth(index)?;
            let (seed_x, seed_y) = contour[0];
            let mask = flood_component(raster, seed_x, seed_y);

            Some(Component {
                contour,
                contour_area: area,
                mask,
            })
        }
    }

    /// Copies the 8-connected component containing `(seed_x, seed_y)` into a new
    /// raster. An out-of-range or background seed yields an empty raster.
    pub fn flood_component(raster: &BinaryRaster, seed_x: i32, seed_y: i32) -> BinaryRaster {
        let (width, height) = raster.dimensions();
        let w = width as i32;
        let h = height as i32;
        let mut mask = BinaryRaster::new(width, height);

        let in_bounds = |x: i32, y: i32| x >= 0 && y >= 0 && x < w && y < h;
        if !in_bounds(seed_x, seed_y) || !raster.is_foreground(seed_x as u32, seed_y as u32) {
            return mask;
        }

        let mut queue = VecDeque::new();
        mask.set(seed_x as u32, seed_y as u32, true);
        queue.push_back((seed_x, seed_y));

        while let Some((cx, cy)) = queue.pop_front() {
            for (dx, dy) in NEIGHBOURS_8 {
                let nx = cx + dx;
                let ny = cy + dy;
                if !in_bounds(nx, ny) {
                    continue;
                }
                let (ux, uy) = (nx as u32, ny as u32);
                if raster.is_foreground(ux, uy) && !mask.is_foreground(ux, uy) {
                    mask.set(ux, uy, true);
                    queue.push_back((nx, ny));
                }
            }
        }

        mask
    }

    /// Keeps only the largest blob of `raster`; everything else is cleared.
    pub fn isolate_largest(raster: &BinaryRaster) -> BinaryRaster {
        LargestComponentExtractor::new()
            .extract(raster)
            .map(|component| component.mask)
            .unwrap_or_else(|| BinaryRaster::new(raster.width(), raster.height()))
    }
}

#[cfg(test)]
mod tests {
    use super::blob_detector::*;
    use super::*;

    #[test]
    fn empty_raster_has_no_component() {
        let raster = BinaryRaster::new(20, 20);
        assert!(LargestComponentExtractor::new().extract(&raster).is_none());
    }

    #[test]
    fn picks_the_largest_blob_and_leaves_input_alone() {
        let mut raster = BinaryRaster::new(60, 40);
        raster.fill_rect(2, 2, 5, 5);
        raster.fill_rect(20, 10, 12, 12);
        raster.fill_rect(40, 30, 3, 3);
        let before = raster.clone();

        let component = LargestComponentExtractor::new().extract(&raster).unwrap();
        assert_eq!(component.mask.foreground_count(), 144);
        assert!(component.mask.is_foreground(20, 10));
        assert!(!component.mask.is_foreground(2, 2));
        assert_eq!(raster, before);
    }

    #[test]
    fn square_contour_area_is_close_to_side_squared() {
        let side = 10u32;
        let mut raster = BinaryRaster::new(40, 40);
        raster.fill_rect(15, 15, side, side);

        let component = LargestComponentExtractor::new().extract(&raster).unwrap();
        let s = side as f64;
        assert!(component.contour_area >= (s - 1.0) * (s - 1.0) - 1e-9);
        assert!(component.contour_area <= s * s);
    }

    #[test]
    fn diagonal_neighbours_belong_to_the_same_component() {
        let mut raster = BinaryRaster::new(10, 10);
        for i in 0..6 {
            raster.set(2 + i, 2 + i, true);
        }
        let mask = flood_component(&raster, 2, 2);
        assert_eq!(mask.foreground_count(), 6);
    }

    #[test]
    fn holes_are_not_filled() {
        let mut raster = BinaryRaster::new(20, 20);
        raster.fill_rect(4, 4, 9, 9);
        for y in 7..10 {
            for x in 7..10 {
                raster.set(x, y, false);
            }
        }

        let component = LargestComponentExtractor::new().extract(&raster).unwrap();
        assert_eq!(component.mask.foreground_count(), 81 - 9);
        assert!(!component.mask.is_foreground(8, 8));
    }

    struct FixedContours(Vec<Vec<(i32, i32)>>);

    impl ContourSource for FixedContours {
        fn outer_contours(&self, _raster: &BinaryRaster) -> Vec<Vec<(i32, i32)>> {
            self.0.clone()
        }
    }

    #[test]
    fn equal_areas_keep_the_first_contour() {
        let mut raster = BinaryRaster::new(30, 10);
        raster.fill_rect(1, 1, 4, 4);
        raster.fill_rect(20, 1, 4, 4);
        let first = vec![(20, 1), (20, 4), (23, 4), (23, 1)];
        let second = vec![(1, 1), (1, 4), (4, 4), (4, 1)];

        let extractor =
            LargestComponentExtractor::with_source(FixedContours(vec![first, second]));
        let component = extractor.extract(&raster).unwrap();
        assert!(component.mask.is_foreground(20, 1));
        assert!(!component.mask.is_foreground(1, 1));
    }

    #[test]
    fn zero_area_contours_are_still_extracted() {
        let mut raster = BinaryRaster::new(10, 10);
        raster.set(3, 3, true);

        let component = LargestComponentExtractor::new().extract(&raster).unwrap();
        assert_eq!(component.contour_area, 0.0);
        assert_eq!(component.mask.foreground_count(), 1);
    }

    #[test]
    fn blobs_touching_the_image_border_are_found() {
        let mut raster = BinaryRaster::new(30, 20);
        raster.fill_rect(0, 5, 4, 4);
        let component = LargestComponentExtractor::new().extract(&raster).unwrap();
        assert_eq!(component.mask.foreground_count(), 16);
        assert!(component.contour.iter().all(|&(x, y)| x >= 0 && y >= 0));

        let mut corners = BinaryRaster::new(30, 20);
        corners.fill_rect(0, 0, 3, 3);
        corners.fill_rect(26, 16, 4, 4);
        let contours = ImageprocContours.outer_contours(&corners);
        assert_eq!(contours.len(), 2);
        assert!(contours[0].contains(&(0, 0)));
        assert!(contours[1].contains(&(29, 19)));
    }

    #[test]
    fn single_pixels_in_column_zero_each_have_a_contour() {
        let mut raster = BinaryRaster::new(10, 10);
        for y in (0..10).step_by(2) {
            raster.set(0, y, true);
        }
        assert_eq!(ImageprocContours.outer_contours(&raster).len(), 5);
    }

    #[test]
    fn isolate_largest_clears_smaller_blobs() {
        let mut raster = BinaryRaster::new(30, 30);
        raster.fill_rect(1, 1, 3, 3);
        raster.fill_rect(10, 10, 8, 8);

        let largest = isolate_largest(&raster);
        assert_eq!(largest.foreground_count(), 64);
        assert!(isolate_largest(&BinaryRaster::new(4, 4)).is_empty());
    }
}
