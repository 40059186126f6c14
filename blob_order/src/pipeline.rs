// THEORY:
// The `pipeline` module is the top-level API for the ordering engine. It wraps the
// full stack (thresholding, row labeling, largest-first extraction, table ordering)
// behind one configurable object so callers hand in an image and get back numbered
// blobs.

use crate::core_modules::binary_raster::BinaryRaster;
use crate::core_modules::morphology::{MAX_ELEMENT_SIDE, StructuringElement};
use crate::core_modules::ordering::OrderingEngine;
use crate::core_modules::row_labeler::RowLabeler;
use crate::error::{Result, SortError};
use image::DynamicImage;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// Re-export key data structures for the public API.
pub use crate::core_modules::moment::{BoundingRect, Centroid};
pub use crate::core_modules::ordering::{BlobRecord, Collision, OrderedBlob};
pub use crate::core_modules::row_labeler::Connectivity;

const DEFAULT_BRIDGE_WIDTH: u32 = 100;
const DEFAULT_DILATE_PASSES: u32 = 2;
const DEFAULT_ERODE_PASSES: u32 = 1;

/// Configuration for the SortingPipeline, allowing for tunable behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Width of the horizontal bridging element. Must exceed the widest gap between
    /// blobs on the same row, and may not exceed 511.
    pub bridge_width: u32,
    /// Height of the bridging element. Anything above 1 starts merging rows.
    pub bridge_height: u32,
    pub dilate_passes: u32,
    /// Must not exceed `dilate_passes`, otherwise blobs can erode out of their band.
    pub erode_passes: u32,
    /// `"four"` or `"eight"`.
    #[serde(with = "crate::core_modules::row_labeler::ConnectivityDef")]
    pub row_connectivity: Connectivity,
    /// Treat dark pixels as foreground when binarizing a decoded image.
    pub invert: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bridge_width: DEFAULT_BRIDGE_WIDTH,
            bridge_height: 1,
            dilate_passes: DEFAULT_DILATE_PASSES,
            erode_passes: DEFAULT_ERODE_PASSES,
            row_connectivity: Connectivity::Four,
            invert: true,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| SortError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bridge_width == 0 || self.bridge_height == 0 {
            return Err(SortError::InvalidConfig(
                "bridge_width and bridge_height must be at least 1".into(),
            ));
        }
        if self.bridge_width > MAX_ELEMENT_SIDE || self.bridge_height > MAX_ELEMENT_SIDE {
            return Err(SortError::InvalidConfig(format!(
                "bridge_width and bridge_height must not exceed {MAX_ELEMENT_SIDE}"
            )));
        }
        if self.dilate_passes == 0 {
            return Err(SortError::InvalidConfig(
                "dilate_passes must be at least 1".into(),
            ));
        }
        if self.erode_passes > self.dilate_passes {
            return Err(SortError::InvalidConfig(format!(
                "erode_passes ({}) must not exceed dilate_passes ({})",
                self.erode_passes, self.dilate_passes
            )));
        }
        Ok(())
    }

    pub fn row_labeler(&self) -> Result<RowLabeler> {
        Ok(RowLabeler::new(
            StructuringElement::rect(self.bridge_width, self.bridge_height)?,
            self.dilate_passes,
            self.erode_passes,
            self.row_connectivity,
        ))
    }
}

/// The primary output of the pipeline for a single image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SortReport {
    pub width: u32,
    pub height: u32,
    pub row_bands: u32,
    /// Extraction loop iterations; equals the number of components found.
    pub iterations: usize,
    pub collisions: Vec<Collision>,
    /// Blobs in reading order, ranks starting at 1.
    pub blobs: Vec<OrderedBlob>,
}

/// The main, top-level struct for the ordering engine.
#[derive(Debug, Clone)]
pub struct SortingPipeline {
    config: PipelineConfig,
}

impl SortingPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Orders the blobs of an already-binarized raster.
    pub fn sort_raster(&self, raster: &BinaryRaster) -> Result<SortReport> {
        let (width, height) = raster.dimensions();

        // Stage 1: Row Bands
        let rows = self.config.row_labeler()?.label(raster);
        debug!("{width}x{height} raster: {} row bands", rows.band_count());

        // Stage 2: Largest-First Extraction & Table Ordering
        let outcome = OrderingEngine::new(raster.clone(), rows)?.run()?;

        Ok(SortReport {
            width,
            height,
            row_bands: outcome.row_bands,
            iterations: outcome.iterations,
            collisions: outcome.collisions,
            blobs: outcome.blobs,
        })
    }

    /// Binarizes a decoded image with Otsu's level, then orders its blobs.
    pub fn sort_image(&self, image: &DynamicImage) -> Result<SortReport> {
        let raster = self.binarize(image);
        self.sort_raster(&raster)
    }

    /// Decodes, binarizes and orders the image at `path`.
    pub fn sort_path(&self, path: &Path) -> Result<SortReport> {
        let image = image::open(path)?;
        self.sort_image(&image)
    }

    pub fn binarize(&self, image: &DynamicImage) -> BinaryRaster {
        BinaryRaster::from_luma_otsu(&image.to_luma8(), self.config.invert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_erosion_stronger_than_dilation() {
        let config = PipelineConfig {
            dilate_passes: 1,
            erode_passes: 2,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            SortingPipeline::new(config),
            Err(SortError::InvalidConfig(_))
        ));
    }

    #[test]
    fn rejects_zero_bridge() {
        let config = PipelineConfig {
            bridge_width: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bridge_wider_than_element_limit() {
        let config = PipelineConfig {
            bridge_width: MAX_ELEMENT_SIDE + 1,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(SortError::InvalidConfig(_))));

        let widest = PipelineConfig {
            bridge_width: MAX_ELEMENT_SIDE,
            ..PipelineConfig::default()
        };
        assert!(widest.row_labeler().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "bridge_width": 60, "row_connectivity": "eight" }"#)
                .unwrap();
        assert_eq!(config.bridge_width, 60);
        assert_eq!(config.row_connectivity, Connectivity::Eight);
        assert_eq!(config.dilate_passes, DEFAULT_DILATE_PASSES);
        assert!(config.invert);
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = PipelineConfig {
            bridge_width: 42,
            erode_passes: 0,
            ..PipelineConfig::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn missing_config_file_reports_path() {
        let err = PipelineConfig::from_json_file(Path::new("/nonexistent/blob_order.json"))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/blob_order.json"));
    }

    #[test]
    fn sort_image_binarizes_dark_blobs() {
        let mut gray = image::GrayImage::from_pixel(60, 30, image::Luma([240]));
        for (x0, y0) in [(35u32, 5u32), (5, 5)] {
            for y in y0..y0 + 8 {
                for x in x0..x0 + 8 {
                    gray.put_pixel(x, y, image::Luma([15]));
                }
            }
        }
        let pipeline = SortingPipeline::new(PipelineConfig {
            bridge_width: 40,
            ..PipelineConfig::default()
        })
        .unwrap();

        let report = pipeline
            .sort_image(&DynamicImage::ImageLuma8(gray))
            .unwrap();
        assert_eq!(report.blobs.len(), 2);
        assert_eq!(report.blobs[0].bounding_rect.x, 5);
        assert_eq!(report.blobs[1].bounding_rect.x, 35);
    }
}
