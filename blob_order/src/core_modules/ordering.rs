// THEORY:
// The `ordering` module is the top of the algorithmic stack. It turns a binary
// raster plus its row bands into a numbered, reading-order list of blobs.
//
// Key architectural principles:
// 1.  **Explicit State Machine**: The `OrderingEngine` is either `Extracting` or
//     `Done`. Each `step` peels exactly one component off the working raster, so the
//     loop is bounded by the number of components and can be driven one step at a
//     time for inspection.
// 2.  **Owned Working Raster**: The engine owns the only mutable copy of the raster.
//     Every extracted component is subtracted from it before the next step; nothing
//     else can observe or change it mid-run.
// 3.  **Arena Records**: Each extracted component becomes an immutable `BlobRecord`
//     stored at index `label - 1`. The label is the extraction order, which is by
//     area and carries no positional meaning.
// 4.  **Sparse Sorting Table**: Position is resolved by the `OrderingTable`, a grid
//     of `band_count` rows by image-width columns. A blob's label is written at
//     (band, rounded centroid x). Reading the table row-major yields top-to-bottom,
//     left-to-right order without any comparison sort.
//
// Two blobs landing on the same cell is a known limitation: the later write wins.
// The engine keeps that behaviour but logs it and reports the overwritten label.

use crate::core_modules::binary_raster::BinaryRaster;
use crate::core_modules::blob_detector::blob_detector::{
    ContourSource, ImageprocContours, LargestComponentExtractor,
};
use crate::core_modules::moment::{BoundingRect, Centroid, ComponentSummary};
use crate::core_modules::row_labeler::RowIndexRaster;
use crate::error::{Result, SortError};
use log::{debug, info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Extracting,
    Done,
}

/// Everything measured about one extracted component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlobRecord {
    /// 1-based extraction order.
    pub label: u32,
    pub centroid: Centroid,
    pub bounding_rect: BoundingRect,
    pub pixel_area: u64,
    pub contour_area: f64,
    pub row_band: u32,
}

/// A blob in its final reading-order position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderedBlob {
    /// 1-based reading-order rank.
    pub rank: u32,
    pub bounding_rect: BoundingRect,
    pub centroid: Centroid,
    pub row_band: u32,
    pub extraction_label: u32,
    pub pixel_area: u64,
}

/// A table cell that was written twice; only `label` survives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub row_band: u32,
    pub column: u32,
    pub overwritten_label: u32,
    pub label: u32,
}

/// Band-by-column grid of extraction labels, 0 = empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingTable {
    width: u32,
    bands: u32,
    cells: Vec<u32>,
}

impl OrderingTable {
    pub fn new(width: u32, bands: u32) -> Self {
        Self {
            width,
            bands,
            cells: vec![0; width as usize * bands as usize],
        }
    }

    pub fn bands(&self) -> u32 {
        self.bands
    }

    /// Writes `label` at (`band`, `column`); `band` is 1-based. Returns the label
    /// that previously occupied the cell, if any.
    pub fn place(&mut self, band: u32, column: u32, label: u32) -> Option<u32> {
        let index = (band as usize - 1) * self.width as usize + column as usize;
        let previous = std::mem::replace(&mut self.cells[index], label);
        (previous != 0).then_some(previous)
    }

    /// Occupied cells in row-major order.
    pub fn labels(&self) -> impl Iterator<Item = u32> + '_ {
        self.cells.iter().copied().filter(|&label| label != 0)
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderingOutcome {
    pub blobs: Vec<OrderedBlob>,
    pub records: Vec<BlobRecord>,
    pub iterations: usize,
    pub row_bands: u32,
    pub collisions: Vec<Collision>,
}

/// Drives largest-first extraction and builds the reading order.
pub struct OrderingEngine<S = ImageprocContours> {
    working: BinaryRaster,
    rows: RowIndexRaster,
    extractor: LargestComponentExtractor<S>,
    records: Vec<BlobRecord>,
    table: OrderingTable,
    collisions: Vec<Collision>,
    state: EngineState,
}

impl OrderingEngine {
    pub fn new(raster: BinaryRaster, rows: RowIndexRaster) -> Result<Self> {
        Self::with_extractor(raster, rows, LargestComponentExtractor::new())
    }
}

impl<S: ContourSource> OrderingEngine<S> {
    pub fn with_extractor(
        raster: BinaryRaster,
        rows: RowIndexRaster,
        extractor: LargestComponentExtractor<S>,
    ) -> Result<Self> {
        let row_dims = (rows.width(), rows.height());
        if raster.dimensions() != row_dims {
            return Err(SortError::DimensionMismatch {
                expected: raster.dimensions(),
                actual: row_dims,
            });
        }

        let table = OrderingTable::new(raster.width(), rows.band_count());
        let state = if raster.is_empty() {
            EngineState::Done
        } else {
            EngineState::Extracting
        };

        Ok(Self {
            working: raster,
            rows,
            extractor,
            records: Vec::new(),
            table,
            collisions: Vec::new(),
            state,
        })
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn records(&self) -> &[BlobRecord] {
        &self.records
    }

    /// What is left to extract.
    pub fn working_raster(&self) -> &BinaryRaster {
        &self.working
    }

    /// Extracts one component. A no-op once the engine is `Done`.
    pub fn step(&mut self) -> Result<EngineState> {
        if self.state == EngineState::Done {
            return Ok(self.state);
        }

        let Some(component) = self.extractor.extract(&self.working) else {
            if self.working.is_empty() {
                self.state = EngineState::Done;
                return Ok(self.state);
            }
            return Err(SortError::UnextractedForeground {
                remaining: self.working.foreground_count(),
            });
        };

        let label = self.records.len() as u32 + 1;
        let summary = ComponentSummary::measure(&component.mask);
        let (Some(centroid), Some(bounding_rect)) =
            (summary.moments.centroid(), summary.bounding_rect)
        else {
            return Err(SortError::DegenerateComponent { label });
        };

        let (column, row) = centroid.to_pixel(self.working.width(), self.working.height());
        let row_band = match self.rows.band_at(column, row) {
            0 => self
                .rows
                .first_band_under(&component.mask)
                .ok_or(SortError::UnassignedRow { label })?,
            band => band,
        };

        debug!(
            "blob {label}: centroid ({:.2}, {:.2}), bbox {:?}, {} px, band {row_band}",
            centroid.x,
            centroid.y,
            bounding_rect,
            summary.pixel_area()
        );

        if let Some(overwritten_label) = self.table.place(row_band, column, label) {
            warn!(
                "blob {label} shares ordering cell (band {row_band}, column {column}) with blob {overwritten_label}; blob {overwritten_label} is dropped"
            );
            self.collisions.push(Collision {
                row_band,
                column,
                overwritten_label,
                label,
            });
        }

        self.records.push(BlobRecord {
            label,
            centroid,
            bounding_rect,
            pixel_area: summary.pixel_area(),
            contour_area: component.contour_area,
            row_band,
        });

        self.working.subtract(&component.mask)?;
        if self.working.is_empty() {
            self.state = EngineState::Done;
        }
        Ok(self.state)
    }

    /// Runs to completion and emits the reading order.
    pub fn run(mut self) -> Result<OrderingOutcome> {
        while self.step()? == EngineState::Extracting {}
        Ok(self.finish())
    }

    fn finish(self) -> OrderingOutcome {
        let blobs: Vec<OrderedBlob> = self
            .table
            .labels()
            .zip(1u32..)
            .map(|(label, rank)| {
                let record = &self.records[label as usize - 1];
                OrderedBlob {
                    rank,
                    bounding_rect: record.bounding_rect,
                    centroid: record.centroid,
                    row_band: record.row_band,
                    extraction_label: record.label,
                    pixel_area: record.pixel_area,
                }
            })
            .collect();

        info!(
            "ordered {} blobs across {} row bands in {} iterations",
            blobs.len(),
            self.table.bands(),
            self.records.len()
        );

        OrderingOutcome {
            blobs,
            iterations: self.records.len(),
            row_bands: self.table.bands(),
            collisions: self.collisions,
            records: self.records,
        }
    }
}
