// THEORY:
// This file is the main entry point for the `blob_order` library crate.
// It exports the `SortingPipeline` and its associated data structures
// (`PipelineConfig`, `SortReport`, `OrderedBlob`) as the high-level interface for
// numbering blobs in reading order, plus the `ParallelPipeline` for batches.
//
// The algorithmic layers (`core_modules`) stay public so callers can drive a single
// stage on its own, e.g. isolate the largest blob or inspect the row bands.

#![doc = include_str!("../README.md")]

pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use error::{Result, SortError};
pub use pipeline::{PipelineConfig, SortReport, SortingPipeline};
