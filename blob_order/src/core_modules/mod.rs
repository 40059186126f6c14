pub mod binary_raster;
pub mod blob_detector;
pub mod moment;
pub mod morphology;
pub mod ordering;
pub mod row_labeler;
