//! Upload ingestion: zip extraction and shapefile discovery

pub mod archive;

pub use archive::{ExtractedShapefile, ExtractionWorkspace, ensure_zip_extension, prepare_upload};
