//! Orchestration layer for shapefile publishing
//!
//! [`PublicationOrchestrator`] drives the map-server publication sequence for
//! a single layer; [`ShapefileService`] wraps it with archive extraction and
//! the PostGIS import to form the complete upload pipeline.

pub mod layer_publisher;
pub mod shapefile_service;

pub use layer_publisher::{MIN_SLD_LENGTH, MirrorRequest, PublicationOrchestrator, PublishPlan};
pub use shapefile_service::{STATUS_PUBLISHED, ShapefileService, UploadRequest, UploadResult};
