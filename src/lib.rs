pub mod core;
pub mod geoserver;
pub mod ingest;
pub mod logging;
pub mod orchestration;
pub mod security;
pub mod storage;

pub use crate::core::*;
pub use geoserver::{CallOutcome, GeoServerClient};
pub use orchestration::{
    MirrorRequest, PublicationOrchestrator, PublishPlan, ShapefileService, UploadRequest,
    UploadResult,
};
pub use security::{CommandError, SafeCommandExecutor};
pub use storage::{DbContext, Ogr2OgrImporter, PostgisRepository};
