//! PostGIS storage: connection context, catalog repository and geometry importer

pub mod db_context;
pub mod importer;
pub mod repository;

pub use db_context::DbContext;
pub use importer::{Ogr2OgrImporter, build_ogr2ogr_args};
pub use repository::{PostgisRepository, TableMaintenance};
