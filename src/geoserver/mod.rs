//! GeoServer administrative API access
//!
//! The map-server side of publication: a REST client implementing
//! [`MapServerAdmin`](crate::core::MapServerAdmin) and the response
//! classification it relies on.

pub mod client;
pub mod response;

pub use client::GeoServerClient;
pub use response::CallOutcome;
