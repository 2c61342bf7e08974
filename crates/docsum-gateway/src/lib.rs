//! HTTP surface for the document analysis pipeline.
pub mod gateway_server;

pub use gateway_server::*;
