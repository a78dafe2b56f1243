//! demoproc - demo analysis service.
//!
//! Accepts an uploaded game demo, runs an external analyzer over it inside a
//! request-scoped scratch workspace, and returns the extracted data as a zip
//! archive. The workspace is removed once the archive has been sent.

pub mod analysis;
pub mod archive;
pub mod cli;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod utils;
pub mod workspace;
