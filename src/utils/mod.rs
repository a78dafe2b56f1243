//! Shared utility functions.
//!
//! - `filename`: turning client-supplied names into safe path components
//! - `format`: human-readable sizes for logs and CLI output

mod filename;
mod format;

pub use filename::{download_name, sanitize_upload_name};
pub use format::format_size;
