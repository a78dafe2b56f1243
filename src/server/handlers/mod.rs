//! HTTP request handlers for the web server.

mod api;
mod demo;
mod upload;

// Re-export handlers for use by the router
pub use api::{health, list_categories, CategoryInfo};
pub use demo::process_demo;
pub use upload::{receive_upload, StoredUpload, FILE_FIELD};
