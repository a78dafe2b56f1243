//! `POST /demo`: upload a demo, get back a zip of its analysis.

use axum::{
    extract::{Multipart, State},
    response::{IntoResponse, Response},
};

use super::super::AppState;
use super::upload::receive_upload;
use crate::archive;
use crate::error::ProcessError;
use crate::utils::{download_name, format_size};

/// Process an uploaded demo.
///
/// The workspace is allocated before the body is read. Any error drops the
/// lease on the way out, so the workspace is gone before the error response
/// is built; on success the lease rides along inside the response body.
pub async fn process_demo(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    match handle_upload(&state, &mut multipart).await {
        Ok(response) => response,
        Err(e) => {
            if e.status().is_server_error() {
                tracing::error!("Demo processing failed: {}", e);
            } else {
                tracing::warn!("Rejected demo upload: {}", e);
            }
            e.into_api_error(state.processor.workspaces().scratch_root())
                .into_response()
        }
    }
}

async fn handle_upload(state: &AppState, multipart: &mut Multipart) -> Result<Response, ProcessError> {
    let lease = state.processor.allocate()?;

    let upload = receive_upload(multipart, lease.input_dir(), state.max_upload_bytes).await?;
    tracing::info!(
        "Received {} ({}) into workspace {}",
        upload.name,
        format_size(upload.size),
        lease.id()
    );

    let archive_path = state
        .processor
        .analyze_and_package(&lease, &upload.path)
        .await?;

    let response = archive::respond(lease, &archive_path, &download_name(&upload.name)).await?;
    Ok(response)
}
