//! Multipart intake: streaming the single uploaded file into a workspace.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Multipart, MultipartError};
use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;

use crate::error::ProcessError;
use crate::utils::sanitize_upload_name;

/// Form field carrying the demo.
pub const FILE_FIELD: &str = "file";

/// An upload persisted into a workspace's `input/` directory.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    /// Where the bytes landed.
    pub path: PathBuf,
    /// Sanitized client filename.
    pub name: String,
    /// Bytes written.
    pub size: u64,
}

/// Stream the one file field of `multipart` into `input_dir`.
///
/// Plain text fields under other names are ignored. A missing file field,
/// a `file` part without a filename, a second `file` field, or a file under
/// any other field name is rejected.
pub async fn receive_upload(
    multipart: &mut Multipart,
    input_dir: &Path,
    limit: usize,
) -> Result<StoredUpload, ProcessError> {
    let mut stored: Option<StoredUpload> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        if field_name != FILE_FIELD {
            if field.file_name().is_some() {
                return Err(ProcessError::InvalidUpload(format!(
                    "unexpected file field '{}', send the demo as '{}'",
                    field_name, FILE_FIELD
                )));
            }
            continue;
        }

        if stored.is_some() {
            return Err(ProcessError::InvalidUpload(
                "exactly one file may be uploaded per request".to_string(),
            ));
        }

        let Some(file_name) = field.file_name().map(str::to_string) else {
            return Err(ProcessError::InvalidUpload(format!(
                "'{}' must be a file upload, not a text field",
                FILE_FIELD
            )));
        };

        let name = sanitize_upload_name(Some(&file_name));
        let path = input_dir.join(&name);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ProcessError::Upload(e.to_string()))?;

        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
            size += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| ProcessError::Upload(e.to_string()))?;
        }
        file.flush()
            .await
            .map_err(|e| ProcessError::Upload(e.to_string()))?;

        stored = Some(StoredUpload { path, name, size });
    }

    stored.ok_or_else(|| {
        ProcessError::InvalidUpload(format!("missing '{}' field", FILE_FIELD))
    })
}

fn multipart_error(err: MultipartError, limit: usize) -> ProcessError {
    let status = err.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ProcessError::UploadTooLarge { limit }
    } else if status.is_client_error() {
        ProcessError::InvalidUpload(err.body_text())
    } else {
        ProcessError::Upload(err.body_text())
    }
}
