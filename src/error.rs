//! Request-level error taxonomy and its HTTP mapping.

use std::path::Path;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::analysis::{AnalysisError, InvokeError};
use crate::archive::PackagingError;
use crate::workspace::WorkspaceError;

/// Everything that can end a processing request early.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Failed to allocate workspace: {0}")]
    Resource(#[from] WorkspaceError),

    #[error("Failed to upload file: {0}")]
    Upload(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },

    #[error("Error processing demo: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("No data could be extracted from the demo.")]
    NoData,

    #[error("Error packaging results: {0}")]
    Packaging(#[from] PackagingError),
}

impl From<InvokeError> for ProcessError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::Analysis(e) => ProcessError::Analysis(e),
            InvokeError::NoData => ProcessError::NoData,
        }
    }
}

impl ProcessError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProcessError::InvalidUpload(_) => StatusCode::BAD_REQUEST,
            ProcessError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProcessError::NoData => StatusCode::UNPROCESSABLE_ENTITY,
            ProcessError::Resource(_)
            | ProcessError::Upload(_)
            | ProcessError::Analysis(_)
            | ProcessError::Packaging(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to a client-facing error with paths under the scratch root
    /// scrubbed from the message.
    pub fn into_api_error(self, scratch_root: &Path) -> ApiError {
        let status = self.status();
        let message = redact_paths(&self.to_string(), &scratch_root.to_string_lossy());
        ApiError { status, message }
    }
}

/// Replace every path starting with `root` (up to the next whitespace or
/// quote) with a placeholder.
///
/// Only whole path tokens count: `root` must start a token and be followed
/// by a separator or the end of the token, so a relative root such as
/// `temp` leaves words like "attempted" alone.
fn redact_paths(message: &str, root: &str) -> String {
    if root.is_empty() {
        return message.to_string();
    }

    let mut out = String::with_capacity(message.len());
    let mut copied = 0;
    let mut search = 0;
    while let Some(offset) = message[search..].find(root) {
        let start = search + offset;
        let after = start + root.len();

        let starts_token = message[..start]
            .chars()
            .next_back()
            .map_or(true, |c| ends_token(c) || matches!(c, '(' | '[' | '<' | '=' | ','));
        let continues_path = root.ends_with(['/', '\\'])
            || message[after..]
                .chars()
                .next()
                .map_or(true, |c| matches!(c, '/' | '\\' | ':' | ',' | ')') || ends_token(c));

        if !(starts_token && continues_path) {
            search = start + root.chars().next().map_or(1, char::len_utf8);
            continue;
        }

        out.push_str(&message[copied..start]);
        out.push_str("<file>");
        let end = message[after..]
            .find(ends_token)
            .map_or(message.len(), |i| after + i);
        copied = end;
        search = end;
    }
    out.push_str(&message[copied..]);
    out
}

fn ends_token(c: char) -> bool {
    c.is_whitespace() || c == '\'' || c == '"'
}

/// JSON error body: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProcessError::NoData.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            ProcessError::InvalidUpload("no file".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ProcessError::UploadTooLarge { limit: 10 }.status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ProcessError::Analysis(AnalysisError::Timeout(5)).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ProcessError::from(InvokeError::NoData).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_scratch_root_redacted() {
        let root = Path::new("/var/cache/demoproc/scratch");
        let err = ProcessError::Analysis(AnalysisError::ParseFailed(
            "cannot open /var/cache/demoproc/scratch/1234/input/match.dem".into(),
        ));

        let api = err.into_api_error(root);
        assert_eq!(api.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            api.message,
            "Error processing demo: Failed to parse demo: cannot open <file>"
        );
    }

    #[test]
    fn test_redact_multiple_paths() {
        let root = "/tmp/scratch";
        assert_eq!(
            redact_paths("'/tmp/scratch/a/x.dem' and /tmp/scratch/b: bad", root),
            "'<file>' and <file> bad"
        );
        assert_eq!(redact_paths("nothing here", root), "nothing here");
        assert_eq!(redact_paths("unchanged", ""), "unchanged");
    }

    #[test]
    fn test_relative_root_only_matches_whole_paths() {
        let root = "temp";
        assert_eq!(
            redact_paths("attempted to read temp/1234/input/match.dem: truncated", root),
            "attempted to read <file> truncated"
        );
        assert_eq!(
            redact_paths("temperature of temp", root),
            "temperature of <file>"
        );
        assert_eq!(redact_paths("contemporary attempts", root), "contemporary attempts");
    }

    #[test]
    fn test_relative_scratch_root_in_api_error() {
        let err = ProcessError::Upload("attempted write to temp/ab/input/x.dem failed".into());
        let api = err.into_api_error(Path::new("temp"));
        assert_eq!(
            api.message,
            "Failed to upload file: attempted write to <file> failed"
        );
    }
}
