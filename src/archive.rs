//! Packaging analysis output into a zip and streaming it back.
//!
//! The response body owns the [`WorkspaceLease`], so the workspace (and the
//! archive on disk) stays alive until the last chunk has been handed to the
//! transport, or until the body is dropped because the client went away.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use axum::{
    body::{Body, Bytes},
    http::{header, StatusCode},
    response::Response,
};
use futures::Stream;
use thiserror::Error;
use tokio::io::AsyncReadExt;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::workspace::WorkspaceLease;

/// Chunk size used when streaming the archive.
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Errors building or sending the archive.
#[derive(Debug, Error)]
pub enum PackagingError {
    #[error("Failed to create archive: {0}")]
    Create(#[source] io::Error),

    #[error("Failed to read analysis output: {0}")]
    Read(#[source] io::Error),

    #[error("Output entry has an unsafe path")]
    UnsafePath,

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Failed to build response: {0}")]
    Response(#[from] axum::http::Error),
}

/// Zip every file under `output_dir` into `destination`.
///
/// Entry names are paths relative to `output_dir` with `/` separators.
/// `destination` must not be inside `output_dir`. A partially written
/// archive is removed on failure.
pub fn package(output_dir: &Path, destination: &Path) -> Result<PathBuf, PackagingError> {
    let mut entries = Vec::new();
    collect_files(output_dir, output_dir, &mut entries)?;
    entries.sort_by(|a, b| a.1.cmp(&b.1));

    let result = write_zip(&entries, destination);
    if result.is_err() {
        let _ = fs::remove_file(destination);
    }
    result?;

    tracing::debug!("Packaged {} files", entries.len());
    Ok(destination.to_path_buf())
}

fn write_zip(entries: &[(PathBuf, String)], destination: &Path) -> Result<(), PackagingError> {
    let file = File::create(destination).map_err(PackagingError::Create)?;
    let mut zip = ZipWriter::new(BufWriter::new(file));

    for (path, name) in entries {
        let mut source = File::open(path).map_err(PackagingError::Read)?;
        let size = source.metadata().map_err(PackagingError::Read)?.len();
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(size >= u32::MAX as u64);
        zip.start_file(name.as_str(), options)?;
        io::copy(&mut source, &mut zip).map_err(PackagingError::Create)?;
    }

    let mut inner = zip.finish()?;
    inner.flush().map_err(PackagingError::Create)?;
    Ok(())
}

/// Recursively gather `(absolute path, entry name)` for regular files.
fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<(PathBuf, String)>,
) -> Result<(), PackagingError> {
    for entry in fs::read_dir(dir).map_err(PackagingError::Read)? {
        let entry = entry.map_err(PackagingError::Read)?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(PackagingError::Read)?;

        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            let name = entry_name(root, &path)?;
            out.push((path, name));
        } else {
            tracing::warn!("Skipping non-regular output entry {:?}", entry.file_name());
        }
    }
    Ok(())
}

/// Archive entry name for `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> Result<String, PackagingError> {
    let relative = path
        .strip_prefix(root)
        .map_err(|_| PackagingError::UnsafePath)?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            _ => return Err(PackagingError::UnsafePath),
        }
    }

    if parts.is_empty() {
        return Err(PackagingError::UnsafePath);
    }
    Ok(parts.join("/"))
}

/// Stream `archive_path` as the response body.
///
/// Takes ownership of the lease: the workspace is torn down when the body
/// finishes or is dropped, not when this function returns.
pub async fn respond(
    lease: WorkspaceLease,
    archive_path: &Path,
    download_name: &str,
) -> Result<Response, PackagingError> {
    let file = tokio::fs::File::open(archive_path)
        .await
        .map_err(PackagingError::Read)?;
    let len = file.metadata().await.map_err(PackagingError::Read)?.len();

    let body = Body::from_stream(archive_stream(ArchiveStream { file, lease }));

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/zip")
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, content_disposition(download_name))
        .body(body)?;
    Ok(response)
}

/// Stream state. Field order matters: the file handle is closed before the
/// lease removes the directory it lives in.
struct ArchiveStream {
    file: tokio::fs::File,
    lease: WorkspaceLease,
}

fn archive_stream(state: ArchiveStream) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    futures::stream::try_unfold(state, |mut state| async move {
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        let n = state.file.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!("Archive for workspace {} fully sent", state.lease.id());
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((Bytes::from(buf), state)))
    })
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 name.
fn content_disposition(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(filename)
    )
}
