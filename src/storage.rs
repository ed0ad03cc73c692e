//! Media files on local disk, laid out by owner id.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::AppError;

static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static regex"));

/// Reduces a client-supplied filename to a safe single path component.
pub fn sanitize_filename(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned = UNSAFE_CHARS.replace_all(base, "_");
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_owned()
    } else {
        cleaned.to_owned()
    }
}

pub fn product_preview_path(product_id: i32, filename: &str) -> String {
    format!(
        "products/product_{product_id}/preview/{}",
        sanitize_filename(filename)
    )
}

pub fn product_image_path(product_id: i32, filename: &str) -> String {
    format!(
        "products/product_{product_id}/images/{}",
        sanitize_filename(filename)
    )
}

pub fn order_receipt_path(filename: &str) -> String {
    format!("order/receipts/{}", sanitize_filename(filename))
}

pub fn upload_path(filename: &str) -> String {
    format!("uploads/{}", sanitize_filename(filename))
}

/// Writes `data` at `relative` under `root`, creating parent directories.
pub async fn save(root: &Path, relative: &str, data: &[u8]) -> Result<PathBuf, AppError> {
    let target = resolve(root, relative)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&target, data).await?;
    info!(path = %target.display(), bytes = data.len(), "Stored media file");
    Ok(target)
}

/// Writes `data` at `relative`, or at the first free `name_N.ext` sibling
/// when a file is already there. Returns the relative path actually used.
pub async fn save_unique(root: &Path, relative: &str, data: &[u8]) -> Result<String, AppError> {
    let (dir, name) = relative.rsplit_once('/').unwrap_or(("", relative));
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };

    let mut attempt = 0u32;
    loop {
        let candidate_name = match (attempt, ext) {
            (0, _) => name.to_owned(),
            (n, Some(ext)) => format!("{stem}_{n}.{ext}"),
            (n, None) => format!("{stem}_{n}"),
        };
        let candidate = if dir.is_empty() {
            candidate_name
        } else {
            format!("{dir}/{candidate_name}")
        };

        let target = resolve(root, &candidate)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .await
        {
            Ok(mut file) => {
                file.write_all(data).await?;
                file.flush().await?;
                info!(path = %target.display(), bytes = data.len(), "Stored media file");
                return Ok(candidate);
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => return Err(err.into()),
        }
    }
}

/// Best-effort removal of files stored by a request that later failed.
pub async fn discard(root: &Path, relatives: &[String]) {
    for relative in relatives {
        let Ok(target) = resolve(root, relative) else {
            continue;
        };
        if let Err(err) = fs::remove_file(&target).await {
            warn!(path = %target.display(), error = %err, "Failed to remove media file");
        }
    }
}

/// Maps a media-relative path to disk, refusing anything that would leave
/// the media root.
pub fn resolve(root: &Path, relative: &str) -> Result<PathBuf, AppError> {
    let mut target = root.to_path_buf();
    for part in relative.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." || part.contains('\\') {
            return Err(AppError::NotFound(format!("No media at {relative}")));
        }
        target.push(part);
    }
    Ok(target)
}
