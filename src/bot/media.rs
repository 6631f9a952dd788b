//! Downloading and storing image documents sent to the bot

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use image::ImageFormat;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tempfile::NamedTempFile;
use tracing::debug;

/// Largest image document accepted for an upload
pub const MAX_DOCUMENT_BYTES: u32 = 10 * 1024 * 1024;

pub async fn download_file(bot: &Bot, file_id: FileId) -> Result<Vec<u8>> {
    let file = bot.get_file(file_id).await?;
    let url = format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    );

    let response = reqwest::get(&url).await?.error_for_status()?;
    let bytes = response.bytes().await?;
    debug!(bytes = bytes.len(), "Downloaded file from Telegram");
    Ok(bytes.to_vec())
}

/// File extension for image bytes the bot can send back as a photo
pub fn detect_image_extension(bytes: &[u8]) -> Option<&'static str> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some("jpg"),
        ImageFormat::Png => Some("png"),
        ImageFormat::WebP => Some("webp"),
        _ => None,
    }
}

/// Write image bytes into `dir` under a fresh name and return the path
///
/// The file is written to a temporary name first and renamed into place.
pub fn store_image(bytes: &[u8], dir: &Path) -> Result<PathBuf> {
    let Some(extension) = detect_image_extension(bytes) else {
        bail!("unsupported image format");
    };
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create media directory {}", dir.display()))?;

    let name = format!(
        "{}_{:08x}.{extension}",
        Utc::now().format("%Y%m%d%H%M%S"),
        rand::random::<u32>()
    );
    let target = dir.join(name);

    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.as_file_mut().write_all(bytes)?;
    temp_file
        .persist(&target)
        .with_context(|| format!("Failed to store image at {}", target.display()))?;
    Ok(target)
}
