//! One-time import of the flat-file layout used by earlier deployments.
//!
//! ```text
//! <legacy>/faq.txt
//! <legacy>/menu.txt
//! <legacy>/map.jpg
//! <legacy>/section_info.txt          key||text per line
//! <legacy>/photo_sections/<id>/*.jpg  one folder per section, plus `directorate`
//! ```
//!
//! Only slots that are still absent from the store are filled, so running
//! the import on every start is harmless. Images are copied into the media
//! directory; the legacy tree is never modified.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::content::{PhotoRef, SlotContent, SlotId};
use crate::sections::SectionRegistry;
use crate::store::ContentStore;

const FAQ_FILE: &str = "faq.txt";
const MENU_FILE: &str = "menu.txt";
const MAP_FILE: &str = "map.jpg";
const SECTION_INFO_FILE: &str = "section_info.txt";
const PHOTO_SECTIONS_DIR: &str = "photo_sections";
const DIRECTORATE_FOLDER: &str = "directorate";
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// What an import run did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    /// Slots filled from legacy files
    pub imported: Vec<SlotId>,
    /// Slots left alone because the store already had content
    pub kept: Vec<SlotId>,
    /// Section ids found in legacy files but not registered
    pub unknown_sections: Vec<String>,
}

/// Import legacy files from `legacy_dir` into absent slots
pub async fn import_legacy<S: ContentStore>(
    store: &S,
    sections: &SectionRegistry,
    legacy_dir: &Path,
    media_dir: &Path,
) -> Result<ImportReport> {
    info!(legacy_dir = %legacy_dir.display(), "Importing legacy content");
    let mut candidates: Vec<(SlotId, LegacyContent)> = Vec::new();

    if let Some(text) = read_text(&legacy_dir.join(FAQ_FILE))? {
        candidates.push((SlotId::Faq, LegacyContent::Text(text)));
    }
    if let Some(text) = read_text(&legacy_dir.join(MENU_FILE))? {
        candidates.push((SlotId::Menu, LegacyContent::Text(text)));
    }
    let map = legacy_dir.join(MAP_FILE);
    if map.is_file() {
        candidates.push((SlotId::Map, LegacyContent::Photos(vec![map])));
    }

    let mut unknown_sections = Vec::new();
    let mut section_texts: Vec<(String, String)> = Vec::new();
    if let Some(raw) = read_text(&legacy_dir.join(SECTION_INFO_FILE))? {
        section_texts = parse_section_info(&raw);
    }
    let section_photos = list_section_folders(&legacy_dir.join(PHOTO_SECTIONS_DIR))?;

    for (folder, photos) in &section_photos {
        if folder == DIRECTORATE_FOLDER {
            candidates.push((SlotId::Directorate, LegacyContent::Photos(photos.clone())));
        }
    }

    for section in sections.iter() {
        let text = section_texts
            .iter()
            .find(|(id, _)| *id == section.id)
            .map(|(_, text)| text.clone());
        let photos = section_photos
            .iter()
            .find(|(id, _)| *id == section.id)
            .map(|(_, photos)| photos.clone())
            .unwrap_or_default();
        if text.is_some() || !photos.is_empty() {
            candidates.push((
                SlotId::Section(section.id.clone()),
                LegacyContent::Section { text, photos },
            ));
        }
    }

    let known = |id: &str| id == DIRECTORATE_FOLDER || sections.contains(id);
    for id in section_texts
        .iter()
        .map(|(id, _)| id)
        .chain(section_photos.iter().map(|(id, _)| id))
    {
        if !known(id) && !unknown_sections.contains(id) {
            warn!(section = %id, "Skipping legacy content of unregistered section");
            unknown_sections.push(id.clone());
        }
    }

    let mut report = ImportReport {
        unknown_sections,
        ..ImportReport::default()
    };
    for (slot, legacy) in candidates {
        if store.get(&slot).await?.is_some() {
            debug!(slot = %slot, "Slot already has content, legacy copy ignored");
            report.kept.push(slot);
            continue;
        }
        let content = legacy.into_content(&slot, media_dir)?;
        store.set(&slot, content).await?;
        info!(slot = %slot, "Imported legacy content");
        report.imported.push(slot);
    }

    info!(
        imported = report.imported.len(),
        kept = report.kept.len(),
        unknown = report.unknown_sections.len(),
        "Legacy import finished"
    );
    Ok(report)
}

enum LegacyContent {
    Text(String),
    Photos(Vec<PathBuf>),
    Section {
        text: Option<String>,
        photos: Vec<PathBuf>,
    },
}

impl LegacyContent {
    fn into_content(self, slot: &SlotId, media_dir: &Path) -> Result<SlotContent> {
        let (text, photos) = match self {
            LegacyContent::Text(text) => (Some(text), Vec::new()),
            LegacyContent::Photos(photos) => (None, photos),
            LegacyContent::Section { text, photos } => (text, photos),
        };
        let photos = copy_into_media(slot, &photos, media_dir)?;
        Ok(SlotContent { text, photos })
    }
}

fn copy_into_media(slot: &SlotId, files: &[PathBuf], media_dir: &Path) -> Result<Vec<PhotoRef>> {
    if files.is_empty() {
        return Ok(Vec::new());
    }
    let target_dir = media_dir.join(slot.media_dir_name());
    fs::create_dir_all(&target_dir)
        .with_context(|| format!("Failed to create media directory {}", target_dir.display()))?;

    let mut photos = Vec::with_capacity(files.len());
    for (index, source) in files.iter().enumerate() {
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("jpg")
            .to_ascii_lowercase();
        let target = target_dir.join(format!("legacy_{:03}.{extension}", index + 1));
        fs::copy(source, &target)
            .with_context(|| format!("Failed to copy legacy image {}", source.display()))?;
        photos.push(PhotoRef::Local(target));
    }
    Ok(photos)
}

/// Read a UTF-8 file, `None` when it is missing or blank
fn read_text(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read legacy file {}", path.display()))?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// Parse `key||text` lines; the last line for a key wins
pub fn parse_section_info(raw: &str) -> Vec<(String, String)> {
    let mut entries: Vec<(String, String)> = Vec::new();
    for line in raw.lines() {
        let Some((key, text)) = line.trim().split_once("||") else {
            continue;
        };
        let (key, text) = (key.trim(), text.trim());
        if key.is_empty() || text.is_empty() {
            continue;
        }
        match entries.iter_mut().find(|(existing, _)| existing == key) {
            Some(entry) => entry.1 = text.to_string(),
            None => entries.push((key.to_string(), text.to_string())),
        }
    }
    entries
}

/// Image files of every section folder, sorted by file name
fn list_section_folders(root: &Path) -> Result<Vec<(String, Vec<PathBuf>)>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut folders = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("Failed to list {}", root.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let photos = list_images(&entry.path())?;
        if !photos.is_empty() {
            folders.push((name, photos));
        }
    }
    folders.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(folders)
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    images.sort();
    Ok(images)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
