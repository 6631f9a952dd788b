//! Registry of forum sections (services) whose staff the bot presents.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// A forum section with a fixed id and a display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    #[serde(alias = "display_name")]
    pub name: String,
}

impl Section {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Ordered, immutable mapping from section id to display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionRegistry {
    sections: Vec<Section>,
}

impl Default for SectionRegistry {
    fn default() -> Self {
        Self {
            sections: vec![
                Section::new("vneucheb", "Внеучебная служба"),
                Section::new("edu", "Образовательная служба"),
                Section::new("press", "Пресса"),
                Section::new("food", "Служба питания"),
                Section::new("accom", "Служба размещения"),
                Section::new("members", "Служба по работе с участниками"),
            ],
        }
    }
}

impl SectionRegistry {
    /// Build a registry, rejecting empty, malformed or duplicate ids
    pub fn new(sections: Vec<Section>) -> Result<Self> {
        if sections.is_empty() {
            bail!("section registry must not be empty");
        }
        for (index, section) in sections.iter().enumerate() {
            if !is_valid_section_id(&section.id) {
                bail!("invalid section id {:?}", section.id);
            }
            if sections[..index].iter().any(|other| other.id == section.id) {
                bail!("duplicate section id {:?}", section.id);
            }
        }
        Ok(Self { sections })
    }

    /// Load a registry from a JSON array of `{"id", "name"}` objects
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read sections file {}", path.display()))?;
        let sections: Vec<Section> = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse sections file {}", path.display()))?;
        Self::new(sections)
    }

    pub fn get(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|section| section.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}

/// Section ids travel inside callback data, so keep them short and plain
fn is_valid_section_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 32
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
