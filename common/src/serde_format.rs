//! Text serialization helpers for settings files.

use std::path::Path;

use anyhow::{Context, bail};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    /// Pick the format from a file extension (`yaml`, `yml`, `json`).
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
            bail!("Missing file extension: {}", path.display());
        };

        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Ok(Self::Yaml)
        } else if ext.eq_ignore_ascii_case("json") {
            Ok(Self::Json)
        } else {
            bail!("Unsupported file extension for file: {}", path.display())
        }
    }
}

pub fn serialize<T: Serialize>(value: &T, format: FileFormat) -> anyhow::Result<String> {
    let text = match format {
        FileFormat::Yaml => serde_yml::to_string(value)?,
        FileFormat::Json => serde_json::to_string_pretty(value)?,
    };
    Ok(text)
}

pub fn deserialize<T: DeserializeOwned>(text: &str, format: FileFormat) -> anyhow::Result<T> {
    let value = match format {
        FileFormat::Yaml => serde_yml::from_str(text)?,
        FileFormat::Json => serde_json::from_str(text)?,
    };
    Ok(value)
}

pub fn save_to_file<T: Serialize>(value: &T, path: &Path) -> anyhow::Result<()> {
    let format = FileFormat::from_path(path)?;
    let text = serialize(value, format)?;
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

pub fn load_from_file<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let format = FileFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    deserialize(&text, format).with_context(|| format!("Failed to parse {}", path.display()))
}
