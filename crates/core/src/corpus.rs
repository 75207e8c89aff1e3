use crate::models::Document;
use crate::IngestError;
use std::fs;
use std::path::Path;

/// Writes the prepared corpus as a pretty-printed JSON array.
pub fn write_corpus(path: &Path, documents: &[Document]) -> Result<(), IngestError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(documents)?;
    fs::write(path, json)?;
    Ok(())
}

pub fn read_corpus(path: &Path) -> Result<Vec<Document>, IngestError> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}
