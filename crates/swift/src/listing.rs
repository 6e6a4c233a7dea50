//! Translation of SWIFT JSON listings into [`FileInfo`] records

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use swiftfs_vfs::{FileInfo, FileType, Result, VfsError};

/// Raw listing keys that are normalized into `FileInfo` fields rather than
/// passed through
const KNOWN_FIELDS: [&str; 4] = ["bytes", "name", "size", "type"];

/// Marker key of pseudo-directory entries in delimiter listings
const SUBDIR: &str = "subdir";

fn passthrough(raw: &Map<String, Value>) -> BTreeMap<String, Value> {
    raw.iter()
        .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

fn name_of(raw: &Map<String, Value>) -> Result<&str> {
    raw.get("name").and_then(Value::as_str).ok_or_else(|| {
        VfsError::Decode(format!(
            "listing entry without name: {}",
            Value::Object(raw.clone())
        ))
    })
}

/// Translate one entry of an object listing.
///
/// `prefix` is the container's listing prefix (`swift://host/account/container/`).
pub fn translate(prefix: &str, raw: &Map<String, Value>) -> Result<FileInfo> {
    if let Some(subdir) = raw.get(SUBDIR) {
        let subdir = subdir
            .as_str()
            .ok_or_else(|| VfsError::Decode(format!("non-string subdir marker: {subdir}")))?;
        let subdir = subdir.strip_suffix('/').unwrap_or(subdir);
        return Ok(FileInfo::directory(format!("{prefix}{subdir}")));
    }

    let name = name_of(raw)?;
    let size = raw
        .get("bytes")
        .and_then(Value::as_u64)
        .ok_or_else(|| VfsError::Decode(format!("listing entry '{name}' without byte count")))?;

    Ok(FileInfo {
        name: format!("{prefix}{name}"),
        size: Some(size),
        file_type: FileType::File,
        extra: passthrough(raw),
    })
}

/// Translate one entry of an account listing into a container directory.
///
/// `prefix` is the account's listing prefix (`swift://host/account/`).
pub fn translate_container(prefix: &str, raw: &Map<String, Value>) -> Result<FileInfo> {
    let name = name_of(raw)?;
    Ok(FileInfo {
        name: format!("{prefix}{name}"),
        size: None,
        file_type: FileType::Directory,
        extra: passthrough(raw),
    })
}

/// Parse a JSON listing body and translate every entry with `each`
pub fn translate_all(
    body: &[u8],
    prefix: &str,
    each: fn(&str, &Map<String, Value>) -> Result<FileInfo>,
) -> Result<Vec<FileInfo>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<Map<String, Value>> = serde_json::from_slice(body)?;
    let infos = entries
        .iter()
        .map(|raw| each(prefix, raw))
        .collect::<Result<Vec<_>>>()?;
    tracing::trace!(prefix, count = infos.len(), "translated listing");
    Ok(infos)
}
