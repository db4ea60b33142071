use std::fs;
use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;

/// Reads a JSON array file as raw values. A missing or blank file is an
/// empty list; anything that is not a JSON array is an error.
pub fn load_json_values(path: &Path) -> Result<Vec<Value>, StoreError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    if contents.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&contents)?)
}

/// Decodes each element on its own. Returns the decoded items and the raw
/// elements that did not fit `T`, which are logged.
pub fn decode_list<T: DeserializeOwned>(path: &Path, values: Vec<Value>) -> (Vec<T>, Vec<Value>) {
    let mut items = Vec::with_capacity(values.len());
    let mut rejected = Vec::new();
    for (idx, value) in values.into_iter().enumerate() {
        match T::deserialize(&value) {
            Ok(item) => items.push(item),
            Err(e) => {
                log::warn!("Skipping entry {} of {}: {}", idx, path.display(), e);
                rejected.push(value);
            }
        }
    }
    (items, rejected)
}

/// Every element of the file that decodes as `T`. An unreadable or malformed
/// file is logged and read as empty.
pub fn read_json_list<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    match load_json_values(path) {
        Ok(values) => decode_list(path, values).0,
        Err(e) => {
            log::warn!("Ignoring unreadable {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Adds one item at the end of the file. Existing elements are written back
/// untouched, whether or not they decode; a file that cannot be read is left
/// alone and the error returned.
pub fn append_json_item<T: Serialize>(path: &Path, item: &T) -> Result<(), StoreError> {
    let mut values = load_json_values(path)?;
    values.push(serde_json::to_value(item)?);
    write_json_list(path, &values)
}

/// Rewrites the whole file as a pretty-printed JSON array.
pub fn write_json_list<T: Serialize>(path: &Path, items: &[T]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(items)?;
    fs::write(path, json)?;
    Ok(())
}

/// Removes the file; a file that is already gone counts as removed.
pub fn remove_file(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
