use anyhow::{Context, Result};
use glob::glob;
use log::{error, info, warn};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Lists the `*.json` files directly inside `directory`, in path order.
pub fn find_json_files<P: AsRef<Path>>(directory: P) -> Result<Vec<PathBuf>> {
    let pattern = directory.as_ref().join("*.json");
    let pattern_str = pattern.to_string_lossy();
    info!("Searching for files matching pattern: {}", pattern_str);
    let mut paths: Vec<PathBuf> = glob(&pattern_str)
        .with_context(|| format!("Invalid glob pattern: {}", pattern_str))?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    if paths.is_empty() {
        warn!("No files found matching the pattern: {}", pattern_str);
    }
    Ok(paths)
}

/// Loads one researcher record.
///
/// Returns `Ok(None)` for zero-byte files, undecodable JSON, and documents
/// that are null, empty, or not objects. Only I/O failures are errors.
pub fn load_record(path: &Path) -> Result<Option<Value>> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to stat file: {}", path.display()))?;
    if metadata.len() == 0 {
        return Ok(None);
    }

    let contents = fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let record: Value = match serde_json::from_slice(&contents) {
        Ok(v) => v,
        Err(e) => {
            error!("JSON decode error in {}: {}", path.display(), e);
            return Ok(None);
        }
    };

    match &record {
        Value::Object(obj) if !obj.is_empty() => Ok(Some(record)),
        Value::Object(_) | Value::Null => Ok(None),
        _ => {
            warn!("Skipping {}: top-level JSON value is not an object", path.display());
            Ok(None)
        }
    }
}

/// Renders a JSON scalar the way it should appear in a CSV cell.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// `key` of `node` rendered as a cell, empty when absent.
pub fn field(node: &Value, key: &str) -> String {
    node.get(key).map(render_value).unwrap_or_default()
}

/// `key.subkey` of `node`, treating a missing or non-object `key` as empty.
pub fn nested_field(node: &Value, key: &str, subkey: &str) -> String {
    node.get(key)
        .and_then(Value::as_object)
        .and_then(|obj| obj.get(subkey))
        .map(render_value)
        .unwrap_or_default()
}

/// 1 when `key` holds a truthy value, 0 otherwise.
pub fn flag(node: &Value, key: &str) -> u8 {
    node.get(key).map_or(0, |v| u8::from(is_truthy(v)))
}

/// Every `@graph` entry whose `@type` equals `graph_type`.
pub fn graphs_of_type<'a>(record: &'a Value, graph_type: &'a str) -> impl Iterator<Item = &'a Map<String, Value>> + 'a {
    record
        .get("@graph")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
        .filter(move |g| g.get("@type").and_then(Value::as_str) == Some(graph_type))
}

/// The `items` of a typed `@graph` entry.
pub fn graph_items(graph: &Map<String, Value>) -> &[Value] {
    graph
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
