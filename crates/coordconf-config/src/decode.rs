//! Decoding node data into flat property maps
//!
//! Node payloads are opaque bytes in the store. A configuration unit decodes
//! them with its [`NodeDataFormat`] and flattens nested tables/objects into
//! dotted keys (`db.pool.size`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::{ConfigError, Result};

/// Flat property map: dotted key -> value.
pub type PropertyMap = BTreeMap<String, Value>;

/// Format of the data stored on a configuration unit's node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeDataFormat {
    /// `key=value` / `key: value` lines
    #[default]
    Properties,
    /// TOML document
    Toml,
    /// JSON object
    Json,
}

impl std::fmt::Display for NodeDataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Properties => write!(f, "properties"),
            Self::Toml => write!(f, "toml"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Decode the payload of the node at `path`.
///
/// Empty (or whitespace-only) payloads decode to an empty map in every format.
pub fn decode(path: &str, bytes: &[u8], format: NodeDataFormat) -> Result<PropertyMap> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| ConfigError::decode(path, format, format!("invalid UTF-8: {e}")))?;

    if text.trim().is_empty() {
        return Ok(PropertyMap::new());
    }

    match format {
        NodeDataFormat::Properties => Ok(parse_properties(text)),
        NodeDataFormat::Toml => {
            let table: toml::Table = toml::from_str(text)
                .map_err(|e| ConfigError::decode(path, format, format!("TOML parse error: {e}")))?;
            let value = serde_json::to_value(table)
                .map_err(|e| ConfigError::decode(path, format, e.to_string()))?;
            Ok(flatten(value))
        }
        NodeDataFormat::Json => {
            let value: Value = serde_json::from_str(text)
                .map_err(|e| ConfigError::decode(path, format, format!("JSON parse error: {e}")))?;
            if !value.is_object() {
                return Err(ConfigError::decode(
                    path,
                    format,
                    "top-level JSON value must be an object",
                ));
            }
            Ok(flatten(value))
        }
    }
}

/// Parse a properties document.
///
/// Lines starting with `#` or `!` are comments. The key ends at the first
/// `=` or `:`; a line ending in an unescaped `\` continues on the next line.
fn parse_properties(text: &str) -> PropertyMap {
    let mut map = PropertyMap::new();
    let mut pending = String::new();

    for raw in text.lines() {
        let line = raw.trim_start();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#') || line.starts_with('!'))
        {
            continue;
        }

        let trailing_backslashes = line.chars().rev().take_while(|c| *c == '\\').count();
        if trailing_backslashes % 2 == 1 {
            pending.push_str(&line[..line.len() - 1]);
            continue;
        }
        pending.push_str(line);

        let entry = std::mem::take(&mut pending);
        insert_entry(&mut map, &entry);
    }

    if !pending.is_empty() {
        insert_entry(&mut map, &pending);
    }

    map
}

/// Split one logical line at the first `=` or `:`; a bare key maps to "".
fn insert_entry(map: &mut PropertyMap, entry: &str) {
    let (key, value) = match entry.find(['=', ':']) {
        Some(idx) => (&entry[..idx], &entry[idx + 1..]),
        None => (entry, ""),
    };
    let key = key.trim();
    if !key.is_empty() {
        map.insert(key.to_string(), Value::String(value.trim().to_string()));
    }
}

/// Flatten nested objects into dotted keys; arrays and scalars are leaves.
fn flatten(value: Value) -> PropertyMap {
    let mut map = PropertyMap::new();
    if let Value::Object(object) = value {
        flatten_into(&mut map, None, object);
    }
    map
}

fn flatten_into(map: &mut PropertyMap, prefix: Option<&str>, object: Map<String, Value>) {
    for (key, value) in object {
        let full_key = match prefix {
            Some(prefix) => format!("{prefix}.{key}"),
            None => key,
        };
        match value {
            Value::Object(nested) => flatten_into(map, Some(&full_key), nested),
            leaf => {
                map.insert(full_key, leaf);
            }
        }
    }
}
