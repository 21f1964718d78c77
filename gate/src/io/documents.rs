//! Document loader for the JSON files the gate reads.

use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

/// Read and parse a JSON file.
///
/// Any read or parse failure yields `None`; callers decide whether that blocks.
pub fn load_json_file(path: &Path) -> Option<Value> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            debug!(path = %path.display(), err = %err, "cannot read json file");
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(path = %path.display(), err = %err, "cannot parse json file");
            None
        }
    }
}
