//! Lenient reader for the `.ralph-active` iteration marker.
//!
//! The marker is written by the external loop driver and also carries fields
//! this gate does not use (`pid`, `timestamp`, ...). Each field this gate does
//! use is read on its own, and a bad value falls back to that field's default
//! instead of failing the whole marker.

use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::core::types::{IterationMarker, IterationMode, ReviewTriple, Snapshot};
use crate::io::documents::load_json_file;

/// Load the marker from disk; a missing or malformed file yields defaults.
pub fn load_marker(path: &Path, default_review_cap: u32) -> IterationMarker {
    match load_json_file(path) {
        Some(value) => parse_marker(&value, default_review_cap),
        None => {
            warn!(path = %path.display(), "iteration marker unreadable; using defaults");
            IterationMarker::with_review_cap(default_review_cap)
        }
    }
}

/// Parse marker fields from JSON, falling back per field.
pub fn parse_marker(value: &Value, default_review_cap: u32) -> IterationMarker {
    let mut marker = IterationMarker::with_review_cap(default_review_cap);
    let Some(obj) = value.as_object() else {
        warn!("iteration marker is not an object; using defaults");
        return marker;
    };

    match obj.get("skipReview") {
        None | Some(Value::Null) => {}
        Some(Value::Bool(skip)) => marker.skip_review = *skip,
        Some(other) => warn!(value = %other, "skipReview is not a boolean; ignoring"),
    }

    match obj.get("reviewCap") {
        None | Some(Value::Null) => {}
        Some(raw) => match raw.as_u64().and_then(|cap| u32::try_from(cap).ok()) {
            Some(cap) => marker.review_cap = cap,
            None => warn!(value = %raw, "reviewCap is not a non-negative integer; ignoring"),
        },
    }

    match obj.get("iterationMode") {
        None | Some(Value::Null) => {}
        Some(Value::String(raw)) if raw.is_empty() => {}
        Some(Value::String(raw)) => marker.iteration_mode = Some(IterationMode::parse(raw)),
        Some(other) => warn!(value = %other, "iterationMode is not a string; ignoring"),
    }

    if let Some(raw) = obj.get("preIterationSnapshot") {
        marker.pre_iteration_snapshot = parse_snapshot(raw);
    }

    debug!(
        skip_review = marker.skip_review,
        review_cap = marker.review_cap,
        mode = ?marker.iteration_mode,
        snapshot_stories = ?marker.pre_iteration_snapshot.as_ref().map(Snapshot::len),
        "iteration marker parsed"
    );
    marker
}

/// Parse the snapshot entry by entry. An entry that does not read as a triple
/// is kept in `unreadable` so the transition check can reject it when its story
/// still exists. A snapshot that is not an object, or has no entries, is absent.
fn parse_snapshot(raw: &Value) -> Option<Snapshot> {
    let Some(entries) = raw.as_object() else {
        if !raw.is_null() {
            warn!(value = %raw, "preIterationSnapshot is not an object; transition check disabled");
        }
        return None;
    };

    let mut snapshot = Snapshot::default();
    for (id, entry) in entries {
        match serde_json::from_value::<ReviewTriple>(entry.clone()) {
            Ok(triple) => {
                snapshot.stories.insert(id.clone(), triple);
            }
            Err(err) => {
                warn!(story = %id, err = %err, "preIterationSnapshot entry is malformed");
                snapshot.unreadable.insert(id.clone(), err.to_string());
            }
        }
    }
    (!snapshot.is_empty()).then_some(snapshot)
}
