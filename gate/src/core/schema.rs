//! Structural validation of `tasks.json`.
//!
//! Validation is fail-fast: the first violation wins, and stories are checked
//! one at a time in document order. On success the raw JSON is returned as a
//! typed [`TaskList`].

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::core::types::{ReviewStatus, Story, TaskList};

const TOP_LEVEL_FIELDS: [&str; 3] = ["project", "branchName", "description"];

/// Expected JSON type of a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Boolean,
    Number,
    Integer,
    Array,
    StringOrNull,
}

impl FieldType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Boolean => value.is_boolean(),
            Self::Number => value.is_number(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Array => value.is_array(),
            Self::StringOrNull => value.is_string() || value.is_null(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Array => "array",
            Self::StringOrNull => "string or null",
        }
    }
}

/// Required story fields, in check order.
const STORY_FIELDS: [(&str, FieldType); 8] = [
    ("id", FieldType::String),
    ("title", FieldType::String),
    ("passes", FieldType::Boolean),
    ("priority", FieldType::Number),
    ("acceptanceCriteria", FieldType::Array),
    ("reviewStatus", FieldType::StringOrNull),
    ("reviewCount", FieldType::Integer),
    ("reviewFeedback", FieldType::String),
];

/// First structural problem found in `tasks.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    NotAnObject,
    MissingTopLevelField(&'static str),
    TopLevelFieldNotString(&'static str),
    MissingUserStories,
    UserStoriesNotArray,
    StoryNotObject { index: usize },
    MissingStoryField { story: String, field: &'static str },
    WrongFieldType {
        story: String,
        field: &'static str,
        expected: FieldType,
    },
    DuplicateId(String),
    EmptyAcceptanceCriteria { story: String },
    InvalidReviewStatus { story: String, value: String },
    NegativeReviewCount { story: String, count: i64 },
    MissingNotes { story: String },
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "tasks.json must be a JSON object"),
            Self::MissingTopLevelField(field) => {
                write!(f, "tasks.json missing required top-level field: '{field}'")
            }
            Self::TopLevelFieldNotString(field) => {
                write!(f, "tasks.json field '{field}' must be a string")
            }
            Self::MissingUserStories => write!(f, "tasks.json missing required field: 'userStories'"),
            Self::UserStoriesNotArray => write!(f, "tasks.json 'userStories' must be an array"),
            Self::StoryNotObject { index } => {
                write!(f, "Story story[{index}]: must be a JSON object")
            }
            Self::MissingStoryField { story, field } => {
                write!(f, "Story {story}: missing required field '{field}'")
            }
            Self::WrongFieldType {
                story,
                field,
                expected,
            } => write!(
                f,
                "Story {story}: field '{field}' has wrong type (expected {})",
                expected.label()
            ),
            Self::DuplicateId(id) => write!(f, "Duplicate story ID: '{id}'"),
            Self::EmptyAcceptanceCriteria { story } => {
                write!(f, "Story {story}: 'acceptanceCriteria' must not be empty")
            }
            Self::InvalidReviewStatus { story, value } => write!(
                f,
                "Story {story}: 'reviewStatus' is '{value}', must be null or one of: \
                 needs_review, changes_requested, approved"
            ),
            Self::NegativeReviewCount { story, count } => write!(
                f,
                "Story {story}: 'reviewCount' must be non-negative (got {count})"
            ),
            Self::MissingNotes { story } => write!(
                f,
                "Story {story}: has passes=true but empty 'notes'; document what was done"
            ),
        }
    }
}

/// Validate the raw task-list document and return its typed form.
pub fn validate_task_list(doc: &Value) -> Result<TaskList, SchemaViolation> {
    let root = doc.as_object().ok_or(SchemaViolation::NotAnObject)?;

    for field in TOP_LEVEL_FIELDS {
        match root.get(field) {
            None => return Err(SchemaViolation::MissingTopLevelField(field)),
            Some(value) if !value.is_string() => {
                return Err(SchemaViolation::TopLevelFieldNotString(field));
            }
            Some(_) => {}
        }
    }

    let raw_stories = root
        .get("userStories")
        .ok_or(SchemaViolation::MissingUserStories)?
        .as_array()
        .ok_or(SchemaViolation::UserStoriesNotArray)?;

    let mut seen = HashSet::new();
    let stories = raw_stories
        .iter()
        .enumerate()
        .map(|(index, raw)| validate_story(index, raw, &mut seen))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TaskList {
        project: string_field(root, "project"),
        branch_name: string_field(root, "branchName"),
        description: string_field(root, "description"),
        user_stories: stories,
    })
}

/// All per-story rules, in order: presence and types, unique id, non-empty
/// criteria, known review status, non-negative count, notes on passed stories.
fn validate_story(
    index: usize,
    raw: &Value,
    seen: &mut HashSet<String>,
) -> Result<Story, SchemaViolation> {
    let obj = raw
        .as_object()
        .ok_or(SchemaViolation::StoryNotObject { index })?;
    let label = story_label(index, obj);

    for (field, expected) in STORY_FIELDS {
        let value = obj.get(field).ok_or_else(|| SchemaViolation::MissingStoryField {
            story: label.clone(),
            field,
        })?;
        if !expected.matches(value) {
            return Err(wrong_type(&label, field, expected));
        }
    }

    let acceptance_criteria = obj
        .get("acceptanceCriteria")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|item| item.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| wrong_type(&label, "acceptanceCriteria", FieldType::Array))?;

    let notes = match obj.get("notes") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(notes)) => notes.clone(),
        Some(_) => return Err(wrong_type(&label, "notes", FieldType::StringOrNull)),
    };

    let id = string_field(obj, "id");
    if !seen.insert(id.clone()) {
        return Err(SchemaViolation::DuplicateId(id));
    }

    if acceptance_criteria.is_empty() {
        return Err(SchemaViolation::EmptyAcceptanceCriteria { story: id });
    }

    let raw_status = obj.get("reviewStatus").and_then(Value::as_str);
    let review_status =
        ReviewStatus::parse(raw_status).ok_or_else(|| SchemaViolation::InvalidReviewStatus {
            story: id.clone(),
            value: raw_status.unwrap_or_default().to_string(),
        })?;

    let review_count = obj.get("reviewCount").map_or(0, count_value);
    if review_count < 0 {
        return Err(SchemaViolation::NegativeReviewCount {
            story: id,
            count: review_count,
        });
    }

    let passes = obj
        .get("passes")
        .and_then(Value::as_bool)
        .unwrap_or_default();
    if passes && notes.trim().is_empty() {
        return Err(SchemaViolation::MissingNotes { story: id });
    }

    Ok(Story {
        title: string_field(obj, "title"),
        passes,
        priority: obj
            .get("priority")
            .and_then(Value::as_f64)
            .unwrap_or_default(),
        acceptance_criteria,
        review_status,
        review_count,
        review_feedback: string_field(obj, "reviewFeedback"),
        notes,
        id,
    })
}

fn story_label(index: usize, obj: &Map<String, Value>) -> String {
    match obj.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => format!("story[{index}]"),
    }
}

fn wrong_type(label: &str, field: &'static str, expected: FieldType) -> SchemaViolation {
    SchemaViolation::WrongFieldType {
        story: label.to_string(),
        field,
        expected,
    }
}

fn string_field(obj: &Map<String, Value>, field: &str) -> String {
    obj.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Integer counts above `i64::MAX` saturate; they exceed any cap anyway.
fn count_value(value: &Value) -> i64 {
    value
        .as_i64()
        .unwrap_or_else(|| if value.is_u64() { i64::MAX } else { 0 })
}
