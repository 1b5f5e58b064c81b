//! Entry model: one tracked series and its reading position.

use crate::error::ValidationError;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// A tracked item.
///
/// Serialized with camelCase keys so exported files match the format older
/// versions wrote (`updatedAt`, not `updated_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Stable identifier, never reassigned
    pub id: String,
    /// Display title
    pub title: String,
    /// Reading position, always finite and >= 0
    pub chapter: f64,
    /// Source link
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Free-text notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Last modification, epoch milliseconds
    pub updated_at: i64,
}

/// Fields [`Entry::coerce_with_repairs`] had to invent or rewrite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Repairs {
    /// No usable id, a fresh one was generated
    pub generated_id: bool,
    /// Numeric id turned into text
    pub converted_id: bool,
    /// No usable timestamp, set to now
    pub defaulted_updated_at: bool,
    /// Chapter was missing, textual, negative or non-finite
    pub coerced_chapter: bool,
}

/// Input for creating an entry from user-supplied fields.
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub title: String,
    pub chapter: f64,
    pub url: Option<String>,
    pub notes: Option<String>,
}

/// Update for an optional text field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldUpdate {
    /// Leave the field as is
    #[default]
    Keep,
    /// Unset the field
    Clear,
    /// Replace the value
    Set(String),
}

/// Partial edit of an existing entry.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub title: Option<String>,
    pub chapter: Option<f64>,
    pub url: FieldUpdate,
    pub notes: FieldUpdate,
}

impl EntryPatch {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.chapter.is_none()
            && self.url == FieldUpdate::Keep
            && self.notes == FieldUpdate::Keep
    }
}

impl Entry {
    /// Validate a loosely typed value into an entry.
    ///
    /// Only the title is mandatory; every other field is coerced or
    /// defaulted (see [`Entry::coerce`]).
    pub fn validate(raw: &Value) -> Result<Self, ValidationError> {
        let entry = Self::coerce(raw);
        if entry.title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        Ok(entry)
    }

    /// Coerce a loosely typed value into an entry without rejecting it.
    ///
    /// A missing or unusable title becomes the empty string.
    pub fn coerce(raw: &Value) -> Self {
        Self::coerce_with_repairs(raw).0
    }

    /// Like [`Entry::coerce`], also reporting which fields had to be filled
    /// in or rewritten.
    pub fn coerce_with_repairs(raw: &Value) -> (Self, Repairs) {
        let mut repairs = Repairs::default();

        let id = match raw.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => {
                repairs.converted_id = true;
                n.to_string()
            }
            _ => {
                repairs.generated_id = true;
                generate_id()
            }
        };

        // Trimmed so a whitespace-only title reads as untitled.
        let title = match raw.get("title") {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        };

        let updated_at = match raw.get("updatedAt").and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
        }) {
            Some(updated_at) => updated_at,
            None => {
                repairs.defaulted_updated_at = true;
                now_millis()
            }
        };

        let chapter = coerce_chapter(raw.get("chapter"));
        repairs.coerced_chapter = !matches!(
            raw.get("chapter").and_then(Value::as_f64),
            Some(v) if v == chapter
        );

        let entry = Self {
            id,
            title,
            chapter,
            url: optional_text(raw.get("url")),
            notes: optional_text(raw.get("notes")),
            updated_at,
        };
        (entry, repairs)
    }

    /// Record a mutation: `updated_at` moves forward even if the clock did not.
    pub fn touch(&mut self) {
        self.updated_at = std::cmp::max(now_millis(), self.updated_at.saturating_add(1));
    }

    /// Apply a partial edit and bump `updated_at`.
    ///
    /// Returns `Ok(false)` for an empty patch, leaving the entry untouched.
    pub fn apply(&mut self, patch: EntryPatch) -> Result<bool, ValidationError> {
        if patch.is_empty() {
            return Ok(false);
        }

        let title = match patch.title {
            Some(title) => Some(checked_title(&title)?),
            None => None,
        };
        let chapter = match patch.chapter {
            Some(chapter) => Some(checked_chapter(chapter)?),
            None => None,
        };

        if let Some(title) = title {
            self.title = title;
        }
        if let Some(chapter) = chapter {
            self.chapter = chapter;
        }
        apply_field(&mut self.url, patch.url);
        apply_field(&mut self.notes, patch.notes);
        self.touch();

        Ok(true)
    }

    /// Move the reading position by `delta`, never below zero.
    pub fn step_chapter(&mut self, delta: f64) {
        self.chapter = (self.chapter + delta).max(0.0);
        self.touch();
    }
}

impl NewEntry {
    /// Build a fresh entry with a new id and the current timestamp.
    pub fn into_entry(self) -> Result<Entry, ValidationError> {
        Ok(Entry {
            id: generate_id(),
            title: checked_title(&self.title)?,
            chapter: checked_chapter(self.chapter)?,
            url: self.url.filter(|u| !u.trim().is_empty()),
            notes: self.notes.filter(|n| !n.trim().is_empty()),
            updated_at: now_millis(),
        })
    }
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Generate an identifier: `<epoch-ms>-<8 hex chars>`.
///
/// Collision resistant within a single local collection; not meant for
/// multi-writer sync.
pub fn generate_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}-{}", now_millis(), &suffix[..8])
}

/// Coerce a raw chapter value to a non-negative finite number.
///
/// Numbers and numeric text (older files stored chapters as strings) are
/// accepted; anything else is 0.
pub fn coerce_chapter(raw: Option<&Value>) -> f64 {
    let parsed = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() => v.max(0.0),
        _ => 0.0,
    }
}

pub(crate) fn checked_chapter(value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFiniteChapter(value.to_string()));
    }
    Ok(value.max(0.0))
}

fn checked_title(title: &str) -> Result<String, ValidationError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(title.to_string())
}

fn optional_text(raw: Option<&Value>) -> Option<String> {
    raw.and_then(Value::as_str).map(str::to_string)
}

fn apply_field(field: &mut Option<String>, update: FieldUpdate) {
    match update {
        FieldUpdate::Keep => {}
        FieldUpdate::Clear => *field = None,
        FieldUpdate::Set(value) => *field = Some(value),
    }
}
