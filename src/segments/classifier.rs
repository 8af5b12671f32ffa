//! Shape-based classification of a batched change notification.
//!
//! The classifier never looks at what was typed, only at how many changes arrived
//! together and whether they look like one edit repeated across lines. That is
//! enough to tell a human multi-cursor action apart from a tool rewriting several
//! places at once.

use crate::config::{ClassifierConfig, MultiLineMatch};
use crate::segments::types::RawChange;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventClassification {
    Empty,
    SingleChange,
    /// Several unrelated changes in one batch (AI edits, refactors, formatters)
    MultiChange,
    /// The same edit applied on several lines (comment toggle, indent)
    MultiLineHumanEdit,
    LargeInsert,
}

impl EventClassification {
    /// Classifications that open or extend segments
    pub fn is_human_like(&self) -> bool {
        matches!(
            self,
            EventClassification::SingleChange
                | EventClassification::LargeInsert
                | EventClassification::MultiLineHumanEdit
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventClassification::Empty => "EMPTY",
            EventClassification::SingleChange => "SINGLE_CHANGE",
            EventClassification::MultiChange => "MULTI_CHANGE",
            EventClassification::MultiLineHumanEdit => "MULTI_LINE_HUMAN_EDIT",
            EventClassification::LargeInsert => "LARGE_INSERT",
        }
    }
}

impl fmt::Display for EventClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedEvent {
    pub event_classification: EventClassification,
    pub change_count: usize,
    /// Inserted text length of the first change (0 when there are no changes)
    pub first_insert_size: usize,
}

pub fn classify_changes(changes: &[RawChange], config: &ClassifierConfig) -> ClassifiedEvent {
    let change_count = changes.len();
    let first_insert_size = changes.first().map(RawChange::inserted_chars).unwrap_or(0);

    let event_classification = match change_count {
        0 => EventClassification::Empty,
        1 => {
            if first_insert_size >= config.large_insert_threshold {
                EventClassification::LargeInsert
            } else {
                EventClassification::SingleChange
            }
        }
        _ => {
            if is_multi_line_human_edit(changes, config.multi_line_match) {
                EventClassification::MultiLineHumanEdit
            } else {
                EventClassification::MultiChange
            }
        }
    };

    ClassifiedEvent {
        event_classification,
        change_count,
        first_insert_size,
    }
}

/// Every change repeats the same insertion and starts on a line no other change
/// starts on. Anything else is treated as foreign.
fn is_multi_line_human_edit(changes: &[RawChange], rule: MultiLineMatch) -> bool {
    let Some(first) = changes.first() else {
        return false;
    };

    let same_insert = |change: &RawChange| match rule {
        MultiLineMatch::IdenticalText => change.text == first.text,
        MultiLineMatch::EqualLength => change.inserted_chars() == first.inserted_chars(),
    };

    let mut lines = HashSet::with_capacity(changes.len());
    changes.iter().all(|change| {
        same_insert(change) && lines.insert(change.range.start.line)
    })
}
