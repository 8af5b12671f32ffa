use crate::error::SegmenterError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Zero-based line/character position inside a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    /// A zero-width range (cursor position)
    pub fn point(line: u32, character: u32) -> Self {
        let p = Position::new(line, character);
        Range { start: p, end: p }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// One entry of an editor change notification.
///
/// Empty range with text is a pure insertion, a non-empty range with empty text
/// is a deletion, both non-empty is a replacement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawChange {
    pub range: Range,
    #[serde(default)]
    pub text: String,
}

impl RawChange {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        RawChange {
            range,
            text: text.into(),
        }
    }

    /// Insert `text` at a cursor position
    pub fn insertion(line: u32, character: u32, text: impl Into<String>) -> Self {
        RawChange::new(Range::point(line, character), text)
    }

    /// Number of line breaks in the inserted text. `\r\n` counts once, a lone `\r`
    /// counts as a break as editors treat it.
    pub fn inserted_lines(&self) -> u32 {
        let mut count = 0;
        let mut chars = self.text.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\n' => count += 1,
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    count += 1;
                }
                _ => {}
            }
        }
        count
    }

    /// Lines removed by the replaced range. Saturates on reversed ranges, which
    /// validation rejects before they reach the engine.
    pub fn deleted_lines(&self) -> u32 {
        self.range.end.line.saturating_sub(self.range.start.line)
    }

    pub fn net_line_delta(&self) -> i64 {
        self.inserted_lines() as i64 - self.deleted_lines() as i64
    }

    /// Length of the inserted text in Unicode scalar values
    pub fn inserted_chars(&self) -> usize {
        self.text.chars().count()
    }

    pub fn validate(&self) -> Result<(), SegmenterError> {
        if self.range.start > self.range.end {
            return Err(SegmenterError::InvalidRange {
                start_line: self.range.start.line,
                start_character: self.range.start.character,
                end_line: self.range.end.line,
                end_character: self.range.end.character,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub uri: String,
}

/// A change notification for one document, in the camelCase shape editor hosts
/// deliver (`{ "document": { "uri": .. }, "contentChanges": [..] }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub document: DocumentRef,
    #[serde(default)]
    pub content_changes: Vec<RawChange>,
}

impl ChangeEvent {
    /// Build a validated event.
    pub fn new(uri: impl Into<String>, content_changes: Vec<RawChange>) -> Result<Self, SegmenterError> {
        let event = ChangeEvent {
            document: DocumentRef { uri: uri.into() },
            content_changes,
        };
        event.validate()?;
        Ok(event)
    }

    /// Parse and validate an event from its JSON wire form.
    pub fn from_json_str(json: &str) -> Result<Self, SegmenterError> {
        let event: ChangeEvent = serde_json::from_str(json)?;
        event.validate()?;
        Ok(event)
    }

    pub fn validate(&self) -> Result<(), SegmenterError> {
        self.content_changes.iter().try_for_each(RawChange::validate)
    }

    pub fn uri(&self) -> &str {
        &self.document.uri
    }

    /// Total characters inserted across every change
    pub fn inserted_chars(&self) -> usize {
        self.content_changes.iter().map(RawChange::inserted_chars).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// A human-like edit landed further than the adjacency gap
    AdjacencyGap,
    DurationExceeded,
    SizeExceeded,
    /// Closed by the caller (tab close, shutdown)
    ForceClosed,
    /// No edits for longer than the idle timeout
    Idle,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::AdjacencyGap => "adjacency_gap",
            CloseReason::DurationExceeded => "duration_exceeded",
            CloseReason::SizeExceeded => "size_exceeded",
            CloseReason::ForceClosed => "force_closed",
            CloseReason::Idle => "idle",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One candidate continuous human-editing session over a contiguous line range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub document_uri: String,
    pub file_name: String,
    /// First line of the segment (inclusive, 0-indexed)
    pub range_start_line: u32,
    /// Line after the last line of the segment (exclusive)
    pub range_end_line_exclusive: u32,
    /// Filled in by the caller, never by the segmenter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_content: Option<String>,
    /// Epoch milliseconds
    pub started_at: u64,
    /// Epoch milliseconds
    pub ended_at: u64,
    pub closed: bool,
    /// Characters inserted by the edits absorbed into this segment
    #[serde(default)]
    pub char_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<CloseReason>,
}

impl Segment {
    pub(crate) fn open(
        document_uri: &str,
        range_start_line: u32,
        range_end_line_exclusive: u32,
        char_count: usize,
        now: u64,
    ) -> Self {
        Segment {
            id: uuid::Uuid::new_v4().to_string(),
            document_uri: document_uri.to_string(),
            file_name: file_name_from_uri(document_uri),
            range_start_line,
            range_end_line_exclusive: range_end_line_exclusive
                .max(range_start_line.saturating_add(1)),
            text_content: None,
            started_at: now,
            ended_at: now,
            closed: false,
            char_count,
            close_reason: None,
        }
    }

    pub(crate) fn close(&mut self, reason: CloseReason, now: u64) {
        self.closed = true;
        self.ended_at = now;
        self.close_reason = Some(reason);
    }

    pub fn line_count(&self) -> u32 {
        self.range_end_line_exclusive.saturating_sub(self.range_start_line)
    }

    pub fn contains_line(&self, line: u32) -> bool {
        line >= self.range_start_line && line < self.range_end_line_exclusive
    }

    pub fn duration_ms(&self) -> u64 {
        self.ended_at.saturating_sub(self.started_at)
    }

    /// Attach a text snapshot read by the caller from the live document.
    pub fn with_text_content(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }
}

/// Last path component of a document URI, e.g. `file:///src/main.rs` -> `main.rs`.
pub fn file_name_from_uri(uri: &str) -> String {
    let without_query = uri.split(['?', '#']).next().unwrap_or(uri);
    let trimmed = without_query.trim_end_matches('/');
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .map(|name| match name.split_once(':') {
            // Untitled or custom-scheme URIs without a path ("untitled:Untitled-1")
            Some((_, rest)) if !rest.is_empty() => rest.to_string(),
            _ => name.to_string(),
        })
        .unwrap_or_else(|| uri.to_string())
}
