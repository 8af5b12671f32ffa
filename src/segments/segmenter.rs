//! Per-document state machine that decides whether an edit extends, rebases, or
//! closes the document's open segment.

use crate::config::SegmenterConfig;
use crate::error::SegmenterError;
use crate::segments::classifier::EventClassification;
use crate::segments::rebase::rebase_segment;
use crate::segments::types::{ChangeEvent, CloseReason, RawChange, Segment};
use std::collections::HashMap;

/// Line span touched by one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventLineSpan {
    /// Topmost line touched (pre-change coordinates)
    pub start_line: u32,
    /// One past the bottommost line touched (pre-change coordinates)
    pub end_line_exclusive: u32,
    /// `end_line_exclusive` shifted by the net line delta of every change
    pub end_line_exclusive_post_change: u32,
}

/// Derive the line span of a notification.
///
/// An empty change list is a caller bug: there is no span to derive and guessing
/// one would corrupt the line bookkeeping for the document.
pub fn event_line_span(changes: &[RawChange]) -> Result<EventLineSpan, SegmenterError> {
    if changes.is_empty() {
        return Err(SegmenterError::EmptyChangeList);
    }

    let start_line = changes
        .iter()
        .map(|c| c.range.start.line)
        .min()
        .unwrap_or_default();
    let last_line = changes
        .iter()
        .map(|c| c.range.end.line)
        .max()
        .unwrap_or_default();
    let end_line_exclusive = last_line.checked_add(1).ok_or_else(|| {
        SegmenterError::Generic(format!(
            "End line {} has no line after it",
            last_line
        ))
    })?;
    let net: i64 = changes.iter().map(RawChange::net_line_delta).sum();

    // Overlapping changes can over-count deletions; the first touched line always survives
    let post_change = (end_line_exclusive as i64 + net).max(start_line as i64 + 1);
    let end_line_exclusive_post_change = u32::try_from(post_change).map_err(|_| {
        SegmenterError::Generic(format!(
            "Post-change end line {} does not fit in a line number",
            post_change
        ))
    })?;

    Ok(EventLineSpan {
        start_line,
        end_line_exclusive,
        end_line_exclusive_post_change,
    })
}

/// Line distance between two half-open intervals; 0 if they overlap or touch.
pub fn interval_distance_post_change(start_a: u32, end_a: u32, start_b: u32, end_b: u32) -> u32 {
    if start_b >= end_a {
        start_b - end_a
    } else if start_a >= end_b {
        start_a - end_b
    } else {
        0
    }
}

/// Owns the open segment of every tracked document. A document maps to at most one
/// open segment; closed segments are handed back to the caller and never kept.
#[derive(Debug, Default)]
pub struct Segmenter {
    open_segments: HashMap<String, Segment>,
}

impl Segmenter {
    /// Create a segmenter with no open segments.
    pub fn new() -> Self {
        Segmenter::default()
    }

    /// Feed one classified notification. Returns the segments this call closed.
    pub fn on_did_change_text_document(
        &mut self,
        event: &ChangeEvent,
        classification: EventClassification,
        config: &SegmenterConfig,
    ) -> Result<Vec<Segment>, SegmenterError> {
        let uri = event.uri();

        if !classification.is_human_like() {
            if let Some(existing) = self.open_segments.get_mut(uri) {
                rebase_segment(existing, &event.content_changes)?;
            }
            return Ok(Vec::new());
        }

        let span = event_line_span(&event.content_changes)?;
        let now = config.now();
        let event_chars = event.inserted_chars();

        let Some(existing) = self.open_segments.get_mut(uri) else {
            self.open_segments.insert(
                uri.to_string(),
                Segment::open(
                    uri,
                    span.start_line,
                    span.end_line_exclusive_post_change,
                    event_chars,
                    now,
                ),
            );
            return Ok(Vec::new());
        };

        // Both spans must be in post-change coordinates before they are compared
        rebase_segment(existing, &event.content_changes)?;

        let distance = interval_distance_post_change(
            existing.range_start_line,
            existing.range_end_line_exclusive,
            span.start_line,
            span.end_line_exclusive_post_change,
        );

        match close_reason(existing, distance, event_chars, now, config) {
            None => {
                existing.range_start_line = existing.range_start_line.min(span.start_line);
                existing.range_end_line_exclusive = existing
                    .range_end_line_exclusive
                    .max(span.end_line_exclusive_post_change);
                existing.ended_at = now;
                existing.char_count = existing.char_count.saturating_add(event_chars);
                Ok(Vec::new())
            }
            Some(reason) => {
                let replacement = Segment::open(
                    uri,
                    span.start_line,
                    span.end_line_exclusive_post_change,
                    event_chars,
                    now,
                );
                let mut closed = std::mem::replace(existing, replacement);
                closed.close(reason, now);
                Ok(vec![closed])
            }
        }
    }

    /// Force-close the open segment of a document. Returns `None` if there is none,
    /// so calling it twice is harmless.
    pub fn close_segment_by_doc_uri(&mut self, uri: &str) -> Option<Segment> {
        let mut segment = self.open_segments.remove(uri)?;
        let ended_at = segment.ended_at;
        segment.close(CloseReason::ForceClosed, ended_at);
        Some(segment)
    }

    /// URIs of every document with an open segment, sorted.
    pub fn get_all_open_segments_uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.open_segments.keys().cloned().collect();
        uris.sort();
        uris
    }

    /// The open segment of a document, if any.
    pub fn open_segment(&self, uri: &str) -> Option<&Segment> {
        self.open_segments.get(uri)
    }

    /// Number of documents with an open segment.
    pub fn open_segment_count(&self) -> usize {
        self.open_segments.len()
    }

    /// Close every segment whose last edit is at least `idle_timeout_ms` old.
    pub fn close_idle_segments(&mut self, config: &SegmenterConfig) -> Vec<Segment> {
        let now = config.now();
        let idle: Vec<String> = self
            .get_all_open_segments_uris()
            .into_iter()
            .filter(|uri| {
                self.open_segments
                    .get(uri)
                    .is_some_and(|s| now.saturating_sub(s.ended_at) >= config.idle_timeout_ms)
            })
            .collect();

        idle.iter()
            .filter_map(|uri| {
                let mut segment = self.open_segments.remove(uri)?;
                let ended_at = segment.ended_at;
                segment.close(CloseReason::Idle, ended_at);
                Some(segment)
            })
            .collect()
    }

    /// Close everything, e.g. on shutdown. Sorted by document URI.
    pub fn close_all_segments(&mut self) -> Vec<Segment> {
        self.get_all_open_segments_uris()
            .iter()
            .filter_map(|uri| self.close_segment_by_doc_uri(uri))
            .collect()
    }
}

fn close_reason(
    existing: &Segment,
    distance: u32,
    event_chars: usize,
    now: u64,
    config: &SegmenterConfig,
) -> Option<CloseReason> {
    if distance > config.adjacency_gap_lines {
        Some(CloseReason::AdjacencyGap)
    } else if now.saturating_sub(existing.started_at) > config.max_segment_duration_ms {
        Some(CloseReason::DurationExceeded)
    } else if existing.char_count.saturating_add(event_chars) > config.max_segment_chars {
        Some(CloseReason::SizeExceeded)
    } else {
        None
    }
}
