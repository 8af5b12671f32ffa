//! Host-facing entry point: classify each notification, feed it to the segmenter,
//! and log what happened.

use crate::config::SegmenterConfig;
use crate::observability::{log_error, log_message, log_performance};
use crate::segments::classifier::{ClassifiedEvent, classify_changes};
use crate::segments::segmenter::Segmenter;
use crate::segments::types::{ChangeEvent, Segment};
use serde_json::json;
use std::collections::HashMap;
use std::time::Instant;

/// Batches at least this large get a performance envelope
const PERFORMANCE_LOG_MIN_CHANGES: usize = 50;

pub struct DocumentTracker {
    segmenter: Segmenter,
    config: SegmenterConfig,
}

impl DocumentTracker {
    pub fn new(config: SegmenterConfig) -> Self {
        DocumentTracker {
            segmenter: Segmenter::new(),
            config,
        }
    }

    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    pub fn segmenter(&self) -> &Segmenter {
        &self.segmenter
    }

    /// Handle one change notification and return the segments it closed.
    ///
    /// Excluded documents are ignored. If the segmenter rejects the event the error is
    /// logged and the document's open segment is force-closed, since its line numbers
    /// can no longer be trusted.
    pub fn handle_change(&mut self, event: &ChangeEvent) -> Vec<Segment> {
        if self.config.is_excluded_document(event.uri()) {
            return Vec::new();
        }

        let classified = classify_changes(&event.content_changes, &self.config.classifier);
        let started = Instant::now();

        let closed = match self.segmenter.on_did_change_text_document(
            event,
            classified.event_classification,
            &self.config,
        ) {
            Ok(closed) => closed,
            Err(e) => {
                log_error(
                    &e,
                    Some(json!({
                        "document_uri": event.uri(),
                        "classification": classified.event_classification.as_str(),
                        "change_count": classified.change_count,
                    })),
                );
                self.segmenter
                    .close_segment_by_doc_uri(event.uri())
                    .into_iter()
                    .collect()
            }
        };

        if classified.change_count >= PERFORMANCE_LOG_MIN_CHANGES {
            log_performance(
                "segmenter.handle_change",
                started.elapsed(),
                Some(json!({ "document_uri": event.uri() })),
                Some(classification_tags(&classified)),
            );
        }

        log_closed(&closed);
        closed
    }

    /// The document was closed in the editor.
    pub fn close_document(&mut self, uri: &str) -> Option<Segment> {
        let closed = self.segmenter.close_segment_by_doc_uri(uri);
        log_closed(closed.as_slice());
        closed
    }

    /// Close segments that have seen no edits for the configured idle timeout.
    pub fn flush_idle(&mut self) -> Vec<Segment> {
        let closed = self.segmenter.close_idle_segments(&self.config);
        log_closed(&closed);
        closed
    }

    /// Close every open segment.
    pub fn shutdown(&mut self) -> Vec<Segment> {
        let closed = self.segmenter.close_all_segments();
        log_closed(&closed);
        closed
    }
}

fn classification_tags(classified: &ClassifiedEvent) -> HashMap<String, String> {
    HashMap::from([
        (
            "classification".to_string(),
            classified.event_classification.as_str().to_string(),
        ),
        ("change_count".to_string(), classified.change_count.to_string()),
    ])
}

fn log_closed(closed: &[Segment]) {
    for segment in closed {
        log_message(
            "segment closed",
            "info",
            Some(json!({
                "segment_id": segment.id,
                "document_uri": segment.document_uri,
                "range_start_line": segment.range_start_line,
                "range_end_line_exclusive": segment.range_end_line_exclusive,
                "close_reason": segment.close_reason.map(|r| r.as_str()),
                "duration_ms": segment.duration_ms(),
            })),
        );
    }
}
