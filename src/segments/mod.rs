//! Tracking of human editing sessions over live documents.
//!
//! A document's open [`Segment`] follows the lines a human is editing. Foreign edits
//! (AI tools, formatters) only move it; human-like edits extend it or close it and
//! start a new one.

pub mod classifier;
pub mod rebase;
pub mod segmenter;
pub mod tracker;
pub mod types;

pub use classifier::{ClassifiedEvent, EventClassification, classify_changes};
pub use segmenter::{EventLineSpan, Segmenter, event_line_span, interval_distance_post_change};
pub use tracker::DocumentTracker;
pub use types::{ChangeEvent, CloseReason, DocumentRef, Position, Range, RawChange, Segment};
