//! Whole-line position mapping for an open segment.
//!
//! Every change in a notification is folded into the segment's `[start, end)`
//! line span, bottom of the document first, so the line delta of one change never
//! invalidates the coordinates of a change above it that is still unprocessed.

use crate::error::SegmenterError;
use crate::segments::types::{RawChange, Segment};

/// Half-open line interval used while folding changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSpan {
    pub start: i64,
    pub end: i64,
}

impl LineSpan {
    pub fn new(start: i64, end: i64) -> Self {
        LineSpan { start, end }
    }
}

/// How a single change sits relative to a span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeRelation {
    /// At or after the exclusive end, including a cursor insertion right at it
    Below,
    /// Entirely above the span (may touch its first line from above)
    Above,
    /// Covers the whole span
    Covers,
    /// Starts above the span and ends inside it
    OverlapsStart,
    /// Starts and ends inside the span, including edits confined to its first line
    Inside,
    /// Starts inside the span and runs past its last line
    OverlapsTail,
}

pub fn relate(span: LineSpan, change: &RawChange) -> ChangeRelation {
    let cs = change.range.start.line as i64;
    let ce = change.range.end.line as i64;

    if cs >= span.end {
        ChangeRelation::Below
    } else if cs == span.start && ce == span.start {
        ChangeRelation::Inside
    } else if ce < span.start || (ce == span.start && cs < span.start) {
        ChangeRelation::Above
    } else if cs <= span.start && ce >= span.end {
        ChangeRelation::Covers
    } else if cs < span.start {
        ChangeRelation::OverlapsStart
    } else if ce < span.end {
        ChangeRelation::Inside
    } else {
        ChangeRelation::OverlapsTail
    }
}

/// Apply one change to a span. The line holding the change start always survives,
/// so the result is never narrower than one line.
pub fn apply_change(span: LineSpan, change: &RawChange) -> LineSpan {
    let cs = change.range.start.line as i64;
    let inserted = change.inserted_lines() as i64;
    let net = change.net_line_delta();

    let mut next = match relate(span, change) {
        ChangeRelation::Below => span,
        ChangeRelation::Above => LineSpan::new(span.start + net, span.end + net),
        ChangeRelation::Covers => LineSpan::new(cs, cs + inserted),
        ChangeRelation::OverlapsStart => LineSpan::new(cs, span.end + net),
        ChangeRelation::Inside => LineSpan::new(span.start, span.end + net),
        ChangeRelation::OverlapsTail => LineSpan::new(span.start, cs + inserted),
    };

    if next.end <= next.start {
        next.end = next.start + 1;
    }
    next
}

/// Changes ordered bottom-up by start position. Ties fall back to end position
/// and text so the order never depends on how the host listed them.
pub fn sort_bottom_up(changes: &[RawChange]) -> Vec<&RawChange> {
    let mut sorted: Vec<&RawChange> = changes.iter().collect();
    sorted.sort_by(|a, b| {
        b.range
            .start
            .cmp(&a.range.start)
            .then_with(|| b.range.end.cmp(&a.range.end))
            .then_with(|| b.text.cmp(&a.text))
    });
    sorted
}

/// Fold all changes of one notification into a span.
pub fn rebase_span(span: LineSpan, changes: &[RawChange]) -> LineSpan {
    sort_bottom_up(changes)
        .into_iter()
        .fold(span, |span, change| apply_change(span, change))
}

/// Rebase a segment in place against the raw changes of one notification.
///
/// Fails without touching the segment if a rebased coordinate falls outside the
/// line number space.
pub fn rebase_segment(segment: &mut Segment, changes: &[RawChange]) -> Result<(), SegmenterError> {
    let span = LineSpan::new(
        segment.range_start_line as i64,
        segment.range_end_line_exclusive as i64,
    );
    let rebased = rebase_span(span, changes);

    if rebased.start < 0 {
        return Err(SegmenterError::LineUnderflow {
            document_uri: segment.document_uri.clone(),
            line: rebased.start,
        });
    }
    let to_line = |line: i64| {
        u32::try_from(line).map_err(|_| {
            SegmenterError::Generic(format!(
                "Rebased line {} for {} does not fit in a line number",
                line, segment.document_uri
            ))
        })
    };
    let start = to_line(rebased.start)?;
    let end = to_line(rebased.end)?;

    segment.range_start_line = start;
    segment.range_end_line_exclusive = end;
    Ok(())
}
