/// Tests for the per-document segment state machine.
///
/// Coverage areas:
/// 1. Opening, merging and closing on human-like edits
/// 2. Rebasing on foreign edits without opening or closing
/// 3. Force close, idle close, shutdown flush
/// 4. The one-open-segment-per-document invariant across many documents
use git_ai_segments::config::{ManualClock, SegmenterConfig};
use git_ai_segments::error::SegmenterError;
use git_ai_segments::segments::{
    ChangeEvent, CloseReason, EventClassification, Position, Range, RawChange, Segmenter,
    classify_changes,
};
use std::sync::Arc;

const DOC: &str = "file:///workspace/src/app.ts";

fn config_with_clock() -> (SegmenterConfig, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    (SegmenterConfig::default().with_clock(clock.clone()), clock)
}

fn single(uri: &str, line: u32, text: &str) -> ChangeEvent {
    ChangeEvent::new(uri, vec![RawChange::insertion(line, 0, text)]).unwrap()
}

fn feed(
    segmenter: &mut Segmenter,
    event: &ChangeEvent,
    config: &SegmenterConfig,
) -> Vec<git_ai_segments::segments::Segment> {
    let classified = classify_changes(&event.content_changes, &config.classifier);
    segmenter
        .on_did_change_text_document(event, classified.event_classification, config)
        .unwrap()
}

fn range_of(segmenter: &Segmenter, uri: &str) -> (u32, u32) {
    let s = segmenter.open_segment(uri).expect("open segment");
    (s.range_start_line, s.range_end_line_exclusive)
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_adjacent_single_changes_merge() {
    let (mut config, _clock) = config_with_clock();
    config.adjacency_gap_lines = 1;
    let mut segmenter = Segmenter::new();

    assert!(feed(&mut segmenter, &single(DOC, 0, "a"), &config).is_empty());
    assert!(feed(&mut segmenter, &single(DOC, 1, "b"), &config).is_empty());

    assert_eq!(segmenter.get_all_open_segments_uris(), vec![DOC.to_string()]);
    assert_eq!(range_of(&segmenter, DOC), (0, 2));
}

#[test]
fn test_distant_change_closes_and_reopens() {
    let (mut config, clock) = config_with_clock();
    config.adjacency_gap_lines = 1;
    let mut segmenter = Segmenter::new();

    feed(&mut segmenter, &single(DOC, 2, "a"), &config);
    clock.advance(1_000);
    let closed = feed(&mut segmenter, &single(DOC, 10, "b"), &config);

    assert_eq!(closed.len(), 1);
    let segment = &closed[0];
    assert!(segment.closed);
    assert_eq!(segment.range_start_line, 2);
    assert_eq!(segment.range_end_line_exclusive, 3);
    assert_eq!(segment.close_reason, Some(CloseReason::AdjacencyGap));
    assert_eq!(segment.ended_at, segment.started_at + 1_000);
    assert_eq!(segment.file_name, "app.ts");

    assert_eq!(range_of(&segmenter, DOC), (10, 11));
    assert!(!segmenter.open_segment(DOC).unwrap().closed);
}

#[test]
fn test_foreign_insert_above_rebases_open_segment() {
    let (config, _clock) = config_with_clock();
    let mut segmenter = Segmenter::new();
    feed(&mut segmenter, &single(DOC, 10, "x"), &config);

    let foreign = ChangeEvent::new(
        DOC,
        vec![
            RawChange::insertion(5, 0, "one\ntwo\nthree\n"),
            RawChange::insertion(40, 0, "tail"),
        ],
    )
    .unwrap();
    let classified = classify_changes(&foreign.content_changes, &config.classifier);
    assert_eq!(classified.event_classification, EventClassification::MultiChange);

    let closed = segmenter
        .on_did_change_text_document(&foreign, classified.event_classification, &config)
        .unwrap();
    assert!(closed.is_empty());
    assert_eq!(range_of(&segmenter, DOC), (13, 14));
}

#[test]
fn test_foreign_edit_does_not_bump_ended_at() {
    let (config, clock) = config_with_clock();
    let mut segmenter = Segmenter::new();
    feed(&mut segmenter, &single(DOC, 10, "x"), &config);
    let ended_at = segmenter.open_segment(DOC).unwrap().ended_at;

    clock.advance(5_000);
    let foreign = ChangeEvent::new(
        DOC,
        vec![RawChange::insertion(1, 0, "a"), RawChange::insertion(2, 0, "bb")],
    )
    .unwrap();
    segmenter
        .on_did_change_text_document(&foreign, EventClassification::MultiChange, &config)
        .unwrap();
    assert_eq!(segmenter.open_segment(DOC).unwrap().ended_at, ended_at);
}

// =============================================================================
// Properties
// =============================================================================

#[test]
fn test_merge_is_union_of_ranges() {
    let (mut config, _clock) = config_with_clock();
    config.adjacency_gap_lines = 3;
    let mut segmenter = Segmenter::new();

    feed(&mut segmenter, &single(DOC, 5, "a"), &config);
    // Paste two lines three lines above: the segment moves to [7, 8) and the
    // event covers [2, 5) post change, two lines apart
    feed(&mut segmenter, &single(DOC, 2, "x\ny\n"), &config);
    assert_eq!(range_of(&segmenter, DOC), (2, 8));

    // An edit inside the segment never shrinks it
    feed(&mut segmenter, &single(DOC, 3, "z"), &config);
    assert_eq!(range_of(&segmenter, DOC), (2, 8));
}

#[test]
fn test_human_delete_above_closes_segment_at_its_new_lines() {
    let (mut config, _clock) = config_with_clock();
    config.adjacency_gap_lines = 1;
    let mut segmenter = Segmenter::new();
    feed(&mut segmenter, &single(DOC, 10, "x"), &config);

    let delete = ChangeEvent::new(
        DOC,
        vec![RawChange::new(Range::new(Position::new(2, 0), Position::new(7, 0)), "")],
    )
    .unwrap();
    let closed = feed(&mut segmenter, &delete, &config);

    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].close_reason, Some(CloseReason::AdjacencyGap));
    assert_eq!(
        (closed[0].range_start_line, closed[0].range_end_line_exclusive),
        (5, 6)
    );
    assert_eq!(range_of(&segmenter, DOC), (2, 3));
}

#[test]
fn test_human_delete_touching_segment_merges_rebased_span() {
    let (mut config, _clock) = config_with_clock();
    config.adjacency_gap_lines = 1;
    let mut segmenter = Segmenter::new();
    feed(&mut segmenter, &single(DOC, 10, "x"), &config);

    let delete = ChangeEvent::new(
        DOC,
        vec![RawChange::new(Range::new(Position::new(8, 0), Position::new(10, 0)), "")],
    )
    .unwrap();
    assert!(feed(&mut segmenter, &delete, &config).is_empty());
    assert_eq!(range_of(&segmenter, DOC), (8, 9));
}

#[test]
fn test_same_line_foreign_edit_keeps_boundaries() {
    let (config, _clock) = config_with_clock();
    let mut segmenter = Segmenter::new();
    feed(&mut segmenter, &single(DOC, 4, "\n\n"), &config);
    let before = range_of(&segmenter, DOC);

    let same_line = ChangeEvent::new(
        DOC,
        vec![
            RawChange::new(Range::new(Position::new(0, 2), Position::new(0, 9)), "renamed"),
            RawChange::new(Range::new(Position::new(5, 0), Position::new(5, 3)), "foo"),
            RawChange::new(Range::new(Position::new(20, 1), Position::new(20, 1)), "bar"),
        ],
    )
    .unwrap();
    segmenter
        .on_did_change_text_document(&same_line, EventClassification::MultiChange, &config)
        .unwrap();
    assert_eq!(range_of(&segmenter, DOC), before);
}

#[test]
fn test_one_open_segment_per_document() {
    let (mut config, _clock) = config_with_clock();
    config.adjacency_gap_lines = 0;
    let mut segmenter = Segmenter::new();
    let docs = ["file:///a.rs", "file:///b.rs", "file:///c.rs"];

    let mut closed_total = 0;
    for round in 0..10u32 {
        for doc in docs {
            closed_total += feed(&mut segmenter, &single(doc, round * 7, "k"), &config).len();
        }
        assert_eq!(segmenter.open_segment_count(), docs.len());
    }
    // Every edit after the first per document was too far away
    assert_eq!(closed_total, 9 * docs.len());
    assert_eq!(
        segmenter.get_all_open_segments_uris(),
        docs.iter().map(|d| d.to_string()).collect::<Vec<_>>()
    );
}

#[test]
fn test_close_segment_by_doc_uri_is_idempotent() {
    let (config, _clock) = config_with_clock();
    let mut segmenter = Segmenter::new();
    feed(&mut segmenter, &single(DOC, 0, "a"), &config);

    let closed = segmenter.close_segment_by_doc_uri(DOC).expect("first close");
    assert!(closed.closed);
    assert_eq!(closed.close_reason, Some(CloseReason::ForceClosed));
    assert!(segmenter.close_segment_by_doc_uri(DOC).is_none());
    assert!(segmenter.get_all_open_segments_uris().is_empty());
}

#[test]
fn test_closed_segment_is_a_snapshot() {
    let (config, _clock) = config_with_clock();
    let mut segmenter = Segmenter::new();
    feed(&mut segmenter, &single(DOC, 2, "a"), &config);
    let closed = feed(&mut segmenter, &single(DOC, 50, "b"), &config);

    // Later foreign edits move the new open segment but not the returned one
    let foreign = ChangeEvent::new(
        DOC,
        vec![RawChange::insertion(0, 0, "\n\n\n"), RawChange::insertion(1, 0, "x")],
    )
    .unwrap();
    segmenter
        .on_did_change_text_document(&foreign, EventClassification::MultiChange, &config)
        .unwrap();

    assert_eq!(closed[0].range_start_line, 2);
    assert_eq!(range_of(&segmenter, DOC), (53, 54));
}

#[test]
fn test_text_content_is_left_to_the_caller() {
    let (config, _clock) = config_with_clock();
    let mut segmenter = Segmenter::new();
    feed(&mut segmenter, &single(DOC, 2, "let x = 1;"), &config);
    let closed = segmenter.close_segment_by_doc_uri(DOC).unwrap();
    assert!(closed.text_content.is_none());

    let with_text = closed.with_text_content("let x = 1;\n");
    assert_eq!(with_text.text_content.as_deref(), Some("let x = 1;\n"));
}

#[test]
fn test_human_like_event_without_changes_is_an_error() {
    let (config, _clock) = config_with_clock();
    let mut segmenter = Segmenter::new();
    let event = ChangeEvent::new(DOC, vec![]).unwrap();
    let err = segmenter
        .on_did_change_text_document(&event, EventClassification::LargeInsert, &config)
        .unwrap_err();
    assert!(matches!(err, SegmenterError::EmptyChangeList));
    assert_eq!(segmenter.open_segment_count(), 0);
}

#[test]
fn test_multi_line_human_edit_opens_over_all_lines() {
    let (config, _clock) = config_with_clock();
    let mut segmenter = Segmenter::new();
    let toggle = ChangeEvent::new(
        DOC,
        (3..=5).map(|l| RawChange::insertion(l, 0, "//")).collect(),
    )
    .unwrap();
    feed(&mut segmenter, &toggle, &config);
    assert_eq!(range_of(&segmenter, DOC), (3, 6));
}
