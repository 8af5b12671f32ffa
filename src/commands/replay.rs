//! `git-ai-segments replay`: run a recorded stream of change notifications through
//! the tracker and print every segment that closes, one JSON object per line.

use crate::config::{ManualClock, SegmenterConfig};
use crate::error::SegmenterError;
use crate::observability::{self, log_message};
use crate::segments::tracker::DocumentTracker;
use crate::segments::types::{ChangeEvent, DocumentRef, RawChange, Segment};
use clap::Args;
use serde::Deserialize;
use serde_json::json;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    /// JSON-lines file of change notifications ("-" for stdin)
    pub input: PathBuf,

    /// Config file to read instead of ~/.git-ai/config.json
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub adjacency_gap_lines: Option<u32>,

    #[arg(long)]
    pub max_segment_duration_ms: Option<u64>,

    #[arg(long)]
    pub max_segment_chars: Option<usize>,

    #[arg(long)]
    pub large_insert_threshold: Option<usize>,

    /// Close idle segments before each timestamped record
    #[arg(long)]
    pub flush_idle: bool,

    /// Write log envelopes to this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

/// One line of a replay log. Either a change notification or a document close.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplayRecord {
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    document: Option<DocumentRef>,
    #[serde(default)]
    content_changes: Vec<RawChange>,
    /// URI of a document closed in the editor
    #[serde(default)]
    close: Option<String>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub events: usize,
    pub closed_segments: usize,
}

pub fn handle_replay(args: &ReplayArgs) -> Result<ReplaySummary, SegmenterError> {
    if let Some(dir) = args.log_dir.as_ref() {
        observability::set_log_dir(dir);
    }

    let mut config = match args.config.as_ref() {
        Some(path) => SegmenterConfig::load_from(Some(path)),
        None => SegmenterConfig::get().clone(),
    };
    if let Some(gap) = args.adjacency_gap_lines {
        config.adjacency_gap_lines = gap;
    }
    if let Some(ms) = args.max_segment_duration_ms {
        config.max_segment_duration_ms = ms;
    }
    if let Some(chars) = args.max_segment_chars {
        config.max_segment_chars = chars;
    }
    if let Some(threshold) = args.large_insert_threshold {
        config.classifier.large_insert_threshold = threshold;
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = if args.input.as_os_str() == "-" {
        run_replay(io::stdin().lock(), &mut out, config, args.flush_idle)?
    } else {
        let file = File::open(&args.input)?;
        run_replay(BufReader::new(file), &mut out, config, args.flush_idle)?
    };

    log_message(
        "replay finished",
        "info",
        Some(json!({
            "events": summary.events,
            "closed_segments": summary.closed_segments,
        })),
    );
    Ok(summary)
}

/// Replay records from `reader`, writing closed segments to `writer`.
///
/// Record timestamps drive the clock; records without one reuse the previous time.
/// Every segment still open at the end of input is flushed.
pub fn run_replay<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    config: SegmenterConfig,
    flush_idle: bool,
) -> Result<ReplaySummary, SegmenterError> {
    let clock = Arc::new(ManualClock::new(0));
    let mut tracker = DocumentTracker::new(config.with_clock(clock.clone()));
    let mut summary = ReplaySummary::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ReplayRecord = serde_json::from_str(&line).map_err(|e| {
            SegmenterError::Generic(format!("line {}: invalid record: {}", index + 1, e))
        })?;

        if let Some(ts) = record.timestamp {
            clock.set(ts);
            if flush_idle {
                let idle = tracker.flush_idle();
                write_segments(writer, &idle, &mut summary)?;
            }
        }

        if let Some(uri) = record.close {
            let closed: Vec<Segment> = tracker.close_document(&uri).into_iter().collect();
            write_segments(writer, &closed, &mut summary)?;
            continue;
        }

        let Some(document) = record.document else {
            return Err(SegmenterError::Generic(format!(
                "line {}: record has neither \"document\" nor \"close\"",
                index + 1
            )));
        };
        let event = ChangeEvent::new(document.uri, record.content_changes)?;
        summary.events += 1;
        let closed = tracker.handle_change(&event);
        write_segments(writer, &closed, &mut summary)?;
    }

    let remaining = tracker.shutdown();
    write_segments(writer, &remaining, &mut summary)?;
    writer.flush()?;
    Ok(summary)
}

fn write_segments<W: Write>(
    writer: &mut W,
    segments: &[Segment],
    summary: &mut ReplaySummary,
) -> Result<(), SegmenterError> {
    for segment in segments {
        serde_json::to_writer(&mut *writer, segment)?;
        writeln!(writer)?;
        summary.closed_segments += 1;
    }
    Ok(())
}
