use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use glob::Pattern;
use serde::Deserialize;

pub const DEFAULT_ADJACENCY_GAP_LINES: u32 = 1;
pub const DEFAULT_MAX_SEGMENT_DURATION_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_MAX_SEGMENT_CHARS: usize = 5000;
pub const DEFAULT_LARGE_INSERT_THRESHOLD: usize = 100;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30 * 1000;

/// Documents that editor hosts report changes for but that are never user code
pub const DEFAULT_EXCLUDE_DOCUMENTS: &[&str] = &["output:*", "git:*", "vscode-*:*"];

const ENV_PREFIX: &str = "GIT_AI_SEGMENTER_";

/// Source of the current time in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// Clock that only moves when told to. Used by tests and by log replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        ManualClock {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<F> Clock for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn now_ms(&self) -> u64 {
        self()
    }
}

/// How the classifier decides that the changes of a multi-cursor batch are "the same edit"
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MultiLineMatch {
    /// Every change inserts byte-identical text
    #[default]
    IdenticalText,
    /// Every change inserts text of the same length
    EqualLength,
}

impl MultiLineMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            MultiLineMatch::IdenticalText => "identical_text",
            MultiLineMatch::EqualLength => "equal_length",
        }
    }

    fn from_str(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "identical_text" => Some(MultiLineMatch::IdenticalText),
            "equal_length" => Some(MultiLineMatch::EqualLength),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Single-change insertions at least this many characters long are large inserts
    pub large_insert_threshold: usize,
    pub multi_line_match: MultiLineMatch,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        ClassifierConfig {
            large_insert_threshold: DEFAULT_LARGE_INSERT_THRESHOLD,
            multi_line_match: MultiLineMatch::default(),
        }
    }
}

/// Tunables for the segmenter plus the clock it reads.
#[derive(Clone)]
pub struct SegmenterConfig {
    pub max_segment_duration_ms: u64,
    pub max_segment_chars: usize,
    pub adjacency_gap_lines: u32,
    pub idle_timeout_ms: u64,
    pub classifier: ClassifierConfig,
    pub exclude_documents: Vec<Pattern>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SegmenterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SegmenterConfig")
            .field("max_segment_duration_ms", &self.max_segment_duration_ms)
            .field("max_segment_chars", &self.max_segment_chars)
            .field("adjacency_gap_lines", &self.adjacency_gap_lines)
            .field("idle_timeout_ms", &self.idle_timeout_ms)
            .field("classifier", &self.classifier)
            .field(
                "exclude_documents",
                &self
                    .exclude_documents
                    .iter()
                    .map(Pattern::as_str)
                    .collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        SegmenterConfig {
            max_segment_duration_ms: DEFAULT_MAX_SEGMENT_DURATION_MS,
            max_segment_chars: DEFAULT_MAX_SEGMENT_CHARS,
            adjacency_gap_lines: DEFAULT_ADJACENCY_GAP_LINES,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            classifier: ClassifierConfig::default(),
            exclude_documents: compile_patterns(
                DEFAULT_EXCLUDE_DOCUMENTS.iter().map(|s| s.to_string()),
            ),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Deserializable version of SegmenterConfig with all optional fields, shared by the
/// config file and the environment overrides
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub(crate) struct FileSegmenterConfig {
    max_segment_duration_ms: Option<u64>,
    max_segment_chars: Option<usize>,
    adjacency_gap_lines: Option<u32>,
    idle_timeout_ms: Option<u64>,
    large_insert_threshold: Option<usize>,
    multi_line_match: Option<String>,
    exclude_documents: Option<Vec<String>>,
}

impl FileSegmenterConfig {
    /// Values set in `other` win over values set in `self`
    fn overlay(self, other: FileSegmenterConfig) -> FileSegmenterConfig {
        FileSegmenterConfig {
            max_segment_duration_ms: other.max_segment_duration_ms.or(self.max_segment_duration_ms),
            max_segment_chars: other.max_segment_chars.or(self.max_segment_chars),
            adjacency_gap_lines: other.adjacency_gap_lines.or(self.adjacency_gap_lines),
            idle_timeout_ms: other.idle_timeout_ms.or(self.idle_timeout_ms),
            large_insert_threshold: other.large_insert_threshold.or(self.large_insert_threshold),
            multi_line_match: other.multi_line_match.or(self.multi_line_match),
            exclude_documents: other.exclude_documents.or(self.exclude_documents),
        }
    }
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    segmenter: Option<FileSegmenterConfig>,
}

static CONFIG: OnceLock<SegmenterConfig> = OnceLock::new();

impl SegmenterConfig {
    /// Access the process-wide configuration, loading it from
    /// `~/.git-ai/config.json` and the environment on first use.
    pub fn get() -> &'static SegmenterConfig {
        CONFIG.get_or_init(SegmenterConfig::load)
    }

    /// Load from the default config file location plus environment overrides.
    pub fn load() -> SegmenterConfig {
        SegmenterConfig::load_from(config_file_path().as_deref())
    }

    /// Load from an explicit config file (missing or unreadable files fall back to
    /// defaults) plus `GIT_AI_SEGMENTER_*` environment overrides.
    pub fn load_from(path: Option<&Path>) -> SegmenterConfig {
        let file_cfg = path.and_then(load_file_config).unwrap_or_default();
        let env_cfg = load_env_config().unwrap_or_default();
        SegmenterConfig::from_file_config(file_cfg.overlay(env_cfg))
    }

    /// Build a config from file values, falling back to defaults for any invalid
    /// or missing value
    pub(crate) fn from_file_config(file_cfg: FileSegmenterConfig) -> SegmenterConfig {
        let defaults = SegmenterConfig::default();

        let multi_line_match = match file_cfg.multi_line_match.as_deref() {
            Some(raw) => MultiLineMatch::from_str(raw).unwrap_or_else(|| {
                eprintln!(
                    "Warning: Unknown multi_line_match '{}', using '{}'",
                    raw,
                    defaults.classifier.multi_line_match.as_str()
                );
                defaults.classifier.multi_line_match
            }),
            None => defaults.classifier.multi_line_match,
        };

        let exclude_documents = match file_cfg.exclude_documents {
            Some(patterns) => compile_patterns(patterns.into_iter()),
            None => defaults.exclude_documents.clone(),
        };

        SegmenterConfig {
            max_segment_duration_ms: file_cfg
                .max_segment_duration_ms
                .unwrap_or(defaults.max_segment_duration_ms),
            max_segment_chars: file_cfg
                .max_segment_chars
                .unwrap_or(defaults.max_segment_chars),
            adjacency_gap_lines: file_cfg
                .adjacency_gap_lines
                .unwrap_or(defaults.adjacency_gap_lines),
            idle_timeout_ms: file_cfg.idle_timeout_ms.unwrap_or(defaults.idle_timeout_ms),
            classifier: ClassifierConfig {
                large_insert_threshold: file_cfg
                    .large_insert_threshold
                    .unwrap_or(defaults.classifier.large_insert_threshold),
                multi_line_match,
            },
            exclude_documents,
            clock: defaults.clock,
        }
    }

    /// Replace the clock the segmenter reads `now` from.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Returns true if changes to this document should never be tracked
    pub fn is_excluded_document(&self, uri: &str) -> bool {
        self.exclude_documents.iter().any(|p| p.matches(uri))
    }
}

fn compile_patterns(patterns: impl Iterator<Item = String>) -> Vec<Pattern> {
    patterns
        .filter_map(|pattern_str| {
            Pattern::new(&pattern_str)
                .map_err(|e| {
                    eprintln!(
                        "Warning: Invalid glob pattern in exclude_documents '{}': {}",
                        pattern_str, e
                    );
                })
                .ok()
        })
        .collect()
}

fn load_file_config(path: &Path) -> Option<FileSegmenterConfig> {
    let data = fs::read(path).ok()?;
    serde_json::from_slice::<FileConfig>(&data).ok()?.segmenter
}

fn load_env_config() -> Option<FileSegmenterConfig> {
    envy::prefixed(ENV_PREFIX)
        .from_env::<FileSegmenterConfig>()
        .map_err(|e| {
            eprintln!("Warning: Ignoring invalid {}* environment: {}", ENV_PREFIX, e);
        })
        .ok()
}

fn config_file_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".git-ai").join("config.json"))
}
