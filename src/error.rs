use std::fmt;

#[derive(Debug)]
pub enum SegmenterError {
    /// Line span derivation was invoked on a notification with no changes
    EmptyChangeList,
    /// A change range whose start position lies after its end position
    InvalidRange {
        start_line: u32,
        start_character: u32,
        end_line: u32,
        end_character: u32,
    },
    /// A rebase pushed a segment coordinate below line zero (tracked state drifted
    /// from the real document)
    LineUnderflow {
        document_uri: String,
        line: i64,
    },
    IoError(std::io::Error),
    JsonError(serde_json::Error),
    Generic(String),
}

impl fmt::Display for SegmenterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmenterError::EmptyChangeList => {
                write!(f, "Cannot derive a line span from an empty change list")
            }
            SegmenterError::InvalidRange {
                start_line,
                start_character,
                end_line,
                end_character,
            } => write!(
                f,
                "Invalid range: start {}:{} is after end {}:{}",
                start_line, start_character, end_line, end_character
            ),
            SegmenterError::LineUnderflow { document_uri, line } => write!(
                f,
                "Segment for {} rebased to negative line {}",
                document_uri, line
            ),
            SegmenterError::IoError(e) => write!(f, "IO error: {}", e),
            SegmenterError::JsonError(e) => write!(f, "JSON error: {}", e),
            SegmenterError::Generic(e) => write!(f, "Generic error: {}", e),
        }
    }
}

impl std::error::Error for SegmenterError {}

impl From<std::io::Error> for SegmenterError {
    fn from(err: std::io::Error) -> Self {
        SegmenterError::IoError(err)
    }
}

impl From<serde_json::Error> for SegmenterError {
    fn from(err: serde_json::Error) -> Self {
        SegmenterError::JsonError(err)
    }
}

impl Clone for SegmenterError {
    fn clone(&self) -> Self {
        match self {
            SegmenterError::EmptyChangeList => SegmenterError::EmptyChangeList,
            SegmenterError::InvalidRange {
                start_line,
                start_character,
                end_line,
                end_character,
            } => SegmenterError::InvalidRange {
                start_line: *start_line,
                start_character: *start_character,
                end_line: *end_line,
                end_character: *end_character,
            },
            SegmenterError::LineUnderflow { document_uri, line } => {
                SegmenterError::LineUnderflow {
                    document_uri: document_uri.clone(),
                    line: *line,
                }
            }
            SegmenterError::IoError(e) => {
                SegmenterError::IoError(std::io::Error::new(e.kind(), e.to_string()))
            }
            SegmenterError::JsonError(e) => SegmenterError::Generic(format!("JSON error: {}", e)),
            SegmenterError::Generic(s) => SegmenterError::Generic(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_empty_change_list() {
        let err = SegmenterError::EmptyChangeList;
        assert!(format!("{}", err).contains("empty change list"));
    }

    #[test]
    fn test_error_display_invalid_range() {
        let err = SegmenterError::InvalidRange {
            start_line: 4,
            start_character: 2,
            end_line: 3,
            end_character: 0,
        };
        let display = format!("{}", err);
        assert!(display.contains("4:2"));
        assert!(display.contains("3:0"));
    }

    #[test]
    fn test_error_display_line_underflow() {
        let err = SegmenterError::LineUnderflow {
            document_uri: "file:///tmp/a.rs".to_string(),
            line: -2,
        };
        let display = format!("{}", err);
        assert!(display.contains("file:///tmp/a.rs"));
        assert!(display.contains("-2"));
    }

    #[test]
    fn test_error_display_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = SegmenterError::from(io_err);
        let display = format!("{}", err);
        assert!(display.contains("IO error"));
        assert!(display.contains("file not found"));
    }

    #[test]
    fn test_error_display_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json").unwrap_err();
        let err = SegmenterError::from(json_err);
        assert!(format!("{}", err).contains("JSON error"));
    }

    #[test]
    fn test_error_clone_json_converts_to_generic() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
        let err = SegmenterError::from(json_err);
        let cloned = err.clone();
        assert!(matches!(cloned, SegmenterError::Generic(_)));
        assert!(format!("{}", cloned).contains("JSON error"));
    }

    #[test]
    fn test_error_clone_keeps_structured_variants() {
        let err = SegmenterError::LineUnderflow {
            document_uri: "file:///x".to_string(),
            line: -1,
        };
        match err.clone() {
            SegmenterError::LineUnderflow { document_uri, line } => {
                assert_eq!(document_uri, "file:///x");
                assert_eq!(line, -1);
            }
            _ => panic!("Expected LineUnderflow"),
        }
        assert!(matches!(
            SegmenterError::EmptyChangeList.clone(),
            SegmenterError::EmptyChangeList
        ));
    }

    #[test]
    fn test_error_is_std_error() {
        let err = SegmenterError::Generic("test".to_string());
        let _: &dyn std::error::Error = &err;
    }
}
