//! Query results returned by the remote index.

use crate::primitives::PrimitiveError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive line span with 1-indexed boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSpan {
    start_line: u32,
    end_line: u32,
}

impl LineSpan {
    /// Construct a validated line span.
    pub const fn new(start_line: u32, end_line: u32) -> Result<Self, PrimitiveError> {
        if start_line == 0 || end_line == 0 {
            return Err(PrimitiveError::LineSpanNonPositive {
                start_line,
                end_line,
            });
        }

        if start_line > end_line {
            return Err(PrimitiveError::LineSpanStartAfterEnd {
                start_line,
                end_line,
            });
        }

        Ok(Self {
            start_line,
            end_line,
        })
    }

    /// Returns the starting line (1-indexed).
    #[must_use]
    pub const fn start_line(&self) -> u32 {
        self.start_line
    }

    /// Returns the ending line (1-indexed).
    #[must_use]
    pub const fn end_line(&self) -> u32 {
        self.end_line
    }

    /// Returns true when the span covers exactly one line.
    #[must_use]
    pub const fn is_single_line(&self) -> bool {
        self.start_line == self.end_line
    }
}

/// `Line 4` for single-line spans, `Line 4 - 9` otherwise.
impl fmt::Display for LineSpan {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_line() {
            write!(formatter, "Line {}", self.start_line)
        } else {
            write!(formatter, "Line {} - {}", self.start_line, self.end_line)
        }
    }
}

/// One ranked match from a repository query.
///
/// `path` is kept as the remote reported it; it is not required to exist
/// locally any more.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMatch {
    /// Repository-relative path of the matching file.
    pub path: Box<str>,
    /// Matching line range.
    pub span: LineSpan,
    /// Matching source excerpt.
    pub content: Box<str>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn line_span_rejects_non_positive() {
        let error = LineSpan::new(0, 2).err();
        assert!(matches!(
            error,
            Some(PrimitiveError::LineSpanNonPositive { .. })
        ));
    }

    #[test]
    fn line_span_rejects_inverted_bounds() {
        let error = LineSpan::new(3, 2).err();
        assert!(matches!(
            error,
            Some(PrimitiveError::LineSpanStartAfterEnd { .. })
        ));
    }

    #[test]
    fn line_span_labels() -> Result<(), PrimitiveError> {
        assert_eq!(LineSpan::new(7, 7)?.to_string(), "Line 7");
        assert_eq!(LineSpan::new(3, 12)?.to_string(), "Line 3 - 12");
        Ok(())
    }

    proptest! {
        #[test]
        fn line_span_accepts_ordered_ranges((start, end) in ordered_line_span()) {
            let span = LineSpan::new(start, end);
            prop_assert!(span.is_ok());
        }
    }

    fn ordered_line_span() -> impl Strategy<Value = (u32, u32)> {
        (1u32..5000, 0u32..200).prop_map(|(start, extra)| (start, start + extra))
    }
}
