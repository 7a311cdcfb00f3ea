use std::fmt;

const EXCERPT_LEN: usize = 40;

/// Errors produced when parsing rule text.
///
/// Carries the 1-based line of the failure, a short excerpt of the source
/// at that point and a description of what went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    line: usize,
    excerpt: String,
    message: String,
}

impl ParseError {
    /// Build an error pointing at byte `offset` of `source`.
    pub(crate) fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
        let offset = floor_char_boundary(source, offset.min(source.len()));
        let line = source[..offset].matches('\n').count() + 1;

        let rest = source[offset..].lines().next().unwrap_or("").trim();
        let excerpt = if rest.is_empty() {
            let line_start = source[..offset].rfind('\n').map_or(0, |i| i + 1);
            source[line_start..offset].trim()
        } else {
            rest
        };
        let excerpt = if excerpt.is_empty() {
            "end of input".to_owned()
        } else {
            excerpt.chars().take(EXCERPT_LEN).collect()
        };

        Self {
            line,
            excerpt,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    #[must_use]
    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

fn floor_char_boundary(s: &str, mut offset: usize) -> usize {
    while !s.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "parse error at line {}: {} (near `{}`)",
            self.line, self.message, self.excerpt
        )
    }
}

impl std::error::Error for ParseError {}
