use std::fmt;

/// One entry of an evaluated playlist.
///
/// The `original` flag is structural: two symbols with the same text differ
/// when only one of them refers to the candidate that was evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[must_use]
pub struct Symbol {
    text: String,
    original: bool,
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.original {
            write!(f, "{} (original)", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

impl Symbol {
    /// A symbol naming the evaluated candidate itself.
    pub fn original(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            original: true,
        }
    }

    /// A symbol naming an auxiliary clip.
    pub fn clip(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            original: false,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn is_original(&self) -> bool {
        self.original
    }

    #[must_use]
    pub fn into_parts(self) -> (String, bool) {
        (self.text, self.original)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.text
    }
}
