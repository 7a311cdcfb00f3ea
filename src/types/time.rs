use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use regex::Regex;

/// Regex used to find an embedded date when no pattern is given.
pub const DEFAULT_DATE_REGEX: &str = r"\d{6}";

/// strftime format paired with [`DEFAULT_DATE_REGEX`].
pub const DEFAULT_DATE_FORMAT: &str = "%m%d%y";

/// Date comparison operators accepted in front of a date literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    /// Resolve `op at` into an inclusive `[start, end]` range.
    ///
    /// `=` covers the whole calendar day of `at`; strict comparisons are
    /// shifted by one microsecond.
    #[must_use]
    pub fn bounds(self, at: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        match self {
            CompareOp::Eq => {
                let day = at.date();
                (
                    day.and_time(NaiveTime::MIN),
                    day.and_hms_opt(23, 59, 59).unwrap_or(at),
                )
            }
            CompareOp::Lte => (NaiveDateTime::MIN, at),
            CompareOp::Gte => (at, NaiveDateTime::MAX),
            CompareOp::Lt => (NaiveDateTime::MIN, at - TimeDelta::microseconds(1)),
            CompareOp::Gt => (at + TimeDelta::microseconds(1), NaiveDateTime::MAX),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompareOp::Eq => write!(f, "="),
            CompareOp::Gt => write!(f, ">"),
            CompareOp::Gte => write!(f, ">="),
            CompareOp::Lt => write!(f, "<"),
            CompareOp::Lte => write!(f, "<="),
        }
    }
}

/// A regex locating a date inside a candidate plus the strftime format that
/// parses the located text.
#[derive(Debug, Clone)]
pub struct DatePattern {
    regex: Regex,
    format: String,
}

/// Placeholder vocabulary for [`DatePattern::from_template`], longest first.
const TEMPLATE_TOKENS: &[(&str, &str, &str)] = &[
    ("YYYY", "%Y", r"\d{4}"),
    ("YY", "%y", r"\d\d"),
    ("MM", "%m", r"\d\d"),
    ("DD", "%d", r"\d\d"),
    ("HH", "%H", r"\d\d"),
    ("mm", "%M", r"\d\d"),
    ("PM", "%p", "(?:AM|PM)"),
    ("hh", "%I", r"\d\d"),
];

impl DatePattern {
    /// Build a pattern from an explicit regex and strftime format.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if `regex` does not compile.
    pub fn new(regex: &str, format: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(regex)?,
            format: format.into(),
        })
    }

    /// The `\d{6}` / `%m%d%y` pattern used for names like `show_120105.mp3`.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`DatePattern::new`].
    pub fn standard() -> Result<Self, regex::Error> {
        Self::new(DEFAULT_DATE_REGEX, DEFAULT_DATE_FORMAT)
    }

    /// Convert a template such as `YYMMDD` or `YYYY-MM-DD_HHmm` into a
    /// regex/format pair. Characters outside the vocabulary
    /// (`YYYY YY MM DD HH mm PM hh`) match themselves.
    ///
    /// # Errors
    ///
    /// Returns [`regex::Error`] if the generated regex does not compile.
    pub fn from_template(template: &str) -> Result<Self, regex::Error> {
        let mut regex = String::new();
        let mut format = String::new();
        let mut rest = template;

        'outer: while let Some(ch) = rest.chars().next() {
            for &(token, directive, pattern) in TEMPLATE_TOKENS {
                if let Some(tail) = rest.strip_prefix(token) {
                    regex.push_str(pattern);
                    format.push_str(directive);
                    rest = tail;
                    continue 'outer;
                }
            }
            regex.push_str(&regex::escape(ch.encode_utf8(&mut [0; 4])));
            if ch == '%' {
                format.push_str("%%");
            } else {
                format.push(ch);
            }
            rest = &rest[ch.len_utf8()..];
        }

        Self::new(&regex, format)
    }

    #[must_use]
    pub fn regex(&self) -> &str {
        self.regex.as_str()
    }

    #[must_use]
    pub fn format(&self) -> &str {
        &self.format
    }

    /// Find the first date embedded in `target`.
    ///
    /// Returns `None` when nothing matches the regex or the matched text does
    /// not parse with the format; the latter is logged.
    #[must_use]
    pub fn extract(&self, target: &str) -> Option<NaiveDateTime> {
        let found = self.regex.find(target)?;
        let parsed = parse_datetime(found.as_str(), &self.format);
        if parsed.is_none() {
            tracing::warn!(
                text = found.as_str(),
                target,
                format = %self.format,
                "error in time format"
            );
        }
        parsed
    }
}

fn parse_datetime(text: &str, format: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, format)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// Where a [`TimeRange`] reads the instant it tests.
#[derive(Debug, Clone)]
pub enum TimeSource {
    /// The wall-clock time at evaluation.
    Now,
    /// A date embedded in the candidate string.
    Embedded(DatePattern),
}

/// An inclusive datetime range.
#[derive(Debug, Clone)]
pub struct TimeRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub source: TimeSource,
}

impl TimeRange {
    /// A range tested against the current time.
    #[must_use]
    pub fn now(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            source: TimeSource::Now,
        }
    }

    /// A range tested against a date found in the candidate.
    #[must_use]
    pub fn embedded(start: NaiveDateTime, end: NaiveDateTime, pattern: DatePattern) -> Self {
        Self {
            start,
            end,
            source: TimeSource::Embedded(pattern),
        }
    }

    /// A range built from a comparator, e.g. `>= 12-01-2005`.
    #[must_use]
    pub fn compare(op: CompareOp, at: NaiveDateTime) -> Self {
        let (start, end) = op.bounds(at);
        Self::now(start, end)
    }

    #[must_use]
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant <= self.end
    }

    /// Switch the source to a pattern embedded in the candidate.
    #[must_use]
    pub fn with_pattern(mut self, pattern: DatePattern) -> Self {
        self.source = TimeSource::Embedded(pattern);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn eq_covers_whole_day() {
        let (start, end) = CompareOp::Eq.bounds(dt(2005, 12, 1, 0, 0, 0));
        assert_eq!(start, dt(2005, 12, 1, 0, 0, 0));
        assert_eq!(end, dt(2005, 12, 1, 23, 59, 59));
    }

    #[test]
    fn strict_bounds_shift_by_a_microsecond() {
        let at = dt(2005, 12, 1, 0, 0, 0);
        let (_, end) = CompareOp::Lt.bounds(at);
        assert!(end < at);
        assert_eq!(at - end, TimeDelta::microseconds(1));

        let (start, end) = CompareOp::Gt.bounds(at);
        assert!(start > at);
        assert_eq!(end, NaiveDateTime::MAX);
    }

    #[test]
    fn open_ended_bounds() {
        let at = dt(2001, 1, 1, 0, 0, 0);
        assert_eq!(CompareOp::Lte.bounds(at), (NaiveDateTime::MIN, at));
        assert_eq!(CompareOp::Gte.bounds(at), (at, NaiveDateTime::MAX));
    }

    #[test]
    fn template_expansion() {
        let p = DatePattern::from_template("YYMMDD").unwrap();
        assert_eq!(p.regex(), r"\d\d\d\d\d\d");
        assert_eq!(p.format(), "%y%m%d");

        let p = DatePattern::from_template("YYYY-MM-DD_hhmmPM").unwrap();
        assert_eq!(p.format(), "%Y-%m-%d_%I%M%p");
        assert_eq!(p.regex(), r"\d{4}\-\d\d\-\d\d_\d\d\d\d(?:AM|PM)");
    }

    #[test]
    fn template_escapes_percent() {
        let p = DatePattern::from_template("%YYYY").unwrap();
        assert_eq!(p.format(), "%%%Y");
    }

    #[test]
    fn extract_with_template() {
        let p = DatePattern::from_template("YYMMDD").unwrap();
        assert_eq!(
            p.extract("/zinger051201pod.mp3"),
            Some(dt(2005, 12, 1, 0, 0, 0))
        );
    }

    #[test]
    fn extract_default_pattern() {
        let p = DatePattern::standard().unwrap();
        assert_eq!(p.extract("show_120105.mp3"), Some(dt(2005, 12, 1, 0, 0, 0)));
        assert_eq!(p.extract("show.mp3"), None);
    }

    #[test]
    fn extract_with_time() {
        let p = DatePattern::from_template("YYYYMMDDHHmm").unwrap();
        assert_eq!(
            p.extract("ep-200512011430.mp3"),
            Some(dt(2005, 12, 1, 14, 30, 0))
        );
    }

    #[test]
    fn extract_unparseable_is_none() {
        // 13th month
        let p = DatePattern::standard().unwrap();
        assert_eq!(p.extract("show_133105.mp3"), None);
    }

    #[test]
    fn range_is_inclusive() {
        let range = TimeRange::now(dt(2005, 1, 1, 0, 0, 0), dt(2005, 12, 31, 0, 0, 0));
        assert!(range.contains(dt(2005, 1, 1, 0, 0, 0)));
        assert!(range.contains(dt(2005, 12, 31, 0, 0, 0)));
        assert!(!range.contains(dt(2006, 1, 1, 0, 0, 0)));
    }
}
