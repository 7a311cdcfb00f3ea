use std::fmt;
use std::ops::{BitOr, BitOrAssign, Not};

use regex::{Regex, RegexBuilder};

use super::time::TimeRange;

/// Regex option bits, combined with `|`.
///
/// The numeric values are stable and used in JSON rule documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RegexFlags(u32);

impl RegexFlags {
    pub const NONE: RegexFlags = RegexFlags(0);
    /// `I`: case-insensitive matching.
    pub const IGNORECASE: RegexFlags = RegexFlags(2);
    /// `L`: locale-dependent classes. Accepted for compatibility; Rust
    /// regexes have no locale mode, so it does not change matching.
    pub const LOCALE: RegexFlags = RegexFlags(4);
    /// `U`: Unicode-aware `\w`, `\d`, `\s`. Always on for Rust regexes.
    pub const UNICODE: RegexFlags = RegexFlags(32);

    const ALL: u32 = 2 | 4 | 32;

    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns `None` if `bits` carries an unknown flag.
    #[must_use]
    pub fn from_bits(bits: u32) -> Option<Self> {
        (bits & !Self::ALL == 0).then_some(Self(bits))
    }

    /// Map a rule-file option letter (`I`, `U`, `L`) to its flag.
    #[must_use]
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "I" => Some(Self::IGNORECASE),
            "U" => Some(Self::UNICODE),
            "L" => Some(Self::LOCALE),
            _ => None,
        }
    }

    #[must_use]
    pub fn contains(self, other: RegexFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for RegexFlags {
    type Output = RegexFlags;

    fn bitor(self, rhs: RegexFlags) -> RegexFlags {
        RegexFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for RegexFlags {
    fn bitor_assign(&mut self, rhs: RegexFlags) {
        self.0 |= rhs.0;
    }
}

/// A regex anchored at the start of the candidate.
#[derive(Debug, Clone)]
pub struct RegexCondition {
    pattern: String,
    flags: RegexFlags,
    pub(crate) regex: Regex,
}

impl RegexCondition {
    /// # Errors
    ///
    /// Returns [`regex::Error`] if the pattern does not compile.
    pub fn new(pattern: impl Into<String>, flags: RegexFlags) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&format!("^(?:{pattern})"))
            .case_insensitive(flags.contains(RegexFlags::IGNORECASE))
            .build()?;
        Ok(Self {
            pattern,
            flags,
            regex,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn flags(&self) -> RegexFlags {
        self.flags
    }
}

/// A shell glob matched against the whole candidate. `*` and `?` also match
/// `/`.
#[derive(Debug, Clone)]
pub struct GlobCondition {
    pattern: String,
    case_sensitive: bool,
    pub(crate) regex: Regex,
}

impl GlobCondition {
    /// # Errors
    ///
    /// Returns [`regex::Error`] if the translated pattern does not compile.
    pub fn new(pattern: impl Into<String>, case_sensitive: bool) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&translate_glob(&pattern))
            .case_insensitive(!case_sensitive)
            .build()?;
        Ok(Self {
            pattern,
            case_sensitive,
            regex,
        })
    }

    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

/// Translate a glob into an anchored regex.
///
/// Hand-rolled rather than `globset` so that `[^...]` stays a literal `^`
/// in the class; only `[!...]` negates.
fn translate_glob(glob: &str) -> String {
    let chars: Vec<char> = glob.chars().collect();
    let mut out = String::from("^(?s:");
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;
        match c {
            '*' => {
                while chars.get(i) == Some(&'*') {
                    i += 1;
                }
                out.push_str(".*");
            }
            '?' => out.push('.'),
            '[' => {
                let mut j = i;
                if chars.get(j) == Some(&'!') {
                    j += 1;
                }
                if chars.get(j) == Some(&']') {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }
                if j >= chars.len() {
                    out.push_str(r"\[");
                    continue;
                }
                let class = &chars[i..j];
                i = j + 1;
                out.push('[');
                let body = match class.first() {
                    Some('!') => {
                        out.push('^');
                        &class[1..]
                    }
                    Some('^') => {
                        out.push_str(r"\^");
                        &class[1..]
                    }
                    _ => class,
                };
                for &ch in body {
                    if matches!(ch, '\\' | '[' | '&' | '~') {
                        out.push('\\');
                    }
                    out.push(ch);
                }
                out.push(']');
            }
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }

    out.push_str(r")\z");
    out
}

/// A predicate over a candidate string.
///
/// Conditions are immutable once built and safe to share across threads.
#[derive(Debug, Clone)]
pub enum Condition {
    Regex(RegexCondition),
    Glob(GlobCondition),
    /// All subconditions match. The last one's match (and its regex groups)
    /// is what templates see, so group references only expand when the
    /// regex is the final subcondition.
    And(Vec<Condition>),
    /// Any subcondition matches; the first match is kept.
    Or(Vec<Condition>),
    Not(Box<Condition>),
    TimeRange(TimeRange),
}

impl Condition {
    #[must_use]
    pub fn and(self, other: Condition) -> Condition {
        match self {
            Condition::And(mut subs) => {
                subs.push(other);
                Condition::And(subs)
            }
            first => Condition::And(vec![first, other]),
        }
    }

    #[must_use]
    pub fn or(self, other: Condition) -> Condition {
        match self {
            Condition::Or(mut subs) => {
                subs.push(other);
                Condition::Or(subs)
            }
            first => Condition::Or(vec![first, other]),
        }
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

impl From<RegexCondition> for Condition {
    fn from(c: RegexCondition) -> Self {
        Condition::Regex(c)
    }
}

impl From<GlobCondition> for Condition {
    fn from(c: GlobCondition) -> Self {
        Condition::Glob(c)
    }
}

impl From<TimeRange> for Condition {
    fn from(r: TimeRange) -> Self {
        Condition::TimeRange(r)
    }
}

/// Case-sensitive glob condition.
///
/// # Errors
///
/// Returns [`regex::Error`] if the translated glob does not compile.
pub fn glob(pattern: &str) -> Result<Condition, regex::Error> {
    GlobCondition::new(pattern, true).map(Condition::Glob)
}

/// Regex condition without flags.
///
/// # Errors
///
/// Returns [`regex::Error`] if the pattern does not compile.
pub fn regex(pattern: &str) -> Result<Condition, regex::Error> {
    RegexCondition::new(pattern, RegexFlags::NONE).map(Condition::Regex)
}

fn write_list(f: &mut fmt::Formatter<'_>, name: &str, subs: &[Condition]) -> fmt::Result {
    write!(f, "{name}(")?;
    for (i, sub) in subs.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{sub}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Regex(r) => write!(f, "regex:{:?}", r.pattern()),
            Condition::Glob(g) if g.case_sensitive() => write!(f, "{:?}", g.pattern()),
            Condition::Glob(g) => write!(f, "{:?} [I]", g.pattern()),
            Condition::And(subs) => write_list(f, "and", subs),
            Condition::Or(subs) => write_list(f, "or", subs),
            Condition::Not(inner) => write!(f, "not({inner})"),
            Condition::TimeRange(range) => write!(f, "{} .. {}", range.start, range.end),
        }
    }
}
