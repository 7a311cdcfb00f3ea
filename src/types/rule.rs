use std::fmt;

use super::condition::Condition;

/// A node of the rule tree.
///
/// Rules are built either with [`MatchRule`] / [`RuleList`] builders or by
/// parsing rule text with [`Rule::from_grammar()`]. A built tree is immutable
/// and designed to live behind `Arc`.
///
/// # Example
///
/// ```
/// use spliceroll::{glob, MatchRule, Rule, RuleList};
///
/// let rule: Rule = RuleList::new()
///     .rule(
///         MatchRule::new()
///             .when(glob("*.mp3").unwrap())
///             .pre(["intro.mp3"])
///             .post(["outro.mp3"]),
///     )
///     .rule(Rule::Default)
///     .into();
///
/// let playlist = rule.evaluate("show.mp3").unwrap();
/// assert_eq!(playlist.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub enum Rule {
    /// Yields only the candidate itself.
    Default,
    Match(MatchRule),
    List(RuleList),
}

/// Surrounds the candidate with pre-roll and post-roll clips when the
/// condition (if any) matches.
///
/// Clip names are templates: when the condition carries regex groups they
/// can be referenced as `$1`, `${name}`, `\1` or `\g<name>`.
#[derive(Debug, Clone, Default)]
pub struct MatchRule {
    pub condition: Option<Condition>,
    pub pre: Vec<String>,
    pub post: Vec<String>,
}

/// An ordered list of rules; the first one that produces a playlist wins.
#[derive(Debug, Clone, Default)]
pub struct RuleList {
    pub condition: Option<Condition>,
    pub rules: Vec<Rule>,
}

impl MatchRule {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Append pre-roll clip templates.
    #[must_use]
    pub fn pre<I, S>(mut self, clips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pre.extend(clips.into_iter().map(Into::into));
        self
    }

    /// Append post-roll clip templates.
    #[must_use]
    pub fn post<I, S>(mut self, clips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.post.extend(clips.into_iter().map(Into::into));
        self
    }
}

impl RuleList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: impl Into<Rule>) -> Self {
        self.rules.push(rule.into());
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl From<MatchRule> for Rule {
    fn from(rule: MatchRule) -> Self {
        Rule::Match(rule)
    }
}

impl From<RuleList> for Rule {
    fn from(list: RuleList) -> Self {
        Rule::List(list)
    }
}

impl Rule {
    /// Parse rule text into a rule tree.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`](crate::ParseError) with the offending line on
    /// any syntax or option error.
    pub fn from_grammar(input: &str) -> Result<Self, crate::ParseError> {
        crate::parse::parse(input)
    }

    /// Read a file of rule text and parse it.
    ///
    /// # Errors
    ///
    /// Returns [`Error`](crate::Error) on I/O or parse failure.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let input = std::fs::read_to_string(path)?;
        Ok(Self::from_grammar(&input)?)
    }

    /// The condition guarding this node, if it has one.
    #[must_use]
    pub fn condition(&self) -> Option<&Condition> {
        match self {
            Rule::Default => None,
            Rule::Match(m) => m.condition.as_ref(),
            Rule::List(l) => l.condition.as_ref(),
        }
    }
}

fn write_clips(f: &mut fmt::Formatter<'_>, name: &str, clips: &[String]) -> fmt::Result {
    write!(f, "{name}: [")?;
    for (i, clip) in clips.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{clip:?}")?;
    }
    write!(f, "]")
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(cond) = self.condition() {
            write!(f, "{cond}: ")?;
        }
        match self {
            Rule::Default => write!(f, "default"),
            Rule::Match(m) => {
                write_clips(f, "pre", &m.pre)?;
                write!(f, " ")?;
                write_clips(f, "post", &m.post)
            }
            Rule::List(l) => {
                write!(f, "[")?;
                for (i, rule) in l.rules.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{rule}")?;
                }
                write!(f, "]")
            }
        }
    }
}
