//! JSON rule documents.
//!
//! Every node is an object with a single key naming its class:
//!
//! ```text
//! {"RuleList": {"rules": [...], "cond": null}}
//! {"MatchRule": {"matcher": {"GlobMatcher": {"pattern": "*.mp3", "casesensitive": true}},
//!                "pre": ["intro.mp3"], "post": []}}
//! {"DefaultRule": {}}
//! ```
//!
//! Conditions use the classes `And`, `Or` (`submatchers`), `Not` (`matcher`),
//! `RegexMatcher` (`regex`, `flags`), `GlobMatcher` (`pattern`,
//! `casesensitive`), `CurrentTimeMatch` (`start`, `end`) and `FileTimeMatch`
//! (`start`, `end`, `dateregex`, `dateformat`). Dates are written as
//! `{year, month, day}` or `{year, month, day, hour, minute, second,
//! microsecond}`; a missing bound is open.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    Condition, DatePattern, GlobCondition, MatchRule, RegexCondition, RegexFlags, Rule, RuleList,
    TimeRange, TimeSource, DEFAULT_DATE_FORMAT, DEFAULT_DATE_REGEX,
};

/// Errors produced when reading or writing a JSON rule document.
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed rule document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown regex flags: {0:#x}")]
    UnknownFlags(u32),

    #[error("invalid date: {0}")]
    InvalidDate(String),
}

// ---------------------------------------------------------------------------
// Document types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
enum RuleDoc {
    RuleList {
        rules: Vec<RuleDoc>,
        #[serde(default)]
        cond: Option<ConditionDoc>,
    },
    DefaultRule {},
    MatchRule {
        #[serde(default)]
        matcher: Option<ConditionDoc>,
        #[serde(default)]
        pre: Vec<String>,
        #[serde(default)]
        post: Vec<String>,
    },
}

fn yes() -> bool {
    true
}

fn default_date_regex() -> String {
    DEFAULT_DATE_REGEX.to_owned()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_owned()
}

#[derive(Debug, Serialize, Deserialize)]
enum ConditionDoc {
    And {
        submatchers: Vec<ConditionDoc>,
    },
    Or {
        submatchers: Vec<ConditionDoc>,
    },
    Not {
        matcher: Box<ConditionDoc>,
    },
    RegexMatcher {
        regex: String,
        #[serde(default)]
        flags: u32,
    },
    GlobMatcher {
        pattern: String,
        #[serde(default = "yes")]
        casesensitive: bool,
    },
    CurrentTimeMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<DateDoc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<DateDoc>,
    },
    FileTimeMatch {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<DateDoc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<DateDoc>,
        #[serde(default = "default_date_regex")]
        dateregex: String,
        #[serde(default = "default_date_format")]
        dateformat: String,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct DateTimeFields {
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
    microsecond: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct DateFields {
    year: i32,
    month: u32,
    day: u32,
}

/// Full datetimes are tried before plain dates; the class-wrapped forms
/// `{"datetime": {...}}` and `{"date": {...}}` are accepted on input.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum DateDoc {
    DateTime(DateTimeFields),
    Date(DateFields),
    WrappedDateTime { datetime: DateTimeFields },
    WrappedDate { date: DateFields },
}

// ---------------------------------------------------------------------------
// Rule tree -> document
// ---------------------------------------------------------------------------

fn date_doc(dt: NaiveDateTime, open: NaiveDateTime) -> Option<DateDoc> {
    if dt == open {
        return None;
    }
    Some(DateDoc::DateTime(DateTimeFields {
        year: dt.year(),
        month: dt.month(),
        day: dt.day(),
        hour: dt.hour(),
        minute: dt.minute(),
        second: dt.second(),
        microsecond: dt.nanosecond() / 1_000,
    }))
}

fn condition_doc(cond: &Condition) -> ConditionDoc {
    match cond {
        Condition::And(subs) => ConditionDoc::And {
            submatchers: subs.iter().map(condition_doc).collect(),
        },
        Condition::Or(subs) => ConditionDoc::Or {
            submatchers: subs.iter().map(condition_doc).collect(),
        },
        Condition::Not(inner) => ConditionDoc::Not {
            matcher: Box::new(condition_doc(inner)),
        },
        Condition::Regex(r) => ConditionDoc::RegexMatcher {
            regex: r.pattern().to_owned(),
            flags: r.flags().bits(),
        },
        Condition::Glob(g) => ConditionDoc::GlobMatcher {
            pattern: g.pattern().to_owned(),
            casesensitive: g.case_sensitive(),
        },
        Condition::TimeRange(range) => {
            let start = date_doc(range.start, NaiveDateTime::MIN);
            let end = date_doc(range.end, NaiveDateTime::MAX);
            match &range.source {
                TimeSource::Now => ConditionDoc::CurrentTimeMatch { start, end },
                TimeSource::Embedded(pattern) => ConditionDoc::FileTimeMatch {
                    start,
                    end,
                    dateregex: pattern.regex().to_owned(),
                    dateformat: pattern.format().to_owned(),
                },
            }
        }
    }
}

fn rule_doc(rule: &Rule) -> RuleDoc {
    match rule {
        Rule::Default => RuleDoc::DefaultRule {},
        Rule::Match(m) => RuleDoc::MatchRule {
            matcher: m.condition.as_ref().map(condition_doc),
            pre: m.pre.clone(),
            post: m.post.clone(),
        },
        Rule::List(l) => RuleDoc::RuleList {
            rules: l.rules.iter().map(rule_doc).collect(),
            cond: l.condition.as_ref().map(condition_doc),
        },
    }
}

// ---------------------------------------------------------------------------
// Document -> rule tree
// ---------------------------------------------------------------------------

fn datetime(doc: Option<DateDoc>, open: NaiveDateTime) -> Result<NaiveDateTime, DocumentError> {
    let fields = match doc {
        None => return Ok(open),
        Some(DateDoc::DateTime(f) | DateDoc::WrappedDateTime { datetime: f }) => f,
        Some(DateDoc::Date(d) | DateDoc::WrappedDate { date: d }) => DateTimeFields {
            year: d.year,
            month: d.month,
            day: d.day,
            hour: 0,
            minute: 0,
            second: 0,
            microsecond: 0,
        },
    };
    let at = NaiveDate::from_ymd_opt(fields.year, fields.month, fields.day)
        .and_then(|d| {
            d.and_hms_micro_opt(fields.hour, fields.minute, fields.second, fields.microsecond)
        })
        .ok_or_else(|| DocumentError::InvalidDate(format!("{fields:?}")))?;
    Ok(unbounded(at))
}

/// Documents written elsewhere mark open ends with the extreme datetimes
/// 0001-01-01 00:00 and 9999-12-31 23:59:59.999999.
fn unbounded(at: NaiveDateTime) -> NaiveDateTime {
    let min = NaiveDate::from_ymd_opt(1, 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
    let max = NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_micro_opt(23, 59, 59, 999_999));
    if Some(at) == min {
        NaiveDateTime::MIN
    } else if Some(at) == max {
        NaiveDateTime::MAX
    } else {
        at
    }
}

fn condition(doc: ConditionDoc) -> Result<Condition, DocumentError> {
    Ok(match doc {
        ConditionDoc::And { submatchers } => Condition::And(
            submatchers
                .into_iter()
                .map(condition)
                .collect::<Result<_, _>>()?,
        ),
        ConditionDoc::Or { submatchers } => Condition::Or(
            submatchers
                .into_iter()
                .map(condition)
                .collect::<Result<_, _>>()?,
        ),
        ConditionDoc::Not { matcher } => Condition::Not(Box::new(condition(*matcher)?)),
        ConditionDoc::RegexMatcher { regex, flags } => {
            let flags = RegexFlags::from_bits(flags).ok_or(DocumentError::UnknownFlags(flags))?;
            RegexCondition::new(regex.clone(), flags)
                .map(Condition::Regex)
                .map_err(|source| DocumentError::InvalidRegex {
                    pattern: regex,
                    source,
                })?
        }
        ConditionDoc::GlobMatcher {
            pattern,
            casesensitive,
        } => GlobCondition::new(pattern.clone(), casesensitive)
            .map(Condition::Glob)
            .map_err(|source| DocumentError::InvalidRegex { pattern, source })?,
        ConditionDoc::CurrentTimeMatch { start, end } => TimeRange::now(
            datetime(start, NaiveDateTime::MIN)?,
            datetime(end, NaiveDateTime::MAX)?,
        )
        .into(),
        ConditionDoc::FileTimeMatch {
            start,
            end,
            dateregex,
            dateformat,
        } => {
            let pattern = DatePattern::new(&dateregex, dateformat).map_err(|source| {
                DocumentError::InvalidRegex {
                    pattern: dateregex.clone(),
                    source,
                }
            })?;
            TimeRange::embedded(
                datetime(start, NaiveDateTime::MIN)?,
                datetime(end, NaiveDateTime::MAX)?,
                pattern,
            )
            .into()
        }
    })
}

fn rule(doc: RuleDoc) -> Result<Rule, DocumentError> {
    Ok(match doc {
        RuleDoc::DefaultRule {} => Rule::Default,
        RuleDoc::MatchRule { matcher, pre, post } => Rule::Match(MatchRule {
            condition: matcher.map(condition).transpose()?,
            pre,
            post,
        }),
        RuleDoc::RuleList { rules, cond } => Rule::List(RuleList {
            condition: cond.map(condition).transpose()?,
            rules: rules.into_iter().map(rule).collect::<Result<_, _>>()?,
        }),
    })
}

impl Rule {
    /// Serialize this rule tree as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if encoding fails.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string(&rule_doc(self))?)
    }

    /// Build a rule tree from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError`] for malformed JSON, unknown classes, invalid
    /// dates, regexes or flags.
    pub fn from_json(input: &str) -> Result<Self, DocumentError> {
        let doc: RuleDoc = serde_json::from_str(input)?;
        rule(doc)
    }
}
