use chrono::NaiveDateTime;
use regex::Captures;

use crate::template;
use crate::types::{Condition, MatchRule, Rule, RuleList, Symbol, TimeSource};

/// What a successful condition check leaves behind for template expansion.
#[derive(Debug)]
pub(crate) enum Outcome<'h> {
    /// Matched without regex groups; templates are used verbatim.
    Plain,
    Captured(Captures<'h>),
}

pub(crate) fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

impl Condition {
    /// Test `candidate`, reading the wall clock for time ranges.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        self.matches_at(candidate, local_now())
    }

    /// Test `candidate` with `now` standing in for the current time.
    #[must_use]
    pub fn matches_at(&self, candidate: &str, now: NaiveDateTime) -> bool {
        self.check(candidate, now).is_some()
    }

    pub(crate) fn check<'h>(&self, candidate: &'h str, now: NaiveDateTime) -> Option<Outcome<'h>> {
        match self {
            Condition::Regex(r) => r.regex.captures(candidate).map(Outcome::Captured),
            Condition::Glob(g) => g.regex.is_match(candidate).then_some(Outcome::Plain),
            Condition::And(subs) => {
                let mut last = None;
                for sub in subs {
                    last = Some(sub.check(candidate, now)?);
                }
                last
            }
            Condition::Or(subs) => subs.iter().find_map(|sub| sub.check(candidate, now)),
            Condition::Not(inner) => match inner.check(candidate, now) {
                Some(_) => None,
                None => Some(Outcome::Plain),
            },
            Condition::TimeRange(range) => {
                let instant = match &range.source {
                    TimeSource::Now => Some(now),
                    TimeSource::Embedded(pattern) => pattern.extract(candidate),
                };
                instant
                    .is_some_and(|t| range.contains(t))
                    .then_some(Outcome::Plain)
            }
        }
    }
}

fn guard<'h>(
    condition: Option<&Condition>,
    candidate: &'h str,
    now: NaiveDateTime,
) -> Option<Outcome<'h>> {
    match condition {
        None => Some(Outcome::Plain),
        Some(cond) => cond.check(candidate, now),
    }
}

fn expand_all(templates: &[String], outcome: &Outcome<'_>) -> Vec<Symbol> {
    templates
        .iter()
        .map(|t| match outcome {
            Outcome::Plain => Symbol::clip(t.as_str()),
            Outcome::Captured(caps) => Symbol::clip(template::expand(t, caps)),
        })
        .collect()
}

impl MatchRule {
    fn evaluate_at(&self, candidate: &str, now: NaiveDateTime) -> Option<Vec<Symbol>> {
        let outcome = guard(self.condition.as_ref(), candidate, now)?;
        let mut playlist = Vec::with_capacity(self.pre.len() + self.post.len() + 1);
        playlist.extend(expand_all(&self.pre, &outcome));
        playlist.push(Symbol::original(candidate));
        playlist.extend(expand_all(&self.post, &outcome));
        Some(playlist)
    }
}

impl RuleList {
    fn evaluate_at(&self, candidate: &str, now: NaiveDateTime) -> Option<Vec<Symbol>> {
        guard(self.condition.as_ref(), candidate, now)?;
        self.rules
            .iter()
            .find_map(|rule| rule.evaluate_at(candidate, now))
    }
}

impl Rule {
    /// Evaluate against `candidate` using the current local time.
    ///
    /// Returns `None` when no rule applies. A produced playlist contains the
    /// candidate exactly once, tagged as the original.
    #[must_use]
    pub fn evaluate(&self, candidate: &str) -> Option<Vec<Symbol>> {
        self.evaluate_at(candidate, local_now())
    }

    /// Evaluate with `now` standing in for the current time.
    #[must_use]
    pub fn evaluate_at(&self, candidate: &str, now: NaiveDateTime) -> Option<Vec<Symbol>> {
        match self {
            Rule::Default => Some(vec![Symbol::original(candidate)]),
            Rule::Match(m) => m.evaluate_at(candidate, now),
            Rule::List(l) => l.evaluate_at(candidate, now),
        }
    }
}
