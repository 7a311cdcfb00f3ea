use chrono::{NaiveDate, NaiveDateTime};

use crate::types::{
    Condition, DatePattern, GlobCondition, MatchRule, RegexCondition, RegexFlags, Rule, RuleList,
    TimeRange,
};

use super::error::ParseError;
use super::parser::{
    ClipSide, CondKind, CondNode, CondRule, DateLit, DateRange, OptionNode, RuleNode,
};

/// Turns the syntax tree into a rule tree, validating options, dates and
/// regexes along the way.
pub(crate) struct Builder<'s> {
    source: &'s str,
}

impl<'s> Builder<'s> {
    pub(crate) fn new(source: &'s str) -> Self {
        Self { source }
    }

    fn error(&self, at: usize, message: impl Into<String>) -> ParseError {
        ParseError::at(self.source, self.source.len().saturating_sub(at), message)
    }

    /// The top level is an unconditional list.
    pub(crate) fn build(&self, rules: Vec<CondRule>) -> Result<Rule, ParseError> {
        let rules = rules
            .into_iter()
            .map(|r| self.rule(r))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Rule::List(RuleList {
            condition: None,
            rules,
        }))
    }

    fn rule(&self, rule: CondRule) -> Result<Rule, ParseError> {
        let condition = rule.condition.map(|c| self.condition(c)).transpose()?;

        match rule.body {
            RuleNode::Default => Ok(match condition {
                None => Rule::Default,
                Some(c) => MatchRule::new().when(c).into(),
            }),
            RuleNode::Clips(clauses) => {
                let mut pre = None;
                let mut post = None;
                for clause in clauses {
                    let (slot, name) = match clause.side {
                        ClipSide::Pre => (&mut pre, "pre"),
                        ClipSide::Post => (&mut post, "post"),
                    };
                    if slot.is_some() {
                        return Err(self.error(clause.at, format!("duplicate {name} clause")));
                    }
                    *slot = Some(clause.clips);
                }
                Ok(Rule::Match(MatchRule {
                    condition,
                    pre: pre.unwrap_or_default(),
                    post: post.unwrap_or_default(),
                }))
            }
            RuleNode::List(children) => {
                let rules = children
                    .into_iter()
                    .map(|r| self.rule(r))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Rule::List(RuleList { condition, rules }))
            }
        }
    }

    fn conditions(&self, nodes: Vec<CondNode>) -> Result<Vec<Condition>, ParseError> {
        nodes.into_iter().map(|n| self.condition(n)).collect()
    }

    fn condition(&self, node: CondNode) -> Result<Condition, ParseError> {
        let at = node.at;
        match node.kind {
            CondKind::And(subs) => Ok(Condition::And(self.conditions(subs)?)),
            CondKind::Or(subs) => Ok(Condition::Or(self.conditions(subs)?)),
            CondKind::Not(inner) => Ok(Condition::Not(Box::new(self.condition(*inner)?))),
            CondKind::Regex { pattern, options } => {
                let flags = self.regex_flags(&options)?;
                RegexCondition::new(pattern, flags)
                    .map(Condition::Regex)
                    .map_err(|e| self.error(at, format!("invalid regex: {e}")))
            }
            CondKind::Glob { pattern, options } => {
                let case_sensitive = self.glob_case_sensitive(&options)?;
                GlobCondition::new(pattern, case_sensitive)
                    .map(Condition::Glob)
                    .map_err(|e| self.error(at, format!("invalid glob: {e}")))
            }
            CondKind::Date { range, options } => {
                let (start, end) = match range {
                    DateRange::Between(a, b) => (self.date(at, &a)?, self.date(at, &b)?),
                    DateRange::Compare(op, d) => op.bounds(self.date(at, &d)?),
                };
                let range = TimeRange::now(start, end);
                Ok(match self.date_pattern(at, &options)? {
                    Some(pattern) => range.with_pattern(pattern),
                    None => range,
                }
                .into())
            }
        }
    }

    fn date(&self, at: usize, lit: &DateLit) -> Result<NaiveDateTime, ParseError> {
        let (hour, minute) = lit.time.unwrap_or((0, 0));
        NaiveDate::from_ymd_opt(lit.year, lit.month, lit.day)
            .and_then(|d| d.and_hms_opt(hour, minute, 0))
            .ok_or_else(|| self.error(at, format!("invalid date: {}", lit.text)))
    }

    fn check_duplicates(&self, options: &[OptionNode]) -> Result<(), ParseError> {
        for (i, opt) in options.iter().enumerate() {
            if options[..i].iter().any(|o| o.key == opt.key) {
                return Err(self.error(opt.at, format!("duplicate option: {}", opt.key)));
            }
        }
        Ok(())
    }

    fn regex_flags(&self, options: &[OptionNode]) -> Result<RegexFlags, ParseError> {
        let mut flags = RegexFlags::NONE;
        for opt in options {
            let flag = match opt.value {
                Some(_) => None,
                None => RegexFlags::from_letter(&opt.key),
            };
            match flag {
                Some(flag) => flags |= flag,
                None => {
                    return Err(self.error(opt.at, format!("illegal option for regex: {}", opt.key)))
                }
            }
        }
        Ok(flags)
    }

    fn glob_case_sensitive(&self, options: &[OptionNode]) -> Result<bool, ParseError> {
        let mut case_sensitive = true;
        for opt in options {
            if opt.key != "I" || opt.value.is_some() {
                return Err(self.error(opt.at, format!("illegal option for glob: {}", opt.key)));
            }
            case_sensitive = false;
        }
        Ok(case_sensitive)
    }

    /// `F` reads the date from the candidate (with an optional `fmt=`
    /// template), `T` or no option reads the clock.
    fn date_pattern(
        &self,
        at: usize,
        options: &[OptionNode],
    ) -> Result<Option<DatePattern>, ParseError> {
        self.check_duplicates(options)?;

        let mut source = None;
        let mut template = None;
        for opt in options {
            match (opt.key.as_str(), &opt.value) {
                ("F" | "T", None) => {
                    if let Some(prev) = source {
                        return Err(self.error(
                            opt.at,
                            format!("incompatible options: {prev}, {}", opt.key),
                        ));
                    }
                    source = Some(if opt.key == "F" { 'F' } else { 'T' });
                }
                ("fmt", Some(value)) => template = Some((opt.at, value.as_str())),
                _ => {
                    return Err(self.error(
                        opt.at,
                        format!("unsupported option for date: {}", opt.key),
                    ))
                }
            }
        }

        match (source, template) {
            (Some('F'), Some((_, template))) => DatePattern::from_template(template)
                .map(Some)
                .map_err(|e| self.error(at, format!("invalid date format: {e}"))),
            (Some('F'), None) => DatePattern::standard()
                .map(Some)
                .map_err(|e| self.error(at, format!("invalid date format: {e}"))),
            (_, Some((fmt_at, _))) => Err(self.error(fmt_at, "fmt requires the F option")),
            _ => Ok(None),
        }
    }
}
