use winnow::ascii::till_line_ending;
use winnow::combinator::{alt, cut_err, delimited, opt, preceded, repeat, separated};
use winnow::error::{ContextError, ErrMode, ModalResult, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{any, none_of, one_of, take_while};

use crate::types::CompareOp;

use super::parser::{
    Clause, ClipSide, CondKind, CondNode, CondRule, DateLit, DateRange, OptionNode, RuleNode,
};

const KEYWORDS: &[&str] = &["default", "pre", "post", "and", "or", "not"];

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

// -- Whitespace & comments --------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    let _: () = repeat(
        0..,
        alt((
            take_while(1.., char::is_whitespace).void(),
            ('#', till_line_ending).void(),
        )),
    )
    .parse_next(input)?;
    Ok(())
}

// -- Words & strings --------------------------------------------------------

fn is_bare(c: char) -> bool {
    !c.is_whitespace()
        && !matches!(
            c,
            ',' | ':' | '(' | ')' | '[' | ']' | '\'' | '"' | '#' | '=' | '<' | '>'
        )
}

fn bare_word<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., is_bare).parse_next(input)
}

fn keyword<'i>(kw: &'static str) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    bare_word.verify(move |w: &str| w == kw)
}

/// A single- or double-quoted string. Only the delimiter can be escaped.
fn quoted(input: &mut &str) -> ModalResult<String> {
    let quote = one_of(['\'', '"']).parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = cut_err(any)
            .context(expected("closing quote"))
            .parse_next(input)?;
        if ch == quote {
            return Ok(s);
        }
        if ch == '\\' && input.starts_with(quote) {
            any.parse_next(input)?;
            s.push(quote);
        } else {
            s.push(ch);
        }
    }
}

fn string(input: &mut &str) -> ModalResult<String> {
    alt((
        quoted,
        bare_word
            .verify(|w: &str| !KEYWORDS.contains(&w))
            .map(str::to_owned),
    ))
    .parse_next(input)
}

// -- Condition options ------------------------------------------------------

fn option(input: &mut &str) -> ModalResult<OptionNode> {
    ws.parse_next(input)?;
    let at = input.len();
    let key = bare_word
        .context(expected("option name"))
        .parse_next(input)?;
    let value = opt(preceded((ws, '=', ws), cut_err(string).context(expected("option value"))))
        .parse_next(input)?;
    Ok(OptionNode {
        key: key.to_owned(),
        value,
        at,
    })
}

fn options(input: &mut &str) -> ModalResult<Vec<OptionNode>> {
    preceded(
        (ws, '['),
        cut_err(delimited(
            ws,
            separated(1.., option, (ws, ',')),
            (ws, ']'),
        ))
        .context(expected("condition options")),
    )
    .parse_next(input)
}

fn maybe_options(input: &mut &str) -> ModalResult<Vec<OptionNode>> {
    Ok(opt(options).parse_next(input)?.unwrap_or_default())
}

// -- Regex ------------------------------------------------------------------

/// Everything up to whitespace, `,` or `:`; `\ `, `\,` and `\:` stand for
/// the bare character.
fn bare_regex(input: &mut &str) -> ModalResult<String> {
    repeat(
        1..,
        alt((
            preceded('\\', one_of([' ', ',', ':'])),
            none_of(|c: char| c.is_whitespace() || c == ',' || c == ':'),
        )),
    )
    .fold(String::new, |mut s, c| {
        s.push(c);
        s
    })
    .parse_next(input)
}

fn regex_cond(input: &mut &str) -> ModalResult<CondKind> {
    "regex:".parse_next(input)?;
    let pattern = cut_err(alt((quoted, bare_regex)))
        .context(expected("regular expression"))
        .parse_next(input)?;
    let options = maybe_options.parse_next(input)?;
    Ok(CondKind::Regex { pattern, options })
}

// -- Dates ------------------------------------------------------------------

fn digits<'i>(count: usize) -> impl Parser<&'i str, &'i str, ErrMode<ContextError>> {
    take_while(count, |c: char| c.is_ascii_digit())
}

fn two_digits(input: &mut &str) -> ModalResult<u32> {
    digits(2).try_map(str::parse::<u32>).parse_next(input)
}

/// `MM<sep>DD<sep>YYYY`, optionally followed by ` HHMM` or `<sep>HHMM`.
fn date_lit(input: &mut &str) -> ModalResult<DateLit> {
    let start = *input;
    let month = two_digits.parse_next(input)?;
    let sep = one_of(['-', '/', '.']).parse_next(input)?;
    let day = two_digits.parse_next(input)?;
    one_of(sep).parse_next(input)?;
    let year = digits(4).try_map(str::parse::<i32>).parse_next(input)?;
    let time = opt(preceded(alt((' ', sep)), (two_digits, two_digits))).parse_next(input)?;
    let text = start[..start.len() - input.len()].to_owned();
    Ok(DateLit {
        month,
        day,
        year,
        time,
        text,
    })
}

fn comparator(input: &mut &str) -> ModalResult<CompareOp> {
    alt((
        "<=".value(CompareOp::Lte),
        ">=".value(CompareOp::Gte),
        "<".value(CompareOp::Lt),
        ">".value(CompareOp::Gt),
        "=".value(CompareOp::Eq),
    ))
    .parse_next(input)
}

fn date_range(input: &mut &str) -> ModalResult<DateRange> {
    alt((
        (comparator, preceded(ws, cut_err(date_lit).context(expected("date"))))
            .map(|(op, date)| DateRange::Compare(op, date)),
        (date_lit, ws, '-', ws, cut_err(date_lit).context(expected("end date")))
            .map(|(start, _, _, _, end)| DateRange::Between(start, end)),
    ))
    .parse_next(input)
}

fn date_cond(input: &mut &str) -> ModalResult<CondKind> {
    let range = date_range.parse_next(input)?;
    let options = maybe_options.parse_next(input)?;
    Ok(CondKind::Date { range, options })
}

// -- Conditions -------------------------------------------------------------

fn glob_cond(input: &mut &str) -> ModalResult<CondKind> {
    let pattern = string.parse_next(input)?;
    let options = maybe_options.parse_next(input)?;
    Ok(CondKind::Glob { pattern, options })
}

#[derive(Clone, Copy)]
enum Combinator {
    And,
    Or,
    Not,
}

fn compound(input: &mut &str) -> ModalResult<CondKind> {
    let which = alt((
        keyword("and").value(Combinator::And),
        keyword("or").value(Combinator::Or),
        keyword("not").value(Combinator::Not),
    ))
    .parse_next(input)?;
    (ws, '(').parse_next(input)?;

    let kind = match which {
        Combinator::Not => {
            let inner = cut_err(condition).parse_next(input)?;
            CondKind::Not(Box::new(inner))
        }
        Combinator::And | Combinator::Or => {
            let subs: Vec<CondNode> = cut_err(separated(1.., condition, (ws, ',')))
                .context(expected("condition list"))
                .parse_next(input)?;
            match which {
                Combinator::And => CondKind::And(subs),
                _ => CondKind::Or(subs),
            }
        }
    };

    (ws, cut_err(')'))
        .context(StrContext::Expected(StrContextValue::CharLiteral(')')))
        .parse_next(input)?;
    Ok(kind)
}

fn condition(input: &mut &str) -> ModalResult<CondNode> {
    ws.parse_next(input)?;
    let at = input.len();
    let kind = alt((compound, regex_cond, date_cond, glob_cond))
        .context(expected("condition"))
        .parse_next(input)?;
    Ok(CondNode { kind, at })
}

// -- Rules ------------------------------------------------------------------

fn clip_list(input: &mut &str) -> ModalResult<Vec<String>> {
    delimited(
        (ws, '['),
        separated(0.., preceded(ws, string), (ws, ',')),
        (ws, ']'),
    )
    .parse_next(input)
}

fn clause(input: &mut &str) -> ModalResult<Clause> {
    ws.parse_next(input)?;
    let at = input.len();
    let side = alt((
        keyword("pre").value(ClipSide::Pre),
        keyword("post").value(ClipSide::Post),
    ))
    .parse_next(input)?;
    (ws, cut_err(':'))
        .context(StrContext::Expected(StrContextValue::CharLiteral(':')))
        .parse_next(input)?;
    let clips = cut_err(clip_list)
        .context(expected("clip list"))
        .parse_next(input)?;
    Ok(Clause { side, clips, at })
}

fn clauses(input: &mut &str) -> ModalResult<RuleNode> {
    let first = clause.parse_next(input)?;
    let second = opt(preceded((ws, opt(',')), clause)).parse_next(input)?;
    Ok(RuleNode::Clips(
        std::iter::once(first).chain(second).collect(),
    ))
}

fn rule_list(input: &mut &str) -> ModalResult<RuleNode> {
    '['.parse_next(input)?;
    let rules = cut_err(cond_rules(0))
        .context(expected("rule list"))
        .parse_next(input)?;
    (ws, cut_err(']'))
        .context(StrContext::Expected(StrContextValue::CharLiteral(']')))
        .parse_next(input)?;
    Ok(RuleNode::List(rules))
}

fn rule_body(input: &mut &str) -> ModalResult<RuleNode> {
    ws.parse_next(input)?;
    alt((
        keyword("default").value(RuleNode::Default),
        clauses,
        rule_list,
    ))
    .parse_next(input)
}

fn cond_rule(input: &mut &str) -> ModalResult<CondRule> {
    ws.parse_next(input)?;
    let at = input.len();
    if let Some(body) = opt(rule_body).parse_next(input)? {
        return Ok(CondRule {
            condition: None,
            body,
            at,
        });
    }

    let cond = condition.parse_next(input)?;
    (ws, cut_err(':'))
        .context(StrContext::Expected(StrContextValue::CharLiteral(':')))
        .parse_next(input)?;
    let body = cut_err(rule_body)
        .context(expected("rule"))
        .parse_next(input)?;
    Ok(CondRule {
        condition: Some(cond),
        body,
        at,
    })
}

/// At least `min` rules, separated by optional commas.
fn cond_rules<'i>(min: usize) -> impl Parser<&'i str, Vec<CondRule>, ErrMode<ContextError>> {
    move |input: &mut &'i str| {
        let mut rules = Vec::new();
        if min == 0 {
            rules.extend(opt(cond_rule).parse_next(input)?);
        } else {
            rules.push(cond_rule.parse_next(input)?);
        }
        if rules.is_empty() {
            return Ok(rules);
        }
        let rest: Vec<CondRule> =
            repeat(0.., preceded((ws, opt(',')), cond_rule)).parse_next(input)?;
        rules.extend(rest);
        Ok(rules)
    }
}

// -- Top-level parser -------------------------------------------------------

pub(crate) fn parse_rules(input: &mut &str) -> ModalResult<Vec<CondRule>> {
    let rules = cond_rules(1)
        .context(expected("rule"))
        .parse_next(input)?;
    ws.parse_next(input)?;
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use winnow::prelude::*;

    use super::*;

    fn rules(src: &str) -> Vec<CondRule> {
        parse_rules.parse(src).unwrap()
    }

    fn single_condition(src: &str) -> CondKind {
        let mut parsed = rules(src);
        assert_eq!(parsed.len(), 1);
        parsed.remove(0).condition.unwrap().kind
    }

    #[test]
    fn parse_default() {
        let parsed = rules("default");
        assert!(matches!(parsed[0].body, RuleNode::Default));
        assert!(parsed[0].condition.is_none());
    }

    #[test]
    fn parse_clauses_either_order() {
        let parsed = rules("post: [b], pre: [a]");
        match &parsed[0].body {
            RuleNode::Clips(clauses) => {
                assert_eq!(clauses[0].side, ClipSide::Post);
                assert_eq!(clauses[1].side, ClipSide::Pre);
                assert_eq!(clauses[1].clips, vec!["a"]);
            }
            other => panic!("expected clips, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty_and_quoted_clips() {
        let parsed = rules(r#"pre: [], post: ['a b.mp3', "c\"d"]"#);
        match &parsed[0].body {
            RuleNode::Clips(clauses) => {
                assert!(clauses[0].clips.is_empty());
                assert_eq!(clauses[1].clips, vec!["a b.mp3", "c\"d"]);
            }
            other => panic!("expected clips, got {other:?}"),
        }
    }

    #[test]
    fn parse_bare_regex_with_escapes() {
        match single_condition(r"regex:a\ b\,c\:d: default") {
            CondKind::Regex { pattern, options } => {
                assert_eq!(pattern, "a b,c:d");
                assert!(options.is_empty());
            }
            other => panic!("expected regex, got {other:?}"),
        }
    }

    #[test]
    fn parse_quoted_regex_with_options() {
        match single_condition(r#"regex:".*bing bong" [I, U]: default"#) {
            CondKind::Regex { pattern, options } => {
                assert_eq!(pattern, ".*bing bong");
                let keys: Vec<_> = options.iter().map(|o| o.key.as_str()).collect();
                assert_eq!(keys, ["I", "U"]);
            }
            other => panic!("expected regex, got {other:?}"),
        }
    }

    #[test]
    fn parse_glob() {
        match single_condition("*bingbong* : default") {
            CondKind::Glob { pattern, .. } => assert_eq!(pattern, "*bingbong*"),
            other => panic!("expected glob, got {other:?}"),
        }
    }

    #[test]
    fn parse_date_comparator_and_range() {
        match single_condition(">=12.01.2005: default") {
            CondKind::Date {
                range: DateRange::Compare(op, date),
                ..
            } => {
                assert_eq!(op, CompareOp::Gte);
                assert_eq!((date.month, date.day, date.year), (12, 1, 2005));
                assert_eq!(date.time, None);
            }
            other => panic!("expected comparator, got {other:?}"),
        }

        match single_condition("12/01/2005 1230 - 01/01/2006: default") {
            CondKind::Date {
                range: DateRange::Between(start, end),
                ..
            } => {
                assert_eq!(start.time, Some((12, 30)));
                assert_eq!(start.text, "12/01/2005 1230");
                assert_eq!(end.year, 2006);
            }
            other => panic!("expected range, got {other:?}"),
        }
    }

    #[test]
    fn date_separators_must_agree() {
        // not a date, so it reads as a glob
        match single_condition("12-01/2005: default") {
            CondKind::Glob { pattern, .. } => assert_eq!(pattern, "12-01/2005"),
            other => panic!("expected glob, got {other:?}"),
        }
    }

    #[test]
    fn parse_date_options() {
        match single_condition("=12.01.2005 [F, fmt=YYMMDD]: default") {
            CondKind::Date { options, .. } => {
                assert_eq!(options.len(), 2);
                assert_eq!(options[1].key, "fmt");
                assert_eq!(options[1].value.as_deref(), Some("YYMMDD"));
            }
            other => panic!("expected date, got {other:?}"),
        }
    }

    #[test]
    fn parse_compound_conditions() {
        match single_condition("and(*a*, or(*b*, not(*c*))): default") {
            CondKind::And(subs) => {
                assert_eq!(subs.len(), 2);
                assert!(matches!(subs[1].kind, CondKind::Or(_)));
            }
            other => panic!("expected and, got {other:?}"),
        }
    }

    #[test]
    fn parse_nested_lists() {
        let parsed = rules("*.mp3: [ regex:a: pre:[x] default ], default");
        assert_eq!(parsed.len(), 2);
        match &parsed[0].body {
            RuleNode::List(children) => assert_eq!(children.len(), 2),
            other => panic!("expected list, got {other:?}"),
        }
    }

    #[test]
    fn parse_empty_list() {
        let parsed = rules("[]");
        assert!(matches!(&parsed[0].body, RuleNode::List(c) if c.is_empty()));
    }

    #[test]
    fn comments_ignored() {
        let parsed = rules("# header\n*.mp3: default # trailing\n# done\ndefault\n");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn keywords_are_not_globs() {
        assert!(parse_rules.parse("pre: default").is_err());
        assert!(parse_rules.parse("and: default").is_err());
    }

    #[test]
    fn missing_colon_is_an_error() {
        assert!(parse_rules.parse("*.mp3 pre: [a]").is_err());
    }

    #[test]
    fn unterminated_quote_is_an_error() {
        assert!(parse_rules.parse("'abc: default").is_err());
    }

    #[test]
    fn empty_input_is_an_error() {
        assert!(parse_rules.parse("   # nothing\n").is_err());
    }
}
