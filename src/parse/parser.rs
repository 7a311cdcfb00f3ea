use crate::types::CompareOp;

// Positions are stored as the length of the input remaining when the node
// started; `source.len() - at` recovers the byte offset.

/// A rule, optionally guarded by a condition, as written in the source.
#[derive(Debug, Clone)]
pub(crate) struct CondRule {
    pub condition: Option<CondNode>,
    pub body: RuleNode,
    pub at: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum RuleNode {
    Default,
    /// `pre:` / `post:` clauses in source order.
    Clips(Vec<Clause>),
    List(Vec<CondRule>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClipSide {
    Pre,
    Post,
}

#[derive(Debug, Clone)]
pub(crate) struct Clause {
    pub side: ClipSide,
    pub clips: Vec<String>,
    pub at: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct CondNode {
    pub kind: CondKind,
    pub at: usize,
}

#[derive(Debug, Clone)]
pub(crate) enum CondKind {
    And(Vec<CondNode>),
    Or(Vec<CondNode>),
    Not(Box<CondNode>),
    Regex {
        pattern: String,
        options: Vec<OptionNode>,
    },
    Glob {
        pattern: String,
        options: Vec<OptionNode>,
    },
    Date {
        range: DateRange,
        options: Vec<OptionNode>,
    },
}

#[derive(Debug, Clone)]
pub(crate) enum DateRange {
    Between(DateLit, DateLit),
    Compare(CompareOp, DateLit),
}

/// A date literal as written; validity is checked when the tree is built.
#[derive(Debug, Clone)]
pub(crate) struct DateLit {
    pub month: u32,
    pub day: u32,
    pub year: i32,
    pub time: Option<(u32, u32)>,
    pub text: String,
}

/// `word` or `word=value` inside a condition's `[...]` options.
#[derive(Debug, Clone)]
pub(crate) struct OptionNode {
    pub key: String,
    pub value: Option<String>,
    pub at: usize,
}
