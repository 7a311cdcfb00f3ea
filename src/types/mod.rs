mod condition;
mod rule;
mod symbol;
mod time;

pub use condition::{glob, regex, Condition, GlobCondition, RegexCondition, RegexFlags};
pub use rule::{MatchRule, Rule, RuleList};
pub use symbol::Symbol;
pub use time::{
    CompareOp, DatePattern, TimeRange, TimeSource, DEFAULT_DATE_FORMAT, DEFAULT_DATE_REGEX,
};
