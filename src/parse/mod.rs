mod build;
mod error;
mod grammar;
mod parser;

pub use error::ParseError;

use crate::types::Rule;

/// Parse rule text into a rule tree.
///
/// The result is an unconditional [`Rule::List`] holding the top-level rules
/// in source order.
///
/// # Errors
///
/// Returns [`ParseError`] on the first syntax error, unknown option, invalid
/// date or invalid regex.
pub fn parse(input: &str) -> Result<Rule, ParseError> {
    use winnow::Parser;

    let tree = grammar::parse_rules.parse(input).map_err(|e| {
        let message = e.inner().to_string().replace('\n', "; ");
        let message = if message.is_empty() {
            "syntax error".to_owned()
        } else {
            message
        };
        ParseError::at(input, e.offset(), message)
    })?;
    build::Builder::new(input).build(tree)
}
