//! Rule-driven pre-roll and post-roll splicing for MP3 files.
//!
//! A [`Rule`] maps an audio name to the clips played around it; the [`mp3`]
//! module stitches the resulting files together without re-encoding.

mod config;
mod error;
mod evaluate;
pub mod mp3;
pub mod parse;
mod provider;
mod rule_file;
#[cfg(feature = "json")]
mod serial;
mod template;
mod types;

use std::path::Path;

pub use config::Config;
pub use error::{Error, Result};
pub use mp3::{
    frame_info, mp3_sanity_check, splice, AudioParams, ChannelMode, Engine, FrameInfo,
    MediaFormatError, Splice, SpliceOptions, ValidationError,
};
pub use parse::ParseError;
pub use provider::{Combined, Library, MediaPolicy, MissingResourceError};
pub use rule_file::{RuleFile, RuleFormat, DEFAULT_REFRESH};
#[cfg(feature = "json")]
pub use serial::DocumentError;
pub use types::{
    glob, regex, CompareOp, Condition, DatePattern, GlobCondition, MatchRule, RegexCondition,
    RegexFlags, Rule, RuleList, Symbol, TimeRange, TimeSource, DEFAULT_DATE_FORMAT,
    DEFAULT_DATE_REGEX,
};

/// Symbols for `candidate`, or an empty list when no rule applies.
#[must_use]
pub fn evaluate_rule(rule: &Rule, candidate: &str) -> Vec<Symbol> {
    rule.evaluate(candidate).unwrap_or_default()
}

/// Encoding parameters of the MP3 file at `path`.
///
/// # Errors
///
/// [`Error::MediaFormat`] if the file is unreadable or not MP3.
pub fn mp3_metadata(path: impl AsRef<Path>) -> Result<AudioParams> {
    Ok(mp3::audio_params(path)?)
}
