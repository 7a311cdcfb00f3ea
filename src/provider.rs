//! Resolving rule output to files on disk.
//!
//! A [`Library`] keeps main audio and clips in separate directories. Rule
//! symbols name files relative to those directories: the original symbol
//! resolves under the main directory, every other symbol under the clip
//! directory.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::Result;
use crate::mp3::{audio_params, splice, MediaFormatError, MediaFormatErrorKind, Splice, SpliceOptions};
use crate::types::Rule;

/// A file a rule referred to does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("resource not found: {}", .path.display())]
pub struct MissingResourceError {
    pub path: PathBuf,
}

/// What to do when the main file cannot be spliced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum MediaPolicy {
    /// Log the problem and serve the main file unchanged.
    #[default]
    Tolerant,
    /// Report the problem as an error.
    Strict,
}

/// Output of [`Library::combined`].
pub enum Combined {
    Spliced(Splice),
    /// No clips apply; serve this file as is.
    Verbatim(PathBuf),
}

impl std::fmt::Debug for Combined {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Combined::Spliced(_) => f.write_str("Spliced(..)"),
            Combined::Verbatim(path) => f.debug_tuple("Verbatim").field(path).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Library {
    main_dir: PathBuf,
    clip_dir: PathBuf,
    policy: MediaPolicy,
}

fn relative(name: &str) -> &str {
    name.trim_start_matches('/')
}

impl Library {
    /// Main files under `root/main`, clips under `root/extra/master`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self::with_dirs(root.join("main"), root.join("extra").join("master"))
    }

    pub fn with_dirs(main_dir: impl Into<PathBuf>, clip_dir: impl Into<PathBuf>) -> Self {
        Self {
            main_dir: main_dir.into(),
            clip_dir: clip_dir.into(),
            policy: MediaPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: MediaPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn policy(&self) -> MediaPolicy {
        self.policy
    }

    /// Where the main file `name` lives. Not checked for existence.
    #[must_use]
    pub fn main_path(&self, name: &str) -> PathBuf {
        self.main_dir.join(relative(name))
    }

    /// Where the clip `name` lives.
    ///
    /// # Errors
    ///
    /// [`MissingResourceError`] if there is no such file.
    pub fn clip_path(&self, name: &str) -> std::result::Result<PathBuf, MissingResourceError> {
        let path = self.clip_dir.join(relative(name));
        if path.is_file() {
            Ok(path)
        } else {
            Err(MissingResourceError { path })
        }
    }

    /// Files to splice for `name`, in order.
    ///
    /// A leading `/` is dropped from `name` before the rule sees it.
    /// Empty when no rule applies, or when the main file is unusable under
    /// the tolerant policy. Clips that do not exist are left out.
    ///
    /// # Errors
    ///
    /// A missing main file, or under the strict policy a main file that is
    /// unreadable or VBR.
    pub fn playlist(&self, name: &str, rule: &Rule) -> Result<Vec<PathBuf>> {
        let name = name.strip_prefix('/').unwrap_or(name);
        let symbols = rule.evaluate(name).unwrap_or_default();
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let main = self.main_path(name);
        if !main.is_file() {
            return Err(MissingResourceError { path: main }.into());
        }
        let unusable = match audio_params(&main) {
            Ok(params) if params.vbr => Some(MediaFormatError::new(&main, MediaFormatErrorKind::Vbr)),
            Ok(_) => None,
            Err(e) => Some(e),
        };
        if let Some(e) = unusable {
            return match self.policy {
                MediaPolicy::Strict => Err(e.into()),
                MediaPolicy::Tolerant => {
                    tracing::warn!(error = %e, "serving main file without clips");
                    Ok(Vec::new())
                }
            };
        }

        let mut paths = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            if symbol.is_original() {
                paths.push(self.main_path(symbol.as_str()));
                continue;
            }
            match self.clip_path(symbol.as_str()) {
                Ok(path) => paths.push(path),
                Err(e) => tracing::warn!(clip = symbol.as_str(), error = %e, "clip not found"),
            }
        }
        Ok(paths)
    }

    /// Splice `name` with its clips, using the main file's tags.
    ///
    /// # Errors
    ///
    /// As for [`playlist`](Self::playlist) and [`splice`].
    pub fn combined(&self, name: &str, rule: &Rule, options: &SpliceOptions) -> Result<Combined> {
        let playlist = self.playlist(name, rule)?;
        let main = self.main_path(name);
        if playlist.is_empty() {
            if !main.is_file() {
                return Err(MissingResourceError { path: main }.into());
            }
            return Ok(Combined::Verbatim(main));
        }
        let options = options.clone().with_tag_source(main);
        Ok(Combined::Spliced(splice(&playlist, &options)?))
    }
}
