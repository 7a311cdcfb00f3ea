use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::RwLock;

use crate::error::Result;
use crate::types::{Rule, Symbol};

pub const DEFAULT_REFRESH: Duration = Duration::from_secs(15);

/// How a rule file is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Grammar,
    #[cfg(feature = "json")]
    Json,
}

impl RuleFormat {
    /// `.json` and `.js` files hold JSON documents, everything else rule text.
    #[must_use]
    pub fn infer(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            #[cfg(feature = "json")]
            Some("json" | "js") => RuleFormat::Json,
            _ => RuleFormat::Grammar,
        }
    }

    fn load(self, path: &Path) -> Result<Rule> {
        let text = fs::read_to_string(path)?;
        match self {
            RuleFormat::Grammar => Ok(Rule::from_grammar(&text)?),
            #[cfg(feature = "json")]
            RuleFormat::Json => Ok(Rule::from_json(&text)?),
        }
    }
}

struct Loaded {
    rule: Arc<Rule>,
    modified: SystemTime,
    last_checked: Instant,
}

/// A rule loaded from a file and reloaded when the file changes.
///
/// The modification time is checked at most once per refresh interval.
/// A reload that fails leaves the previous rule in place.
pub struct RuleFile {
    path: PathBuf,
    format: RuleFormat,
    refresh: Duration,
    state: RwLock<Loaded>,
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

impl RuleFile {
    /// Load the rule at `path`, inferring its format from the extension.
    ///
    /// # Errors
    ///
    /// I/O, parse, or document errors from the initial load.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = RuleFormat::infer(&path);
        Self::open_as(path, format)
    }

    /// Load the rule at `path` as `format`.
    ///
    /// # Errors
    ///
    /// I/O, parse, or document errors from the initial load.
    pub fn open_as(path: impl Into<PathBuf>, format: RuleFormat) -> Result<Self> {
        let path = path.into();
        let modified = modified(&path)?;
        let rule = format.load(&path)?;
        tracing::debug!(path = %path.display(), ?format, "loaded rules");
        Ok(Self {
            path,
            format,
            refresh: DEFAULT_REFRESH,
            state: RwLock::new(Loaded {
                rule: Arc::new(rule),
                modified,
                last_checked: Instant::now(),
            }),
        })
    }

    #[must_use]
    pub fn with_refresh(mut self, refresh: Duration) -> Self {
        self.refresh = refresh;
        self
    }

    /// Reinterpret the file as `format`.
    ///
    /// # Errors
    ///
    /// Errors from loading the file in the new format.
    pub fn with_format(self, format: RuleFormat) -> Result<Self> {
        if format == self.format {
            return Ok(self);
        }
        let refresh = self.refresh;
        Ok(Self::open_as(self.path, format)?.with_refresh(refresh))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn format(&self) -> RuleFormat {
        self.format
    }

    /// The current rule, after checking the file for changes.
    pub fn current(&self) -> Arc<Rule> {
        self.refresh_if_stale();
        Arc::clone(&self.state.read().rule)
    }

    /// Evaluate `candidate` against the current rule.
    pub fn evaluate(&self, candidate: &str) -> Option<Vec<Symbol>> {
        self.current().evaluate(candidate)
    }

    fn refresh_if_stale(&self) {
        if self.state.read().last_checked.elapsed() < self.refresh {
            return;
        }

        let mtime = match modified(&self.path) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot stat rule file");
                self.state.write().last_checked = Instant::now();
                return;
            }
        };
        {
            let mut state = self.state.write();
            state.last_checked = Instant::now();
            if mtime <= state.modified {
                return;
            }
        }

        match self.format.load(&self.path) {
            Ok(rule) => {
                let mut state = self.state.write();
                state.rule = Arc::new(rule);
                state.modified = mtime;
                tracing::info!(path = %self.path.display(), "reloaded rules");
            }
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "failed to reload rules; keeping previous"
                );
            }
        }
    }
}

impl std::fmt::Debug for RuleFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleFile")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(RuleFormat::infer(Path::new("rules.conf")), RuleFormat::Grammar);
        assert_eq!(RuleFormat::infer(Path::new("rules")), RuleFormat::Grammar);
        #[cfg(feature = "json")]
        {
            assert_eq!(RuleFormat::infer(Path::new("rules.json")), RuleFormat::Json);
            assert_eq!(RuleFormat::infer(Path::new("rules.js")), RuleFormat::Json);
        }
    }

    #[test]
    fn initial_failure_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.conf");
        assert!(RuleFile::open(&path).is_err());

        fs::write(&path, "pre: [").unwrap();
        assert!(matches!(
            RuleFile::open(&path),
            Err(crate::Error::Parse(_))
        ));
    }

    #[test]
    fn unchanged_file_keeps_rule() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.conf");
        fs::write(&path, "pre: [intro]").unwrap();
        let rules = RuleFile::open(&path).unwrap().with_refresh(Duration::ZERO);
        let first = rules.current();
        let second = rules.current();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
