use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::mp3::{Engine, SpliceOptions, DEFAULT_CHUNK_SIZE};
use crate::provider::{Library, MediaPolicy};
use crate::rule_file::RuleFile;

/// Settings a host application hands to the library.
///
/// Loading this from a file is left to the host; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Deserialize, serde::Serialize))]
pub struct Config {
    /// Rule file, grammar or JSON by extension.
    #[cfg_attr(feature = "json", serde(default))]
    pub rule_file: Option<PathBuf>,

    /// Seconds between checks of the rule file's modification time.
    #[cfg_attr(feature = "json", serde(default = "default_refresh_secs"))]
    pub refresh_secs: u64,

    /// `default`, `sox`, or `mp3cat`.
    #[cfg_attr(feature = "json", serde(default = "default_engine"))]
    pub engine: String,

    /// Path to the engine's executable, when not on `PATH`.
    #[cfg_attr(feature = "json", serde(default))]
    pub engine_path: Option<PathBuf>,

    #[cfg_attr(feature = "json", serde(default = "default_chunk_size"))]
    pub chunk_size: usize,

    #[cfg_attr(feature = "json", serde(default))]
    pub media_policy: MediaPolicy,

    /// Directory holding `main/` and `extra/master/`.
    #[cfg_attr(feature = "json", serde(default))]
    pub library_root: Option<PathBuf>,
}

fn default_refresh_secs() -> u64 {
    15
}

fn default_engine() -> String {
    "default".to_owned()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rule_file: None,
            refresh_secs: default_refresh_secs(),
            engine: default_engine(),
            engine_path: None,
            chunk_size: default_chunk_size(),
            media_policy: MediaPolicy::default(),
            library_root: None,
        }
    }
}

impl Config {
    /// Open the configured rule file, if there is one.
    ///
    /// # Errors
    ///
    /// Errors from the initial load of the rule file.
    pub fn rule_file(&self) -> Result<Option<RuleFile>> {
        self.rule_file
            .as_ref()
            .map(|path| {
                RuleFile::open(path.clone())
                    .map(|f| f.with_refresh(Duration::from_secs(self.refresh_secs)))
            })
            .transpose()
    }

    /// The engine named by `engine`, with `engine_path` applied.
    ///
    /// # Errors
    ///
    /// [`Error::UnknownEngine`](crate::Error::UnknownEngine) for an
    /// unrecognized name.
    pub fn engine(&self) -> Result<Engine> {
        let engine = self.engine.parse::<Engine>()?;
        Ok(match (engine, &self.engine_path) {
            (Engine::Sox { .. }, Some(path)) => Engine::Sox {
                path: Some(path.clone()),
            },
            (Engine::Mp3cat { .. }, Some(path)) => Engine::Mp3cat {
                path: Some(path.clone()),
            },
            (engine, _) => engine,
        })
    }

    /// # Errors
    ///
    /// As for [`engine`](Self::engine).
    pub fn splice_options(&self) -> Result<SpliceOptions> {
        Ok(SpliceOptions::new()
            .with_chunk_size(self.chunk_size)
            .with_engine(self.engine()?))
    }

    #[must_use]
    pub fn library(&self) -> Option<Library> {
        self.library_root
            .as_ref()
            .map(|root| Library::new(root).with_policy(self.media_policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.refresh_secs, 15);
        assert_eq!(config.engine().unwrap(), Engine::Default);
        assert_eq!(config.splice_options().unwrap().chunk_size(), DEFAULT_CHUNK_SIZE);
        assert!(config.rule_file().unwrap().is_none());
        assert!(config.library().is_none());
    }

    #[test]
    fn engine_path_applies_to_tools() {
        let config = Config {
            engine: "sox".into(),
            engine_path: Some("/opt/sox/bin/sox".into()),
            ..Config::default()
        };
        assert_eq!(
            config.engine().unwrap(),
            Engine::Sox {
                path: Some("/opt/sox/bin/sox".into())
            }
        );
    }

    #[test]
    fn unknown_engine() {
        let config = Config {
            engine: "ffmpeg".into(),
            ..Config::default()
        };
        assert!(config.splice_options().is_err());
    }

    #[cfg(feature = "json")]
    #[test]
    fn deserializes_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"engine": "mp3cat", "media_policy": "strict"}"#).unwrap();
        assert_eq!(config.engine, "mp3cat");
        assert_eq!(config.media_policy, MediaPolicy::Strict);
        assert_eq!(config.refresh_secs, 15);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
