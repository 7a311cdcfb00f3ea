use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

use super::engine::{Body, Engine};
use super::error::ValidationError;
use super::params::{audio_params, AudioParams};
use super::tag::{read_id3v1, read_id3v2};

pub const DEFAULT_CHUNK_SIZE: usize = 1 << 20;

/// Settings for [`splice`].
#[derive(Debug, Clone)]
pub struct SpliceOptions {
    chunk_size: usize,
    tag_source: Option<PathBuf>,
    engine: Engine,
}

impl Default for SpliceOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            tag_source: None,
            engine: Engine::Default,
        }
    }
}

impl SpliceOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Largest chunk the splice yields; at least one byte.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// File whose ID3v2 and ID3v1 tags frame the output.
    #[must_use]
    pub fn with_tag_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.tag_source = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[must_use]
    pub fn tag_source(&self) -> Option<&Path> {
        self.tag_source.as_deref()
    }

    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Head,
    Body,
    Tail,
    Done,
}

/// Lazily produced bytes of a splice.
///
/// Yields the tag source's ID3v2 tag and the engine's output in chunks no
/// larger than the configured chunk size, then the tag source's ID3v1 tag
/// as a single chunk.
/// After an error item the iterator is exhausted. Dropping it early stops
/// any external tools it started.
pub struct Splice {
    chunk_size: usize,
    phase: Phase,
    head: Vec<u8>,
    body: Body,
    tail: Vec<u8>,
    offset: usize,
}

impl Splice {
    fn next_head_chunk(&mut self) -> Option<Vec<u8>> {
        if self.offset < self.head.len() {
            let end = self.head.len().min(self.offset + self.chunk_size);
            let chunk = self.head[self.offset..end].to_vec();
            self.offset = end;
            return Some(chunk);
        }
        self.phase = Phase::Body;
        None
    }

    /// Write the whole splice to `path`.
    ///
    /// The bytes go to a temporary file in the same directory, which replaces
    /// `path` only once everything was written. Returns the number of bytes
    /// written.
    ///
    /// # Errors
    ///
    /// The first error produced by the splice, or any I/O failure.
    pub fn write_to(self, path: impl AsRef<Path>) -> Result<u64> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        let mut written = 0u64;
        for chunk in self {
            let chunk = chunk?;
            tmp.write_all(&chunk)?;
            written += chunk.len() as u64;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        tracing::debug!(path = %path.display(), bytes = written, "wrote splice");
        Ok(written)
    }
}

impl Iterator for Splice {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.phase {
                Phase::Head => {
                    if let Some(chunk) = self.next_head_chunk() {
                        return Some(Ok(chunk));
                    }
                }
                Phase::Body => match self.body.next_chunk(self.chunk_size) {
                    Some(Ok(chunk)) => return Some(Ok(chunk)),
                    Some(Err(e)) => {
                        self.phase = Phase::Done;
                        return Some(Err(e));
                    }
                    None => self.phase = Phase::Tail,
                },
                Phase::Tail => {
                    self.phase = Phase::Done;
                    if !self.tail.is_empty() {
                        return Some(Ok(std::mem::take(&mut self.tail)));
                    }
                }
                Phase::Done => return None,
            }
        }
    }
}

/// Splice `files` in order.
///
/// Tags are read from the tag source up front, and external tools are
/// started immediately; the audio itself is produced as the result is
/// iterated.
///
/// # Errors
///
/// [`Error::Io`](crate::Error::Io) if the tag source cannot be read, or a
/// tool error if the engine cannot be started.
pub fn splice<I, P>(files: I, options: &SpliceOptions) -> Result<Splice>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let files: Vec<PathBuf> = files
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();

    let (head, tail) = match &options.tag_source {
        Some(source) => {
            let mut reader = BufReader::new(File::open(source)?);
            let head = read_id3v2(&mut reader)?;
            let (_, tail) = read_id3v1(&mut reader, false)?;
            (head, tail.unwrap_or_default())
        }
        None => (Vec::new(), Vec::new()),
    };
    tracing::debug!(
        files = files.len(),
        engine = options.engine.name(),
        head = head.len(),
        tail = tail.len(),
        "starting splice"
    );

    Ok(Splice {
        chunk_size: options.chunk_size,
        phase: Phase::Head,
        head,
        body: options.engine.start(files)?,
        tail,
        offset: 0,
    })
}

/// Check that `files` agree on VBR-ness, bitrate, sample rate, and channel
/// mode, comparing each against the first.
///
/// # Errors
///
/// [`ValidationError`] naming the first field that differs, or
/// [`MediaFormatError`](super::MediaFormatError) for an unreadable file.
pub fn mp3_sanity_check<P: AsRef<Path>>(files: &[P]) -> Result<()> {
    let mut params = files.iter().map(audio_params);
    let Some(first) = params.next().transpose()? else {
        return Ok(());
    };
    for other in params {
        compare(&first, &other?)?;
    }
    Ok(())
}

fn compare(expected: &AudioParams, actual: &AudioParams) -> std::result::Result<(), ValidationError> {
    let mismatch = |field, expected: String, actual: String| ValidationError {
        field,
        expected,
        actual,
    };
    if expected.vbr != actual.vbr {
        return Err(mismatch("vbr", expected.vbr.to_string(), actual.vbr.to_string()));
    }
    if expected.bitrate != actual.bitrate {
        return Err(mismatch(
            "bitrate",
            expected.bitrate.to_string(),
            actual.bitrate.to_string(),
        ));
    }
    if expected.samplerate != actual.samplerate {
        return Err(mismatch(
            "samplerate",
            expected.samplerate.to_string(),
            actual.samplerate.to_string(),
        ));
    }
    if expected.mode != actual.mode {
        return Err(mismatch("mode", expected.mode.to_string(), actual.mode.to_string()));
    }
    Ok(())
}
