//! Producers of the spliced audio body.

use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, Take};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::str::FromStr;

use crate::error::{Error, Result};

use super::tag::{read_id3v1, read_id3v2};

/// How the audio of the spliced files is joined.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Engine {
    /// Strip each file's tags, trim any partial trailing frame, and
    /// concatenate the rest.
    #[default]
    Default,
    /// `sox <files> -t mp3 -`
    Sox { path: Option<PathBuf> },
    /// `cat <files> | mp3cat - -`
    Mp3cat { path: Option<PathBuf> },
}

impl Engine {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Engine::Default => "default",
            Engine::Sox { .. } => "sox",
            Engine::Mp3cat { .. } => "mp3cat",
        }
    }

    pub(crate) fn start(&self, files: Vec<PathBuf>) -> Result<Body> {
        match self {
            Engine::Default => Ok(Body::Files(FileBody {
                queue: files.into(),
                current: None,
            })),
            Engine::Sox { path } => ToolPipe::sox(path.as_deref(), &files).map(Body::Pipe),
            Engine::Mp3cat { path } => ToolPipe::mp3cat(path.as_deref(), &files).map(Body::Pipe),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Engine {
    type Err = Error;

    /// External tools are looked up on `PATH` when selected by name.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "default" => Ok(Engine::Default),
            "sox" => Ok(Engine::Sox { path: None }),
            "mp3cat" => Ok(Engine::Mp3cat { path: None }),
            other => Err(Error::UnknownEngine(other.to_owned())),
        }
    }
}

pub(crate) enum Body {
    Files(FileBody),
    Pipe(ToolPipe),
}

impl Body {
    /// The next chunk of at most `size` bytes, `None` once exhausted.
    pub(crate) fn next_chunk(&mut self, size: usize) -> Option<Result<Vec<u8>>> {
        match self {
            Body::Files(body) => body.next_chunk(size),
            Body::Pipe(pipe) => pipe.next_chunk(size),
        }
    }
}

pub(crate) struct FileBody {
    queue: VecDeque<PathBuf>,
    current: Option<Take<BufReader<File>>>,
}

impl FileBody {
    /// The audio of `path` between its tags, cut at the last whole frame.
    fn open(path: &Path) -> std::io::Result<Take<BufReader<File>>> {
        let mut reader = BufReader::new(File::open(path)?);
        read_id3v2(&mut reader)?;
        let (end, _) = read_id3v1(&mut reader, true)?;
        let start = reader.stream_position()?;
        tracing::trace!(path = %path.display(), start, end, "splicing file");
        Ok(reader.take(end.saturating_sub(start)))
    }

    fn next_chunk(&mut self, size: usize) -> Option<Result<Vec<u8>>> {
        loop {
            let mut current = match self.current.take() {
                Some(reader) => reader,
                None => {
                    let path = self.queue.pop_front()?;
                    match Self::open(&path) {
                        Ok(reader) => reader,
                        Err(e) => return Some(Err(e.into())),
                    }
                }
            };

            let mut chunk = Vec::with_capacity(size.min(64 * 1024));
            if let Err(e) = current.by_ref().take(size as u64).read_to_end(&mut chunk) {
                return Some(Err(e.into()));
            }
            if !chunk.is_empty() {
                self.current = Some(current);
                return Some(Ok(chunk));
            }
        }
    }
}

/// Output of an external tool pipeline, re-chunked.
pub(crate) struct ToolPipe {
    tool: &'static str,
    children: Vec<Child>,
    stdout: ChildStdout,
    finished: bool,
}

fn locate(tool: &str, configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) => Ok(path.to_path_buf()),
        None => which::which(tool).map_err(|_| Error::tool_not_found(tool)),
    }
}

fn spawn(tool: &str, command: &mut Command) -> Result<Child> {
    command
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| Error::tool_failed(tool, format!("failed to spawn: {e}")))
}

fn take_stdout(tool: &str, child: &mut Child) -> Result<ChildStdout> {
    child
        .stdout
        .take()
        .ok_or_else(|| Error::tool_failed(tool, "stdout not captured"))
}

impl ToolPipe {
    fn sox(path: Option<&Path>, files: &[PathBuf]) -> Result<Self> {
        let program = locate("sox", path)?;
        tracing::debug!(program = %program.display(), files = files.len(), "starting sox");
        let mut child = spawn(
            "sox",
            Command::new(program)
                .args(files)
                .args(["-t", "mp3", "-"])
                .stdin(Stdio::null())
                .stdout(Stdio::piped()),
        )?;
        let stdout = take_stdout("sox", &mut child)?;
        Ok(Self {
            tool: "sox",
            children: vec![child],
            stdout,
            finished: false,
        })
    }

    fn mp3cat(path: Option<&Path>, files: &[PathBuf]) -> Result<Self> {
        let cat = locate("cat", None)?;
        let program = locate("mp3cat", path)?;
        tracing::debug!(program = %program.display(), files = files.len(), "starting mp3cat");

        let mut feeder = spawn(
            "cat",
            Command::new(cat)
                .args(files)
                .stdin(Stdio::null())
                .stdout(Stdio::piped()),
        )?;
        let feed = take_stdout("cat", &mut feeder)?;
        let mut child = match spawn(
            "mp3cat",
            Command::new(program)
                .args(["-", "-"])
                .stdin(Stdio::from(feed))
                .stdout(Stdio::piped()),
        ) {
            Ok(child) => child,
            Err(e) => {
                reap(&mut feeder);
                return Err(e);
            }
        };
        let stdout = take_stdout("mp3cat", &mut child)?;
        Ok(Self {
            tool: "mp3cat",
            children: vec![feeder, child],
            stdout,
            finished: false,
        })
    }

    fn next_chunk(&mut self, size: usize) -> Option<Result<Vec<u8>>> {
        if self.finished {
            return None;
        }
        let mut chunk = Vec::with_capacity(size.min(64 * 1024));
        if let Err(e) = self.stdout.by_ref().take(size as u64).read_to_end(&mut chunk) {
            self.finished = true;
            return Some(Err(e.into()));
        }
        if !chunk.is_empty() {
            return Some(Ok(chunk));
        }

        self.finished = true;
        let mut failure = None;
        for mut child in std::mem::take(&mut self.children) {
            let outcome = match child.wait() {
                Ok(status) if status.success() => continue,
                Ok(status) => Error::tool_failed(self.tool, format!("exited with {status}")),
                Err(e) => e.into(),
            };
            failure.get_or_insert(outcome);
        }
        failure.map(Err)
    }
}

fn reap(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        let _ = child.kill();
    }
    let _ = child.wait();
}

impl Drop for ToolPipe {
    fn drop(&mut self) {
        for child in &mut self.children {
            reap(child);
        }
    }
}
