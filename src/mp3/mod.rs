//! MP3 frame inspection, ID3 tag handling, and splicing.

mod engine;
mod error;
pub mod frame;
mod params;
mod splice;
pub mod tag;

pub use engine::Engine;
pub use error::{MediaFormatError, MediaFormatErrorKind, ValidationError};
pub use frame::{find_sync, frame_info, ChannelMode, FrameHeader, FrameInfo, Layer, MpegVersion};
pub use params::{audio_params, AudioParams};
pub use splice::{mp3_sanity_check, splice, Splice, SpliceOptions, DEFAULT_CHUNK_SIZE};
pub use tag::{aligned_end, correct_end_offset, read_id3v1, read_id3v2};
