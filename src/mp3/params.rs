use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::error::{MediaFormatError, MediaFormatErrorKind};
use super::frame::{find_sync, ChannelMode, FrameHeader};
use super::tag::read_id3v2;

const PROBE_LEN: u64 = 128 * 1024;
const SAMPLE_FRAMES: usize = 32;

const XING_FRAMES: u32 = 0x1;
const XING_BYTES: u32 = 0x2;
const VBRI_OFFSET: usize = FrameHeader::LEN + 32;

/// Encoding parameters that must agree across spliced files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "json", derive(serde::Serialize))]
pub struct AudioParams {
    pub vbr: bool,
    /// kbit/s; the average for VBR files that carry frame and byte counts.
    pub bitrate: u32,
    /// Hz
    pub samplerate: u32,
    pub mode: ChannelMode,
}

fn be_u32(buf: &[u8], at: usize) -> Option<u32> {
    let bytes = buf.get(at..at + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read the encoding parameters of the MP3 file at `path`.
///
/// # Errors
///
/// [`MediaFormatError`] when the file cannot be read or holds no frame
/// header confirmed by the one following it.
pub fn audio_params(path: impl AsRef<Path>) -> Result<AudioParams, MediaFormatError> {
    let path = path.as_ref();
    let io_err = |e| MediaFormatError::new(path, MediaFormatErrorKind::Io(e));

    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    read_id3v2(&mut reader).map_err(io_err)?;
    let mut probe = Vec::new();
    reader
        .take(PROBE_LEN)
        .read_to_end(&mut probe)
        .map_err(io_err)?;

    let (pos, header) = first_frame(&probe)
        .ok_or_else(|| MediaFormatError::new(path, MediaFormatErrorKind::NoFrameHeader))?;
    Ok(params_at(&probe, pos, header))
}

/// The first header whose successor is also a header, or which runs to the
/// end of the data or into an ID3v1 tag.
fn first_frame(buf: &[u8]) -> Option<(usize, FrameHeader)> {
    let mut from = 0;
    while let Some(pos) = find_sync(buf, from) {
        if let Some(header) = FrameHeader::parse(&buf[pos..]) {
            let next = pos + header.frame_length();
            let confirmed = match buf.get(next..) {
                None | Some([]) => true,
                Some(rest) => rest.starts_with(b"TAG") || FrameHeader::parse(rest).is_some(),
            };
            if confirmed {
                return Some((pos, header));
            }
        }
        from = pos + 1;
    }
    None
}

fn params_at(buf: &[u8], pos: usize, header: FrameHeader) -> AudioParams {
    let frame = &buf[pos..];
    let mut params = AudioParams {
        vbr: false,
        bitrate: header.bitrate,
        samplerate: header.samplerate,
        mode: header.mode,
    };

    let xing = header.xing_offset();
    let tag = frame.get(xing..xing + 4).unwrap_or_default();
    if tag == b"Xing" || tag == b"Info" {
        params.vbr = tag == b"Xing";
        let flags = be_u32(frame, xing + 4).unwrap_or(0);
        let mut field = xing + 8;
        let frames = if flags & XING_FRAMES != 0 {
            let v = be_u32(frame, field);
            field += 4;
            v
        } else {
            None
        };
        let bytes = if flags & XING_BYTES != 0 {
            be_u32(frame, field)
        } else {
            None
        };
        if params.vbr {
            if let Some(avg) = average_bitrate(&header, frames, bytes) {
                params.bitrate = avg;
            }
        }
        return params;
    }

    if frame
        .get(VBRI_OFFSET..VBRI_OFFSET + 4)
        .is_some_and(|tag| tag == b"VBRI")
    {
        params.vbr = true;
        let bytes = be_u32(frame, VBRI_OFFSET + 10);
        let frames = be_u32(frame, VBRI_OFFSET + 14);
        if let Some(avg) = average_bitrate(&header, frames, bytes) {
            params.bitrate = avg;
        }
        return params;
    }

    let mut seen = vec![header.bitrate];
    let mut at = pos + header.frame_length();
    while seen.len() < SAMPLE_FRAMES {
        let Some(next) = buf.get(at..).and_then(FrameHeader::parse) else {
            break;
        };
        seen.push(next.bitrate);
        at += next.frame_length();
    }
    if seen.iter().any(|&b| b != header.bitrate) {
        params.vbr = true;
        let total: u64 = seen.iter().map(|&b| u64::from(b)).sum();
        params.bitrate = u32::try_from(total / seen.len() as u64).unwrap_or(header.bitrate);
    }
    params
}

fn average_bitrate(header: &FrameHeader, frames: Option<u32>, bytes: Option<u32>) -> Option<u32> {
    let (frames, bytes) = (u64::from(frames?), u64::from(bytes?));
    if frames == 0 {
        return None;
    }
    let samples = frames * u64::from(header.samples_per_frame());
    let kbps = bytes * 8 * u64::from(header.samplerate) / (samples * 1000);
    u32::try_from(kbps).ok()
}
