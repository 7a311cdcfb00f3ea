use std::fmt;

/// MPEG audio version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpegVersion {
    Mpeg1,
    Mpeg2,
    Mpeg25,
}

impl MpegVersion {
    /// 1, 2, or 3 for MPEG-2.5.
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            MpegVersion::Mpeg1 => 1,
            MpegVersion::Mpeg2 => 2,
            MpegVersion::Mpeg25 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layer {
    I,
    II,
    III,
}

impl Layer {
    #[must_use]
    pub fn number(self) -> u8 {
        match self {
            Layer::I => 1,
            Layer::II => 2,
            Layer::III => 3,
        }
    }
}

/// Channel mode, displayed as its one-letter code (`s`, `j`, `d`, `m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "json", serde(rename_all = "lowercase"))]
pub enum ChannelMode {
    Stereo,
    JointStereo,
    DualChannel,
    Mono,
}

impl ChannelMode {
    #[must_use]
    pub fn code(self) -> char {
        match self {
            ChannelMode::Stereo => 's',
            ChannelMode::JointStereo => 'j',
            ChannelMode::DualChannel => 'd',
            ChannelMode::Mono => 'm',
        }
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// kbit/s, indexed by the 4-bit bitrate field; 0 (free) and 15 (bad) are
// rejected before lookup.
const BITRATES_V1_L1: [u32; 15] = [
    0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448,
];
const BITRATES_V1_L2: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384,
];
const BITRATES_V1_L3: [u32; 15] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];
const BITRATES_V2_L1: [u32; 15] = [
    0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256,
];
const BITRATES_V2_L23: [u32; 15] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160,
];

const SAMPLERATES_V1: [u32; 3] = [44_100, 48_000, 32_000];
const SAMPLERATES_V2: [u32; 3] = [22_050, 24_000, 16_000];
const SAMPLERATES_V25: [u32; 3] = [11_025, 12_000, 8_000];

/// A decoded 4-byte MPEG audio frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    pub layer: Layer,
    /// A 16-bit CRC follows the header.
    pub protected: bool,
    /// kbit/s
    pub bitrate: u32,
    /// Hz
    pub samplerate: u32,
    pub padding: bool,
    pub mode: ChannelMode,
}

impl FrameHeader {
    pub const LEN: usize = 4;

    /// Decode the header at the start of `buf`, or `None` if `buf` does not
    /// start with a valid one.
    #[must_use]
    pub fn parse(buf: &[u8]) -> Option<Self> {
        let &[b0, b1, b2, b3, ..] = buf else {
            return None;
        };
        if b0 != 0xFF || b1 & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (b1 >> 3) & 0b11 {
            0b00 => MpegVersion::Mpeg25,
            0b10 => MpegVersion::Mpeg2,
            0b11 => MpegVersion::Mpeg1,
            _ => return None,
        };
        let layer = match (b1 >> 1) & 0b11 {
            0b01 => Layer::III,
            0b10 => Layer::II,
            0b11 => Layer::I,
            _ => return None,
        };

        let bitrate_index = usize::from(b2 >> 4);
        if bitrate_index == 0 || bitrate_index == 15 {
            return None;
        }
        let samplerate_index = usize::from((b2 >> 2) & 0b11);
        if samplerate_index == 3 {
            return None;
        }
        if b3 & 0b11 == 0b10 {
            return None;
        }

        let bitrates = match (version, layer) {
            (MpegVersion::Mpeg1, Layer::I) => &BITRATES_V1_L1,
            (MpegVersion::Mpeg1, Layer::II) => &BITRATES_V1_L2,
            (MpegVersion::Mpeg1, Layer::III) => &BITRATES_V1_L3,
            (_, Layer::I) => &BITRATES_V2_L1,
            (_, _) => &BITRATES_V2_L23,
        };
        let samplerates = match version {
            MpegVersion::Mpeg1 => &SAMPLERATES_V1,
            MpegVersion::Mpeg2 => &SAMPLERATES_V2,
            MpegVersion::Mpeg25 => &SAMPLERATES_V25,
        };
        let mode = match b3 >> 6 {
            0b00 => ChannelMode::Stereo,
            0b01 => ChannelMode::JointStereo,
            0b10 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };

        Some(Self {
            version,
            layer,
            protected: b1 & 1 == 0,
            bitrate: bitrates[bitrate_index],
            samplerate: samplerates[samplerate_index],
            padding: (b2 >> 1) & 1 == 1,
            mode,
        })
    }

    /// Total frame length in bytes, header included.
    #[must_use]
    pub fn frame_length(&self) -> usize {
        let bps = self.bitrate as usize * 1000;
        let sr = self.samplerate as usize;
        let pad = usize::from(self.padding);
        match (self.layer, self.version) {
            (Layer::I, _) => (12 * bps / sr + pad) * 4,
            (Layer::II, _) | (Layer::III, MpegVersion::Mpeg1) => 144 * bps / sr + pad,
            (Layer::III, _) => 72 * bps / sr + pad,
        }
    }

    /// PCM samples encoded by one frame.
    #[must_use]
    pub fn samples_per_frame(&self) -> u32 {
        match (self.layer, self.version) {
            (Layer::I, _) => 384,
            (Layer::II, _) | (Layer::III, MpegVersion::Mpeg1) => 1152,
            (Layer::III, _) => 576,
        }
    }

    /// Length of the Layer III side information following the header (and
    /// CRC, if any).
    #[must_use]
    pub fn side_info_len(&self) -> usize {
        match (self.version, self.mode) {
            (MpegVersion::Mpeg1, ChannelMode::Mono) => 17,
            (MpegVersion::Mpeg1, _) => 32,
            (_, ChannelMode::Mono) => 9,
            (_, _) => 17,
        }
    }

    /// Offset from the frame start where a Xing/Info header would sit.
    #[must_use]
    pub(crate) fn xing_offset(&self) -> usize {
        let crc = if self.protected { 2 } else { 0 };
        Self::LEN + crc + self.side_info_len()
    }
}

/// Length, version, and layer of the frame at the start of a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    pub length: usize,
    /// 1, 2, or 3 (MPEG-2.5); 0 when no frame was found.
    pub version: u8,
    /// 1, 2, or 3; 0 when no frame was found.
    pub layer: u8,
}

impl FrameInfo {
    pub const NONE: FrameInfo = FrameInfo {
        length: 0,
        version: 0,
        layer: 0,
    };
}

impl From<FrameHeader> for FrameInfo {
    fn from(h: FrameHeader) -> Self {
        Self {
            length: h.frame_length(),
            version: h.version.number(),
            layer: h.layer.number(),
        }
    }
}

/// Inspect the frame header at the start of `buf`.
///
/// Returns [`FrameInfo::NONE`] when `buf` does not start with a valid header.
#[must_use]
pub fn frame_info(buf: &[u8]) -> FrameInfo {
    FrameHeader::parse(buf).map_or(FrameInfo::NONE, FrameInfo::from)
}

/// Position of the first valid frame header at or after `from`.
#[must_use]
pub fn find_sync(buf: &[u8], from: usize) -> Option<usize> {
    let tail = buf.get(from..)?;
    tail.iter()
        .enumerate()
        .filter(|&(_, &b)| b == 0xFF)
        .find(|&(i, _)| FrameHeader::parse(&tail[i..]).is_some())
        .map(|(i, _)| from + i)
}
