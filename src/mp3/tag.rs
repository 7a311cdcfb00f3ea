//! ID3 tag spans and the backward search for the last complete frame.

use std::io::{self, Read, Seek, SeekFrom};

use super::frame::FrameHeader;

pub const ID3V2_HEADER_LEN: usize = 10;
pub const ID3V1_LEN: u64 = 128;

/// Bytes examined when looking past a tag or back from the end of a file.
pub const SYNC_WINDOW: usize = 8192;

const ID3V2_FOOTER_FLAG: u8 = 0x10;

fn synchsafe(bytes: [u8; 4]) -> usize {
    bytes
        .iter()
        .fold(0usize, |acc, &b| (acc << 7) | usize::from(b & 0x7F))
}

/// Read as much of `buf` as the reader can supply.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Read the ID3v2 tag at the reader's position, header included.
///
/// Without a tag this returns an empty vector and leaves the position where
/// it was; otherwise the reader is left just past the tag. Some encoders set
/// a footer without flagging it, so when no frame starts right after the tag
/// but one starts ten bytes later, those ten bytes are taken as the footer.
pub fn read_id3v2<R: Read + Seek>(reader: &mut R) -> io::Result<Vec<u8>> {
    let start = reader.stream_position()?;
    let mut header = [0u8; ID3V2_HEADER_LEN];
    let got = read_up_to(reader, &mut header)?;
    if got < ID3V2_HEADER_LEN || &header[..3] != b"ID3" {
        reader.seek(SeekFrom::Start(start))?;
        return Ok(Vec::new());
    }

    let mut size = synchsafe([header[6], header[7], header[8], header[9]]);
    if header[5] & ID3V2_FOOTER_FLAG != 0 {
        size += ID3V2_HEADER_LEN;
    }

    let mut tag = header.to_vec();
    reader.by_ref().take(size as u64).read_to_end(&mut tag)?;

    let body_end = reader.stream_position()?;
    let mut peek = vec![0u8; SYNC_WINDOW];
    let got = read_up_to(reader, &mut peek)?;
    peek.truncate(got);
    reader.seek(SeekFrom::Start(body_end))?;

    let at_boundary = FrameHeader::parse(&peek).is_some();
    let after_footer = peek
        .get(ID3V2_HEADER_LEN..)
        .and_then(FrameHeader::parse)
        .is_some();
    if !at_boundary && after_footer {
        tracing::debug!(offset = body_end, "inferring an unflagged id3v2 footer");
        reader
            .by_ref()
            .take(ID3V2_HEADER_LEN as u64)
            .read_to_end(&mut tag)?;
    }
    Ok(tag)
}

/// Locate the trailing ID3v1 tag.
///
/// Returns the offset where the audio ends and the tag, if present. With
/// `correct_offset` the end is pulled back to the last complete frame (see
/// [`correct_end_offset`]). The reader position is restored.
pub fn read_id3v1<R: Read + Seek>(
    reader: &mut R,
    correct_offset: bool,
) -> io::Result<(u64, Option<Vec<u8>>)> {
    let position = reader.stream_position()?;
    let size = reader.seek(SeekFrom::End(0))?;

    let mut tag = None;
    let mut end = size;
    if size >= ID3V1_LEN {
        reader.seek(SeekFrom::Start(size - ID3V1_LEN))?;
        let mut buf = vec![0u8; ID3V1_LEN as usize];
        if read_up_to(reader, &mut buf)? == buf.len() && buf.starts_with(b"TAG") {
            end = size - ID3V1_LEN;
            tag = Some(buf);
        }
    }

    if correct_offset {
        end = correct_end_offset(reader, end, SYNC_WINDOW)?;
    }
    reader.seek(SeekFrom::Start(position))?;
    Ok((end, tag))
}

/// Where the last complete frame in `window` ends.
///
/// Walks backward over `0xFF` bytes. A valid header whose frame length
/// reaches exactly to the current boundary ends the search; a valid header
/// that falls short becomes the new boundary, discarding the fragment after
/// it.
#[must_use]
pub fn aligned_end(window: &[u8]) -> Option<usize> {
    let mut boundary = window.len();
    let mut cursor = window.len();
    while let Some(pos) = window[..cursor].iter().rposition(|&b| b == 0xFF) {
        cursor = pos;
        let Some(header) = FrameHeader::parse(&window[pos..]) else {
            continue;
        };
        if header.frame_length() == boundary - pos {
            return Some(boundary);
        }
        boundary = pos;
    }
    None
}

/// Pull `nominal` back to the end of the last complete frame found within
/// `window_len` bytes before it.
///
/// Falls back to `nominal` (with a warning) when no complete frame is found.
/// The reader position is restored.
pub fn correct_end_offset<R: Read + Seek>(
    reader: &mut R,
    nominal: u64,
    window_len: usize,
) -> io::Result<u64> {
    let position = reader.stream_position()?;
    let start = nominal.saturating_sub(window_len as u64);
    let len = usize::try_from(nominal - start).unwrap_or(window_len);

    reader.seek(SeekFrom::Start(start))?;
    let mut window = vec![0u8; len];
    let got = read_up_to(reader, &mut window)?;
    window.truncate(got);
    reader.seek(SeekFrom::Start(position))?;

    match aligned_end(&window) {
        Some(end) => Ok(start + end as u64),
        None => {
            tracing::warn!(
                window = window_len,
                offset = nominal,
                "no complete frame found before end of audio; no cleanup attempted"
            );
            Ok(nominal)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    // MPEG-1 Layer III, 32 kbit/s, 32 kHz: 144 bytes per frame
    const HEADER: [u8; 4] = [0xFF, 0xFB, 0x18, 0xC4];
    const FRAME_LEN: usize = 144;

    fn frame() -> Vec<u8> {
        let mut f = HEADER.to_vec();
        f.resize(FRAME_LEN, 0x55);
        f
    }

    fn frames(n: usize) -> Vec<u8> {
        (0..n).flat_map(|_| frame()).collect()
    }

    fn id3v2(body_len: usize, flags: u8) -> Vec<u8> {
        let size = body_len as u32;
        let mut tag = b"ID3".to_vec();
        tag.extend_from_slice(&[3, 0, flags]);
        tag.extend_from_slice(&[
            ((size >> 21) & 0x7F) as u8,
            ((size >> 14) & 0x7F) as u8,
            ((size >> 7) & 0x7F) as u8,
            (size & 0x7F) as u8,
        ]);
        tag.resize(ID3V2_HEADER_LEN + body_len, 0);
        tag
    }

    fn id3v1() -> Vec<u8> {
        let mut tag = b"TAG".to_vec();
        tag.resize(ID3V1_LEN as usize, b' ');
        tag
    }

    #[test]
    fn frame_fixture_is_valid() {
        assert_eq!(FrameHeader::parse(&HEADER).unwrap().frame_length(), FRAME_LEN);
    }

    #[test]
    fn synchsafe_sizes() {
        assert_eq!(synchsafe([0, 0, 0x02, 0x01]), 257);
        assert_eq!(synchsafe([0x7F, 0x7F, 0x7F, 0x7F]), (1 << 28) - 1);
    }

    #[test]
    fn no_id3v2_restores_position() {
        let mut data = vec![0u8; 5];
        data.extend(frames(2));
        let mut cur = Cursor::new(data);
        cur.set_position(5);
        assert!(read_id3v2(&mut cur).unwrap().is_empty());
        assert_eq!(cur.position(), 5);
    }

    #[test]
    fn id3v2_read_whole() {
        let tag = id3v2(300, 0);
        let mut data = tag.clone();
        data.extend(frames(2));
        let mut cur = Cursor::new(data);
        assert_eq!(read_id3v2(&mut cur).unwrap(), tag);
        assert_eq!(cur.position(), tag.len() as u64);
    }

    #[test]
    fn flagged_footer_is_included() {
        let mut tag = id3v2(40, ID3V2_FOOTER_FLAG);
        tag.extend_from_slice(b"3DI\x03\x00\x10\x00\x00\x00\x28");
        let mut data = tag.clone();
        data.extend(frames(2));
        let mut cur = Cursor::new(data);
        assert_eq!(read_id3v2(&mut cur).unwrap().len(), tag.len());
    }

    #[test]
    fn unflagged_footer_is_inferred() {
        let mut tag = id3v2(40, 0);
        tag.extend_from_slice(&[0u8; 10]);
        let mut data = tag.clone();
        data.extend(frames(2));
        let mut cur = Cursor::new(data);
        let read = read_id3v2(&mut cur).unwrap();
        assert_eq!(read.len(), tag.len());
        assert_eq!(cur.position(), tag.len() as u64);
    }

    #[test]
    fn id3v1_found_and_position_restored() {
        let mut data = frames(3);
        data.extend(id3v1());
        let mut cur = Cursor::new(data);
        cur.set_position(7);
        let (end, tag) = read_id3v1(&mut cur, false).unwrap();
        assert_eq!(end, 3 * FRAME_LEN as u64);
        assert_eq!(tag.unwrap(), id3v1());
        assert_eq!(cur.position(), 7);
    }

    #[test]
    fn id3v1_absent() {
        let mut cur = Cursor::new(frames(3));
        let (end, tag) = read_id3v1(&mut cur, false).unwrap();
        assert_eq!(end, 3 * FRAME_LEN as u64);
        assert!(tag.is_none());

        let mut tiny = Cursor::new(vec![1u8, 2, 3]);
        assert_eq!(read_id3v1(&mut tiny, false).unwrap(), (3, None));
    }

    #[test]
    fn aligned_end_accepts_complete_tail() {
        assert_eq!(aligned_end(&frames(3)), Some(3 * FRAME_LEN));
    }

    #[test]
    fn aligned_end_drops_fragment() {
        let mut data = frames(3);
        data.extend_from_slice(&HEADER);
        data.extend_from_slice(&[0x55; 20]);
        assert_eq!(aligned_end(&data), Some(3 * FRAME_LEN));
    }

    #[test]
    fn aligned_end_without_sync() {
        assert_eq!(aligned_end(&[0x55; 64]), None);
        assert_eq!(aligned_end(&[]), None);
    }

    #[test]
    fn corrected_offset_skips_truncated_frame_before_tag() {
        let mut data = frames(4);
        data.extend_from_slice(&HEADER);
        data.extend_from_slice(&[0x55; 30]);
        let audio_end = data.len() as u64;
        data.extend(id3v1());

        let mut cur = Cursor::new(data);
        let (end, tag) = read_id3v1(&mut cur, true).unwrap();
        assert!(tag.is_some());
        assert!(end < audio_end);
        assert_eq!(end, 4 * FRAME_LEN as u64);
    }

    #[test]
    fn aligned_end_is_stable_on_its_own_output() {
        let mut data = frames(4);
        data.extend_from_slice(&HEADER);
        data.extend_from_slice(&[0x55; 30]);
        data.extend_from_slice(b"junk");

        let first = aligned_end(&data).unwrap();
        assert_eq!(first, 4 * FRAME_LEN);
        assert_eq!(aligned_end(&data[..first]), Some(first));
    }

    #[test]
    fn corrected_offset_is_stable_before_tag() {
        let mut data = frames(3);
        data.extend_from_slice(&HEADER);
        data.extend_from_slice(&[0x55; 10]);
        data.extend(id3v1());

        let mut cur = Cursor::new(data);
        let (end, _) = read_id3v1(&mut cur, true).unwrap();
        assert_eq!(end, 3 * FRAME_LEN as u64);
        assert_eq!(correct_end_offset(&mut cur, end, SYNC_WINDOW).unwrap(), end);
    }

    #[test]
    fn corrected_offset_is_stable_for_lone_partial_frame() {
        let mut data = HEADER.to_vec();
        data.extend_from_slice(&[0x55; 30]);
        let len = data.len() as u64;

        let mut cur = Cursor::new(data);
        let first = correct_end_offset(&mut cur, len, SYNC_WINDOW).unwrap();
        assert_eq!(first, len);
        assert_eq!(correct_end_offset(&mut cur, first, SYNC_WINDOW).unwrap(), first);
    }

    #[test]
    fn corrected_offset_falls_back_to_nominal() {
        let mut cur = Cursor::new(vec![0x55u8; 500]);
        assert_eq!(correct_end_offset(&mut cur, 500, SYNC_WINDOW).unwrap(), 500);
    }

    #[test]
    fn window_start_clamped_at_zero() {
        let data = frames(2);
        let mut cur = Cursor::new(data);
        assert_eq!(
            correct_end_offset(&mut cur, 2 * FRAME_LEN as u64, SYNC_WINDOW).unwrap(),
            2 * FRAME_LEN as u64
        );
    }
}
