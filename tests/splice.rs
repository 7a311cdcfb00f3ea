
use std::fs;
use std::path::PathBuf;

use fixtures::*;
use spliceroll::{
    frame_info, mp3_metadata, mp3_sanity_check, splice, ChannelMode, Combined, Engine, Error,
    Library, MediaPolicy, Rule, SpliceOptions, ValidationError,
};

fn collect(options: &SpliceOptions, files: &[PathBuf]) -> Vec<Vec<u8>> {
    splice(files, options)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn default_engine_strips_tags_and_frames_with_tag_source() {
    let dir = tempfile::tempdir().unwrap();
    let intro = write(dir.path(), "intro.mp3", &tagged_mono(3, 0x11, "intro"));
    let main = write(dir.path(), "main.mp3", &tagged_mono(5, 0x22, "main"));

    let options = SpliceOptions::new()
        .with_chunk_size(100)
        .with_tag_source(&main);
    let chunks = collect(&options, &[intro, main]);

    assert!(chunks.iter().all(|c| !c.is_empty()));
    let (tail, rest) = chunks.split_last().unwrap();
    assert_eq!(tail.len(), 128);
    assert!(rest.iter().all(|c| c.len() <= 100));
    let mut expected = id3v2(64, b'a');
    expected.extend(mono_frames(3, 0x11));
    expected.extend(mono_frames(5, 0x22));
    expected.extend(id3v1("main"));
    assert_eq!(chunks.concat(), expected);
}

#[test]
fn without_tag_source_output_is_bare_audio() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.mp3", &tagged_mono(2, 0x11, "a"));
    let b = write(dir.path(), "b.mp3", &mono_frames(2, 0x22));

    let chunks = collect(&SpliceOptions::new(), &[a, b]);
    let mut expected = mono_frames(2, 0x11);
    expected.extend(mono_frames(2, 0x22));
    assert_eq!(chunks.concat(), expected);
}

#[test]
fn partial_trailing_frame_is_dropped() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let mut data = mono_frames(4, 0x33);
    data.extend_from_slice(&MONO_32K);
    data.extend_from_slice(&[0x33; 50]);
    data.extend(id3v1("cut"));
    let cut = write(dir.path(), "cut.mp3", &data);

    let chunks = collect(&SpliceOptions::new(), &[cut]);
    assert_eq!(chunks.concat(), mono_frames(4, 0x33));
}

#[test]
fn small_chunks_split_head_not_tail() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.mp3", &tagged_mono(1, 0x22, "main"));
    let options = SpliceOptions::new().with_chunk_size(7).with_tag_source(&main);
    let chunks = collect(&options, &[main.clone()]);
    let (tail, rest) = chunks.split_last().unwrap();
    assert_eq!(tail, &id3v1("main"));
    assert!(rest.iter().all(|c| c.len() <= 7));
    assert_eq!(chunks.concat(), fs::read(&main).unwrap());
}

#[test]
fn error_item_ends_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.mp3", &mono_frames(1, 0x11));
    let missing = dir.path().join("missing.mp3");

    let mut s = splice([&a, &missing, &a], &SpliceOptions::new()).unwrap();
    assert!(matches!(s.next(), Some(Ok(_))));
    assert!(matches!(s.next(), Some(Err(Error::Io(_)))));
    assert!(s.next().is_none());
}

#[test]
fn missing_tag_source_fails_up_front() {
    let dir = tempfile::tempdir().unwrap();
    let options = SpliceOptions::new().with_tag_source(dir.path().join("nope.mp3"));
    assert!(matches!(
        splice(Vec::<PathBuf>::new(), &options),
        Err(Error::Io(_))
    ));
}

#[test]
fn write_to_persists_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let main = write(dir.path(), "main.mp3", &tagged_mono(3, 0x22, "main"));
    let target = dir.path().join("combined.mp3");

    let written = splice([&main], &SpliceOptions::new().with_tag_source(&main))
        .unwrap()
        .write_to(&target)
        .unwrap();
    let bytes = fs::read(&target).unwrap();
    assert_eq!(written, bytes.len() as u64);
    assert_eq!(bytes, fs::read(&main).unwrap());
    // only the target is left behind
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[cfg(unix)]
#[test]
fn tool_output_is_rechunked() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.mp3", &mono_frames(3, 0x11));
    let b = write(dir.path(), "b.mp3", &mono_frames(2, 0x22));

    // `cat - -` passes its input through, standing in for mp3cat
    let options = SpliceOptions::new()
        .with_chunk_size(64)
        .with_engine(Engine::Mp3cat {
            path: Some(PathBuf::from("cat")),
        });
    let chunks = collect(&options, &[a, b]);
    assert!(chunks.iter().all(|c| c.len() <= 64));
    let mut expected = mono_frames(3, 0x11);
    expected.extend(mono_frames(2, 0x22));
    assert_eq!(chunks.concat(), expected);
}

#[cfg(unix)]
#[test]
fn failing_tool_reports_error() {
    let options = SpliceOptions::new().with_engine(Engine::Sox {
        path: Some(PathBuf::from("false")),
    });
    let items: Vec<_> = splice(["x.mp3"], &options).unwrap().collect();
    assert_eq!(items.len(), 1);
    assert!(matches!(
        &items[0],
        Err(Error::ToolFailed { tool, .. }) if tool == "sox"
    ));
}

#[cfg(unix)]
#[test]
fn dropping_stream_stops_tool() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.mp3", &mono_frames(200, 0x11));
    let options = SpliceOptions::new()
        .with_chunk_size(16)
        .with_engine(Engine::Mp3cat {
            path: Some(PathBuf::from("cat")),
        });
    let mut s = splice([&a], &options).unwrap();
    assert_eq!(s.next().unwrap().unwrap().len(), 16);
    drop(s);
}

#[test]
fn metadata_of_cbr_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "a.mp3", &tagged_mono(10, 0, "a"));
    let params = mp3_metadata(&path).unwrap();
    assert!(!params.vbr);
    assert_eq!(params.bitrate, 32);
    assert_eq!(params.samplerate, 32_000);
    assert_eq!(params.mode, ChannelMode::Mono);

    let info = frame_info(&MONO_32K);
    assert_eq!((info.length, info.version, info.layer), (144, 1, 3));
}

#[test]
fn sanity_check_reports_first_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "a.mp3", &mono_frames(4, 0));
    let b = write(dir.path(), "b.mp3", &mono_frames(6, 0));
    let c = write(
        dir.path(),
        "c.mp3",
        &(0..4).flat_map(|_| frame(JOINT_128K, 417, 0)).collect::<Vec<_>>(),
    );

    assert!(mp3_sanity_check(&[&a, &b]).is_ok());
    match mp3_sanity_check(&[&a, &b, &c]) {
        Err(Error::Validation(ValidationError {
            field,
            expected,
            actual,
        })) => {
            assert_eq!(field, "bitrate");
            assert_eq!(expected, "32");
            assert_eq!(actual, "128");
        }
        other => panic!("expected validation error, got {other:?}"),
    }

    let v = write(dir.path(), "v.mp3", &vbr_frames(8));
    let err = mp3_sanity_check(&[&c, &v]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "vbr does not match; expected false, got true"
    );
}

#[test]
fn sanity_check_reports_samplerate_mismatch() {
    // 128 kbit/s joint stereo at 48 kHz: 384-byte frames
    const JOINT_128K_48K: [u8; 4] = [0xFF, 0xFB, 0x94, 0x44];
    let dir = tempfile::tempdir().unwrap();
    let a = write(
        dir.path(),
        "a.mp3",
        &(0..4).flat_map(|_| frame(JOINT_128K, 417, 0)).collect::<Vec<_>>(),
    );
    let b = write(
        dir.path(),
        "b.mp3",
        &(0..4).flat_map(|_| frame(JOINT_128K_48K, 384, 0)).collect::<Vec<_>>(),
    );

    match mp3_sanity_check(&[&a, &b]) {
        Err(Error::Validation(ValidationError {
            field,
            expected,
            actual,
        })) => {
            assert_eq!(field, "samplerate");
            assert_eq!(expected, "44100");
            assert_eq!(actual, "48000");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

fn library(dir: &std::path::Path) -> Library {
    write(
        dir,
        "main/show.mp3",
        &tagged_mono(5, 0x22, "show"),
    );
    write(dir, "main/vbr.mp3", &vbr_frames(6));
    write(dir, "extra/master/intro.mp3", &mono_frames(2, 0x11));
    Library::new(dir)
}

#[test]
fn playlist_drops_missing_clips() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let lib = library(dir.path());
    let rule = Rule::from_grammar("*: pre: [intro.mp3, missing.mp3]").unwrap();

    let playlist = lib.playlist("/show.mp3", &rule).unwrap();
    assert_eq!(
        playlist,
        [
            dir.path().join("extra/master/intro.mp3"),
            dir.path().join("main/show.mp3"),
        ]
    );
}

#[test]
fn rules_see_name_without_leading_slash() {
    let dir = tempfile::tempdir().unwrap();
    let lib = library(dir.path());
    let rule = Rule::from_grammar("regex:show.*: pre: [intro.mp3]").unwrap();

    let playlist = lib.playlist("/show.mp3", &rule).unwrap();
    assert_eq!(
        playlist,
        [
            dir.path().join("extra/master/intro.mp3"),
            dir.path().join("main/show.mp3"),
        ]
    );
}

#[test]
fn combined_uses_main_tags() {
    let dir = tempfile::tempdir().unwrap();
    let lib = library(dir.path());
    let rule = Rule::from_grammar("*: pre: [intro.mp3]").unwrap();

    let Combined::Spliced(stream) = lib
        .combined("show.mp3", &rule, &SpliceOptions::new())
        .unwrap()
    else {
        panic!("expected a splice");
    };
    let bytes: Vec<u8> = stream.map(Result::unwrap).flatten().collect();

    let mut expected = id3v2(64, b'a');
    expected.extend(mono_frames(2, 0x11));
    expected.extend(mono_frames(5, 0x22));
    expected.extend(id3v1("show"));
    assert_eq!(bytes, expected);
}

#[test]
fn vbr_main_follows_policy() {
    let dir = tempfile::tempdir().unwrap();
    let lib = library(dir.path());
    let rule = Rule::from_grammar("*: pre: [intro.mp3]").unwrap();

    assert!(lib.playlist("vbr.mp3", &rule).unwrap().is_empty());
    assert!(matches!(
        lib.combined("vbr.mp3", &rule, &SpliceOptions::new()).unwrap(),
        Combined::Verbatim(path) if path == dir.path().join("main/vbr.mp3")
    ));

    let strict = lib.with_policy(MediaPolicy::Strict);
    assert!(matches!(
        strict.playlist("vbr.mp3", &rule),
        Err(Error::MediaFormat(_))
    ));
}

#[test]
fn missing_main_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let lib = library(dir.path());
    let rule = Rule::from_grammar("default").unwrap();
    assert!(matches!(
        lib.playlist("gone.mp3", &rule),
        Err(Error::MissingResource(_))
    ));
}
