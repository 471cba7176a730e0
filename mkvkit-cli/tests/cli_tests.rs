//! End-to-end runs of the `mkvkit` binary.

use mkvkit::elements::codec_ids;
use mkvkit::{AudioSettings, MkvDemuxer, MkvMuxer, MuxerConfig, TrackEntry, TrackType};
use mkvkit_core::Packet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::process::{Command, Output};

const MS: i64 = 1_000_000;

fn mkvkit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_mkvkit"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write_sample(path: &Path) {
    let config = MuxerConfig {
        title: Some("CLI sample".to_string()),
        ..Default::default()
    };
    let mut muxer = MkvMuxer::new(BufWriter::new(File::create(path).unwrap()), config);
    let mut track = TrackEntry::new(1, TrackType::Audio, codec_ids::A_PCM_INT_LIT);
    track.audio = Some(AudioSettings::new(8000.0, 1));
    track.default_duration = Some(20_000_000);
    muxer.add_track(track, None).unwrap();
    for i in 0..20 {
        muxer
            .write_packet(Packet::new(1, i * 20 * MS, vec![i as u8; 8]).with_duration(20 * MS))
            .unwrap();
    }
    muxer.finalize().unwrap();
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn test_info_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.mkv");
    write_sample(&path);

    let output = mkvkit(&["-q", "info", "--json", path_str(&path)]);
    assert_eq!(output.status.code(), Some(0));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["doc_type"], "matroska");
    assert_eq!(json["segment_info"]["title"], "CLI sample");
    assert_eq!(json["tracks"].as_array().unwrap().len(), 1);
}

#[test]
fn test_merge_and_propedit() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.mkv");
    let output = dir.path().join("out.mkv");
    write_sample(&input);

    let result = mkvkit(&[
        "-q",
        "merge",
        "-o",
        path_str(&output),
        "--language",
        "1:ger",
        "--title",
        "Merged",
        path_str(&input),
    ]);
    assert_eq!(result.status.code(), Some(0), "{}", String::from_utf8_lossy(&result.stderr));

    let result = mkvkit(&[
        "-q",
        "propedit",
        path_str(&output),
        "--edit",
        "track:a1",
        "--set",
        "name=Commentary",
    ]);
    assert_eq!(result.status.code(), Some(0), "{}", String::from_utf8_lossy(&result.stderr));

    let demuxer = MkvDemuxer::open(BufReader::new(File::open(&output).unwrap())).unwrap();
    assert_eq!(demuxer.segment_info.title.as_deref(), Some("Merged"));
    assert_eq!(demuxer.tracks[0].language, "ger");
    assert_eq!(demuxer.tracks[0].name.as_deref(), Some("Commentary"));
}

#[test]
fn test_extract_timestamps() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.mkv");
    let timestamps = dir.path().join("timestamps.txt");
    write_sample(&path);

    let target = format!("1:{}", path_str(&timestamps));
    let result = mkvkit(&["-q", "extract", "timestamps_v2", path_str(&path), &target]);
    assert_eq!(result.status.code(), Some(0));

    let text = std::fs::read_to_string(&timestamps).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("# timestamp format v2"));
    assert_eq!(lines.next(), Some("0"));
    assert_eq!(lines.next(), Some("20"));
    assert_eq!(text.lines().count(), 21);
}

#[test]
fn test_errors_exit_with_two() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("missing.mkv");
    assert_eq!(mkvkit(&["-q", "info", path_str(&missing)]).status.code(), Some(2));

    let not_matroska = dir.path().join("text.mkv");
    std::fs::write(&not_matroska, b"definitely not EBML").unwrap();
    let result = mkvkit(&["-q", "propedit", path_str(&not_matroska), "--set", "title=x"]);
    assert_eq!(result.status.code(), Some(2));
    assert_eq!(std::fs::read(&not_matroska).unwrap(), b"definitely not EBML");
}
