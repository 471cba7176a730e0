//! In-place editing of files on disk.

use mkvkit::elements::*;
use mkvkit::{
    Analyzer, AudioSettings, ChangeKind, EditScope, MkvDemuxer, MkvMuxer, MuxerConfig, Node,
    PropEdit, TrackEntry, TrackSelector, TrackType, VideoSettings,
};
use mkvkit_core::Packet;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

const MS: i64 = 1_000_000;

/// A video and an audio track, 4 seconds long, with cues and a title.
fn write_sample(path: &Path) {
    let config = MuxerConfig {
        title: Some("Sample".to_string()),
        track_statistics: false,
        ..Default::default()
    };
    let mut muxer = MkvMuxer::new(BufWriter::new(File::create(path).unwrap()), config);

    let mut video = TrackEntry::new(1, TrackType::Video, codec_ids::V_VP9);
    video.video = Some(VideoSettings::new(320, 240));
    video.default_duration = Some(40_000_000);
    let mut audio = TrackEntry::new(2, TrackType::Audio, codec_ids::A_OPUS);
    audio.audio = Some(AudioSettings::new(48000.0, 2));
    audio.codec_private = Some(b"OpusHead\x01\x02\x38\x01\x80\xbb\x00\x00\x00\x00\x00".to_vec());
    audio.default_duration = Some(20_000_000);
    muxer.add_track(video, None).unwrap();
    muxer.add_track(audio, None).unwrap();

    for i in 0..200 {
        let ts = i * 20 * MS;
        if i % 2 == 0 {
            let mut frame = Packet::new(1, ts, vec![1; 64]);
            if i % 50 != 0 {
                frame = frame.with_bref(ts - 40 * MS);
            }
            muxer.write_packet(frame).unwrap();
        }
        muxer.write_packet(Packet::new(2, ts, vec![2; 16])).unwrap();
    }
    muxer.finalize().unwrap();
}

fn open(path: &Path) -> MkvDemuxer<BufReader<File>> {
    MkvDemuxer::open(BufReader::new(File::open(path).unwrap())).unwrap()
}

fn packet_count(path: &Path) -> usize {
    let mut demuxer = open(path);
    let mut count = 0;
    while demuxer.read_packet().unwrap().is_some() {
        count += 1;
    }
    assert!(demuxer.diagnostics().is_empty());
    count
}

/// Every cue must point at a Cluster.
fn assert_cues_point_at_clusters(path: &Path) {
    let demuxer = open(path);
    let data_start = demuxer.segment().unwrap().data_start;
    let clusters: Vec<u64> = demuxer
        .layout()
        .iter()
        .filter(|e| e.id == CLUSTER)
        .map(|e| e.position - data_start)
        .collect();
    assert!(!demuxer.cues.points.is_empty());
    for point in &demuxer.cues.points {
        for position in &point.positions {
            assert!(
                clusters.contains(&position.cluster_position),
                "cue at {} points at {}",
                point.time,
                position.cluster_position
            );
        }
    }
}

#[test]
fn test_edit_info_and_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.mkv");
    write_sample(&path);
    let packets = packet_count(&path);

    let mut edit = PropEdit::new();
    edit.change(ChangeKind::Set, "title=Edited").unwrap();
    edit.edit(EditScope::Track(TrackSelector::OfType(TrackType::Audio, 1)));
    edit.change(ChangeKind::Set, "language=fre").unwrap();
    edit.change(ChangeKind::Set, "name=Français").unwrap();
    edit.edit(EditScope::Track(TrackSelector::Number(1)));
    edit.change(ChangeKind::Set, "display-width=427").unwrap();
    edit.change(ChangeKind::Set, "flag-default=0").unwrap();
    let report = edit.run(&path).unwrap();
    assert_eq!(report.changes, 5);
    assert_eq!(report.updated, vec!["Info", "Tracks"]);

    let demuxer = open(&path);
    assert_eq!(demuxer.segment_info.title.as_deref(), Some("Edited"));
    let audio = demuxer.track(2).unwrap();
    assert_eq!(audio.language, "fre");
    assert_eq!(audio.name.as_deref(), Some("Français"));
    let video = demuxer.track(1).unwrap();
    assert_eq!(video.video.as_ref().unwrap().display_width, Some(427));
    assert!(!video.flag_default);
    assert_eq!(packet_count(&path), packets);
}

#[test]
fn test_growing_edit_keeps_index_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.mkv");
    write_sample(&path);
    let packets = packet_count(&path);
    let len = std::fs::metadata(&path).unwrap().len();

    let title = format!("title={}", "long ".repeat(1000));
    let edit = PropEdit::from_args(["--edit", "info", "--set", title.as_str()]).unwrap();
    edit.run(&path).unwrap();

    assert!(std::fs::metadata(&path).unwrap().len() > len + 4000);
    assert_eq!(packet_count(&path), packets);
    assert_cues_point_at_clusters(&path);

    let mut demuxer = open(&path);
    demuxer.seek(2000 * MS).unwrap();
    let packet = demuxer.read_packet().unwrap().unwrap();
    assert!(packet.timestamp <= 2000 * MS);
}

#[test]
fn test_unknown_element_survives_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.mkv");
    write_sample(&path);

    let unknown = Node::binary(0x2ABCDE, vec![9, 8, 7, 6]);
    let mut analyzer = Analyzer::open(&path).unwrap();
    analyzer.process().unwrap();
    let mut info = analyzer.read_all(INFO).unwrap().unwrap();
    info.push(unknown.clone());
    analyzer.update_element(info).unwrap();
    drop(analyzer);

    let ids_before: Vec<u32> = {
        let mut analyzer = Analyzer::open(&path).unwrap();
        analyzer.process().unwrap();
        let info = analyzer.read_all(INFO).unwrap().unwrap();
        info.children().iter().map(|c| c.id).collect()
    };
    assert_eq!(ids_before.last(), Some(&0x2ABCDE));

    let mut edit = PropEdit::new();
    edit.change(ChangeKind::Set, "title=Changed").unwrap();
    edit.run(&path).unwrap();

    let mut analyzer = Analyzer::open(&path).unwrap();
    analyzer.process().unwrap();
    let info = analyzer.read_all(INFO).unwrap().unwrap();
    let ids_after: Vec<u32> = info.children().iter().map(|c| c.id).collect();
    assert_eq!(ids_after, ids_before);
    assert_eq!(info.child(0x2ABCDE), Some(&unknown));
    assert_eq!(info.child_str(TITLE), Some("Changed"));
    assert_eq!(
        info.child(0x2ABCDE).unwrap().render().unwrap(),
        unknown.render().unwrap()
    );
}

#[test]
fn test_metadata_edits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.mkv");
    write_sample(&path);

    let chapters = dir.path().join("chapters.txt");
    std::fs::write(
        &chapters,
        "CHAPTER01=00:00:00.000\nCHAPTER01NAME=Start\nCHAPTER02=00:00:02.000\nCHAPTER02NAME=Middle\n",
    )
    .unwrap();
    let font = dir.path().join("font.ttf");
    std::fs::write(&font, vec![0u8; 300]).unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, b"notes").unwrap();

    let chapters_arg = chapters.to_string_lossy().into_owned();
    let font_arg = font.to_string_lossy().into_owned();
    let notes_arg = notes.to_string_lossy().into_owned();
    let edit = PropEdit::from_args([
        "--chapters",
        chapters_arg.as_str(),
        "--add-attachment",
        font_arg.as_str(),
        "--add-attachment",
        notes_arg.as_str(),
    ])
    .unwrap();
    edit.run(&path).unwrap();

    let demuxer = open(&path);
    let names: Vec<&str> = demuxer.chapters.atoms().iter().filter_map(|a| a.name()).collect();
    assert_eq!(names, vec!["Start", "Middle"]);
    let files: Vec<(&str, &str)> = demuxer
        .attachments
        .files
        .iter()
        .map(|f| (f.name.as_str(), f.media_type.as_str()))
        .collect();
    assert_eq!(files, vec![("font.ttf", "font/ttf"), ("notes.txt", "text/plain")]);

    let edit = PropEdit::from_args(["--delete-attachment", "1", "--delete-chapters"]).unwrap();
    let report = edit.run(&path).unwrap();
    assert_eq!(report.removed, vec!["Chapters"]);

    let demuxer = open(&path);
    assert!(demuxer.chapters.is_empty());
    assert_eq!(demuxer.attachments.files.len(), 1);
    assert_eq!(demuxer.attachments.files[0].data, b"notes");
    assert_eq!(packet_count(&path), 300);
}

#[test]
fn test_invalid_edit_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.mkv");
    write_sample(&path);
    let before = std::fs::read(&path).unwrap();

    let edit = PropEdit::from_args([
        "--edit", "info", "--set", "title=Fine", "--edit", "track:v3", "--set", "name=missing",
    ])
    .unwrap();
    assert!(edit.run(&path).is_err());
    assert_eq!(std::fs::read(&path).unwrap(), before);

    assert!(PropEdit::from_args(["--set", "no-such-property=1"]).is_err());
}
