#![no_main]

//! Fuzz target for the demuxer: open a file and read every packet.

use libfuzzer_sys::fuzz_target;
use mkvkit::MkvDemuxer;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }
    let Ok(mut demuxer) = MkvDemuxer::open(Cursor::new(data)) else {
        return;
    };
    for _ in 0..10_000 {
        match demuxer.read_packet() {
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    let _ = demuxer.seek(0);
});
