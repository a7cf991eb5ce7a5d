use crate::{AudioRole, CaptureConfig, ContainerFormat, OutputNamer};

use std::{fs, time::Duration};

use chrono::{Local, NaiveDate, TimeZone};

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
}

/// WHAT: Unsplit sessions use a plain dated name
/// WHY: Single-segment recordings should not carry a segment suffix
#[test]
fn given_unsplit_session_when_reserving_then_dated_name_without_segment() {
    // Given: An unsplit MKV config
    let dir = tempfile::tempdir().unwrap();
    let config = CaptureConfig::new(dir.path());
    let mut namer = OutputNamer::new(&config, Local::now());

    // When: Reserving the first output
    let path = namer.reserve_output_on(1, date());

    // Then: <prefix>_<date>.mkv
    assert_eq!(path, dir.path().join("Desktop_Video_2026_03_09.mkv"));
}

/// WHAT: Split sessions append a three-digit segment number
/// WHY: Segments of one day must sort in capture order
#[test]
fn given_split_session_when_reserving_then_segment_suffix() {
    // Given: A split MP4 config
    let dir = tempfile::tempdir().unwrap();
    let mut config = CaptureConfig::new(dir.path());
    config.segment_duration = Some(Duration::from_secs(3600));
    config.container = ContainerFormat::Mp4;
    let mut namer = OutputNamer::new(&config, Local::now());

    // When: Reserving segments 1 and 12
    let first = namer.reserve_output_on(1, date());
    let twelfth = namer.reserve_output_on(12, date());

    // Then: _S001 and _S012 with the mp4 extension
    assert_eq!(first, dir.path().join("Desktop_Video_2026_03_09_S001.mp4"));
    assert_eq!(twelfth, dir.path().join("Desktop_Video_2026_03_09_S012.mp4"));
}

/// WHAT: Collisions with files on disk and reserved names get a counter
/// WHY: A queued mux must never be overwritten by a later segment
#[test]
fn given_existing_and_reserved_names_when_reserving_then_counter_appended() {
    // Given: The plain name already exists on disk
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Desktop_Video_2026_03_09.mkv"), b"old").unwrap();
    let config = CaptureConfig::new(dir.path());
    let mut namer = OutputNamer::new(&config, Local::now());

    // When: Reserving twice without writing anything
    let first = namer.reserve_output_on(1, date());
    let second = namer.reserve_output_on(1, date());

    // Then: _001 for the disk collision, _002 for the reserved one
    assert_eq!(first, dir.path().join("Desktop_Video_2026_03_09_001.mkv"));
    assert_eq!(second, dir.path().join("Desktop_Video_2026_03_09_002.mkv"));
}

/// WHAT: A raw-video fallback left by an earlier session also forces a counter
/// WHY: Reusing that final name would let a second failed encode replace the first recording
#[test]
fn given_existing_fallback_file_when_reserving_then_counter_appended() {
    // Given: Only the fallback of the plain name exists on disk
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Desktop_Video_2026_03_09_video_only.mjpeg"), b"raw").unwrap();
    let config = CaptureConfig::new(dir.path());
    let mut namer = OutputNamer::new(&config, Local::now());

    // When: Reserving
    let path = namer.reserve_output_on(1, date());

    // Then: The counter is appended even though the .mkv itself is absent
    assert_eq!(path, dir.path().join("Desktop_Video_2026_03_09_001.mkv"));
}

/// WHAT: Intermediates carry the session stamp, role tag and segment number
/// WHY: Concurrent or crashed sessions must not clash in the temp directory
#[test]
fn given_session_when_naming_intermediates_then_stamped_temp_paths() {
    // Given: A session started at a fixed instant
    let dir = tempfile::tempdir().unwrap();
    let mut config = CaptureConfig::new(dir.path().join("out"));
    config.temp_dir = Some(dir.path().join("tmp"));
    let start = Local.timestamp_millis_opt(1_700_000_000_123).unwrap();
    let namer = OutputNamer::new(&config, start);

    // When: Naming segment 7's intermediates
    let video = namer.video_intermediate(7);
    let loopback = namer.audio_intermediate(AudioRole::Loopback, 7);
    let mic = namer.audio_intermediate(AudioRole::Microphone, 7);

    // Then: d264_<kind>_<ms>_s007 in the temp dir
    let tmp = dir.path().join("tmp");
    assert_eq!(video, tmp.join("d264_video_1700000000123_s007.mjpeg"));
    assert_eq!(loopback, tmp.join("d264_loopback_1700000000123_s007.wav"));
    assert_eq!(mic, tmp.join("d264_mic_1700000000123_s007.wav"));
}
