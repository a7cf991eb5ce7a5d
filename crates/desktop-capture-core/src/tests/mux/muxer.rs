use crate::{
    AudioIntermediate, AudioRole, CaptureConfig, MuxOutcome, MuxSettings, Muxer, Resolution,
    SegmentWriter, VideoIntermediate, fallback_path,
    tests::support::{EncoderScript, FakeEncoder, list_files, solid_frame},
};

use std::{fs, path::Path, sync::Arc};

fn write_video(dir: &Path, frames: usize) -> VideoIntermediate {
    let mut writer = SegmentWriter::begin(dir.join("d264_video_1_s001.mjpeg"), Resolution::new(16, 16), 30).unwrap();
    for i in 0..frames {
        writer.write(solid_frame(Resolution::new(16, 16), i as u8)).unwrap();
    }
    writer.finalize().unwrap()
}

fn write_wav(dir: &Path, role: AudioRole) -> AudioIntermediate {
    let path = dir.join(format!("d264_{}_1_s001.wav", role.file_tag()));
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..800 {
        writer.write_sample(i as i16).unwrap();
    }
    writer.finalize().unwrap();
    let bytes = fs::metadata(&path).unwrap().len();
    AudioIntermediate { role, path, bytes }
}

fn settings() -> MuxSettings {
    MuxSettings::from_config(&CaptureConfig::new("unused"))
}

/// WHAT: Successful encode reports the output and removes every intermediate
/// WHY: Long sessions must not leave gigabytes of temp files behind
#[test]
fn given_working_encoder_when_muxing_then_output_kept_and_intermediates_removed() {
    // Given: Video and two audio intermediates, a succeeding encoder
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let video = write_video(tmp.path(), 3);
    let audio = vec![write_wav(tmp.path(), AudioRole::Loopback), write_wav(tmp.path(), AudioRole::Microphone)];
    let encoder = Arc::new(FakeEncoder::new(EncoderScript::Succeed));
    let muxer = Muxer::new(encoder.clone());
    let output = out.path().join("Desktop_Video_2026_01_01.mkv");

    // When: Muxing
    let outcome = muxer.mux(&video, &audio, &output, &settings());

    // Then: Encoded, output present, temp dir empty, both tracks passed in
    assert!(matches!(outcome, MuxOutcome::Encoded { ref output, bytes } if output.exists() && bytes > 0));
    assert!(list_files(tmp.path()).is_empty());
    let requests = encoder.recorded();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].args.iter().any(|a| a.to_string_lossy().contains("amix")));
}

/// WHAT: Forced encoder failure preserves the raw video and nothing else
/// WHY: A broken encoder must never lose the recording
#[test]
fn given_failing_encoder_when_muxing_then_video_only_fallback_and_no_intermediates() {
    // Given: Video plus one audio track, a failing encoder
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let video = write_video(tmp.path(), 4);
    let original = fs::read(&video.path).unwrap();
    let audio = vec![write_wav(tmp.path(), AudioRole::Microphone)];
    let muxer = Muxer::new(Arc::new(FakeEncoder::new(EncoderScript::Fail)));
    let output = out.path().join("Desktop_Video_2026_01_01_S002.mkv");

    // When: Muxing
    let outcome = muxer.mux(&video, &audio, &output, &settings());

    // Then: Fallback file beside the target, byte-identical, temp dir empty
    let expected = out.path().join("Desktop_Video_2026_01_01_S002_video_only.mjpeg");
    match outcome {
        MuxOutcome::Fallback { preserved, error } => {
            assert_eq!(preserved.as_deref(), Some(expected.as_path()));
            assert!(error.to_string().contains("Unknown encoder"));
        }
        other => panic!("expected fallback, got {other:?}"),
    }
    assert_eq!(fs::read(&expected).unwrap(), original);
    assert!(!output.exists());
    assert!(list_files(tmp.path()).is_empty());
    assert_eq!(list_files(out.path()), vec!["Desktop_Video_2026_01_01_S002_video_only.mjpeg".to_string()]);
}

/// WHAT: An existing fallback file is left intact and the new one gets a counter
/// WHY: Raw video from an earlier failed encode must survive a later failure on the same name
#[test]
fn given_existing_fallback_when_encode_fails_then_earlier_file_untouched() {
    // Given: A fallback from a previous run already beside the target
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let output = out.path().join("Desktop_Video_2026_01_01.mkv");
    fs::write(fallback_path(&output), b"earlier recording").unwrap();
    let video = write_video(tmp.path(), 3);
    let original = fs::read(&video.path).unwrap();
    let muxer = Muxer::new(Arc::new(FakeEncoder::new(EncoderScript::Fail)));

    // When: Muxing fails again for the same target
    let outcome = muxer.mux(&video, &[], &output, &settings());

    // Then: Earlier file unchanged, new raw video under the _001 name
    let expected = out.path().join("Desktop_Video_2026_01_01_video_only_001.mjpeg");
    assert!(matches!(outcome, MuxOutcome::Fallback { preserved: Some(ref p), .. } if *p == expected));
    assert_eq!(fs::read(fallback_path(&output)).unwrap(), b"earlier recording");
    assert_eq!(fs::read(&expected).unwrap(), original);
    assert!(list_files(tmp.path()).is_empty());
}

/// WHAT: A clean exit without an output file counts as failure
/// WHY: Exit status alone has been seen to lie
#[test]
fn given_encoder_producing_nothing_when_muxing_then_fallback() {
    // Given: An encoder that exits cleanly but writes nothing
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let video = write_video(tmp.path(), 2);
    let muxer = Muxer::new(Arc::new(FakeEncoder::new(EncoderScript::SilentlyProduceNothing)));
    let output = out.path().join("seg.mkv");

    // When: Muxing
    let outcome = muxer.mux(&video, &[], &output, &settings());

    // Then: Fallback with preserved video
    assert!(matches!(outcome, MuxOutcome::Fallback { preserved: Some(_), .. }));
    assert!(fallback_path(&output).exists());
}

/// WHAT: Zero audio produces a video-only request
/// WHY: No empty audio intermediate may be fed to the encoder
#[test]
fn given_no_audio_when_muxing_then_request_has_no_audio_stream() {
    // Given: Video only
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let video = write_video(tmp.path(), 2);
    let encoder = Arc::new(FakeEncoder::new(EncoderScript::Succeed));
    let muxer = Muxer::new(encoder.clone());

    // When: Muxing
    let outcome = muxer.mux(&video, &[], &out.path().join("seg.mkv"), &settings());

    // Then: Single input, no audio codec, no wav referenced
    assert!(matches!(outcome, MuxOutcome::Encoded { .. }));
    let args = &encoder.recorded()[0].args;
    assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
    assert!(!args.iter().any(|a| a == "-c:a" || a.to_string_lossy().ends_with(".wav")));
}

/// WHAT: A segment with no frames is skipped and cleaned up
/// WHY: Stopping right after a split must not produce an encoder error
#[test]
fn given_empty_segment_when_muxing_then_skipped_without_encoding() {
    // Given: A zero-frame video and an audio track
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let video = write_video(tmp.path(), 0);
    let audio = vec![write_wav(tmp.path(), AudioRole::Loopback)];
    let encoder = Arc::new(FakeEncoder::new(EncoderScript::Succeed));
    let muxer = Muxer::new(encoder.clone());

    // When: Muxing
    let outcome = muxer.mux(&video, &audio, &out.path().join("seg.mkv"), &settings());

    // Then: Empty, encoder untouched, nothing left anywhere
    assert!(matches!(outcome, MuxOutcome::Empty));
    assert!(encoder.recorded().is_empty());
    assert!(list_files(tmp.path()).is_empty());
    assert!(list_files(out.path()).is_empty());
}
