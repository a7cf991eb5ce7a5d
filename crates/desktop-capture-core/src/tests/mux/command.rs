use crate::{MuxCommandBuilder, VideoProfile};

use std::ffi::OsString;

fn position(args: &[OsString], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
}

fn value_after<'a>(args: &'a [OsString], flag: &str) -> Option<&'a str> {
    position(args, flag).and_then(|i| args.get(i + 1)).and_then(|a| a.to_str())
}

/// WHAT: Video-only requests carry no audio mapping or codec
/// WHY: Zero-audio sessions omit the track entirely
#[test]
fn given_no_audio_when_building_then_video_only_arguments() {
    // Given: A builder with no audio inputs
    let builder = MuxCommandBuilder::new("seg.mjpeg", 30, "out.mkv");

    // When: Building
    let args = builder.build();

    // Then: One input, mpdecimate with VFR, no audio flags
    assert_eq!(args.iter().filter(|a| *a == "-i").count(), 1);
    assert_eq!(value_after(&args, "-f"), Some("mjpeg"));
    assert_eq!(value_after(&args, "-framerate"), Some("30"));
    assert_eq!(value_after(&args, "-vf"), Some("mpdecimate"));
    assert_eq!(value_after(&args, "-fps_mode"), Some("vfr"));
    assert_eq!(value_after(&args, "-map"), Some("0:v"));
    assert!(position(&args, "-c:a").is_none());
    assert!(position(&args, "-b:a").is_none());
    assert!(!args.iter().any(|a| a.to_string_lossy().contains("amix")));
    assert_eq!(args.last().and_then(|a| a.to_str()), Some("out.mkv"));
}

/// WHAT: One audio source is mapped straight through and encoded as AAC
/// WHY: Mixing a single track would only add filter overhead
#[test]
fn given_one_audio_when_building_then_direct_map_and_aac() {
    // Given: A builder with one audio input at 160 kbps
    let builder = MuxCommandBuilder::new("seg.mjpeg", 60, "out.mp4")
        .with_audio_input("mic.wav")
        .with_audio_bitrate(160);

    // When: Building
    let args = builder.build();

    // Then: Two inputs, 1:a mapped, AAC at 160k
    assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "1:a"));
    assert_eq!(value_after(&args, "-c:a"), Some("aac"));
    assert_eq!(value_after(&args, "-b:a"), Some("160k"));
    assert!(position(&args, "-filter_complex").is_none());
}

/// WHAT: Two audio sources are mixed with equal weight and no normalization
/// WHY: System audio and microphone must both be audible at their own levels
#[test]
fn given_two_audio_when_building_then_amix_filter_graph() {
    // Given: Loopback and microphone inputs, 8 filter threads
    let builder = MuxCommandBuilder::new("seg.mjpeg", 30, "out.mkv")
        .with_audio_inputs(["loop.wav", "mic.wav"])
        .with_filter_threads(8);

    // When: Building
    let args = builder.build();

    // Then: filter_complex with mpdecimate and amix, mapped outputs
    let graph = value_after(&args, "-filter_complex").unwrap();
    assert!(graph.starts_with("[0:v]mpdecimate[vout];"));
    assert!(graph.contains("[1:a][2:a]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]"));
    assert_eq!(value_after(&args, "-filter_complex_threads"), Some("8"));
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[vout]"));
    assert!(args.windows(2).any(|w| w[0] == "-map" && w[1] == "[aout]"));
    assert!(position(&args, "-vf").is_none());
}

/// WHAT: Video profile parameters reach the encoder, tune only when low-latency
/// WHY: Profiles are the user's quality/speed knob
#[test]
fn given_profiles_when_building_then_preset_crf_and_tune_match() {
    // Given: The default and the high-compression profiles
    let fast = MuxCommandBuilder::new("v", 30, "o.mkv")
        .with_video_params(VideoProfile::OptimalPerformance.params())
        .build();
    let small = MuxCommandBuilder::new("v", 30, "o.mkv")
        .with_video_params(VideoProfile::HighCompression.params())
        .build();

    // When/Then: Parameters are passed verbatim
    assert_eq!(value_after(&fast, "-c:v"), Some("libx264"));
    assert_eq!(value_after(&fast, "-preset"), Some("veryfast"));
    assert_eq!(value_after(&fast, "-tune"), Some("zerolatency"));
    assert_eq!(value_after(&fast, "-pix_fmt"), Some("yuv420p"));
    assert_eq!(value_after(&small, "-preset"), Some("slow"));
    assert_eq!(value_after(&small, "-crf"), Some("28"));
    assert!(position(&small, "-tune").is_none());
}

/// WHAT: Encoder-wide threading and overwrite flags lead the argument list
/// WHY: Reserved output names may already exist as failed partial files
#[test]
fn given_any_request_when_building_then_overwrite_and_auto_threads() {
    // Given/When: A default build
    let args = MuxCommandBuilder::new("v", 30, "o.mkv").build();

    // Then: -y and -threads 0 precede the first input
    let first_input = position(&args, "-i").unwrap();
    assert_eq!(args[0], "-y");
    assert!(position(&args, "-threads").unwrap() < first_input);
    assert_eq!(value_after(&args, "-threads"), Some("0"));
}

/// WHAT: Extra audio inputs beyond two are ignored
/// WHY: The mix graph handles at most system audio plus microphone
#[test]
fn given_three_audio_when_building_then_only_two_inputs_used() {
    // Given: Three audio paths
    let builder = MuxCommandBuilder::new("v", 30, "o.mkv").with_audio_inputs(["a.wav", "b.wav", "c.wav"]);

    // When: Building
    let args = builder.build();

    // Then: Video plus two audio inputs
    assert_eq!(builder.audio_inputs().len(), 2);
    assert_eq!(args.iter().filter(|a| *a == "-i").count(), 3);
    assert!(!args.iter().any(|a| a == "c.wav"));
}

/// WHAT: Paths that are not valid UTF-8 reach the argument list byte for byte
/// WHY: Lossy conversion would point the encoder at files that do not exist
#[cfg(unix)]
#[test]
fn given_non_utf8_paths_when_building_then_paths_passed_unchanged() {
    use std::{ffi::OsStr, os::unix::ffi::OsStrExt, path::PathBuf};

    // Given: Video, audio and output paths containing an invalid UTF-8 byte
    let dir = PathBuf::from(OsStr::from_bytes(b"/tmp/caf\xe9"));
    let video = dir.join("seg.mjpeg");
    let audio = dir.join("mic.wav");
    let output = dir.join("out.mkv");
    let builder = MuxCommandBuilder::new(&video, 30, &output).with_audio_input(&audio);

    // When: Building
    let args = builder.build();

    // Then: Each path appears exactly as given
    assert!(args.iter().any(|a| a == video.as_os_str()));
    assert!(args.iter().any(|a| a == audio.as_os_str()));
    assert_eq!(args.last(), Some(&output.into_os_string()));
    assert!(!args.iter().any(|a| a.to_string_lossy().contains('\u{FFFD}')));
}
