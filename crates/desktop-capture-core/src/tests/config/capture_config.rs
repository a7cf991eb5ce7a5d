use crate::{AudioProfile, CaptureConfig, CaptureError, Resolution};

use std::time::Duration;

/// WHAT: Default config is valid and records a single unsplit segment
/// WHY: First-run users must be able to record without editing anything
#[test]
fn given_default_config_when_validating_then_ok_and_unsplit() {
    // Given: A default config
    let config = CaptureConfig::new("recordings");

    // When: Validating
    let result = config.validate();

    // Then: Valid, 1080p30 MKV, no splitting, 192 kbps
    assert!(result.is_ok());
    assert_eq!(config.resolution, Resolution::FULL_HD);
    assert_eq!(config.frame_rate, 30);
    assert!(!config.splits_enabled());
    assert_eq!(config.effective_audio_bitrate_kbps(), 192);
    assert_eq!(config.file_prefix, "Desktop_Video");
}

/// WHAT: Odd and zero dimensions are rejected
/// WHY: yuv420p output needs even width and height
#[test]
fn given_odd_or_zero_resolution_when_validating_then_invalid_config() {
    // Given: Configs with unusable resolutions
    for resolution in [Resolution::new(0, 720), Resolution::new(1281, 720), Resolution::new(854, 481)] {
        let mut config = CaptureConfig::new("recordings");
        config.resolution = resolution;

        // When: Validating
        let result = config.validate();

        // Then: InvalidConfig
        assert!(
            matches!(result, Err(CaptureError::InvalidConfig { .. })),
            "{resolution} accepted"
        );
    }
}

/// WHAT: Out-of-range numeric settings are rejected
/// WHY: A zero frame rate or queue would hang the pipeline
#[test]
fn given_out_of_range_settings_when_validating_then_invalid_config() {
    // Given: One broken field per config
    let base = CaptureConfig::new("recordings");
    let broken: Vec<CaptureConfig> = vec![
        CaptureConfig { frame_rate: 0, ..base.clone() },
        CaptureConfig { frame_rate: 241, ..base.clone() },
        CaptureConfig { audio_bitrate_kbps: 0, ..base.clone() },
        CaptureConfig { segment_duration: Some(Duration::ZERO), ..base.clone() },
        CaptureConfig { audio_chunk_frames: 0, ..base.clone() },
        CaptureConfig { mux_queue_capacity: 0, ..base.clone() },
        CaptureConfig { file_prefix: "  ".to_string(), ..base.clone() },
    ];

    // When/Then: Every one fails validation
    for config in broken {
        assert!(matches!(config.validate(), Err(CaptureError::InvalidConfig { .. })));
    }
}

/// WHAT: Audio bitrate is capped by the audio profile
/// WHY: The encoder receives the capped value, not the raw selection
#[test]
fn given_capped_profile_when_reading_effective_bitrate_then_cap_applied() {
    // Given: 256 kbps selected under High Compression
    let mut config = CaptureConfig::new("recordings");
    config.audio_bitrate_kbps = 256;
    config.audio_profile = AudioProfile::HighCompression;

    // When: Reading the effective bitrate
    let kbps = config.effective_audio_bitrate_kbps();

    // Then: 96 kbps
    assert_eq!(kbps, 96);
}

/// WHAT: Segment duration round-trips through TOML as seconds
/// WHY: The persisted config stores a plain number, not a struct
#[test]
fn given_split_config_when_round_tripping_toml_then_duration_preserved() {
    // Given: A config splitting every 10 minutes
    let mut config = CaptureConfig::new("recordings");
    config.segment_duration = Some(Duration::from_secs(600));

    // When: Serializing and parsing back
    let text = toml::to_string(&config).unwrap();
    let back: CaptureConfig = toml::from_str(&text).unwrap();

    // Then: Stored as seconds and equal after parsing
    assert!(text.contains("segment_duration_secs = 600"));
    assert_eq!(back, config);
}

/// WHAT: Minimal TOML fills optional fields with defaults
/// WHY: Older config files lack the newer fields
#[test]
fn given_minimal_toml_when_parsing_then_defaults_filled() {
    // Given: Only the required fields
    let text = r#"
        frame_rate = 60
        output_dir = "videos"
        audio_bitrate_kbps = 128

        [resolution]
        width = 1280
        height = 720
    "#;

    // When: Parsing
    let config: CaptureConfig = toml::from_str(text).unwrap();

    // Then: Unsplit, default prefix, chunk size and queue
    assert_eq!(config.resolution, Resolution::HD);
    assert_eq!(config.segment_duration, None);
    assert_eq!(config.file_prefix, "Desktop_Video");
    assert_eq!(config.audio_chunk_frames, 4096);
    assert_eq!(config.mux_queue_capacity, 32);
    assert!(config.validate().is_ok());
}

/// WHAT: Negative segment duration in TOML is a parse error
/// WHY: Duration cannot represent it; failing early beats a panic
#[test]
fn given_negative_split_when_parsing_then_error() {
    // Given: A negative split duration
    let text = r#"
        frame_rate = 30
        output_dir = "videos"
        audio_bitrate_kbps = 128
        segment_duration_secs = -5.0

        [resolution]
        width = 1280
        height = 720
    "#;

    // When: Parsing
    let result: Result<CaptureConfig, _> = toml::from_str(text);

    // Then: Rejected
    assert!(result.is_err());
}
