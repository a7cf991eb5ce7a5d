use serde::{Deserialize, Serialize};

/// Encoder parameters a video profile resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoEncodeParams {
    /// libx264 speed preset.
    pub preset: &'static str,
    /// Constant rate factor (lower is higher quality).
    pub crf: u8,
    /// Whether to apply the `zerolatency` tune.
    pub low_latency: bool,
    /// Output pixel format.
    pub pixel_format: &'static str,
}

/// Named video compression profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoProfile {
    /// Fast encode, moderate size. Keeps CPU free for live capture.
    #[default]
    #[serde(rename = "Optimal Performance")]
    OptimalPerformance,
    /// Visually lossless desktop footage.
    #[serde(rename = "Good Quality")]
    GoodQuality,
    /// Middle ground between speed and size.
    #[serde(rename = "Balanced")]
    Balanced,
    /// Smallest files, slowest encode.
    #[serde(rename = "High Compression")]
    HighCompression,
}

impl VideoProfile {
    /// Every selectable profile, in menu order.
    pub const ALL: [VideoProfile; 4] = [
        VideoProfile::OptimalPerformance,
        VideoProfile::GoodQuality,
        VideoProfile::Balanced,
        VideoProfile::HighCompression,
    ];

    /// Display name, identical to the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            VideoProfile::OptimalPerformance => "Optimal Performance",
            VideoProfile::GoodQuality => "Good Quality",
            VideoProfile::Balanced => "Balanced",
            VideoProfile::HighCompression => "High Compression",
        }
    }

    /// Resolve the profile to concrete encoder parameters.
    pub fn params(&self) -> VideoEncodeParams {
        match self {
            VideoProfile::OptimalPerformance => VideoEncodeParams {
                preset: "veryfast",
                crf: 23,
                low_latency: true,
                pixel_format: "yuv420p",
            },
            VideoProfile::GoodQuality => VideoEncodeParams {
                preset: "medium",
                crf: 18,
                low_latency: false,
                pixel_format: "yuv420p",
            },
            VideoProfile::Balanced => VideoEncodeParams {
                preset: "fast",
                crf: 23,
                low_latency: false,
                pixel_format: "yuv420p",
            },
            VideoProfile::HighCompression => VideoEncodeParams {
                preset: "slow",
                crf: 28,
                low_latency: false,
                pixel_format: "yuv420p",
            },
        }
    }
}

/// Named audio compression profile: an optional cap on the selected bitrate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioProfile {
    /// Use the selected bitrate as-is.
    #[default]
    #[serde(rename = "Optimal Performance")]
    OptimalPerformance,
    /// Cap at 160 kbps.
    #[serde(rename = "Balanced")]
    Balanced,
    /// Cap at 96 kbps.
    #[serde(rename = "High Compression")]
    HighCompression,
}

impl AudioProfile {
    /// Every selectable profile, in menu order.
    pub const ALL: [AudioProfile; 3] = [
        AudioProfile::OptimalPerformance,
        AudioProfile::Balanced,
        AudioProfile::HighCompression,
    ];

    /// Display name, identical to the serialized form.
    pub fn label(&self) -> &'static str {
        match self {
            AudioProfile::OptimalPerformance => "Optimal Performance",
            AudioProfile::Balanced => "Balanced",
            AudioProfile::HighCompression => "High Compression",
        }
    }

    /// Bitrate cap in kbps, if the profile has one.
    pub fn bitrate_cap_kbps(&self) -> Option<u32> {
        match self {
            AudioProfile::OptimalPerformance => None,
            AudioProfile::Balanced => Some(160),
            AudioProfile::HighCompression => Some(96),
        }
    }

    /// The bitrate actually handed to the encoder: `min(selected, cap)`.
    pub fn effective_bitrate_kbps(&self, selected_kbps: u32) -> u32 {
        match self.bitrate_cap_kbps() {
            Some(cap) => selected_kbps.min(cap),
            None => selected_kbps,
        }
    }
}

/// Final output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ContainerFormat {
    /// Matroska.
    #[default]
    #[serde(rename = "MKV", alias = "mkv")]
    Mkv,
    /// MPEG-4 Part 14.
    #[serde(rename = "MP4", alias = "mp4")]
    Mp4,
}

impl ContainerFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Mkv => "mkv",
            ContainerFormat::Mp4 => "mp4",
        }
    }
}
