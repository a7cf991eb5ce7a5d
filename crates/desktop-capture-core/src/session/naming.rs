use crate::{audio::AudioRole, config::CaptureConfig, mux::fallback_path};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, NaiveDate};

/// Final and intermediate file names for one session.
///
/// Final names are reserved as they are handed out, so a name waiting in the
/// mux queue is never given to a later segment.
#[derive(Debug, Clone)]
pub struct OutputNamer {
    output_dir: PathBuf,
    temp_dir: PathBuf,
    prefix: String,
    extension: &'static str,
    splits: bool,
    stamp: i64,
    reserved: HashSet<PathBuf>,
}

impl OutputNamer {
    /// Namer for a session that started at `session_start`.
    pub fn new(config: &CaptureConfig, session_start: DateTime<Local>) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            temp_dir: config.intermediate_dir(),
            prefix: config.file_prefix.clone(),
            extension: config.container.extension(),
            splits: config.splits_enabled(),
            stamp: session_start.timestamp_millis(),
            reserved: HashSet::new(),
        }
    }

    /// Reserve a final path for segment `sequence`, dated today.
    pub fn reserve_output(&mut self, sequence: u32) -> PathBuf {
        self.reserve_output_on(sequence, Local::now().date_naive())
    }

    /// Reserve a final path for segment `sequence`, dated `date`.
    ///
    /// `<prefix>_<YYYY_MM_DD>[_S<NNN>][_<NNN>].<ext>`; the trailing counter
    /// appears only when the plain name, or its `_video_only.mjpeg` fallback,
    /// exists on disk or is reserved.
    pub fn reserve_output_on(&mut self, sequence: u32, date: NaiveDate) -> PathBuf {
        let mut base = format!("{}_{}", self.prefix, date.format("%Y_%m_%d"));
        if self.splits {
            base.push_str(&format!("_S{:03}", sequence));
        }

        let mut candidate = self.output_dir.join(format!("{}.{}", base, self.extension));
        let mut counter = 1u32;
        while self.is_taken(&candidate) {
            candidate = self
                .output_dir
                .join(format!("{}_{:03}.{}", base, counter, self.extension));
            counter += 1;
        }

        self.reserved.insert(candidate.clone());
        candidate
    }

    /// A name is also taken when an earlier session left its raw-video fallback behind.
    fn is_taken(&self, path: &Path) -> bool {
        self.reserved.contains(path) || path.exists() || fallback_path(path).exists()
    }

    /// `d264_video_<stamp>_s<NNN>.mjpeg` in the temp directory.
    pub fn video_intermediate(&self, sequence: u32) -> PathBuf {
        self.temp_dir
            .join(format!("d264_video_{}_s{:03}.mjpeg", self.stamp, sequence))
    }

    /// `d264_<loopback|mic>_<stamp>_s<NNN>.wav` in the temp directory.
    pub fn audio_intermediate(&self, role: AudioRole, sequence: u32) -> PathBuf {
        self.temp_dir.join(format!(
            "d264_{}_{}_s{:03}.wav",
            role.file_tag(),
            self.stamp,
            sequence
        ))
    }
}
