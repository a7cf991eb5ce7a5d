use crate::config::{VideoEncodeParams, VideoProfile};

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

/// Builds the encoder argument list for one segment.
#[derive(Debug, Clone)]
pub struct MuxCommandBuilder {
    video_input: PathBuf,
    frame_rate: u32,
    audio_inputs: Vec<PathBuf>,
    output_path: PathBuf,
    video_params: VideoEncodeParams,
    audio_bitrate_kbps: u32,
    filter_threads: usize,
}

impl MuxCommandBuilder {
    /// Start from the video intermediate and the final output path.
    pub fn new(video_input: impl Into<PathBuf>, frame_rate: u32, output_path: impl Into<PathBuf>) -> Self {
        Self {
            video_input: video_input.into(),
            frame_rate,
            audio_inputs: Vec::new(),
            output_path: output_path.into(),
            video_params: VideoProfile::default().params(),
            audio_bitrate_kbps: 192,
            filter_threads: 1,
        }
    }

    /// Add an audio input. The first two are used; more are ignored.
    pub fn with_audio_input(mut self, path: impl Into<PathBuf>) -> Self {
        self.audio_inputs.push(path.into());
        self
    }

    /// Set every audio input at once.
    pub fn with_audio_inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.audio_inputs = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Set the resolved video profile parameters.
    pub fn with_video_params(mut self, params: VideoEncodeParams) -> Self {
        self.video_params = params;
        self
    }

    /// Set the AAC bitrate.
    pub fn with_audio_bitrate(mut self, kbps: u32) -> Self {
        self.audio_bitrate_kbps = kbps;
        self
    }

    /// Set the filter-graph thread count.
    pub fn with_filter_threads(mut self, threads: usize) -> Self {
        self.filter_threads = threads.max(1);
        self
    }

    /// Audio inputs that will be passed to the encoder.
    pub fn audio_inputs(&self) -> &[PathBuf] {
        &self.audio_inputs[..self.audio_inputs.len().min(2)]
    }

    /// Output path.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Produce the argument list, without the program name.
    ///
    /// Paths are passed through as `OsString`s, untouched.
    pub fn build(&self) -> Vec<OsString> {
        let audio = self.audio_inputs();
        let threads = self.filter_threads.to_string();
        let frame_rate = self.frame_rate.to_string();

        let mut args = Vec::new();
        push_all(&mut args, ["-y", "-hide_banner", "-threads", "0"]);
        push_all(&mut args, ["-f", "mjpeg", "-framerate", frame_rate.as_str(), "-i"]);
        args.push(self.video_input.clone().into_os_string());

        for input in audio {
            args.push(OsString::from("-i"));
            args.push(input.clone().into_os_string());
        }

        match audio.len() {
            0 => push_all(
                &mut args,
                ["-vf", "mpdecimate", "-filter_threads", threads.as_str(), "-fps_mode", "vfr", "-map", "0:v"],
            ),
            1 => push_all(
                &mut args,
                [
                    "-vf", "mpdecimate", "-filter_threads", threads.as_str(), "-fps_mode", "vfr", "-map", "0:v",
                    "-map", "1:a",
                ],
            ),
            _ => push_all(
                &mut args,
                [
                    "-filter_complex",
                    "[0:v]mpdecimate[vout];\
                     [1:a][2:a]amix=inputs=2:duration=first:dropout_transition=0:normalize=0[aout]",
                    "-filter_complex_threads",
                    threads.as_str(),
                    "-map",
                    "[vout]",
                    "-map",
                    "[aout]",
                    "-fps_mode",
                    "vfr",
                ],
            ),
        }

        let video = &self.video_params;
        let crf = video.crf.to_string();
        push_all(&mut args, ["-c:v", "libx264", "-preset", video.preset, "-crf", crf.as_str()]);
        if video.low_latency {
            push_all(&mut args, ["-tune", "zerolatency"]);
        }
        push_all(&mut args, ["-pix_fmt", video.pixel_format]);

        if !audio.is_empty() {
            let bitrate = format!("{}k", self.audio_bitrate_kbps);
            push_all(&mut args, ["-c:a", "aac", "-b:a", bitrate.as_str()]);
        }

        args.push(self.output_path.clone().into_os_string());
        args
    }
}

fn push_all<const N: usize>(args: &mut Vec<OsString>, items: [&str; N]) {
    args.extend(items.into_iter().map(OsString::from));
}
