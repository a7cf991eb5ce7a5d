use crate::{
    CaptureError, CoreResult,
    audio::{AudioDevice, AudioInput, AudioReadError, AudioRole, StreamSpec},
};

use std::{
    fs::{self, File},
    io::BufWriter,
    panic::Location,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        mpsc::{self, Receiver, Sender, TryRecvError},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use error_location::ErrorLocation;
use hound::{WavSpec, WavWriter};
use tracing::{debug, error, info, instrument, warn};

/// Upper bound on one blocking read; also bounds how long stop and rotate wait.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_millis(250);

/// Most sample bytes one WAV file may hold. RIFF sizes are 32-bit; the
/// remainder is left for the header.
pub(crate) const WAV_DATA_LIMIT: u64 = u32::MAX as u64 - 4096;

/// A finished per-segment WAV file.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioIntermediate {
    /// Which device recorded it.
    pub role: AudioRole,
    /// 16-bit PCM WAV on disk.
    pub path: PathBuf,
    /// File size including the header.
    pub bytes: u64,
}

/// The outcome of one segment's audio, available once the tap has closed the file.
#[derive(Debug)]
pub struct PendingAudio {
    role: AudioRole,
    result: Receiver<Option<AudioIntermediate>>,
}

impl PendingAudio {
    /// Block until the tap closes the segment's file.
    ///
    /// `None` when the device produced nothing for this segment.
    pub fn wait(self) -> Option<AudioIntermediate> {
        self.result.recv().ok().flatten()
    }

    /// Device role this result belongs to.
    pub fn role(&self) -> AudioRole {
        self.role
    }

    pub(crate) fn resolved(role: AudioRole, value: Option<AudioIntermediate>) -> Self {
        let (tx, result) = mpsc::channel();
        // Receiver is alive, send cannot fail
        let _ = tx.send(value);
        Self { role, result }
    }
}

/// Counters shared between a tap thread and status readers.
#[derive(Debug, Default)]
pub struct TapStats {
    bytes_written: AtomicU64,
    peak_buffered_samples: AtomicUsize,
    dropped_chunks: AtomicU64,
    failed: AtomicBool,
}

impl TapStats {
    /// Sample bytes written across all segments.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Largest number of samples held in memory at once.
    pub fn peak_buffered_samples(&self) -> usize {
        self.peak_buffered_samples.load(Ordering::Relaxed)
    }

    /// Chunks lost to input overflow.
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }

    /// Whether the input stream has failed for the rest of the session.
    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

enum TapCommand {
    Rotate {
        next: PathBuf,
        reply: Sender<Option<AudioIntermediate>>,
    },
    Stop {
        reply: Sender<Option<AudioIntermediate>>,
    },
}

/// Continuous capture of one audio device into per-segment WAV files.
///
/// Owns a dedicated thread that does blocking chunk reads and writes every
/// chunk straight to disk, so memory stays at one chunk regardless of
/// session length.
pub struct AudioTap {
    role: AudioRole,
    device_name: String,
    commands: Sender<TapCommand>,
    worker: Option<JoinHandle<()>>,
    stats: Arc<TapStats>,
}

impl AudioTap {
    /// Open `device` on a new thread and start writing into `first_sink`.
    ///
    /// Returns once the stream is running, or with the open error.
    #[track_caller]
    #[instrument(skip(device, first_sink), fields(role = %role))]
    pub fn start(
        device: Box<dyn AudioDevice>,
        role: AudioRole,
        first_sink: PathBuf,
        chunk_frames: usize,
    ) -> CoreResult<Self> {
        let device_name = device.name();
        let stats = Arc::new(TapStats::default());
        let (commands, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<CoreResult<StreamSpec>>(1);

        let thread_stats = Arc::clone(&stats);
        let worker = thread::Builder::new()
            .name(format!("audio-tap-{}", role.file_tag()))
            .spawn(move || {
                let input = match device.open(chunk_frames) {
                    Ok(input) => input,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let spec = input.spec();
                let _ = ready_tx.send(Ok(spec));
                let sink = WavSink::new(first_sink, role, spec);
                run_tap(input, sink, command_rx, &thread_stats);
            })?;

        let spec = match ready_rx.recv() {
            Ok(result) => result?,
            Err(_) => {
                let _ = worker.join();
                return Err(CaptureError::DeviceError {
                    reason: format!("{} tap thread exited during open", role),
                    location: ErrorLocation::from(Location::caller()),
                });
            }
        };

        info!(
            device = %device_name,
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            "Audio tap started"
        );

        Ok(Self {
            role,
            device_name,
            commands,
            worker: Some(worker),
            stats,
        })
    }

    /// Close the current segment's file and continue into `next`.
    ///
    /// Never blocks on the device; the returned handle resolves once the
    /// tap has finished the old file.
    pub fn rotate(&self, next: PathBuf) -> PendingAudio {
        let (reply, result) = mpsc::channel();
        if self.commands.send(TapCommand::Rotate { next, reply }).is_err() {
            return PendingAudio::resolved(self.role, None);
        }
        PendingAudio { role: self.role, result }
    }

    /// Stop reading, close the current file and join the tap thread.
    #[instrument(skip(self), fields(role = %self.role))]
    pub fn stop(mut self) -> PendingAudio {
        let (reply, result) = mpsc::channel();
        let pending = match self.commands.send(TapCommand::Stop { reply }) {
            Ok(()) => PendingAudio { role: self.role, result },
            Err(_) => PendingAudio::resolved(self.role, None),
        };
        self.join();
        info!(
            bytes_written = self.stats.bytes_written(),
            dropped_chunks = self.stats.dropped_chunks(),
            "Audio tap stopped"
        );
        pending
    }

    fn join(&mut self) {
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!(role = %self.role, "Audio tap thread panicked");
        }
    }

    /// Device role.
    pub fn role(&self) -> AudioRole {
        self.role
    }

    /// Name of the underlying device.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Live counters.
    pub fn stats(&self) -> Arc<TapStats> {
        Arc::clone(&self.stats)
    }
}

impl Drop for AudioTap {
    fn drop(&mut self) {
        if self.worker.is_some() {
            let (reply, _) = mpsc::channel();
            let _ = self.commands.send(TapCommand::Stop { reply });
            self.join();
        }
    }
}

fn run_tap(
    input: Box<dyn AudioInput>,
    mut sink: WavSink,
    commands: Receiver<TapCommand>,
    stats: &TapStats,
) {
    let mut input = Some(input);
    let mut chunk = Vec::new();

    loop {
        // A failed input has nothing to read; just wait for the next command.
        let command = if input.is_some() {
            match commands.try_recv() {
                Ok(command) => Some(command),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        } else {
            match commands.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            }
        };

        match command {
            Some(TapCommand::Rotate { next, reply }) => {
                let role = sink.role;
                let spec = sink.stream_spec;
                let finished = std::mem::replace(&mut sink, WavSink::new(next, role, spec)).finish();
                let _ = reply.send(finished);
                continue;
            }
            Some(TapCommand::Stop { reply }) => {
                let _ = reply.send(sink.finish());
                return;
            }
            None => {}
        }

        let Some(active) = input.as_mut() else {
            continue;
        };

        match active.read_chunk(&mut chunk, READ_TIMEOUT) {
            Ok(()) => {
                stats
                    .peak_buffered_samples
                    .fetch_max(chunk.len(), Ordering::Relaxed);
                match sink.write(&chunk) {
                    Ok(written) => {
                        stats.bytes_written.fetch_add(written, Ordering::Relaxed);
                    }
                    Err(e) => warn!(role = %sink.role, error = %e, "Dropping audio for this segment"),
                }
            }
            Err(AudioReadError::Timeout) => {}
            Err(AudioReadError::Overflow { dropped }) => {
                warn!(role = %sink.role, dropped, "Audio input overflow, chunk skipped");
                stats.dropped_chunks.fetch_add(dropped, Ordering::Relaxed);
            }
            Err(AudioReadError::Disconnected(reason)) => {
                error!(role = %sink.role, %reason, "Audio input failed, keeping partial recording");
                stats.failed.store(true, Ordering::Relaxed);
                input = None;
            }
        }
    }

    let _ = sink.finish();
}

/// Lazily created WAV file; no bytes means no file.
///
/// Stops accepting samples once the data chunk reaches its limit; what was
/// written stays a valid file and the rest of the segment is silent.
pub(crate) struct WavSink {
    path: PathBuf,
    role: AudioRole,
    stream_spec: StreamSpec,
    writer: Option<WavWriter<BufWriter<File>>>,
    samples: u64,
    data_limit: u64,
    full: bool,
    broken: bool,
}

impl WavSink {
    pub(crate) fn new(path: PathBuf, role: AudioRole, stream_spec: StreamSpec) -> Self {
        Self {
            path,
            role,
            stream_spec,
            writer: None,
            samples: 0,
            data_limit: WAV_DATA_LIMIT,
            full: false,
            broken: false,
        }
    }

    pub(crate) fn with_data_limit(mut self, bytes: u64) -> Self {
        self.data_limit = bytes.min(WAV_DATA_LIMIT);
        self
    }

    /// Append samples and refresh the header. Returns sample bytes written.
    #[track_caller]
    pub(crate) fn write(&mut self, samples: &[i16]) -> CoreResult<u64> {
        if self.broken || self.full || samples.is_empty() {
            return Ok(0);
        }

        // Whole frames only, so the file never ends mid-frame.
        let channels = u64::from(self.stream_spec.channels.max(1));
        let room = self.data_limit.saturating_sub(self.samples * 2) / 2;
        let room = (room - room % channels) as usize;
        let accepted = if samples.len() > room {
            warn!(
                role = %self.role,
                path = %self.path.display(),
                limit = self.data_limit,
                "WAV size limit reached, dropping further audio for this segment"
            );
            self.full = true;
            &samples[..room]
        } else {
            samples
        };
        if accepted.is_empty() {
            return Ok(0);
        }

        let result = self.write_inner(accepted);
        if result.is_err() {
            self.broken = true;
        }
        result
    }

    #[track_caller]
    fn write_inner(&mut self, samples: &[i16]) -> CoreResult<u64> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => {
                let spec = WavSpec {
                    channels: self.stream_spec.channels,
                    sample_rate: self.stream_spec.sample_rate,
                    bits_per_sample: 16,
                    sample_format: hound::SampleFormat::Int,
                };
                let writer = WavWriter::create(&self.path, spec)
                    .map_err(|e| wav_error(&self.path, e))?;
                debug!(path = %self.path.display(), "Audio intermediate created");
                self.writer.insert(writer)
            }
        };

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| wav_error(&self.path, e))?;
        }
        // Keeps the header valid so a crash leaves a playable file.
        writer.flush().map_err(|e| wav_error(&self.path, e))?;

        self.samples += samples.len() as u64;
        Ok(samples.len() as u64 * 2)
    }

    pub(crate) fn finish(mut self) -> Option<AudioIntermediate> {
        let writer = self.writer.take()?;
        if let Err(e) = writer.finalize() {
            warn!(path = %self.path.display(), error = %e, "Failed to finalize WAV header");
        }

        let bytes = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if self.samples == 0 || bytes == 0 {
            let _ = fs::remove_file(&self.path);
            return None;
        }

        Some(AudioIntermediate {
            role: self.role,
            path: self.path,
            bytes,
        })
    }
}

#[track_caller]
fn wav_error(path: &Path, e: hound::Error) -> CaptureError {
    let source = match e {
        hound::Error::IoError(io) => io,
        other => std::io::Error::other(other.to_string()),
    };
    CaptureError::intermediate(path, source)
}
