use crate::{
    CaptureError, CoreResult,
    audio::{AudioDevice, AudioDeviceProvider, AudioInput, AudioReadError, AudioRole, StreamSpec},
};

use std::{
    panic::Location,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError},
    },
    time::Duration,
};

use cpal::{
    Device, FromSample, SampleFormat, SizedSample, Stream, StreamConfig,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use error_location::ErrorLocation;
use tracing::{error, info, instrument};

/// Chunks the callback may queue ahead of the reader before dropping.
pub(crate) const QUEUED_CHUNKS: usize = 4;

/// Default devices of the platform's default cpal host.
///
/// Loopback opens an input stream on the default output device, which the
/// WASAPI backend serves as a loopback capture. Backends without loopback
/// support fail at open and the tap is skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalDeviceProvider;

impl CpalDeviceProvider {
    /// Create a provider bound to `cpal::default_host()`.
    pub fn new() -> Self {
        Self
    }
}

impl AudioDeviceProvider for CpalDeviceProvider {
    #[instrument(skip(self))]
    fn resolve(&self, role: AudioRole) -> Option<Box<dyn AudioDevice>> {
        let host = cpal::default_host();
        let device = match role {
            AudioRole::Loopback => host.default_output_device(),
            AudioRole::Microphone => host.default_input_device(),
        }?;
        Some(Box::new(CpalDevice { device, role }))
    }
}

struct CpalDevice {
    device: Device,
    role: AudioRole,
}

impl AudioDevice for CpalDevice {
    fn name(&self) -> String {
        #[allow(deprecated)]
        self.device.name().unwrap_or_else(|_| "unknown".to_string())
    }

    #[track_caller]
    #[instrument(skip(self), fields(role = %self.role))]
    fn open(self: Box<Self>, chunk_frames: usize) -> CoreResult<Box<dyn AudioInput>> {
        let Self { device, role } = *self;

        let supported = match role {
            AudioRole::Loopback => device.default_output_config(),
            AudioRole::Microphone => device.default_input_config(),
        }
        .map_err(|e| CaptureError::DeviceError {
            reason: format!("Failed to get config: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        let spec = StreamSpec {
            channels: supported.channels(),
            sample_rate: supported.sample_rate(),
        };
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();
        let chunk_samples = chunk_frames * usize::from(spec.channels.max(1));

        let (tx, rx) = mpsc::sync_channel(QUEUED_CHUNKS);
        let shared = Arc::new(Shared::default());

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, chunk_samples, tx, &shared),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, chunk_samples, tx, &shared),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, chunk_samples, tx, &shared),
            SampleFormat::I32 => build_stream::<i32>(&device, &config, chunk_samples, tx, &shared),
            other => Err(CaptureError::DeviceError {
                reason: format!("Unsupported sample format {:?}", other),
                location: ErrorLocation::from(Location::caller()),
            }),
        }?;

        stream.play().map_err(|e| CaptureError::DeviceError {
            reason: format!("Failed to start stream: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?;

        info!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            ?sample_format,
            "Audio input streaming"
        );

        Ok(Box::new(CpalInput {
            _stream: stream,
            spec,
            chunks: rx,
            shared,
            reported_drops: 0,
        }))
    }
}

#[derive(Default)]
struct Shared {
    dropped: AtomicU64,
    failure: Mutex<Option<String>>,
}

#[track_caller]
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    chunk_samples: usize,
    tx: SyncSender<Vec<i16>>,
    shared: &Arc<Shared>,
) -> CoreResult<Stream>
where
    T: SizedSample + Send + 'static,
    i16: FromSample<T>,
{
    let data_shared = Arc::clone(shared);
    let err_shared = Arc::clone(shared);
    let mut pending: Vec<i16> = Vec::with_capacity(chunk_samples);

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for &sample in data {
                    pending.push(i16::from_sample(sample));
                    if pending.len() == chunk_samples {
                        let full = std::mem::replace(&mut pending, Vec::with_capacity(chunk_samples));
                        match tx.try_send(full) {
                            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
                            Err(TrySendError::Full(_)) => {
                                data_shared.dropped.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
                let mut failure = err_shared.failure.lock().unwrap_or_else(|e| e.into_inner());
                failure.get_or_insert_with(|| err.to_string());
            },
            None,
        )
        .map_err(|e| CaptureError::DeviceError {
            reason: format!("Failed to build stream: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })
}

struct CpalInput {
    _stream: Stream,
    spec: StreamSpec,
    chunks: Receiver<Vec<i16>>,
    shared: Arc<Shared>,
    reported_drops: u64,
}

impl AudioInput for CpalInput {
    fn spec(&self) -> StreamSpec {
        self.spec
    }

    fn read_chunk(&mut self, chunk: &mut Vec<i16>, timeout: Duration) -> Result<(), AudioReadError> {
        if let Some(reason) = self
            .shared
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(AudioReadError::Disconnected(reason));
        }

        let dropped = self.shared.dropped.load(Ordering::Relaxed);
        if dropped > self.reported_drops {
            let delta = dropped - self.reported_drops;
            self.reported_drops = dropped;
            return Err(AudioReadError::Overflow { dropped: delta });
        }

        match self.chunks.recv_timeout(timeout) {
            Ok(samples) => {
                *chunk = samples;
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(AudioReadError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(AudioReadError::Disconnected("stream callback dropped".to_string()))
            }
        }
    }
}
