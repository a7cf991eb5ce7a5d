use crate::{
    CaptureError, CoreResult,
    audio::{AudioIntermediate, PendingAudio},
    mux::{MuxOutcome, MuxSettings, Muxer},
    session::{SegmentReport, SessionState},
    video::VideoIntermediate,
};

use std::{
    panic::Location,
    path::PathBuf,
    sync::{
        Arc, Condvar, Mutex,
        mpsc::{self, Sender},
    },
    thread::{self, JoinHandle},
};

use error_location::ErrorLocation;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// A finished segment waiting for the mux worker.
#[derive(Debug)]
pub struct MuxJob {
    /// Session the segment belongs to.
    pub session_id: Uuid,
    /// 1-based segment number.
    pub sequence: u32,
    /// Closed video intermediate.
    pub video: VideoIntermediate,
    /// One handle per tap that was running during the segment.
    pub audio: Vec<PendingAudio>,
    /// Reserved final path.
    pub output: PathBuf,
    /// Encode parameters.
    pub settings: MuxSettings,
}

/// Count of submitted-but-unfinished jobs, with a wait-for-zero.
///
/// Also enforces the queue capacity: the job channel itself is unbounded.
#[derive(Debug, Default)]
pub struct PendingJobs {
    count: Mutex<usize>,
    changed: Condvar,
}

impl PendingJobs {
    fn add(&self) -> usize {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count += 1;
        *count
    }

    /// Count one more job once fewer than `limit` are outstanding.
    /// `on_full` runs once if the caller has to wait.
    fn add_within(&self, limit: usize, on_full: impl FnOnce()) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        if *count >= limit {
            on_full();
        }
        while *count >= limit {
            count = self.changed.wait(count).unwrap_or_else(|e| e.into_inner());
        }
        *count += 1;
    }

    fn complete(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        *count = count.saturating_sub(1);
        self.changed.notify_all();
    }

    /// Jobs submitted and not yet finished.
    pub fn count(&self) -> usize {
        *self.count.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Block until the count reaches zero. No timeout.
    pub fn wait_idle(&self) {
        let mut count = self.count.lock().unwrap_or_else(|e| e.into_inner());
        while *count > 0 {
            count = self.changed.wait(count).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Cloneable handle for queueing jobs on a [`MuxPipeline`].
#[derive(Debug, Clone)]
pub struct MuxSubmitter {
    sender: Sender<MuxJob>,
    pending: Arc<PendingJobs>,
    capacity: usize,
}

impl MuxSubmitter {
    /// Queue `job`. Waits for room, with a warning, when the queue is full.
    ///
    /// Room means fewer than `capacity` jobs waiting besides the one being encoded.
    #[track_caller]
    pub fn submit(&self, job: MuxJob) -> CoreResult<()> {
        let sequence = job.sequence;
        self.pending.add_within(self.capacity + 1, || {
            warn!(
                segment = sequence,
                capacity = self.capacity,
                "Mux queue full, capture waiting for the encoder"
            )
        });
        self.send(job)
    }

    /// Queue a session's last segment without waiting for room.
    ///
    /// The queue may exceed its capacity by this one job.
    #[track_caller]
    pub fn submit_final(&self, job: MuxJob) -> CoreResult<()> {
        let sequence = job.sequence;
        let outstanding = self.pending.add();
        if outstanding > self.capacity + 1 {
            debug!(segment = sequence, outstanding, "Final segment queued past capacity");
        }
        self.send(job)
    }

    #[track_caller]
    fn send(&self, job: MuxJob) -> CoreResult<()> {
        self.sender.send(job).map_err(|_| {
            self.pending.complete();
            closed("mux worker exited")
        })
    }
}

/// Bounded queue served by exactly one mux worker thread.
///
/// Jobs are encoded strictly in submission order, final segments included. The worker exits once every
/// [`MuxSubmitter`] is gone and the queue is drained.
pub struct MuxPipeline {
    submitter: Option<MuxSubmitter>,
    worker: Option<JoinHandle<()>>,
    pending: Arc<PendingJobs>,
}

impl MuxPipeline {
    /// Start the worker.
    pub fn spawn(
        muxer: Muxer,
        capacity: usize,
        state: Arc<Mutex<SessionState>>,
        pending: Arc<PendingJobs>,
    ) -> CoreResult<Self> {
        let capacity = capacity.max(1);
        let (sender, jobs) = mpsc::channel::<MuxJob>();
        let worker_pending = Arc::clone(&pending);

        let worker = thread::Builder::new()
            .name("mux-worker".to_string())
            .spawn(move || {
                for job in jobs {
                    run_job(&muxer, job, &state);
                    worker_pending.complete();
                }
                debug!("Mux worker exiting");
            })?;

        Ok(Self {
            submitter: Some(MuxSubmitter {
                sender,
                pending: Arc::clone(&pending),
                capacity,
            }),
            worker: Some(worker),
            pending,
        })
    }

    /// A new handle for queueing jobs.
    #[track_caller]
    pub fn submitter(&self) -> CoreResult<MuxSubmitter> {
        self.submitter
            .clone()
            .ok_or_else(|| closed("pipeline shut down"))
    }

    /// Queue `job` through the pipeline's own handle.
    #[track_caller]
    pub fn submit(&self, job: MuxJob) -> CoreResult<()> {
        match self.submitter.as_ref() {
            Some(submitter) => submitter.submit(job),
            None => Err(closed("pipeline shut down")),
        }
    }

    /// Shared pending counter.
    pub fn pending(&self) -> Arc<PendingJobs> {
        Arc::clone(&self.pending)
    }

    /// Block until every submitted job has finished.
    pub fn await_all_pending(&self) {
        self.pending.wait_idle();
    }

    /// Finish queued work, then stop the worker.
    ///
    /// Blocks until outstanding [`MuxSubmitter`] clones are dropped.
    pub fn shutdown(mut self) {
        self.stop_worker();
    }

    fn stop_worker(&mut self) {
        self.submitter.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            error!("Mux worker panicked");
        }
    }
}

impl Drop for MuxPipeline {
    fn drop(&mut self) {
        self.stop_worker();
    }
}

#[track_caller]
fn closed(reason: &str) -> CaptureError {
    CaptureError::PipelineClosed {
        reason: reason.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}

fn run_job(muxer: &Muxer, job: MuxJob, state: &Mutex<SessionState>) {
    let MuxJob {
        session_id,
        sequence,
        video,
        audio,
        output,
        settings,
    } = job;

    let span = info_span!("mux", %session_id, segment = sequence);
    let _entered = span.enter();

    let tracks: Vec<AudioIntermediate> = audio.into_iter().filter_map(PendingAudio::wait).collect();
    info!(frames = video.frames, audio_tracks = tracks.len(), "Muxing segment");

    let outcome = muxer.mux(&video, &tracks, &output, &settings);
    let report = SegmentReport::new(sequence, output, &video, &outcome);

    let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
    if let MuxOutcome::Encoded { output, bytes } = &outcome {
        state.last_output = Some((output.clone(), *bytes));
    }
    state.completed.push(report);
}
