use crate::{
    CaptureConfig, MuxJob, MuxPipeline, MuxSettings, Muxer, PendingAudio, PendingJobs, Resolution,
    SegmentResult, SegmentWriter, SessionState,
    tests::support::{EncoderScript, FakeEncoder, solid_frame},
};

use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use uuid::Uuid;

fn job(dir: &Path, out: &Path, sequence: u32) -> MuxJob {
    let mut writer = SegmentWriter::begin(
        dir.join(format!("d264_video_1_s{sequence:03}.mjpeg")),
        Resolution::new(16, 16),
        30,
    )
    .unwrap();
    writer.write(solid_frame(Resolution::new(16, 16), 1)).unwrap();

    MuxJob {
        session_id: Uuid::nil(),
        sequence,
        video: writer.finalize().unwrap(),
        audio: Vec::<PendingAudio>::new(),
        output: out.join(format!("Desktop_Video_2026_01_01_S{sequence:03}.mkv")),
        settings: MuxSettings::from_config(&CaptureConfig::new("unused")),
    }
}

/// WHAT: Jobs complete strictly in submission order
/// WHY: Final filenames must appear in increasing segment order
#[test]
fn given_many_jobs_when_draining_then_completed_in_submission_order() {
    // Given: A pipeline with a slow encoder
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let state = Arc::new(Mutex::new(SessionState::default()));
    let encoder = Arc::new(FakeEncoder::new(EncoderScript::Succeed).with_delay(Duration::from_millis(5)));
    let pipeline = MuxPipeline::spawn(
        Muxer::new(encoder.clone()),
        4,
        Arc::clone(&state),
        Arc::new(PendingJobs::default()),
    )
    .unwrap();

    // When: Submitting six jobs and awaiting them
    for sequence in 1..=6 {
        pipeline.submit(job(tmp.path(), out.path(), sequence)).unwrap();
    }
    pipeline.await_all_pending();

    // Then: Completion order and encoder call order both ascend
    let completed: Vec<u32> = state.lock().unwrap().completed.iter().map(|r| r.sequence).collect();
    assert_eq!(completed, vec![1, 2, 3, 4, 5, 6]);
    let outputs: Vec<_> = encoder.recorded().into_iter().map(|r| r.output).collect();
    let mut sorted = outputs.clone();
    sorted.sort();
    assert_eq!(outputs, sorted);
    assert_eq!(pipeline.pending().count(), 0);
    assert!(state.lock().unwrap().completed.iter().all(|r| matches!(r.result, SegmentResult::Encoded { .. })));
}

/// WHAT: A full queue makes submit wait instead of failing or dropping
/// WHY: Backpressure keeps memory bounded without losing segments
#[test]
fn given_full_queue_when_submitting_then_waits_and_all_jobs_finish() {
    // Given: Capacity 1 and an encoder slower than submission
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let state = Arc::new(Mutex::new(SessionState::default()));
    let pipeline = MuxPipeline::spawn(
        Muxer::new(Arc::new(FakeEncoder::new(EncoderScript::Succeed).with_delay(Duration::from_millis(20)))),
        1,
        Arc::clone(&state),
        Arc::new(PendingJobs::default()),
    )
    .unwrap();

    // When: Submitting four jobs back to back
    let results: Vec<_> = (1..=4).map(|s| pipeline.submit(job(tmp.path(), out.path(), s))).collect();
    pipeline.shutdown();

    // Then: Every submit succeeded and every job completed
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(state.lock().unwrap().completed.len(), 4);
}

/// WHAT: A final submission skips the capacity wait but keeps its place in line
/// WHY: Ending a session must not block on the encoder, yet segments stay ordered
#[test]
fn given_full_queue_when_submitting_final_then_returns_at_once_and_runs_last() {
    // Given: Capacity 1 with one job encoding and one waiting
    let tmp = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let state = Arc::new(Mutex::new(SessionState::default()));
    let pipeline = MuxPipeline::spawn(
        Muxer::new(Arc::new(FakeEncoder::new(EncoderScript::Succeed).with_delay(Duration::from_millis(300)))),
        1,
        Arc::clone(&state),
        Arc::new(PendingJobs::default()),
    )
    .unwrap();
    let submitter = pipeline.submitter().unwrap();
    submitter.submit(job(tmp.path(), out.path(), 1)).unwrap();
    submitter.submit(job(tmp.path(), out.path(), 2)).unwrap();

    // When: Submitting the final job
    let started = Instant::now();
    submitter.submit_final(job(tmp.path(), out.path(), 3)).unwrap();
    let took = started.elapsed();

    // Then: No wait, three outstanding, completed in order
    assert!(took < Duration::from_millis(150), "final submit took {took:?}");
    assert_eq!(pipeline.pending().count(), 3);
    drop(submitter);
    pipeline.await_all_pending();
    let completed: Vec<u32> = state.lock().unwrap().completed.iter().map(|r| r.sequence).collect();
    assert_eq!(completed, vec![1, 2, 3]);
}

/// WHAT: Awaiting an idle pipeline returns immediately
/// WHY: await_all_pending is called unconditionally on shutdown paths
#[test]
fn given_idle_pipeline_when_awaiting_then_returns_with_zero_pending() {
    // Given: A pipeline that never received work
    let state = Arc::new(Mutex::new(SessionState::default()));
    let pipeline = MuxPipeline::spawn(
        Muxer::new(Arc::new(FakeEncoder::new(EncoderScript::Succeed))),
        2,
        Arc::clone(&state),
        Arc::new(PendingJobs::default()),
    )
    .unwrap();

    // When: Awaiting and shutting down
    pipeline.await_all_pending();
    let pending = pipeline.pending();
    pipeline.shutdown();

    // Then: Nothing pending, nothing recorded
    assert_eq!(pending.count(), 0);
    assert!(state.lock().unwrap().completed.is_empty());
}
