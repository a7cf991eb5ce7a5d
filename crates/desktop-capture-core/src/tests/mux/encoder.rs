use crate::{
    CaptureError, EncodeRequest, EncoderRunner, FfmpegRunner,
    mux::encoder::{STDERR_TAIL_BYTES, stderr_tail},
};

/// WHAT: Only the last 2000 bytes of stderr are kept
/// WHY: ffmpeg prints banners and progress; the cause is at the end
#[test]
fn given_long_stderr_when_taking_tail_then_last_bytes_kept() {
    // Given: 5000 bytes of noise followed by the real error
    let mut stderr = vec![b'.'; 5000];
    stderr.extend_from_slice(b"\nUnknown encoder 'libx264'\n");

    // When: Taking the tail
    let tail = stderr_tail(&stderr);

    // Then: Bounded, trimmed, and ends with the error
    assert!(tail.len() <= STDERR_TAIL_BYTES);
    assert!(tail.ends_with("Unknown encoder 'libx264'"));
}

/// WHAT: A missing encoder binary is reported as EncoderFailed
/// WHY: Spawn failure must take the fallback path, not crash the worker
#[test]
fn given_missing_binary_when_running_then_encoder_failed() {
    // Given: A runner pointing at a binary that does not exist
    let dir = tempfile::tempdir().unwrap();
    let runner = FfmpegRunner::with_program(dir.path().join("no-such-ffmpeg"));
    let request = EncodeRequest {
        args: vec!["-version".into()],
        output: dir.path().join("out.mkv"),
    };

    // When: Running
    let result = runner.run(&request);

    // Then: EncoderFailed mentioning the program
    match result {
        Err(CaptureError::EncoderFailed { reason, .. }) => assert!(reason.contains("no-such-ffmpeg")),
        other => panic!("unexpected result {other:?}"),
    }
}
