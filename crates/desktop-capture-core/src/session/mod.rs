mod naming;
mod scheduler;
mod state;

pub use {
    naming::OutputNamer,
    scheduler::SegmentScheduler,
    state::{
        AudioSourceStatus, SchedulerState, SegmentReport, SegmentResult, SessionState,
        SessionStatus, StatusHandle,
    },
};
