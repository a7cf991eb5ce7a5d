mod cpal_input;
mod device;
pub(crate) mod tap;

pub use {
    cpal_input::CpalDeviceProvider,
    device::{AudioDevice, AudioDeviceProvider, AudioInput, AudioReadError, AudioRole, StreamSpec},
    tap::{AudioIntermediate, AudioTap, PendingAudio, TapStats},
};
