#[allow(clippy::module_inception)]
mod config;
mod encoder_config;

pub(crate) use {config::Config, encoder_config::EncoderConfig};

pub(crate) const CONFIG_FILE_NAME: &str = "config.toml";
pub(crate) const RECORDINGS_DIR_NAME: &str = "Desktop Capture";
