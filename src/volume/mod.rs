//! Hardware volume control: loudness percent <-> mixer units

mod control;
mod error;
mod mapper;

pub use control::{AlsaMixerControl, MixerControl};
pub use error::VolumeError;
pub use mapper::*;
