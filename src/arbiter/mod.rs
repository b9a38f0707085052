//! Connection admission: which remote device owns the audio session

mod device;
mod machine;
mod track;

pub use device::*;
pub use machine::*;
pub use track::TrackSignature;
