//! Audio pipe feeding decoded frames into the playback process

mod error;
mod pipe;
#[cfg(test)]
mod tests;

pub use error::PipeError;
pub use pipe::*;
