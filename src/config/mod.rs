//! Daemon configuration management

mod settings;

pub use settings::*;
