//! User interface module

mod cli;
#[cfg(test)]
mod tests;

pub use cli::*;
