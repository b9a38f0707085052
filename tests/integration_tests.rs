//! Main integration test entry point for bt-speaker
//!
//! This file serves as the entry point for all integration tests.

mod integration;
