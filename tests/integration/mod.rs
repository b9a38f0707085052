//! Integration tests module
//!
//! This module organizes all integration tests for the bt-speaker daemon.

pub mod config_test;
pub mod daemon_flow_test;
pub mod volume_test;
