//! Channels and their background sweeps
//!
//! This module handles:
//! - The fixed registry of named channels and band selection
//! - Powering a filter up before wavelength work
//! - Starting, replacing and cancelling per-channel sweep tasks

pub mod registry;
pub mod sweep;

pub use registry::{Channel, ChannelRegistry};
pub use sweep::SweepParams;
