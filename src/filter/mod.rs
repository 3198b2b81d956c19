//! TF1 filter access
//!
//! This module handles:
//! - The request/response exchange with a single filter
//! - Typed operations for every supported device capability

pub mod commands;
pub mod transport;

pub use transport::{ExchangeTiming, FilterDevice};
