//! Operator command execution
//!
//! This module handles:
//! - Splitting command lines into name and arguments
//! - Looking names up in the fixed command table
//! - Running the matching handler against the filters
//! - Rendering ACK/NACK reply lines

mod dispatcher;
pub mod handlers;

pub use dispatcher::CommandDispatcher;
