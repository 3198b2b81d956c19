//! Operator Line Protocol
//!
//! Commands arrive as `:<name>[?|:]<args>` lines terminated by `\n` or `\r`.
//! Replies are `:ACK`, `:ACK: <text>` or `:NACK: <reason>` lines.

use std::fmt;

use crate::limits::MAX_LINE_LEN;

/// Marker that opens a command line
pub const START_MARKER: u8 = b':';

/// States of the line framer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    /// Discarding bytes until a start marker arrives
    Idle,
    /// Accumulating the body of a command line
    Collecting,
}

/// Output of feeding one byte to the framer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    /// A complete, non-empty command line (without marker and terminator)
    Line(String),
    /// The line exceeded the buffer and was dropped
    Overflow { discarded: usize },
}

/// Byte-at-a-time command line extractor
#[derive(Debug)]
pub struct LineFramer {
    state: FramerState,
    buffer: Vec<u8>,
    max_len: usize,
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl LineFramer {
    /// Create a framer with the protocol's line limit
    pub fn new() -> Self {
        Self::with_max_len(MAX_LINE_LEN)
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            state: FramerState::Idle,
            buffer: Vec::with_capacity(max_len),
            max_len,
        }
    }

    /// Current state
    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Feed one byte, returning an event when a line completes or overflows
    pub fn push(&mut self, byte: u8) -> Option<FramerEvent> {
        match self.state {
            FramerState::Idle => {
                if byte == START_MARKER {
                    self.buffer.clear();
                    self.state = FramerState::Collecting;
                }
                None
            }
            FramerState::Collecting => match byte {
                b'\n' | b'\r' => {
                    self.state = FramerState::Idle;
                    if self.buffer.is_empty() {
                        return None;
                    }
                    let line = String::from_utf8_lossy(&self.buffer).into_owned();
                    self.buffer.clear();
                    Some(FramerEvent::Line(line))
                }
                _ if self.buffer.len() < self.max_len => {
                    self.buffer.push(byte);
                    None
                }
                _ => {
                    let discarded = self.buffer.len();
                    self.buffer.clear();
                    self.state = FramerState::Idle;
                    Some(FramerEvent::Overflow { discarded })
                }
            },
        }
    }
}

/// Reply line sent back to the operator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Success, with optional response text
    Ack(Option<String>),
    /// Failure, with the error name or reason
    Nack(String),
}

impl Reply {
    pub fn ack(text: impl Into<String>) -> Self {
        let text = text.into();
        if text.is_empty() {
            Reply::Ack(None)
        } else {
            Reply::Ack(Some(text))
        }
    }

    pub fn nack(reason: impl Into<String>) -> Self {
        Reply::Nack(reason.into())
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Ack(None) => write!(f, ":ACK"),
            Reply::Ack(Some(text)) => write!(f, ":ACK: {text}"),
            Reply::Nack(reason) => write!(f, ":NACK: {reason}"),
        }
    }
}
