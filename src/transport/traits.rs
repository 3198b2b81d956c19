//! Operator channel abstraction for pluggable character streams

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// A character stream carrying operator command lines in and replies out
#[async_trait]
pub trait OperatorStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Flush pending replies and close the stream
    async fn shutdown(&mut self) -> Result<()>;
}

/// Factory for operator streams
#[async_trait]
pub trait OperatorConnector: Send + Sync {
    /// The stream type this connector produces
    type Stream: OperatorStream;

    /// Open the stream
    async fn connect(&self) -> Result<Self::Stream>;

    /// Human-readable name for this channel
    fn name(&self) -> &'static str;
}
