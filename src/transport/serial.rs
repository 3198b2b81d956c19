//! Operator channel on a serial port (8N1, no flow control)

use crate::transport::traits::{OperatorConnector, OperatorStream};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::info;

/// Serial port wrapper implementing OperatorStream
pub struct SerialOperatorStream {
    inner: SerialStream,
}

impl AsyncRead for SerialOperatorStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for SerialOperatorStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}

#[async_trait]
impl OperatorStream for SerialOperatorStream {
    async fn shutdown(&mut self) -> Result<()> {
        self.inner.flush().await?;
        Ok(())
    }
}

/// Connector opening a serial port for the operator channel
#[derive(Debug, Clone)]
pub struct SerialConnector {
    port: String,
    baud: u32,
}

impl SerialConnector {
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        Self {
            port: port.into(),
            baud,
        }
    }
}

#[async_trait]
impl OperatorConnector for SerialConnector {
    type Stream = SerialOperatorStream;

    async fn connect(&self) -> Result<Self::Stream> {
        let inner = tokio_serial::new(&self.port, self.baud)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .with_context(|| format!("Failed to open operator serial port {}", self.port))?;

        info!("Operator channel on {} at {} baud", self.port, self.baud);
        Ok(SerialOperatorStream { inner })
    }

    fn name(&self) -> &'static str {
        "serial"
    }
}
