//! Line Reader task
//!
//! Feeds the operator stream through the line framer one byte at a time and
//! hands each completed line to the command slot.

use super::slot::CommandSlot;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tf1_shared::operator::{FramerEvent, LineFramer};
use tf1_shared::timing::EOF_BACKOFF_MS;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const READ_CHUNK: usize = 64;

/// Run until cancelled or the stream fails.
///
/// End of data is not fatal: the reader backs off briefly and polls again.
pub async fn run_line_reader<R>(
    mut reader: R,
    slot: Arc<CommandSlot>,
    token: CancellationToken,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut buf = [0u8; READ_CHUNK];
    let backoff = Duration::from_millis(EOF_BACKOFF_MS);

    loop {
        let n = tokio::select! {
            _ = token.cancelled() => break,
            result = reader.read(&mut buf) => result?,
        };

        if n == 0 {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(backoff) => continue,
            }
        }

        for &byte in &buf[..n] {
            match framer.push(byte) {
                Some(FramerEvent::Line(line)) => {
                    debug!("Operator line: {}", line);
                    slot.put(line);
                }
                Some(FramerEvent::Overflow { discarded }) => {
                    error!("Command line too long, discarded {} bytes", discarded);
                }
                None => {}
            }
        }
    }

    info!("Line reader stopped");
    Ok(())
}
