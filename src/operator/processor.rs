//! Command Processor task
//!
//! Waits for lines in the command slot, runs them through the dispatcher
//! and writes one reply line per command.

use super::slot::CommandSlot;
use crate::command::CommandDispatcher;
use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn run_command_processor<W>(
    dispatcher: CommandDispatcher,
    slot: Arc<CommandSlot>,
    mut writer: W,
    token: CancellationToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    loop {
        let line = tokio::select! {
            _ = token.cancelled() => break,
            line = slot.wait() => line,
        };

        if let Some(reply) = dispatcher.dispatch(&line).await {
            writer.write_all(format!("{reply}\n").as_bytes()).await?;
            writer.flush().await?;
        }
    }

    info!("Command processor stopped");
    Ok(())
}
