//! Operator command channel
//!
//! This module handles:
//! - Reading command lines from the operator stream
//! - The single-slot hand-off between reader and processor
//! - Executing commands and writing reply lines

pub mod processor;
pub mod reader;
pub mod slot;

pub use processor::run_command_processor;
pub use reader::run_line_reader;
pub use slot::CommandSlot;

use crate::command::CommandDispatcher;
use crate::transport::{OperatorConnector, OperatorStream};
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Connect the operator channel and run reader and processor until
/// cancelled or either task fails
pub async fn run_operator<C: OperatorConnector>(
    connector: &C,
    dispatcher: CommandDispatcher,
    token: CancellationToken,
) -> Result<()> {
    let stream = connector.connect().await?;
    info!("Operator channel ready ({})", connector.name());
    serve(stream, dispatcher, token).await
}

/// Serve one operator stream, closing it when both tasks have stopped
pub async fn serve<S: OperatorStream>(
    stream: S,
    dispatcher: CommandDispatcher,
    token: CancellationToken,
) -> Result<()> {
    let (mut read_half, mut write_half) = tokio::io::split(stream);
    let slot = Arc::new(CommandSlot::new());

    // Either task stopping brings the other down with it
    let session = token.child_token();
    let (reader, processor) = tokio::join!(
        async {
            let result = run_line_reader(&mut read_half, slot.clone(), session.clone()).await;
            session.cancel();
            result
        },
        async {
            let result =
                run_command_processor(dispatcher, slot.clone(), &mut write_half, session.clone())
                    .await;
            session.cancel();
            result
        }
    );

    let mut stream = read_half.unsplit(write_half);
    if let Err(e) = OperatorStream::shutdown(&mut stream).await {
        warn!("Failed to close operator channel: {}", e);
    }

    if let Err(e) = &reader {
        error!("Line reader failed: {}", e);
    }
    if let Err(e) = &processor {
        error!("Command processor failed: {}", e);
    }
    reader.and(processor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::SimulatedBus;
    use crate::channel::SweepParams;
    use crate::context::testing::{simulated_context, C_ADDR};
    use crate::context::AppContext;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use std::time::Duration;
    use tf1_shared::CommandCode;
    use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadBuf};

    struct TestStream(DuplexStream);

    impl AsyncRead for TestStream {
        fn poll_read(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_read(cx, buf)
        }
    }

    impl AsyncWrite for TestStream {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Pin::new(&mut self.0).poll_write(cx, buf)
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_flush(cx)
        }

        fn poll_shutdown(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
        ) -> Poll<std::io::Result<()>> {
            Pin::new(&mut self.0).poll_shutdown(cx)
        }
    }

    #[async_trait::async_trait]
    impl OperatorStream for TestStream {
        async fn shutdown(&mut self) -> Result<()> {
            Ok(())
        }
    }

    struct Session {
        ctx: Arc<AppContext>,
        sim: SimulatedBus,
        client: BufReader<DuplexStream>,
        token: CancellationToken,
        task: tokio::task::JoinHandle<Result<()>>,
    }

    impl Session {
        fn start() -> Self {
            let (ctx, sim) = simulated_context();
            let ctx = Arc::new(ctx);
            let (client, server) = tokio::io::duplex(1024);
            let token = CancellationToken::new();
            let task = tokio::spawn(serve(
                TestStream(server),
                CommandDispatcher::new(ctx.clone()),
                token.clone(),
            ));
            Self {
                ctx,
                sim,
                client: BufReader::new(client),
                token,
                task,
            }
        }

        async fn command(&mut self, line: &str) -> String {
            self.client.get_mut().write_all(line.as_bytes()).await.unwrap();
            let mut reply = String::new();
            self.client.read_line(&mut reply).await.unwrap();
            reply
        }

        async fn finish(self) {
            self.token.cancel();
            self.task.await.unwrap().unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_wl_end_to_end() {
        let mut session = Session::start();

        assert_eq!(session.command(":set-wl C:1550.0\n").await, ":ACK\n");
        assert_eq!(
            session
                .sim
                .count_command(C_ADDR, CommandCode::Wavelength.byte()),
            1
        );
        assert_eq!(session.sim.filter(C_ADDR).unwrap().wavelength(), 1550.0);

        session.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_wl_end_to_end_cancels_active_sweep() {
        let mut session = Session::start();
        let c = session.ctx.channels.select("C").unwrap().clone();
        c.start_sweep(&session.ctx.bus, SweepParams::new(1530.0, 1540.0, 1.0, 100))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(c.sweep_status().await.is_some());

        session.sim.clear_transfers();
        assert_eq!(session.command(":set-wl C:1550.0\n").await, ":ACK\n");
        assert!(c.sweep_status().await.is_none());

        // The sweep is gone: exactly one wavelength write after the command
        let writes = session
            .sim
            .count_command(C_ADDR, CommandCode::Wavelength.byte());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(
            session
                .sim
                .count_command(C_ADDR, CommandCode::Wavelength.byte()),
            writes
        );
        assert_eq!(session.sim.filter(C_ADDR).unwrap().wavelength(), 1550.0);

        session.finish().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_replies() {
        let mut session = Session::start();

        assert_eq!(
            session.command("junk:get-interval?L\r").await,
            ":ACK: (1570.000,1605.000)\n"
        );
        assert_eq!(session.command(":bogus\n").await, ":NACK: unknown command\n");
        assert_eq!(
            session.command(":sweep:L:1605:1570:0.5:1000\n").await,
            ":NACK: ArgumentError\n"
        );
        assert_eq!(
            session.command(":sweep:L:1570:1605:0.5:1000\n").await,
            ":ACK\n"
        );
        assert_eq!(session.command(":stop?L\n").await, ":ACK: stopped\n");

        session.finish().await;
    }
}
