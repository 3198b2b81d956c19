//! `iden` handler

use super::HandlerResult;
use crate::context::AppContext;
use tracing::warn;

/// Identify every channel's filter.
///
/// A channel that fails to answer is reported inline; the command itself
/// always succeeds.
pub async fn handle_iden(ctx: &AppContext, _args: &str) -> HandlerResult {
    let mut out = String::new();

    for channel in ctx.channels.iter() {
        let result = {
            let mut bus = ctx.bus.lock().await;
            channel.device().get_identity(&mut *bus).await
        };

        match result {
            Ok(id) => out.push_str(&format!(
                "Canal {}: Modelo={}, S/N={}, FW={} | ",
                channel.name(),
                id.model,
                id.serial_number,
                id.firmware
            )),
            Err(e) => {
                warn!("Identify failed on channel {}: {}", channel.name(), e);
                out.push_str(&format!("Canal {}: Falha ao ler ID | ", channel.name()));
            }
        }
    }

    Ok(out.trim_end().to_string())
}
