//! Power handlers: `powerup`, `get-power`
//!
//! Both walk every channel and report each one inline, so a filter that
//! does not answer never hides the state of the others.

use super::HandlerResult;
use crate::context::AppContext;
use tf1_shared::PowerMode;
use tracing::warn;

/// Switch every filter to normal power
pub async fn handle_powerup(ctx: &AppContext, _args: &str) -> HandlerResult {
    let mut out = String::new();

    for channel in ctx.channels.iter() {
        let result = {
            let mut bus = ctx.bus.lock().await;
            channel
                .device()
                .get_or_set_power_mode(&mut *bus, Some(PowerMode::Normal))
                .await
        };

        match result {
            Ok(_) => out.push_str(&format!("Canal {}: Ligado ", channel.name())),
            Err(e) => {
                warn!("Power-up failed on channel {}: {}", channel.name(), e);
                out.push_str(&format!("Canal {}: Falha ao ligar | ", channel.name()));
            }
        }
    }

    Ok(out.trim_end().to_string())
}

/// Power mode of every filter, as its numeric value
pub async fn handle_get_power(ctx: &AppContext, _args: &str) -> HandlerResult {
    let mut out = String::new();

    for channel in ctx.channels.iter() {
        let result = {
            let mut bus = ctx.bus.lock().await;
            channel.device().get_or_set_power_mode(&mut *bus, None).await
        };

        match result {
            Ok(Some(mode)) => {
                out.push_str(&format!("Canal {}: {} ", channel.name(), mode.byte()))
            }
            Ok(None) => {
                warn!("Channel {} sent no power mode", channel.name());
                out.push_str(&format!("Canal {}: Falha ao ler | ", channel.name()));
            }
            Err(e) => {
                warn!("Power query failed on channel {}: {}", channel.name(), e);
                out.push_str(&format!("Canal {}: Falha ao ler | ", channel.name()));
            }
        }
    }

    Ok(out.trim_end().to_string())
}
