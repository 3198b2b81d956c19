//! Device maintenance handlers: `get-temp`, `reset`, `get-pos`, `set-pos`

use super::{band, fields, parse, HandlerResult};
use crate::context::AppContext;
use tf1_shared::MirrorPosition;
use tracing::info;

/// Microcontroller temperature in degrees Celsius
pub async fn handle_get_temp(ctx: &AppContext, args: &str) -> HandlerResult {
    let channel = band(ctx, args)?;
    let mut bus = ctx.bus.lock().await;
    let celsius = channel.device().get_temperature(&mut *bus).await?;
    Ok(celsius.to_string())
}

/// Reset a filter, cancelling its sweep first
pub async fn handle_reset(ctx: &AppContext, args: &str) -> HandlerResult {
    let channel = band(ctx, args)?;
    if channel.stop_sweep().await {
        info!("Channel {} sweep cancelled by reset", channel.name());
    }

    let mut bus = ctx.bus.lock().await;
    channel.device().reset(&mut *bus).await?;
    Ok(String::new())
}

/// Mirror actuator values as `(x_neg,x_pos,y_neg,y_pos)`
pub async fn handle_get_pos(ctx: &AppContext, args: &str) -> HandlerResult {
    let channel = band(ctx, args)?;
    let mut bus = ctx.bus.lock().await;
    let position = channel.device().get_mirror_position(&mut *bus).await?;
    Ok(position.to_string())
}

/// Drive the mirror directly: `band:x_neg:x_pos:y_neg:y_pos`
pub async fn handle_set_pos(ctx: &AppContext, args: &str) -> HandlerResult {
    let [band_arg, x_neg, x_pos, y_neg, y_pos] = fields(args, "band:x_neg:x_pos:y_neg:y_pos")?;
    let channel = band(ctx, band_arg)?;
    let position = MirrorPosition {
        x_neg: parse(x_neg, "x_neg")?,
        x_pos: parse(x_pos, "x_pos")?,
        y_neg: parse(y_neg, "y_neg")?,
        y_pos: parse(y_pos, "y_pos")?,
    };

    if channel.stop_sweep().await {
        info!("Channel {} sweep cancelled by set-pos", channel.name());
    }

    let mut bus = ctx.bus.lock().await;
    channel.device().set_mirror_position(&mut *bus, position).await?;
    Ok(String::new())
}
