//! Wavelength handlers: `get-interval`, `get-wl`, `set-wl`

use super::{band, fields, parse, HandlerResult};
use crate::context::AppContext;
use tf1_shared::FilterError;
use tracing::info;

/// Tunable range of a channel as `(min,max)`
pub async fn handle_get_interval(ctx: &AppContext, args: &str) -> HandlerResult {
    let channel = band(ctx, args)?;

    // Both bounds under one lock scope; either failure aborts the reply
    let (min, max) = {
        let mut bus = ctx.bus.lock().await;
        let min = channel.device().get_min_wavelength(&mut *bus).await?;
        let max = channel.device().get_max_wavelength(&mut *bus).await?;
        (min, max)
    };

    Ok(format!("({:.3},{:.3})", min, max))
}

/// Current wavelength of a channel
pub async fn handle_get_wl(ctx: &AppContext, args: &str) -> HandlerResult {
    let channel = band(ctx, args)?;
    channel.ensure_power_on(&ctx.bus).await?;

    let wl = {
        let mut bus = ctx.bus.lock().await;
        channel.device().get_wavelength(&mut *bus).await?
    };
    Ok(format!("{:.3}", wl))
}

/// Tune a channel to a fixed wavelength: `band:wl`.
///
/// A sweep running on the channel is cancelled first.
pub async fn handle_set_wl(ctx: &AppContext, args: &str) -> HandlerResult {
    let [band_arg, wl_arg] = fields(args, "band:wavelength")?;
    let channel = band(ctx, band_arg)?;
    let wl: f32 = parse(wl_arg, "wavelength")?;
    if !wl.is_finite() || wl <= 0.0 {
        return Err(FilterError::argument(format!("wavelength {wl} must be positive")));
    }

    if channel.stop_sweep().await {
        info!("Channel {} sweep cancelled by set-wl", channel.name());
    }
    channel.ensure_power_on(&ctx.bus).await?;

    let mut bus = ctx.bus.lock().await;
    channel
        .device()
        .get_or_set_wavelength(&mut *bus, Some(wl))
        .await?;
    Ok(String::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::SweepParams;
    use crate::context::testing::{simulated_context, C_ADDR};
    use std::time::Duration;
    use tf1_shared::device::device_error;
    use tf1_shared::{CommandCode, PowerMode};

    #[tokio::test(start_paused = true)]
    async fn test_get_interval() {
        let (ctx, _) = simulated_context();
        assert_eq!(
            handle_get_interval(&ctx, "C").await.unwrap(),
            "(1527.608,1565.503)"
        );
        assert_eq!(
            handle_get_interval(&ctx, "l").await.unwrap(),
            "(1570.000,1605.000)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_interval_aborts_on_first_failure() {
        let (ctx, sim) = simulated_context();
        sim.fail_next_write();
        let result = handle_get_interval(&ctx, "C").await;
        assert!(matches!(result, Err(FilterError::Transport(_))));
        assert_eq!(sim.count_command(C_ADDR, CommandCode::WavelengthMax.byte()), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_wl_powers_up_filter() {
        let (ctx, sim) = simulated_context();
        assert_eq!(handle_get_wl(&ctx, "C").await.unwrap(), "1527.608");
        assert_eq!(sim.filter(C_ADDR).unwrap().power_mode(), PowerMode::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_wl() {
        let (ctx, sim) = simulated_context();
        assert_eq!(handle_set_wl(&ctx, "C:1550.5").await.unwrap(), "");
        assert_eq!(sim.filter(C_ADDR).unwrap().wavelength(), 1550.5);
        assert_eq!(sim.count_command(C_ADDR, CommandCode::Wavelength.byte()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_wl_rejects_bad_arguments_without_bus_io() {
        let (ctx, sim) = simulated_context();
        for args in ["C", "C:abc", "C:0", "C:-1550", "X:1550", "C:1550:1"] {
            let result = handle_set_wl(&ctx, args).await;
            assert!(
                matches!(result, Err(FilterError::Argument(_))),
                "{args} should be rejected"
            );
        }
        assert!(sim.transfers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_wl_out_of_range_is_device_error() {
        let (ctx, _) = simulated_context();
        let result = handle_set_wl(&ctx, "C:1600").await;
        assert_eq!(result, Err(FilterError::Device(device_error::OUT_OF_RANGE)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_wl_cancels_sweep() {
        let (ctx, sim) = simulated_context();
        let c = ctx.channels.select("C").unwrap();
        c.start_sweep(&ctx.bus, SweepParams::new(1530.0, 1540.0, 1.0, 100))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;

        handle_set_wl(&ctx, "C:1550").await.unwrap();
        assert!(c.sweep_status().await.is_none());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sim.filter(C_ADDR).unwrap().wavelength(), 1550.0);
    }
}
