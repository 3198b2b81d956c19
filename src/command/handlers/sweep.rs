//! Sweep handlers: `sweep`, `stop`, `sweep-status`

use super::{band, fields, parse, HandlerResult};
use crate::channel::SweepParams;
use crate::context::AppContext;

/// Start (or replace) a sweep: `band:min:max:step:interval_ms`
pub async fn handle_sweep(ctx: &AppContext, args: &str) -> HandlerResult {
    let [band_arg, min, max, step, interval] = fields(args, "band:min:max:step:interval_ms")?;
    let channel = band(ctx, band_arg)?;

    let params = SweepParams::new(
        parse(min, "minimum wavelength")?,
        parse(max, "maximum wavelength")?,
        parse(step, "step")?,
        parse(interval, "interval")?,
    );
    channel.start_sweep(&ctx.bus, params).await?;
    Ok(String::new())
}

/// Cancel a channel's sweep
pub async fn handle_stop(ctx: &AppContext, args: &str) -> HandlerResult {
    let channel = band(ctx, args)?;
    let text = if channel.stop_sweep().await {
        "stopped"
    } else {
        "idle"
    };
    Ok(text.to_string())
}

pub async fn handle_sweep_status(ctx: &AppContext, args: &str) -> HandlerResult {
    let channel = band(ctx, args)?;
    Ok(match channel.sweep_status().await {
        Some(status) => status.to_string(),
        None => "idle".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tf1_shared::FilterError;

    use crate::context::testing::simulated_context;

    #[tokio::test(start_paused = true)]
    async fn test_sweep_lifecycle() {
        let (ctx, _) = simulated_context();
        assert_eq!(handle_sweep_status(&ctx, "L").await.unwrap(), "idle");

        handle_sweep(&ctx, "L:1570:1605:0.5:1000").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let status = handle_sweep_status(&ctx, "L").await.unwrap();
        assert!(
            status.starts_with("running min=1570.000,max=1605.000,step=0.500,interval=1000ms"),
            "{status}"
        );

        assert_eq!(handle_stop(&ctx, "l").await.unwrap(), "stopped");
        assert_eq!(handle_stop(&ctx, "L").await.unwrap(), "idle");
        assert_eq!(handle_sweep_status(&ctx, "L").await.unwrap(), "idle");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_argument_errors() {
        let (ctx, sim) = simulated_context();
        for args in [
            "L:1570:1605:0.5",
            "L:a:1605:0.5:1000",
            "L:1570:1605:0.5:-5",
            "L:0:1605:0.5:1000",
            "L:1605:1570:0.5:1000",
            "L:1570:1605:0:1000",
            "L:1570:1605:0.5:0",
            "Z:1570:1605:0.5:1000",
            "L:1570:1605:0.5:1000.5",
            "L:1570:1605:0.00001:1000",
            "C:1:1e30:1e-10:100",
        ] {
            let result = handle_sweep(&ctx, args).await;
            assert!(
                matches!(result, Err(FilterError::Argument(_))),
                "{args} should be rejected"
            );
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(sim.transfers().is_empty());
    }
}
