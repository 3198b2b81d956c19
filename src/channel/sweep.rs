//! Sweep Manager
//!
//! Runs at most one background task per channel that walks the filter
//! wavelength from `min` to `max` and starts over, forever, until it is
//! cancelled. A failed step is logged and counted but never stops the sweep.

use crate::bus::BusHandle;
use crate::filter::FilterDevice;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tf1_shared::FilterError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Slack on the last point so accumulated float error never drops `max`
const STEP_TOLERANCE: f64 = 1e-6;

/// Upper bound on the points in one pass
pub const MAX_SWEEP_POINTS: u64 = 1_000_000;

/// Range and cadence of a sweep
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepParams {
    /// First wavelength, nm
    pub min: f32,
    /// Last wavelength, nm (inclusive)
    pub max: f32,
    /// Increment between points, nm
    pub step: f32,
    /// Delay after each point, ms
    pub interval_ms: u64,
}

impl SweepParams {
    pub fn new(min: f32, max: f32, step: f32, interval_ms: u64) -> Self {
        Self {
            min,
            max,
            step,
            interval_ms,
        }
    }

    /// Check `min > 0`, `max > min`, `step > 0`, `interval > 0` and that one
    /// pass stays within `MAX_SWEEP_POINTS`
    pub fn validate(&self) -> Result<(), FilterError> {
        if !self.min.is_finite() || !self.max.is_finite() || !self.step.is_finite() {
            return Err(FilterError::argument("sweep bounds must be finite"));
        }
        if self.min <= 0.0 {
            return Err(FilterError::argument(format!(
                "sweep minimum {} must be positive",
                self.min
            )));
        }
        if self.max <= self.min {
            return Err(FilterError::argument(format!(
                "sweep maximum {} must exceed minimum {}",
                self.max, self.min
            )));
        }
        if self.step <= 0.0 {
            return Err(FilterError::argument(format!(
                "sweep step {} must be positive",
                self.step
            )));
        }
        if self.interval_ms == 0 {
            return Err(FilterError::argument("sweep interval must be positive"));
        }
        if self.span() >= MAX_SWEEP_POINTS as f64 {
            return Err(FilterError::argument(format!(
                "sweep step {} too small for range {}..{} (limit {} points)",
                self.step, self.min, self.max, MAX_SWEEP_POINTS
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Number of points in one pass, both ends included
    pub fn point_count(&self) -> u64 {
        let steps = (self.span() + STEP_TOLERANCE).floor();
        if steps.is_nan() || steps < 0.0 {
            return 1;
        }
        (steps as u64).min(MAX_SWEEP_POINTS - 1) + 1
    }

    fn span(&self) -> f64 {
        (f64::from(self.max) - f64::from(self.min)) / f64::from(self.step)
    }

    /// Wavelength of point `index` in a pass
    pub fn wavelength_at(&self, index: u64) -> f32 {
        let wl = f64::from(self.min) + index as f64 * f64::from(self.step);
        wl.min(f64::from(self.max)) as f32
    }
}

/// Counters updated by a running sweep
#[derive(Debug, Default)]
pub struct SweepStats {
    steps: AtomicU64,
    failed_steps: AtomicU64,
}

impl SweepStats {
    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::Relaxed)
    }

    pub fn failed_steps(&self) -> u64 {
        self.failed_steps.load(Ordering::Relaxed)
    }

    fn record(&self, ok: bool) {
        self.steps.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.failed_steps.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Snapshot of a running sweep
#[derive(Debug, Clone, PartialEq)]
pub struct SweepStatus {
    pub params: SweepParams,
    pub steps: u64,
    pub failed_steps: u64,
}

impl fmt::Display for SweepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "running min={:.3},max={:.3},step={:.3},interval={}ms,steps={},failed={}",
            self.params.min,
            self.params.max,
            self.params.step,
            self.params.interval_ms,
            self.steps,
            self.failed_steps
        )
    }
}

/// Handle to the background task of one channel
pub struct SweepTask {
    params: SweepParams,
    stats: Arc<SweepStats>,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SweepTask {
    /// Spawn the sweep loop for `device`
    pub fn spawn(channel: char, device: FilterDevice, bus: BusHandle, params: SweepParams) -> Self {
        let stats = Arc::new(SweepStats::default());
        let token = CancellationToken::new();

        let handle = tokio::spawn(run_sweep(
            channel,
            device,
            bus,
            params,
            stats.clone(),
            token.clone(),
        ));

        Self {
            params,
            stats,
            token,
            handle,
        }
    }

    pub fn status(&self) -> SweepStatus {
        SweepStatus {
            params: self.params,
            steps: self.stats.steps(),
            failed_steps: self.stats.failed_steps(),
        }
    }

    /// Cancel the task and wait until it has exited
    pub async fn cancel(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            warn!("[SWEEP] Task ended abnormally: {}", e);
        }
    }
}

async fn run_sweep(
    channel: char,
    device: FilterDevice,
    bus: BusHandle,
    params: SweepParams,
    stats: Arc<SweepStats>,
    token: CancellationToken,
) {
    info!(
        "[SWEEP] Channel {} sweeping {:.3}-{:.3} nm, step {:.3} nm every {} ms",
        channel, params.min, params.max, params.step, params.interval_ms
    );

    let points = params.point_count();
    'sweep: loop {
        for index in 0..points {
            let wl = params.wavelength_at(index);

            let result = tokio::select! {
                biased;
                _ = token.cancelled() => break 'sweep,
                mut guard = bus.lock() => device.get_or_set_wavelength(&mut *guard, Some(wl)).await,
            };

            match result {
                Ok(_) => {
                    debug!("[SWEEP] Channel {} at {:.3} nm", channel, wl);
                    stats.record(true);
                }
                Err(e) => {
                    warn!("[SWEEP] Channel {} step to {:.3} nm failed: {}", channel, wl, e);
                    stats.record(false);
                }
            }

            tokio::select! {
                biased;
                _ = token.cancelled() => break 'sweep,
                _ = tokio::time::sleep(params.interval()) => {}
            }
        }
    }

    info!(
        "[SWEEP] Channel {} stopped after {} steps ({} failed)",
        channel,
        stats.steps(),
        stats.failed_steps()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(SweepParams::new(1570.0, 1605.0, 0.5, 1000).validate().is_ok());

        let rejected = [
            SweepParams::new(0.0, 1605.0, 0.5, 1000),
            SweepParams::new(-1.0, 1605.0, 0.5, 1000),
            SweepParams::new(1570.0, 1570.0, 0.5, 1000),
            SweepParams::new(1605.0, 1570.0, 0.5, 1000),
            SweepParams::new(1570.0, 1605.0, 0.0, 1000),
            SweepParams::new(1570.0, 1605.0, -0.5, 1000),
            SweepParams::new(1570.0, 1605.0, 0.5, 0),
            SweepParams::new(f32::NAN, 1605.0, 0.5, 1000),
            SweepParams::new(1.0, 1.0e30, 1.0e-10, 100),
            SweepParams::new(1570.0, 1605.0, f32::MIN_POSITIVE, 100),
            SweepParams::new(1570.0, 1605.0, 0.00001, 100),
        ];
        for params in rejected {
            assert!(
                matches!(params.validate(), Err(FilterError::Argument(_))),
                "{:?} should be rejected",
                params
            );
        }
    }

    #[test]
    fn test_points_include_max() {
        let params = SweepParams::new(1570.0, 1605.0, 0.5, 100);
        assert_eq!(params.point_count(), 71);
        assert_eq!(params.wavelength_at(0), 1570.0);
        assert_eq!(params.wavelength_at(70), 1605.0);

        // 0.1 is not exact in binary; the last point must survive anyway
        let params = SweepParams::new(1550.0, 1551.0, 0.1, 100);
        assert_eq!(params.point_count(), 11);
        assert_eq!(params.wavelength_at(10), 1551.0);
    }

    #[test]
    fn test_point_count_is_bounded() {
        let params = SweepParams::new(1.0, 1.0e30, 1.0e-10, 100);
        assert_eq!(params.point_count(), MAX_SWEEP_POINTS);

        let params = SweepParams::new(1570.0, 1605.0, 0.0009765625, 100);
        assert!(params.validate().is_ok());
        assert_eq!(params.point_count(), 35_841);
    }

    #[test]
    fn test_step_larger_than_span() {
        let params = SweepParams::new(1550.0, 1551.0, 5.0, 100);
        assert_eq!(params.point_count(), 1);
    }

    #[test]
    fn test_status_format() {
        let status = SweepStatus {
            params: SweepParams::new(1570.0, 1605.0, 0.5, 1000),
            steps: 12,
            failed_steps: 1,
        };
        assert_eq!(
            status.to_string(),
            "running min=1570.000,max=1605.000,step=0.500,interval=1000ms,steps=12,failed=1"
        );
    }
}
