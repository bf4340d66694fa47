// ── Periodic reported-state producer ──
//
// Stands in for the sensor loop: on every tick while connected, send a
// small status document. A failed or skipped report is simply superseded
// by the next tick.

use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use devlink_core::{CoordinatorHandle, CoreError, log_report_completion};

pub fn payload(uptime: Duration, retry_count: u32) -> Value {
    json!({
        "uptime_secs": uptime.as_secs(),
        "retry_count": retry_count,
    })
}

pub async fn run(handle: CoordinatorHandle, every: Duration, cancel: CancellationToken) {
    let booted = Instant::now();
    let mut ticker = tokio::time::interval_at(booted + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let retry_count = handle.snapshot().retry_count;
        let report = payload(booted.elapsed(), retry_count);
        match handle.send_reported_state(report, log_report_completion("telemetry")) {
            Ok(()) => debug!("reported state queued"),
            Err(CoreError::NotConnected) => trace!("not connected; report skipped"),
            Err(e) => warn!(error = %e, "report not sent"),
        }
    }
    debug!("report producer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_carries_uptime_and_retries() {
        assert_eq!(
            payload(Duration::from_millis(12_900), 3),
            json!({ "uptime_secs": 12, "retry_count": 3 })
        );
    }
}
