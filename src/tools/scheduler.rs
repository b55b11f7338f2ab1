//! Twice-daily trigger for the scheduled job, pinned to India Standard Time.

use crate::core::AppState;
use crate::tools::cron_job::run_scheduled_job;
use crate::types::RunSummary;
use chrono::{DateTime, Duration, FixedOffset, Offset, TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Asia/Kolkata has no DST, so a fixed +05:30 offset is exact.
pub const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Local hours (minute 0) at which the job fires.
pub const FIRE_HOURS: [u32; 2] = [6, 18];

pub fn ist() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Wall-clock source for run timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IstClock;

impl Clock for IstClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&ist())
    }
}

/// First fire time strictly after `now`, expressed in IST.
pub fn next_fire_after(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let tz = ist();
    let local = now.with_timezone(&tz);
    for day in 0..=1 {
        let date = local.date_naive() + Duration::days(day);
        for hour in FIRE_HOURS {
            let candidate = date
                .and_hms_opt(hour, 0, 0)
                .and_then(|naive| tz.from_local_datetime(&naive).single());
            if let Some(c) = candidate {
                if c > local {
                    return c;
                }
            }
        }
    }
    local + Duration::hours(12)
}

/// What happened when a run was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Finished(RunSummary),
    /// Pending list could not be fetched; nothing was written.
    Aborted,
    /// Another run holds the lock.
    Busy,
    /// Sheet store or browser missing from configuration.
    Unavailable(String),
}

/// Run the scheduled job unless one is already in flight.
pub async fn run_if_idle(state: &AppState, clock: &dyn Clock) -> RunOutcome {
    let Ok(_guard) = state.cron_lock.try_lock() else {
        info!("[SCHEDULER] run already in progress, skipping");
        return RunOutcome::Busy;
    };
    let Some(store) = state.sheets.as_ref() else {
        return RunOutcome::Unavailable("spreadsheet is not configured".into());
    };
    let Some(launcher) = state.launcher.as_ref() else {
        return RunOutcome::Unavailable("no Chromium-family browser found".into());
    };
    match run_scheduled_job(store.as_ref(), launcher.as_ref(), &state.heartbeat, clock).await {
        Some(summary) => RunOutcome::Finished(summary),
        None => RunOutcome::Aborted,
    }
}

/// Sleep until each fire time and run the job, forever.
pub async fn run_scheduler(state: Arc<AppState>) {
    info!("[SCHEDULER] Cron job scheduled for 6:00 AM and 6:00 PM IST daily");
    loop {
        let now = IstClock.now();
        let next = next_fire_after(now);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("[SCHEDULER] next run at {}", next.format("%Y-%m-%d %H:%M:%S %:z"));
        tokio::time::sleep(wait).await;

        match run_if_idle(&state, &IstClock).await {
            RunOutcome::Finished(s) => info!(
                "[SCHEDULER] run finished: {} updated, {} without product",
                s.updated_with_product, s.have_no_product
            ),
            RunOutcome::Aborted => warn!("[SCHEDULER] run aborted: sheet fetch failed"),
            RunOutcome::Busy => {}
            RunOutcome::Unavailable(why) => warn!("[SCHEDULER] run skipped: {}", why),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn morning_before_six_fires_same_day() {
        assert_eq!(
            next_fire_after(at("2025-03-10T05:59:00+05:30")),
            at("2025-03-10T06:00:00+05:30")
        );
    }

    #[test]
    fn exactly_at_fire_time_moves_to_next_slot() {
        assert_eq!(
            next_fire_after(at("2025-03-10T06:00:00+05:30")),
            at("2025-03-10T18:00:00+05:30")
        );
    }

    #[test]
    fn evening_rolls_over_to_next_morning() {
        assert_eq!(
            next_fire_after(at("2025-12-31T18:30:00+05:30")),
            at("2026-01-01T06:00:00+05:30")
        );
    }

    #[test]
    fn utc_input_is_converted_to_ist() {
        // 00:15 UTC is 05:45 IST.
        let next = next_fire_after(at("2025-03-10T00:15:00+00:00"));
        assert_eq!(next, at("2025-03-10T06:00:00+05:30"));
        assert_eq!(next.offset().local_minus_utc(), IST_OFFSET_SECS);
    }
}
