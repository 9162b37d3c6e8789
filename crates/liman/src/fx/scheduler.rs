use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::FxRateProvider;
use crate::deadline::Deadline;

const REFRESH_BUDGET: Duration = Duration::from_secs(120);

/// Europe/Istanbul has stayed on UTC+3 all year since 2016.
pub fn istanbul_offset() -> FixedOffset {
    FixedOffset::east_opt(3 * 60 * 60).unwrap_or_else(|| Utc.fix())
}

/// Refresh today's rates every day at `at` local time. Failures are logged and the loop
/// keeps going; the task ends only when aborted.
pub fn spawn_daily_refresh(provider: Arc<FxRateProvider>, at: NaiveTime) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now().with_timezone(&istanbul_offset());
            let wait = delay_until_next_run(now, at);
            info!(refresh_at = %at, wait_secs = wait.as_secs(), "scheduled fx refresh");
            tokio::time::sleep(wait).await;

            let today = Utc::now().with_timezone(&istanbul_offset()).date_naive();
            match provider
                .refresh(today, Deadline::after(REFRESH_BUDGET))
                .await
            {
                Ok(snapshot) => info!(
                    requested_date = %today,
                    effective_date = %snapshot.effective_date,
                    source = snapshot.source.label(),
                    "fx refresh completed"
                ),
                Err(err) => warn!(requested_date = %today, error = %err, "fx refresh failed"),
            }
        }
    })
}

/// Time from `now` until the next occurrence of `at` on the local clock of `now`.
pub fn delay_until_next_run(now: DateTime<FixedOffset>, at: NaiveTime) -> Duration {
    let local = now.naive_local();
    let today_at = local.date().and_time(at);
    let target = if local < today_at {
        today_at
    } else {
        today_at + chrono::Duration::days(1)
    };
    (target - local).to_std().unwrap_or(Duration::ZERO)
}
