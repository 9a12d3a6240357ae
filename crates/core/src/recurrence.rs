//! Recurrence arithmetic for scheduled notifications.

use chrono::{Duration, Months, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    Once,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(self) -> &'static str {
        match self {
            Recurrence::Once => "once",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "once" => Some(Recurrence::Once),
            "daily" => Some(Recurrence::Daily),
            "weekly" => Some(Recurrence::Weekly),
            "monthly" => Some(Recurrence::Monthly),
            _ => None,
        }
    }
}

/// Compute the next `next_run_at` after a run that was due at `previous`.
///
/// - `Once` never runs again.
/// - `Daily` runs at `scheduled_time` today if that is still ahead of `now`,
///   otherwise tomorrow.
/// - `Weekly` / `Monthly` add a fixed 7 days / one calendar month to
///   `previous`, repeatedly, until the result is after `now`. Missed
///   periods are skipped rather than replayed.
pub fn next_run_after(
    recurrence: Recurrence,
    scheduled_time: NaiveTime,
    previous: Timestamp,
    now: Timestamp,
) -> Option<Timestamp> {
    match recurrence {
        Recurrence::Once => None,
        Recurrence::Daily => {
            let today = now.date_naive().and_time(scheduled_time).and_utc();
            if today > now {
                Some(today)
            } else {
                Some(today + Duration::days(1))
            }
        }
        Recurrence::Weekly => advance_past(previous, now, |t| Some(t + Duration::days(7))),
        Recurrence::Monthly => advance_past(previous, now, |t| t.checked_add_months(Months::new(1))),
    }
}

fn advance_past<F>(mut at: Timestamp, now: Timestamp, step: F) -> Option<Timestamp>
where
    F: Fn(Timestamp) -> Option<Timestamp>,
{
    loop {
        at = step(at)?;
        if at > now {
            return Some(at);
        }
    }
}
