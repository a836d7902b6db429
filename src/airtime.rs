//! Airtime gate: decides whether a series is due for polling this invocation
//!
//! A series with an airtime is only checked close to its weekly airing. The airtime's weekday and
//! time of day are projected onto the current week (the next occurrence on or after today, in the
//! airtime's zone) and `now` must lie within `[airing - grace, airing + grace]`. When that misses,
//! the same window one week earlier is tried, which catches an airing that slipped past midnight
//! into the next weekday before the run happened.

use crate::rule::SeriesRule;
use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use tracing::{debug, warn};

/// Outcome of the gate for one series
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateDecision {
    /// Series has no airtime and is checked every run
    Unscheduled,
    /// `now` is within the grace window of this week's airing
    CurrentWeek {
        /// The airing that matched
        airs_at: DateTime<Utc>,
    },
    /// `now` is within the grace window of last week's airing
    PreviousWeek {
        /// The airing that matched
        aired_at: DateTime<Utc>,
    },
    /// Neither window contains `now`
    NotDue {
        /// Upcoming airing, if it could be resolved in the airtime's zone
        next_airing: Option<DateTime<Utc>>,
    },
}

impl GateDecision {
    /// Whether the series should be polled
    pub fn is_due(self) -> bool {
        !matches!(self, GateDecision::NotDue { .. })
    }
}

/// Evaluate the gate for `rule` at `now`
///
/// Airtimes without an explicit offset are interpreted in `reference`.
pub fn evaluate(rule: &SeriesRule, now: DateTime<Utc>, reference: Tz) -> GateDecision {
    let Some(airtime) = rule.airtime else {
        return GateDecision::Unscheduled;
    };

    match airtime.offset() {
        Some(offset) => decide(
            airtime.weekday(),
            airtime.time(),
            rule.grace_period,
            now,
            &offset,
        ),
        None => decide(
            airtime.weekday(),
            airtime.time(),
            rule.grace_period,
            now,
            &reference,
        ),
    }
}

/// Whether `rule` should be checked at `now`
pub fn should_check(rule: &SeriesRule, now: DateTime<Utc>, reference: Tz) -> bool {
    match evaluate(rule, now, reference) {
        GateDecision::Unscheduled => true,
        GateDecision::CurrentWeek { airs_at } => {
            debug!(series = %rule.id, %airs_at, "Within airtime window");
            true
        }
        GateDecision::PreviousWeek { aired_at } => {
            warn!(
                series = %rule.id,
                %aired_at,
                "Within last week's airtime window, checking missed episode"
            );
            true
        }
        GateDecision::NotDue { next_airing } => {
            debug!(series = %rule.id, ?next_airing, "Not within airtime window, skipping");
            false
        }
    }
}

fn decide<T: TimeZone>(
    weekday: Weekday,
    time: NaiveTime,
    grace: TimeDelta,
    now: DateTime<Utc>,
    tz: &T,
) -> GateDecision {
    let today = now.with_timezone(tz).date_naive();
    let ahead = (7 + weekday.num_days_from_monday() - today.weekday().num_days_from_monday()) % 7;

    let Some(airing_date) = today.checked_add_days(Days::new(u64::from(ahead))) else {
        return GateDecision::NotDue { next_airing: None };
    };

    let airing = occurrence(tz, airing_date, time);
    if let Some(airs_at) = airing.filter(|at| within(now, *at, grace)) {
        return GateDecision::CurrentWeek { airs_at };
    }

    // Secondary window: the same slot one week earlier
    let previous = airing_date
        .checked_sub_days(Days::new(7))
        .and_then(|date| occurrence(tz, date, time));
    if let Some(aired_at) = previous.filter(|at| within(now, *at, grace)) {
        return GateDecision::PreviousWeek { aired_at };
    }

    GateDecision::NotDue {
        next_airing: airing,
    }
}

fn occurrence<T: TimeZone>(tz: &T, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn within(now: DateTime<Utc>, airing: DateTime<Utc>, grace: TimeDelta) -> bool {
    now >= airing - grace && now <= airing + grace
}
