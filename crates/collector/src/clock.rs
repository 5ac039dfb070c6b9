//! Funding settlement schedule.
//!
//! Settlements fall on whole UTC hours taken from a fixed daily cycle. Every
//! call recomputes the schedule from the reference instant; nothing is kept.

use chrono::{DateTime, Duration, NaiveDate, Utc};

/// Daily settlement cycle as a set of UTC hours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingSchedule {
    hours: Vec<u32>,
}

impl Default for FundingSchedule {
    fn default() -> Self {
        Self::hourly()
    }
}

impl FundingSchedule {
    /// A settlement candidate at every hour of the day.
    pub fn hourly() -> Self {
        Self {
            hours: (0..24).collect(),
        }
    }

    /// Returns `None` if no valid hour (0..=23) is given.
    pub fn new(hours: impl IntoIterator<Item = u32>) -> Option<Self> {
        let mut hours: Vec<u32> = hours.into_iter().filter(|h| *h < 24).collect();
        hours.sort_unstable();
        hours.dedup();
        if hours.is_empty() {
            None
        } else {
            Some(Self { hours })
        }
    }

    pub fn hours(&self) -> &[u32] {
        &self.hours
    }

    /// Settlements of `now`'s day plus the last one of the previous day and
    /// the first one of the next day.
    ///
    /// Ordered by distance to `now`; instants more than an hour in the past
    /// come last. The order is only a hint, callers still test every entry.
    pub fn scheduled_instants(&self, now: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let today = now.date_naive();

        let mut instants: Vec<DateTime<Utc>> = self
            .hours
            .iter()
            .filter_map(|h| at_hour(today, *h))
            .collect();

        // boundary crossings at midnight
        if let (Some(prev_day), Some(last)) = (today.pred_opt(), self.hours.last()) {
            instants.extend(at_hour(prev_day, *last));
        }
        if let (Some(next_day), Some(first)) = (today.succ_opt(), self.hours.first()) {
            instants.extend(at_hour(next_day, *first));
        }

        let stale_before = now - Duration::hours(1);
        instants.sort_by_key(|t| {
            (
                *t < stale_before,
                t.signed_duration_since(now).num_milliseconds().abs(),
                *t,
            )
        });
        instants
    }

    /// Earliest scheduled settlement strictly after `now`.
    pub fn next_upcoming(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.scheduled_instants(now)
            .into_iter()
            .filter(|t| *t > now)
            .min()
    }
}

fn at_hour(date: NaiveDate, hour: u32) -> Option<DateTime<Utc>> {
    date.and_hms_opt(hour, 0, 0)
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

/// Signed minutes from `now` to `instant`; positive when `instant` is ahead.
pub fn minutes_until(instant: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    instant.signed_duration_since(now).num_milliseconds() as f64 / 60_000.0
}

/// Signed minutes elapsed since `instant`; positive once it has passed.
pub fn minutes_since(instant: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    -minutes_until(instant, now)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::{TimeZone, Timelike};

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_scheduled_instants_cover_day_and_neighbours() {
        let schedule = FundingSchedule::hourly();
        let refs = [
            utc(2025, 8, 2, 0, 0, 0),
            utc(2025, 8, 2, 15, 35, 12),
            utc(2025, 8, 2, 23, 59, 59),
            utc(2024, 12, 31, 23, 30, 0),
            utc(2024, 2, 29, 0, 10, 0),
        ];

        for now in refs {
            let instants = schedule.scheduled_instants(now);
            assert_eq!(instants.len(), 26, "reference {}", now);

            let unique: HashSet<_> = instants.iter().collect();
            assert_eq!(unique.len(), instants.len());

            for t in &instants {
                assert_eq!(t.minute(), 0);
                assert_eq!(t.second(), 0);
                assert_eq!(t.nanosecond(), 0);
            }

            let today = now.date_naive();
            for h in 0..24 {
                assert!(instants.contains(&at_hour(today, h).unwrap()));
            }
            assert!(instants.contains(&at_hour(today.pred_opt().unwrap(), 23).unwrap()));
            assert!(instants.contains(&at_hour(today.succ_opt().unwrap(), 0).unwrap()));
        }
    }

    #[test]
    fn test_scheduled_instants_ordering_hint() {
        let now = utc(2025, 8, 2, 15, 35, 0);
        let instants = FundingSchedule::hourly().scheduled_instants(now);

        assert_eq!(instants[0], utc(2025, 8, 2, 16, 0, 0));
        assert_eq!(instants[1], utc(2025, 8, 2, 15, 0, 0));
        // more than an hour in the past goes to the back
        let stale_from = instants
            .iter()
            .position(|t| *t < now - Duration::hours(1))
            .unwrap();
        assert!(instants[stale_from..]
            .iter()
            .all(|t| *t < now - Duration::hours(1)));
        assert_eq!(*instants.last().unwrap(), utc(2025, 8, 1, 23, 0, 0));
    }

    #[test]
    fn test_custom_cycle_boundaries() {
        let schedule = FundingSchedule::new([16, 0, 8, 8, 30]).unwrap();
        assert_eq!(schedule.hours(), &[0, 8, 16]);

        let mut instants = schedule.scheduled_instants(utc(2025, 8, 2, 10, 0, 0));
        instants.sort();
        assert_eq!(
            instants,
            vec![
                utc(2025, 8, 1, 16, 0, 0),
                utc(2025, 8, 2, 0, 0, 0),
                utc(2025, 8, 2, 8, 0, 0),
                utc(2025, 8, 2, 16, 0, 0),
                utc(2025, 8, 3, 0, 0, 0),
            ]
        );

        assert!(FundingSchedule::new([24, 99]).is_none());
    }

    #[test]
    fn test_next_upcoming() {
        let schedule = FundingSchedule::hourly();
        assert_eq!(
            schedule.next_upcoming(utc(2025, 8, 2, 15, 35, 0)),
            Some(utc(2025, 8, 2, 16, 0, 0))
        );
        assert_eq!(
            schedule.next_upcoming(utc(2025, 8, 2, 23, 40, 0)),
            Some(utc(2025, 8, 3, 0, 0, 0))
        );
        // exactly on a settlement, the next one is an hour away
        assert_eq!(
            schedule.next_upcoming(utc(2025, 8, 2, 16, 0, 0)),
            Some(utc(2025, 8, 2, 17, 0, 0))
        );
    }

    #[test]
    fn test_minutes_until_is_antisymmetric() {
        let a = utc(2025, 8, 2, 16, 0, 0);
        let b = utc(2025, 8, 2, 15, 35, 30);

        assert_eq!(minutes_until(a, b), 24.5);
        assert_eq!(minutes_until(a, b), -minutes_until(b, a));
        assert_eq!(minutes_since(a, b), -24.5);
        assert_eq!(minutes_until(a, a), 0.0);
    }
}
