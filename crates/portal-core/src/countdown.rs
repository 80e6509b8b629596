//! Meeting countdown
//!
//! The target is persisted under [`MEETING_DATE_KEY`] as RFC 3339 and falls
//! back to the configured default when nothing valid is saved.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::config::AppConfig;
use crate::prefs::{PreferenceStore, MEETING_DATE_KEY};

const SECOND_MS: i64 = 1_000;
const MINUTE_MS: i64 = 60 * SECOND_MS;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Whole days/hours/minutes/seconds until a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TimeRemaining {
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    /// The target is now or in the past
    pub overdue: bool,
}

impl TimeRemaining {
    /// Zero-padded clock label, e.g. `03d 04h 05m 06s`.
    pub fn label(&self) -> String {
        format!(
            "{:02}d {:02}h {:02}m {:02}s",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Split the time from `now` to `target` into whole units.
///
/// Any non-positive difference is reported as zero and overdue.
pub fn time_remaining(target: DateTime<Utc>, now: DateTime<Utc>) -> TimeRemaining {
    let diff = target.timestamp_millis() - now.timestamp_millis();
    if diff <= 0 {
        return TimeRemaining {
            overdue: true,
            ..TimeRemaining::default()
        };
    }

    TimeRemaining {
        days: diff / DAY_MS,
        hours: (diff % DAY_MS) / HOUR_MS,
        minutes: (diff % HOUR_MS) / MINUTE_MS,
        seconds: (diff % MINUTE_MS) / SECOND_MS,
        overdue: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownState {
    /// No target saved and no default configured
    NotConfigured,
    Running(TimeRemaining),
    /// The target has been reached
    Arrived,
}

/// Countdown target backed by a preference store.
#[derive(Debug, Clone)]
pub struct Countdown<P> {
    prefs: P,
    default_target: Option<DateTime<Utc>>,
    target: Option<DateTime<Utc>>,
}

impl<P: PreferenceStore> Countdown<P> {
    /// Load the saved target, falling back to the configured default.
    pub fn load(prefs: P, config: &AppConfig) -> Self {
        let default_target = config.default_meeting_target;
        let target = Self::stored_target(&prefs).or(default_target);
        Self {
            prefs,
            default_target,
            target,
        }
    }

    pub const fn target(&self) -> Option<DateTime<Utc>> {
        self.target
    }

    /// Use `target` from now on. Returns whether it was persisted; the
    /// target applies to this countdown either way.
    pub fn set_target(&mut self, target: DateTime<Utc>) -> bool {
        self.target = Some(target);
        let persisted = self.prefs.set(MEETING_DATE_KEY, &target.to_rfc3339());
        if persisted {
            tracing::info!("Meeting date set to {}", target.to_rfc3339());
        }
        persisted
    }

    /// Forget the saved target and return to the configured default.
    pub fn clear_target(&mut self) -> bool {
        self.target = self.default_target;
        self.prefs.remove(MEETING_DATE_KEY)
    }

    pub fn state(&self, now: DateTime<Utc>) -> CountdownState {
        let Some(target) = self.target else {
            return CountdownState::NotConfigured;
        };
        let remaining = time_remaining(target, now);
        if remaining.overdue {
            CountdownState::Arrived
        } else {
            CountdownState::Running(remaining)
        }
    }

    fn stored_target(prefs: &P) -> Option<DateTime<Utc>> {
        let stored = prefs.get(MEETING_DATE_KEY)?;
        match DateTime::parse_from_rfc3339(stored.trim()) {
            Ok(target) => Some(target.with_timezone(&Utc)),
            Err(error) => {
                tracing::warn!("Ignoring saved meeting date '{}': {}", stored, error);
                None
            }
        }
    }
}

/// One-second refresh ticks for a running countdown display.
///
/// Must be called inside a tokio runtime.
pub fn ticks() -> Interval {
    let mut ticks = interval(Duration::from_secs(1));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::MemoryPreferenceStore;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    #[test]
    fn splits_difference_into_units() {
        let remaining = time_remaining(at(90_061_000), at(0));
        assert_eq!(
            remaining,
            TimeRemaining {
                days: 1,
                hours: 1,
                minutes: 1,
                seconds: 1,
                overdue: false,
            }
        );
        assert_eq!(remaining.label(), "01d 01h 01m 01s");
    }

    #[test]
    fn truncates_partial_seconds() {
        let remaining = time_remaining(at(1_999), at(0));
        assert_eq!(remaining.seconds, 1);
        assert!(!remaining.overdue);
    }

    #[test]
    fn past_and_present_targets_are_overdue() {
        for target in [at(0), at(-5_000)] {
            let remaining = time_remaining(target, at(0));
            assert!(remaining.overdue);
            assert_eq!(remaining.days + remaining.hours + remaining.seconds, 0);
        }
    }

    #[test]
    fn falls_back_to_configured_default() {
        let config = AppConfig::default();
        let countdown = Countdown::load(MemoryPreferenceStore::new(), &config);
        assert_eq!(countdown.target(), config.default_meeting_target);
    }

    #[test]
    fn saved_target_wins_and_survives_reload() {
        let prefs = MemoryPreferenceStore::new();
        let config = AppConfig::default();
        let target = Utc.with_ymd_and_hms(2030, 1, 2, 3, 4, 5).unwrap();

        let mut countdown = Countdown::load(prefs.clone(), &config);
        assert!(countdown.set_target(target));

        let reloaded = Countdown::load(prefs, &config);
        assert_eq!(reloaded.target(), Some(target));
    }

    #[test]
    fn corrupt_saved_value_is_ignored() {
        let prefs = MemoryPreferenceStore::new();
        prefs.set(MEETING_DATE_KEY, "next tuesday");
        let config = AppConfig::default();

        let countdown = Countdown::load(prefs, &config);
        assert_eq!(countdown.target(), config.default_meeting_target);
    }

    #[test]
    fn clear_restores_default() {
        let prefs = MemoryPreferenceStore::new();
        let config = AppConfig::default();
        let mut countdown = Countdown::load(prefs.clone(), &config);
        countdown.set_target(at(5_000));

        assert!(countdown.clear_target());
        assert_eq!(countdown.target(), config.default_meeting_target);
        assert_eq!(prefs.get(MEETING_DATE_KEY), None);
    }

    #[test]
    fn state_reports_each_phase() {
        let config = AppConfig {
            default_meeting_target: None,
            ..AppConfig::default()
        };
        let mut countdown = Countdown::load(MemoryPreferenceStore::new(), &config);
        assert_eq!(countdown.state(at(0)), CountdownState::NotConfigured);

        countdown.set_target(at(61_000));
        assert!(matches!(
            countdown.state(at(0)),
            CountdownState::Running(TimeRemaining { minutes: 1, seconds: 1, .. })
        ));
        assert_eq!(countdown.state(at(61_000)), CountdownState::Arrived);
    }

    #[test]
    fn unavailable_storage_still_applies_target() {
        let prefs = MemoryPreferenceStore::new();
        prefs.set_disabled(true);
        let mut countdown = Countdown::load(prefs, &AppConfig::default());

        assert!(!countdown.set_target(at(10_000)));
        assert_eq!(countdown.target(), Some(at(10_000)));
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_fire_every_second() {
        let mut ticks = ticks();
        let first = ticks.tick().await;
        let second = ticks.tick().await;
        assert_eq!(second - first, Duration::from_secs(1));
    }
}
