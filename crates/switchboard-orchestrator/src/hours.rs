// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Weekly business-hours window in a fixed UTC offset.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, Utc};
use switchboard_config::model::{BusinessHoursConfig, OffHoursPolicy};
use switchboard_core::SwitchboardError;

#[derive(Debug, Clone)]
pub struct BusinessHours {
    offset: FixedOffset,
    open: NaiveTime,
    close: NaiveTime,
    /// Bit `n` set means ISO weekday `n` (Monday = 1) opens.
    days: u8,
    pub policy: OffHoursPolicy,
    pub note: String,
}

impl BusinessHours {
    pub fn from_config(config: &BusinessHoursConfig) -> Result<Self, SwitchboardError> {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            SwitchboardError::Config(format!(
                "business_hours.utc_offset_minutes out of range: {}",
                config.utc_offset_minutes
            ))
        })?;
        let parse = |field: &str, value: &str| {
            NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
                SwitchboardError::Config(format!("business_hours.{field} `{value}` is not HH:MM: {e}"))
            })
        };
        let mut days = 0u8;
        for &day in &config.days {
            if !(1..=7).contains(&day) {
                return Err(SwitchboardError::Config(format!(
                    "business_hours.days contains {day}; expected 1..=7"
                )));
            }
            days |= 1 << day;
        }
        Ok(Self {
            offset,
            open: parse("open", &config.open)?,
            close: parse("close", &config.close)?,
            days,
            policy: config.off_hours,
            note: config.off_hours_note.clone(),
        })
    }

    fn opens_on(&self, iso_weekday: u32) -> bool {
        self.days & (1 << iso_weekday) != 0
    }

    /// Whether `now` falls inside the window.
    ///
    /// When `close` is not after `open` the window runs past midnight, and
    /// the early-morning part belongs to the previous day's opening.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        let time = local.time();
        let today = local.weekday().number_from_monday();

        if self.open < self.close {
            return self.opens_on(today) && time >= self.open && time < self.close;
        }
        if time >= self.open {
            return self.opens_on(today);
        }
        if time < self.close {
            let yesterday = (local - Duration::days(1)).weekday().number_from_monday();
            return self.opens_on(yesterday);
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hours(open: &str, close: &str, days: Vec<u8>, offset_minutes: i32) -> BusinessHours {
        BusinessHours::from_config(&BusinessHoursConfig {
            utc_offset_minutes: offset_minutes,
            open: open.into(),
            close: close.into(),
            days,
            off_hours: OffHoursPolicy::Suppress,
            off_hours_note: "closed".into(),
        })
        .unwrap()
    }

    #[test]
    fn weekday_window_in_local_time() {
        // Bangkok, UTC+7. 2024-01-01 is a Monday.
        let h = hours("09:00", "18:00", vec![1, 2, 3, 4, 5], 7 * 60);
        let at = |d, hh, mm| Utc.with_ymd_and_hms(2024, 1, d, hh, mm, 0).unwrap();
        assert!(h.is_open(at(1, 2, 0)), "09:00 local Monday");
        assert!(!h.is_open(at(1, 1, 59)), "08:59 local");
        assert!(!h.is_open(at(1, 11, 0)), "18:00 local is closed");
        assert!(!h.is_open(at(6, 5, 0)), "Saturday");
    }

    #[test]
    fn overnight_window_belongs_to_opening_day() {
        let h = hours("20:00", "02:00", vec![5], 0);
        let at = |d, hh| Utc.with_ymd_and_hms(2024, 1, d, hh, 0, 0).unwrap();
        assert!(h.is_open(at(5, 21)), "Friday evening");
        assert!(h.is_open(at(6, 1)), "Saturday early morning continues Friday");
        assert!(!h.is_open(at(6, 21)), "Saturday evening");
        assert!(!h.is_open(at(5, 1)), "Friday early morning belongs to Thursday");
    }

    #[test]
    fn rejects_bad_config() {
        let bad = BusinessHoursConfig {
            utc_offset_minutes: 0,
            open: "9am".into(),
            close: "18:00".into(),
            days: vec![1],
            off_hours: OffHoursPolicy::Suppress,
            off_hours_note: String::new(),
        };
        assert!(BusinessHours::from_config(&bad).is_err());
        let bad_day = BusinessHoursConfig {
            open: "09:00".into(),
            days: vec![8],
            ..bad
        };
        assert!(BusinessHours::from_config(&bad_day).is_err());
    }
}
