//! Disparo diario: hora fija en UTC.
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid daily schedule '{0}' (expected 'M H * * *' or 'HH:MM')")]
pub struct ScheduleParseError(pub String);

/// Cadencia diaria a `hour:minute` UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    hour: u32,
    minute: u32,
}

impl DailySchedule {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    /// Próximo disparo estrictamente posterior a `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN);
        let today = now.date_naive().and_time(time).and_utc();
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

impl Default for DailySchedule {
    /// 01:00 UTC.
    fn default() -> Self {
        Self { hour: 1, minute: 0 }
    }
}

impl FromStr for DailySchedule {
    type Err = ScheduleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ScheduleParseError(s.to_string());
        let trimmed = s.trim();
        let (hour, minute) = if let Some((h, m)) = trimmed.split_once(':') {
            (h.trim(), m.trim())
        } else {
            // Cron de 5 campos; sólo se acepta la forma diaria.
            let fields: Vec<&str> = trimmed.split_whitespace().collect();
            match fields.as_slice() {
                [m, h, "*", "*", "*"] => (*h, *m),
                _ => return Err(err()),
            }
        };
        let hour: u32 = hour.parse().map_err(|_| err())?;
        let minute: u32 = minute.parse().map_err(|_| err())?;
        Self::new(hour, minute).ok_or_else(err)
    }
}

impl fmt::Display for DailySchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02} UTC", self.hour, self.minute)
    }
}
