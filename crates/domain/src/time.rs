//! Clock-of-day and weekday helpers used by schedule-driven scenes.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A wall-clock time of day, rendered as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime(NaiveTime);

impl ClockTime {
    /// Build a clock time from hour and minute.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidClockTime`] if the values are out of range.
    pub fn from_hm(hour: u32, minute: u32) -> Result<Self, ValidationError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| ValidationError::InvalidClockTime(format!("{hour}:{minute}")))
    }

    #[must_use]
    pub fn hour(self) -> u32 {
        self.0.hour()
    }

    #[must_use]
    pub fn minute(self) -> u32 {
        self.0.minute()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0.hour(), self.0.minute())
    }
}

impl FromStr for ClockTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| ValidationError::InvalidClockTime(s.to_string()))
    }
}

impl Serialize for ClockTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClockTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Seven-day recurrence mask, Sunday first, as the cloud expects (`"1111111"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Weekdays([bool; 7]);

impl Weekdays {
    /// Every day of the week.
    pub const EVERY_DAY: Self = Self([true; 7]);

    /// Whether the mask includes at least one day.
    #[must_use]
    pub fn any(self) -> bool {
        self.0.iter().any(|day| *day)
    }
}

impl Default for Weekdays {
    fn default() -> Self {
        Self::EVERY_DAY
    }
}

impl fmt::Display for Weekdays {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for day in self.0 {
            f.write_str(if day { "1" } else { "0" })?;
        }
        Ok(())
    }
}

impl FromStr for Weekdays {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut days = [false; 7];
        let mut count = 0;
        for (idx, ch) in s.chars().enumerate() {
            if idx >= 7 {
                return Err(ValidationError::InvalidWeekdays(s.to_string()));
            }
            days[idx] = match ch {
                '1' => true,
                '0' => false,
                _ => return Err(ValidationError::InvalidWeekdays(s.to_string())),
            };
            count += 1;
        }
        if count != 7 {
            return Err(ValidationError::InvalidWeekdays(s.to_string()));
        }
        Ok(Self(days))
    }
}

impl Serialize for Weekdays {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Weekdays {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_and_display_clock_time() {
        let t: ClockTime = "06:05".parse().unwrap();
        assert_eq!(t.hour(), 6);
        assert_eq!(t.minute(), 5);
        assert_eq!(t.to_string(), "06:05");
    }

    #[test]
    fn should_reject_out_of_range_clock_time() {
        assert!("24:00".parse::<ClockTime>().is_err());
        assert!(ClockTime::from_hm(12, 60).is_err());
    }

    #[test]
    fn should_roundtrip_weekdays_mask() {
        let mask: Weekdays = "0111110".parse().unwrap();
        assert_eq!(mask.to_string(), "0111110");
        assert!(mask.any());
    }

    #[test]
    fn should_reject_short_or_invalid_mask() {
        assert!("111".parse::<Weekdays>().is_err());
        assert!("11111111".parse::<Weekdays>().is_err());
        assert!("11x1111".parse::<Weekdays>().is_err());
    }

    #[test]
    fn should_deserialize_clock_time_from_json_string() {
        let t: ClockTime = serde_json::from_str("\"18:00\"").unwrap();
        assert_eq!(t, ClockTime::from_hm(18, 0).unwrap());
    }
}
