// libs/calendar-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use shared_config::AppConfig;

use crate::error::CalendarError;

const SLOT_ID_FORMAT: &str = "%Y-%m-%dT%H:%M";
const MINUTES_PER_DAY: u32 = 24 * 60;

/// Longest range `ListSlots` accepts in one call.
pub const MAX_RANGE_DAYS: i64 = 366;

// ==============================================================================
// SLOTS
// ==============================================================================

/// Identity of a slot: its local (clinic time) start. The calendar has a single
/// fixed slot length, so the start alone pins down (date, start, duration).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(NaiveDateTime);

impl SlotId {
    pub fn new(start: NaiveDateTime) -> Self {
        Self(start)
    }

    pub fn start(&self) -> NaiveDateTime {
        self.0
    }

    pub fn date(&self) -> NaiveDate {
        self.0.date()
    }

    /// Minutes since local midnight, or `None` when the id carries seconds and
    /// therefore cannot lie on any minute grid.
    pub fn minute_of_day(&self) -> Option<u32> {
        let time = self.0.time();
        if time.second() != 0 || time.nanosecond() != 0 {
            return None;
        }
        Some(time.hour() * 60 + time.minute())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(SLOT_ID_FORMAT))
    }
}

impl FromStr for SlotId {
    type Err = CalendarError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        NaiveDateTime::parse_from_str(raw, SLOT_ID_FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
            .map(SlotId)
            .map_err(|_| CalendarError::InvalidSlotId(raw.to_string()))
    }
}

impl Serialize for SlotId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SlotId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: SlotId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub duration_minutes: u32,
    pub capacity: u32,
    pub remaining: u32,
}

impl Slot {
    pub fn new(start: NaiveDateTime, duration_minutes: u32, capacity: u32) -> Self {
        Self {
            id: SlotId(start),
            start,
            end: start + Duration::minutes(duration_minutes as i64),
            duration_minutes,
            capacity,
            remaining: capacity,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }

    /// Copy of the slot with `remaining` set from an occupancy count, clamped
    /// to `[0, capacity]`.
    pub fn with_occupied(mut self, occupied: u32) -> Self {
        self.remaining = self.capacity.saturating_sub(occupied);
        self
    }

    pub fn is_full(&self) -> bool {
        self.remaining == 0
    }
}

// ==============================================================================
// CONFIGURATION
// ==============================================================================

/// Opening window within a day, in minutes since local midnight. `end_minute`
/// may be 1440 for a window that runs to midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingWindow {
    pub start_minute: u32,
    pub end_minute: u32,
}

impl WorkingWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, CalendarError> {
        Self::from_minutes(
            start.hour() * 60 + start.minute(),
            end.hour() * 60 + end.minute(),
        )
    }

    pub fn from_hours(open_hour: u32, close_hour: u32) -> Result<Self, CalendarError> {
        let to_minutes = |hour: u32| {
            hour.checked_mul(60).ok_or_else(|| {
                CalendarError::InvalidConfig(format!("working hour {} is out of range", hour))
            })
        };
        Self::from_minutes(to_minutes(open_hour)?, to_minutes(close_hour)?)
    }

    pub fn from_minutes(start_minute: u32, end_minute: u32) -> Result<Self, CalendarError> {
        if start_minute >= end_minute || end_minute > MINUTES_PER_DAY {
            return Err(CalendarError::InvalidConfig(format!(
                "working window {}..{} minutes is empty or exceeds a day",
                start_minute, end_minute
            )));
        }
        Ok(Self { start_minute, end_minute })
    }

    pub fn contains_slot(&self, minute_of_day: u32, slot_minutes: u32) -> bool {
        minute_of_day >= self.start_minute
            && minute_of_day + slot_minutes <= self.end_minute
            && (minute_of_day - self.start_minute) % slot_minutes == 0
    }
}

/// Closed interval inside which no slot may start or run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackoutPeriod {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BlackoutPeriod {
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end && self.start < end
    }
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub windows: Vec<WorkingWindow>,
    pub working_days: Vec<Weekday>,
    pub slot_minutes: u32,
    pub capacity: u32,
    pub blackout_dates: Vec<NaiveDate>,
    pub blackout_periods: Vec<BlackoutPeriod>,
    pub utc_offset: FixedOffset,
}

impl CalendarConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, CalendarError> {
        let window = WorkingWindow::from_hours(config.clinic_open_hour, config.clinic_close_hour)?;

        Ok(Self {
            windows: vec![window],
            working_days: config.working_days.clone(),
            slot_minutes: config.slot_minutes,
            capacity: config.slot_capacity,
            blackout_dates: config.blackout_dates.clone(),
            blackout_periods: Vec::new(),
            utc_offset: config.clinic_offset(),
        })
    }

    /// Sorts windows and rejects configurations that would emit duplicate or
    /// zero-length slots.
    pub fn validated(mut self) -> Result<Self, CalendarError> {
        if self.slot_minutes == 0 {
            return Err(CalendarError::InvalidConfig("slot length must be positive".into()));
        }
        if self.capacity == 0 {
            return Err(CalendarError::InvalidConfig("slot capacity must be positive".into()));
        }
        if self.windows.is_empty() {
            return Err(CalendarError::InvalidConfig("at least one working window is required".into()));
        }

        self.windows.sort_by_key(|w| w.start_minute);
        for pair in self.windows.windows(2) {
            if pair[1].start_minute < pair[0].end_minute {
                return Err(CalendarError::InvalidConfig(format!(
                    "working windows overlap at minute {}",
                    pair[1].start_minute
                )));
            }
        }

        Ok(self)
    }

    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        self.working_days.contains(&date.weekday()) && !self.blackout_dates.contains(&date)
    }
}

// ==============================================================================
// QUERIES
// ==============================================================================

/// Inclusive range of local dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, CalendarError> {
        if end < start {
            return Err(CalendarError::InvalidRange(format!("{} is before {}", end, start)));
        }
        if (end - start).num_days() >= MAX_RANGE_DAYS {
            return Err(CalendarError::InvalidRange(format!(
                "ranges are limited to {} days",
                MAX_RANGE_DAYS
            )));
        }
        Ok(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self { start: date, end: date }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Optional narrowing of a slot listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotFilter {
    pub from_time: Option<NaiveTime>,
    pub to_time: Option<NaiveTime>,
    pub weekdays: Option<Vec<Weekday>>,
}

impl SlotFilter {
    pub fn matches(&self, slot: &Slot) -> bool {
        let time = slot.start.time();
        if let Some(from) = self.from_time {
            if time < from {
                return false;
            }
        }
        if let Some(to) = self.to_time {
            if time >= to {
                return false;
            }
        }
        if let Some(days) = &self.weekdays {
            if !days.contains(&slot.start.weekday()) {
                return false;
            }
        }
        true
    }
}
