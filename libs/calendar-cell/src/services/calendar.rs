// libs/calendar-cell/src/services/calendar.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::error::CalendarError;
use crate::models::{CalendarConfig, DateRange, Slot, SlotFilter, SlotId};

/// Generates bookable slots from the clinic's working hours. Holds no state
/// besides its configuration, so every listing can be re-created at will.
#[derive(Debug, Clone)]
pub struct SlotCalendar {
    config: CalendarConfig,
}

impl SlotCalendar {
    pub fn new(config: CalendarConfig) -> Result<Self, CalendarError> {
        let config = config.validated()?;
        info!(
            "Slot calendar ready: {} window(s), {} minute slots, capacity {}",
            config.windows.len(),
            config.slot_minutes,
            config.capacity
        );
        Ok(Self { config })
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, CalendarError> {
        Self::new(CalendarConfig::from_app_config(config)?)
    }

    pub fn config(&self) -> &CalendarConfig {
        &self.config
    }

    pub fn capacity(&self) -> u32 {
        self.config.capacity
    }

    pub fn slot_minutes(&self) -> u32 {
        self.config.slot_minutes
    }

    /// Ordered, lazily generated slots for the range. Remaining capacity is
    /// always the full capacity; bookings are not consulted here.
    pub fn list_slots<'a>(
        &'a self,
        range: DateRange,
        filter: Option<&'a SlotFilter>,
    ) -> impl Iterator<Item = Slot> + 'a {
        debug!("Listing slots {} to {}", range.start, range.end);

        range
            .days()
            .filter(move |date| self.config.is_working_day(*date))
            .flat_map(move |date| self.slots_for_day(date))
            .filter(move |slot| filter.map_or(true, |f| f.matches(slot)))
    }

    fn slots_for_day(&self, date: NaiveDate) -> impl Iterator<Item = Slot> + '_ {
        let step = self.config.slot_minutes;
        self.config
            .windows
            .iter()
            .flat_map(move |window| {
                (window.start_minute..window.end_minute)
                    .step_by(step as usize)
                    .take_while(move |minute| minute + step <= window.end_minute)
            })
            .filter_map(move |minute| local_start(date, minute))
            .map(move |start| Slot::new(start, step, self.config.capacity))
            .filter(move |slot| !self.is_blacked_out(slot.start, slot.end))
    }

    /// True when the id lies on the generation grid: a working day, inside a
    /// window, aligned to the window start, and clear of every blackout.
    pub fn is_valid_slot(&self, id: &SlotId) -> bool {
        let Some(minute) = id.minute_of_day() else {
            return false;
        };
        if !self.config.is_working_day(id.date()) {
            return false;
        }

        let step = self.config.slot_minutes;
        if !self.config.windows.iter().any(|w| w.contains_slot(minute, step)) {
            return false;
        }

        let end = id.start() + Duration::minutes(step as i64);
        !self.is_blacked_out(id.start(), end)
    }

    /// The slot for a valid id, at full capacity.
    pub fn slot(&self, id: &SlotId) -> Option<Slot> {
        self.is_valid_slot(id)
            .then(|| Slot::new(id.start(), self.config.slot_minutes, self.config.capacity))
    }

    pub fn parse_slot(&self, raw: &str) -> Result<Slot, CalendarError> {
        let id: SlotId = raw.parse()?;
        self.slot(&id)
            .ok_or_else(|| CalendarError::InvalidSlotId(format!("{} is not on the clinic calendar", raw)))
    }

    fn is_blacked_out(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        self.config
            .blackout_periods
            .iter()
            .any(|period| period.overlaps(start, end))
    }

    pub fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        let offset_seconds = self.config.utc_offset.local_minus_utc() as i64;
        Utc.from_utc_datetime(&(local - Duration::seconds(offset_seconds)))
    }

    pub fn slot_start_utc(&self, id: &SlotId) -> DateTime<Utc> {
        self.to_utc(id.start())
    }

    pub fn slot_end_utc(&self, id: &SlotId) -> DateTime<Utc> {
        self.to_utc(id.start() + Duration::minutes(self.config.slot_minutes as i64))
    }

    /// A slot counts as past once it has started.
    pub fn is_past(&self, id: &SlotId, now: DateTime<Utc>) -> bool {
        self.slot_start_utc(id) <= now
    }

    pub fn local_now(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.with_timezone(&self.config.utc_offset).naive_local()
    }

    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        self.local_now(now).date()
    }
}

fn local_start(date: NaiveDate, minute_of_day: u32) -> Option<NaiveDateTime> {
    NaiveTime::from_hms_opt(minute_of_day / 60, minute_of_day % 60, 0).map(|t| date.and_time(t))
}
