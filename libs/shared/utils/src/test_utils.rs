use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc, Weekday};

use shared_config::AppConfig;

use crate::clock::Clock;

/// Scheduling configuration used across the cell test suites: a UTC clinic open
/// 09:00-11:00 every day with 30 minute single-capacity slots.
pub struct TestConfig {
    pub open_hour: u32,
    pub close_hour: u32,
    pub slot_minutes: u32,
    pub slot_capacity: u32,
    pub utc_offset_minutes: i32,
    pub working_days: Vec<Weekday>,
    pub blackout_dates: Vec<NaiveDate>,
    pub hold_minutes: i64,
    pub storage_timeout_ms: u64,
    pub storage_max_retries: u32,
    pub one_appointment_per_day: bool,
    pub twilio_api_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            open_hour: 9,
            close_hour: 11,
            slot_minutes: 30,
            slot_capacity: 1,
            utc_offset_minutes: 0,
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
                Weekday::Sat,
                Weekday::Sun,
            ],
            blackout_dates: Vec::new(),
            hold_minutes: 30,
            storage_timeout_ms: 500,
            storage_max_retries: 2,
            one_appointment_per_day: true,
            twilio_api_base_url: "http://localhost:9".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            slot_capacity: capacity,
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            app_name: "asistente_virtual_test".to_string(),
            app_env: "test".to_string(),
            port: 0,
            clinic_utc_offset_minutes: self.utc_offset_minutes,
            clinic_open_hour: self.open_hour,
            clinic_close_hour: self.close_hour,
            working_days: self.working_days.clone(),
            slot_minutes: self.slot_minutes,
            slot_capacity: self.slot_capacity,
            blackout_dates: self.blackout_dates.clone(),
            waitlist_hold_minutes: self.hold_minutes,
            storage_timeout_ms: self.storage_timeout_ms,
            storage_max_retries: self.storage_max_retries,
            one_appointment_per_day: self.one_appointment_per_day,
            reminder_lead_hours: 24,
            sweep_interval_seconds: 60,
            twilio_account_sid: "ACtest".to_string(),
            twilio_auth_token: "test-auth-token".to_string(),
            twilio_whatsapp_from: "+14155238886".to_string(),
            twilio_api_base_url: self.twilio_api_base_url.clone(),
            dry_run: false,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// Manually driven clock.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Clock pinned to midnight UTC of the given day.
    pub fn at_date(year: i32, month: u32, day: u32) -> Self {
        Self::new(Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default().to_app_config();

        assert_eq!(config.clinic_open_hour, 9);
        assert_eq!(config.clinic_close_hour, 11);
        assert_eq!(config.slot_capacity, 1);
        assert!(config.is_schedule_valid());
        assert!(config.is_whatsapp_configured());
    }

    #[test]
    fn test_capacity_override() {
        let config = TestConfig::with_capacity(2).to_app_config();
        assert_eq!(config.slot_capacity, 2);
        assert_eq!(config.slot_minutes, 30);
    }

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::at_date(2024, 3, 1);
        let start = clock.now();

        clock.advance(Duration::minutes(45));
        assert_eq!(clock.now() - start, Duration::minutes(45));

        let shared = clock.clone();
        shared.advance(Duration::minutes(15));
        assert_eq!(clock.now() - start, Duration::hours(1));
    }
}
