use std::env;
use std::fmt::Display;
use std::str::FromStr;

use chrono::{FixedOffset, NaiveDate, Offset, Utc, Weekday};
use tracing::warn;

const DEFAULT_WORKING_DAYS: &str = "mon,tue,wed,thu,fri,sat,sun";
const DEFAULT_TWILIO_API_BASE_URL: &str = "https://api.twilio.com";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: String,
    pub port: u16,

    // Clinic calendar
    pub clinic_utc_offset_minutes: i32,
    pub clinic_open_hour: u32,
    pub clinic_close_hour: u32,
    pub working_days: Vec<Weekday>,
    pub slot_minutes: u32,
    pub slot_capacity: u32,
    pub blackout_dates: Vec<NaiveDate>,

    // Scheduling engine
    pub waitlist_hold_minutes: i64,
    pub storage_timeout_ms: u64,
    pub storage_max_retries: u32,
    pub one_appointment_per_day: bool,
    pub reminder_lead_hours: i64,
    pub sweep_interval_seconds: u64,

    // WhatsApp delivery (Twilio)
    pub twilio_account_sid: String,
    pub twilio_auth_token: String,
    pub twilio_whatsapp_from: String,
    pub twilio_api_base_url: String,
    pub dry_run: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. `from_env` is the
    /// production entry point; tests pass a map.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // CLINIC_START_HOUR / CLINIC_END_HOUR are the older names and are still honoured.
        let open_key = if lookup("CLINIC_OPEN_HOUR").is_none() && lookup("CLINIC_START_HOUR").is_some() {
            "CLINIC_START_HOUR"
        } else {
            "CLINIC_OPEN_HOUR"
        };
        let close_key = if lookup("CLINIC_CLOSE_HOUR").is_none() && lookup("CLINIC_END_HOUR").is_some() {
            "CLINIC_END_HOUR"
        } else {
            "CLINIC_CLOSE_HOUR"
        };

        let offset_raw = string_or(&lookup, "CLINIC_UTC_OFFSET", "-06:00");
        let clinic_utc_offset_minutes = parse_utc_offset(&offset_raw).unwrap_or_else(|| {
            warn!("CLINIC_UTC_OFFSET '{}' is not a valid offset, using -06:00", offset_raw);
            -360
        });

        let working_days_raw = string_or(&lookup, "CLINIC_WORKING_DAYS", DEFAULT_WORKING_DAYS);
        let working_days = parse_weekdays(&working_days_raw);

        let blackout_raw = lookup("BLACKOUT_DATES").unwrap_or_default();
        let blackout_dates = parse_dates(&blackout_raw);

        let config = Self {
            app_name: string_or(&lookup, "APP_NAME", "asistente_virtual"),
            app_env: string_or(&lookup, "APP_ENV", "dev"),
            port: parse_or(&lookup, "PORT", 3000),
            clinic_utc_offset_minutes,
            clinic_open_hour: parse_or(&lookup, open_key, 16),
            clinic_close_hour: parse_or(&lookup, close_key, 22),
            working_days,
            slot_minutes: parse_or(&lookup, "SLOT_MINUTES", 30),
            slot_capacity: parse_or(&lookup, "SLOT_CAPACITY", 1),
            blackout_dates,
            waitlist_hold_minutes: parse_or(&lookup, "WAITLIST_HOLD_MINUTES", 30),
            storage_timeout_ms: parse_or(&lookup, "STORAGE_TIMEOUT_MS", 2000),
            storage_max_retries: parse_or(&lookup, "STORAGE_MAX_RETRIES", 3),
            one_appointment_per_day: parse_or(&lookup, "ONE_APPOINTMENT_PER_DAY", true),
            reminder_lead_hours: parse_or(&lookup, "REMINDER_LEAD_HOURS", 24),
            sweep_interval_seconds: parse_or(&lookup, "SWEEP_INTERVAL_SECONDS", 60),
            twilio_account_sid: lookup("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            twilio_auth_token: lookup("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            twilio_whatsapp_from: lookup("TWILIO_WHATSAPP_FROM").unwrap_or_default(),
            twilio_api_base_url: string_or(&lookup, "TWILIO_API_BASE_URL", DEFAULT_TWILIO_API_BASE_URL),
            dry_run: parse_or(&lookup, "DRY_RUN", false),
        };

        if !config.is_schedule_valid() {
            warn!(
                "Clinic hours {}..{} with {} minute slots produce no bookable slots",
                config.clinic_open_hour, config.clinic_close_hour, config.slot_minutes
            );
        }

        if !config.is_whatsapp_configured() {
            warn!("Twilio credentials not set - WhatsApp messages will only be logged");
        }

        config
    }

    pub fn clinic_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.clinic_utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    pub fn is_schedule_valid(&self) -> bool {
        self.slot_minutes > 0
            && self.slot_capacity > 0
            && self.clinic_open_hour < self.clinic_close_hour
            && self.clinic_close_hour <= 24
            && (self.clinic_close_hour - self.clinic_open_hour) * 60 >= self.slot_minutes
    }

    pub fn is_whatsapp_configured(&self) -> bool {
        !self.twilio_account_sid.is_empty()
            && !self.twilio_auth_token.is_empty()
            && !self.twilio_whatsapp_from.is_empty()
    }
}

fn string_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).unwrap_or_else(|| {
        warn!("{} not set, using default '{}'", key, default);
        default.to_string()
    })
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{}='{}' could not be parsed, using default {}", key, raw, default);
            default
        }),
        None => default,
    }
}

/// Parses `+HH:MM` / `-HH:MM` (or `Z`) into minutes east of UTC.
pub fn parse_utc_offset(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw.eq_ignore_ascii_case("utc") {
        return Some(0);
    }

    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => (1, raw),
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 14 || minutes >= 60 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}

pub fn parse_weekdays(raw: &str) -> Vec<Weekday> {
    let mut days = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.parse::<Weekday>() {
            Ok(day) if !days.contains(&day) => days.push(day),
            Ok(_) => {}
            Err(_) => warn!("Ignoring unknown weekday '{}'", token),
        }
    }
    days
}

pub fn parse_dates(raw: &str) -> Vec<NaiveDate> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .filter_map(|token| match NaiveDate::parse_from_str(token, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                warn!("Ignoring invalid blackout date '{}'", token);
                None
            }
        })
        .collect()
}
