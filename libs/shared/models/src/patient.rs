use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::SchedulingError;

const MAX_CONTACT_LEN: usize = 120;

fn phone_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\+?[0-9]{8,15}$").expect("phone pattern compiles"))
}

/// Explicit patient identity passed into every scheduling call.
///
/// Phone numbers (with or without a `whatsapp:` prefix, spaces or dashes) are
/// normalised to `+<digits>` so the same person always maps to the same id.
/// Anything else is accepted verbatim as an opaque contact id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatientId(String);

impl PatientId {
    pub fn parse(raw: &str) -> Result<Self, SchedulingError> {
        let trimmed = raw.trim();
        let without_channel = trimmed
            .strip_prefix("whatsapp:")
            .map(str::trim)
            .unwrap_or(trimmed);

        let compact: String = without_channel
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
            .collect();

        if phone_pattern().is_match(&compact) {
            let digits = compact.trim_start_matches('+');
            return Ok(Self(format!("+{}", digits)));
        }

        if trimmed.is_empty()
            || trimmed.len() > MAX_CONTACT_LEN
            || trimmed.chars().any(char::is_whitespace)
        {
            return Err(SchedulingError::InvalidPatient(raw.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_phone(&self) -> bool {
        phone_pattern().is_match(&self.0)
    }
}

impl fmt::Display for PatientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for PatientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PatientId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        PatientId::parse(&raw).map_err(serde::de::Error::custom)
    }
}
