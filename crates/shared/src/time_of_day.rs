//! `HH:MM` wire format for time-of-day columns.
//!
//! SQL `time` columns come back as `HH:MM:SS`, so decoding accepts both.

use chrono::NaiveTime;
use serde::{de, Deserialize, Deserializer, Serializer};

pub const WIRE_FORMAT: &str = "%H:%M";

pub fn parse(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, WIRE_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S%.f"))
        .ok()
}

pub fn format(time: NaiveTime) -> String {
    time.format(WIRE_FORMAT).to_string()
}

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(*time))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid time of day '{raw}'")))
}
