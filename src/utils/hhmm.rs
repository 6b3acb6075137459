//! Serde adapter for optional `HH:mm` clock times.
//!
//! Use with `#[serde(with = "crate::utils::hhmm", default)]`. Seconds are accepted on
//! input (`HH:mm:ss`) and dropped on output.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer, de::Error};

pub fn serialize<S>(value: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(t) => serializer.serialize_str(&t.format("%H:%M").to_string()),
        None => serializer.serialize_none(),
    }
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse(s)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid time '{s}', expected HH:mm"))),
    }
}

pub fn parse(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Row {
        #[serde(with = "crate::utils::hhmm", default)]
        check_in: Option<chrono::NaiveTime>,
    }

    #[test]
    fn reads_and_writes_minutes_only() {
        let row: Row = serde_json::from_str(r#"{"check_in":"09:05:59"}"#).unwrap();
        assert_eq!(row.check_in, chrono::NaiveTime::from_hms_opt(9, 5, 59));
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"check_in":"09:05"}"#);
    }

    #[test]
    fn blank_and_missing_are_none() {
        let blank: Row = serde_json::from_str(r#"{"check_in":""}"#).unwrap();
        let missing: Row = serde_json::from_str("{}").unwrap();
        let null: Row = serde_json::from_str(r#"{"check_in":null}"#).unwrap();
        assert_eq!(blank.check_in, None);
        assert_eq!(missing.check_in, None);
        assert_eq!(null.check_in, None);
        assert!(serde_json::from_str::<Row>(r#"{"check_in":"9am"}"#).is_err());
    }
}
