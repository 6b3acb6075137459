//! HH:mm slot arithmetic used by overtime claims.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Error, PartialEq)]
pub enum SlotError {
    #[error("Invalid time '{0}', expected HH:mm")]
    InvalidTime(String),

    #[error("Each slot must end after it starts")]
    EndBeforeStart,

    #[error("Add at least one slot")]
    Empty,

    #[error("Slots {0} and {1} overlap")]
    Overlap(String, String),
}

/// A slot as typed by the user, both ends on the claim date.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SlotInput {
    #[schema(example = "17:00")]
    pub start: String,
    #[schema(example = "19:30")]
    pub end: String,
}

/// A validated slot anchored to a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[schema(value_type = String, example = "2024-02-15T17:00:00")]
    pub from: NaiveDateTime,
    #[schema(value_type = String, example = "2024-02-15T19:30:00")]
    pub to: NaiveDateTime,
    #[schema(example = 150)]
    pub duration_minutes: i64,
}

/// `"HH:mm"` to minutes since midnight.
pub fn parse_hhmm(value: &str) -> Result<u32, SlotError> {
    let invalid = || SlotError::InvalidTime(value.to_string());

    let (h, m) = value.trim().split_once(':').ok_or_else(invalid)?;
    if h.is_empty() || h.len() > 2 || m.len() != 2 {
        return Err(invalid());
    }
    let hours: u32 = h.parse().map_err(|_| invalid())?;
    let minutes: u32 = m.parse().map_err(|_| invalid())?;
    if hours > 23 || minutes > 59 {
        return Err(invalid());
    }
    Ok(hours * 60 + minutes)
}

/// Minutes since midnight to `"HH:mm"`. Values past the day wrap around.
pub fn format_hhmm(minutes: u32) -> String {
    let minutes = minutes % MINUTES_PER_DAY;
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

pub fn slot_duration(start: u32, end: u32) -> Result<u32, SlotError> {
    if end <= start {
        return Err(SlotError::EndBeforeStart);
    }
    Ok(end - start)
}

fn at(date: NaiveDate, minutes: u32) -> NaiveDateTime {
    // minutes < 1440 is guaranteed by parse_hhmm
    let time = NaiveTime::from_num_seconds_from_midnight_opt(minutes * 60, 0).unwrap_or_default();
    date.and_time(time)
}

/// Validates the typed slots and anchors them to `date`.
///
/// Slots come back sorted by start time.
pub fn build_slots(date: NaiveDate, inputs: &[SlotInput]) -> Result<Vec<TimeSlot>, SlotError> {
    if inputs.is_empty() {
        return Err(SlotError::Empty);
    }

    let mut ranges = inputs
        .iter()
        .map(|s| {
            let start = parse_hhmm(&s.start)?;
            let end = parse_hhmm(&s.end)?;
            slot_duration(start, end)?;
            Ok((start, end))
        })
        .collect::<Result<Vec<_>, SlotError>>()?;

    ranges.sort_unstable();

    for pair in ranges.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if b.0 < a.1 {
            return Err(SlotError::Overlap(
                format!("{}-{}", format_hhmm(a.0), format_hhmm(a.1)),
                format!("{}-{}", format_hhmm(b.0), format_hhmm(b.1)),
            ));
        }
    }

    Ok(ranges
        .into_iter()
        .map(|(start, end)| TimeSlot {
            from: at(date, start),
            to: at(date, end),
            duration_minutes: i64::from(end - start),
        })
        .collect())
}

fn span(slot: &TimeSlot) -> String {
    format!("{}-{}", slot.from.format("%H:%M"), slot.to.format("%H:%M"))
}

/// Rejects `slots` when any of them overlaps a slot already recorded on
/// another claim. Touching ends are allowed, as within a claim.
pub fn ensure_disjoint(slots: &[TimeSlot], recorded: &[TimeSlot]) -> Result<(), SlotError> {
    for slot in slots {
        if let Some(taken) = recorded
            .iter()
            .find(|r| slot.from < r.to && r.from < slot.to)
        {
            return Err(SlotError::Overlap(span(taken), span(slot)));
        }
    }
    Ok(())
}

pub fn total_duration(slots: &[TimeSlot]) -> i64 {
    slots.iter().map(|s| s.duration_minutes).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(start: &str, end: &str) -> SlotInput {
        SlotInput {
            start: start.into(),
            end: end.into(),
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 15).unwrap()
    }

    #[test]
    fn every_minute_of_the_day_survives_formatting() {
        for minutes in 0..MINUTES_PER_DAY {
            let text = format_hhmm(minutes);
            assert_eq!(parse_hhmm(&text), Ok(minutes), "{text}");
        }
    }

    #[test]
    fn rejects_malformed_times() {
        for bad in ["24:00", "12:60", "1230", "12:5", "", "ab:cd", "-1:30", "123:00"] {
            assert!(parse_hhmm(bad).is_err(), "{bad} should fail");
        }
        assert_eq!(parse_hhmm("7:05"), Ok(425));
    }

    #[test]
    fn end_must_follow_start() {
        assert_eq!(slot_duration(600, 600), Err(SlotError::EndBeforeStart));
        assert_eq!(slot_duration(600, 540), Err(SlotError::EndBeforeStart));
        assert_eq!(slot_duration(540, 600), Ok(60));
    }

    #[test]
    fn builds_sorted_slots_and_totals() {
        let slots = build_slots(date(), &[slot("19:00", "20:15"), slot("08:00", "09:00")]).unwrap();

        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0].from, date().and_hms_opt(8, 0, 0).unwrap());
        assert_eq!(slots[0].duration_minutes, 60);
        assert_eq!(slots[1].to, date().and_hms_opt(20, 15, 0).unwrap());
        assert_eq!(total_duration(&slots), 135);
    }

    #[test]
    fn touching_slots_are_fine_overlapping_are_not() {
        assert!(build_slots(date(), &[slot("08:00", "09:00"), slot("09:00", "10:00")]).is_ok());
        assert_eq!(
            build_slots(date(), &[slot("08:00", "09:30"), slot("09:00", "10:00")]),
            Err(SlotError::Overlap("08:00-09:30".into(), "09:00-10:00".into()))
        );
    }

    #[test]
    fn slots_already_claimed_that_day_are_rejected() {
        let recorded = build_slots(date(), &[slot("18:00", "20:00")]).unwrap();

        let same = build_slots(date(), &[slot("18:00", "20:00")]).unwrap();
        assert_eq!(
            ensure_disjoint(&same, &recorded),
            Err(SlotError::Overlap("18:00-20:00".into(), "18:00-20:00".into()))
        );

        let partial = build_slots(date(), &[slot("07:00", "08:00"), slot("19:30", "21:00")]).unwrap();
        assert_eq!(
            ensure_disjoint(&partial, &recorded),
            Err(SlotError::Overlap("18:00-20:00".into(), "19:30-21:00".into()))
        );

        let after = build_slots(date(), &[slot("20:00", "21:00"), slot("06:00", "18:00")]).unwrap();
        assert_eq!(ensure_disjoint(&after, &recorded), Ok(()));
        assert_eq!(ensure_disjoint(&after, &[]), Ok(()));
    }

    #[test]
    fn empty_and_inverted_claims_fail() {
        assert_eq!(build_slots(date(), &[]), Err(SlotError::Empty));
        assert_eq!(
            build_slots(date(), &[slot("10:00", "09:00")]),
            Err(SlotError::EndBeforeStart)
        );
    }
}
