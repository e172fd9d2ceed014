use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const CLOCK_FORMAT: &str = "%I:%M %p";
const UNSCHEDULED_LABEL: &str = "N/A - Too Late";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("unparsable time slot: {0}")]
    Parse(String),
    #[error("invalid time slot: {0}")]
    InvalidSlot(String),
    #[error("{0}")]
    InvalidOperation(String),
}

/// Parses a 12-hour clock value such as `9:05 AM` or `09:05 pm`.
pub fn parse_clock(value: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(value.trim(), CLOCK_FORMAT)
        .map_err(|error| ScheduleError::Parse(format!("'{}': {error}", value.trim())))
}

pub fn format_clock(time: NaiveTime) -> String {
    time.format(CLOCK_FORMAT).to_string()
}

// Slots carry no date, so arithmetic happens on a fixed anchor day and any
// result that leaves that day is rejected instead of wrapping.
pub(crate) fn on_anchor_day(time: NaiveTime) -> NaiveDateTime {
    NaiveDate::default().and_time(time)
}

pub(crate) fn time_on_anchor_day(value: NaiveDateTime) -> Option<NaiveTime> {
    (value.date() == NaiveDate::default()).then(|| value.time())
}

/// A time-of-day interval with `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slot {
    start: NaiveTime,
    end: NaiveTime,
}

impl Slot {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::InvalidSlot(format!(
                "start {} must be before end {}",
                format_clock(start),
                format_clock(end)
            )));
        }
        Ok(Self { start, end })
    }

    pub(crate) fn from_anchored(
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Self, ScheduleError> {
        let (Some(start_time), Some(end_time)) =
            (time_on_anchor_day(start), time_on_anchor_day(end))
        else {
            return Err(ScheduleError::InvalidSlot(
                "slot would cross midnight".to_string(),
            ));
        };
        Self::new(start_time, end_time)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &Slot) -> bool {
        !(self.end <= other.start || self.start >= other.end)
    }

    pub fn is_within(&self, window: &WorkWindow) -> bool {
        self.start >= window.start() && self.end <= window.end()
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", format_clock(self.start), format_clock(self.end))
    }
}

impl FromStr for Slot {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let Some((start_raw, end_raw)) = value.split_once('-') else {
            return Err(ScheduleError::Parse(format!(
                "'{value}' is missing the ' - ' separator"
            )));
        };
        if end_raw.contains('-') {
            return Err(ScheduleError::Parse(format!(
                "'{value}' contains more than one separator"
            )));
        }
        let start = parse_clock(start_raw)?;
        let end = parse_clock(end_raw)?;
        Self::new(start, end)
    }
}

impl TryFrom<String> for Slot {
    type Error = ScheduleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Slot> for String {
    fn from(slot: Slot) -> Self {
        slot.to_string()
    }
}

/// A task's slot, or the Unscheduled sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Placement {
    Scheduled(Slot),
    Unscheduled,
}

impl Placement {
    pub fn slot(&self) -> Option<&Slot> {
        match self {
            Self::Scheduled(slot) => Some(slot),
            Self::Unscheduled => None,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        matches!(self, Self::Scheduled(_))
    }

    /// Chronological key: unscheduled entries compare after every start time.
    pub fn sort_key(&self) -> (bool, NaiveTime) {
        match self {
            Self::Scheduled(slot) => (false, slot.start()),
            Self::Unscheduled => (true, NaiveTime::MIN),
        }
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::Unscheduled
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduled(slot) => slot.fmt(f),
            Self::Unscheduled => f.write_str(UNSCHEDULED_LABEL),
        }
    }
}

impl From<String> for Placement {
    fn from(value: String) -> Self {
        value
            .parse::<Slot>()
            .map(Self::Scheduled)
            .unwrap_or(Self::Unscheduled)
    }
}

impl From<Placement> for String {
    fn from(placement: Placement) -> Self {
        placement.to_string()
    }
}

/// Bounds of the planning day; no overnight wraparound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkWindow {
    start: NaiveTime,
    end: NaiveTime,
}

impl WorkWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::InvalidSlot(format!(
                "work window start {} must be before end {}",
                format_clock(start),
                format_clock(end)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ScheduleError> {
        Self::new(parse_clock(start)?, parse_clock(end)?)
    }

    pub fn start(&self) -> NaiveTime {
        self.start
    }

    pub fn end(&self) -> NaiveTime {
        self.end
    }

    pub fn total_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    pub fn as_slot(&self) -> Slot {
        Slot {
            start: self.start,
            end: self.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clock(value: &str) -> NaiveTime {
        parse_clock(value).expect("valid clock")
    }

    fn slot(value: &str) -> Slot {
        value.parse().expect("valid slot")
    }

    #[test]
    fn parses_and_formats_wire_shape() {
        let parsed = slot("9:00 AM - 9:30 AM");
        assert_eq!(parsed.start(), clock("09:00 AM"));
        assert_eq!(parsed.end(), clock("09:30 AM"));
        assert_eq!(parsed.to_string(), "09:00 AM - 09:30 AM");
        assert_eq!(slot("01:15 PM - 02:00 PM").to_string(), "01:15 PM - 02:00 PM");
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        for raw in [
            "09:00 AM 09:30 AM",
            "13:00 PM - 14:00 PM",
            "09:00 - 10:00",
            "N/A - Too Late",
            "09:00 AM - 10:00 AM - 11:00 AM",
            "",
        ] {
            assert!(raw.parse::<Slot>().is_err(), "expected parse failure for {raw:?}");
        }
    }

    #[test]
    fn slot_requires_start_before_end() {
        assert!(matches!(
            "10:00 AM - 10:00 AM".parse::<Slot>(),
            Err(ScheduleError::InvalidSlot(_))
        ));
        assert!(Slot::new(clock("11:00 AM"), clock("10:00 AM")).is_err());
    }

    #[test]
    fn touching_slots_do_not_overlap() {
        let morning = slot("09:00 AM - 10:00 AM");
        assert!(!morning.overlaps(&slot("10:00 AM - 10:30 AM")));
        assert!(!slot("08:00 AM - 09:00 AM").overlaps(&morning));
        assert!(morning.overlaps(&slot("09:45 AM - 10:15 AM")));
        assert!(morning.overlaps(&slot("09:15 AM - 09:30 AM")));
        assert!(slot("08:00 AM - 11:00 AM").overlaps(&morning));
    }

    #[test]
    fn placement_serializes_as_wire_string() {
        let scheduled = Placement::Scheduled(slot("09:00 AM - 09:30 AM"));
        assert_eq!(
            serde_json::to_string(&scheduled).expect("serialize"),
            "\"09:00 AM - 09:30 AM\""
        );
        assert_eq!(
            serde_json::to_string(&Placement::Unscheduled).expect("serialize"),
            "\"N/A - Too Late\""
        );
    }

    #[test]
    fn unparsable_placement_deserializes_as_unscheduled() {
        let placement: Placement = serde_json::from_str("\"garbage\"").expect("deserialize");
        assert_eq!(placement, Placement::Unscheduled);
        let placement: Placement =
            serde_json::from_str("\"10:00 AM - 10:30 AM\"").expect("deserialize");
        assert_eq!(placement, Placement::Scheduled(slot("10:00 AM - 10:30 AM")));
    }

    #[test]
    fn unscheduled_sorts_after_latest_start() {
        let late = Placement::Scheduled(slot("11:00 PM - 11:30 PM"));
        assert!(late.sort_key() < Placement::Unscheduled.sort_key());
    }

    #[test]
    fn anchored_arithmetic_rejects_midnight_crossing() {
        let start = on_anchor_day(clock("11:30 PM"));
        let end = start + Duration::minutes(45);
        assert!(Slot::from_anchored(start, end).is_err());
    }

    #[test]
    fn work_window_requires_ordered_bounds() {
        assert!(WorkWindow::parse("05:00 PM", "09:00 AM").is_err());
        let window = WorkWindow::parse("09:00 AM", "05:00 PM").expect("valid window");
        assert_eq!(window.total_minutes(), 480);
    }
}
