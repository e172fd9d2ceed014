use crate::domain::slot::Placement;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_DURATION_MINUTES: u32 = 30;

const EVENING_KEYWORDS: [&str; 4] = ["dinner", "evening", "wind down", "relax"];
const BREAK_KEYWORDS: [&str; 2] = ["break", "relax"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Self::High => 3,
            Self::Medium => 2,
            Self::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn parse_priority(value: &str) -> Result<Priority, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "high" => Ok(Priority::High),
        "medium" => Ok(Priority::Medium),
        "low" => Ok(Priority::Low),
        other => Err(format!("unsupported priority: {other}")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub description: String,
    pub priority: Priority,
    pub duration_minutes: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub slot: Placement,
}

impl Task {
    pub fn new(description: impl Into<String>, priority: Priority, duration_minutes: u32) -> Self {
        Self {
            description: description.into(),
            priority,
            duration_minutes,
            completed: false,
            slot: Placement::Unscheduled,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.description.trim().is_empty() {
            return Err("task.description must not be empty".to_string());
        }
        if self.duration_minutes == 0 {
            return Err("task.duration_minutes must be > 0".to_string());
        }
        Ok(())
    }

    // Tags are derived on every read so they can never drift from the text.
    pub fn is_evening(&self) -> bool {
        contains_any(&self.description, &EVENING_KEYWORDS)
    }

    pub fn is_break_or_low(&self) -> bool {
        contains_any(&self.description, &BREAK_KEYWORDS)
    }
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|keyword| lowered.contains(keyword))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Mood {
    Low,
    Great,
    Neutral,
}

impl Mood {
    pub fn action(self) -> &'static str {
        match self {
            Self::Low => "Prioritized easy tasks.",
            Self::Great => "Prioritized high-priority tasks.",
            Self::Neutral => "Schedule unchanged.",
        }
    }
}

pub fn parse_mood(value: &str) -> Result<Mood, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "low" => Ok(Mood::Low),
        "great" => Ok(Mood::Great),
        "neutral" => Ok(Mood::Neutral),
        other => Err(format!("unsupported mood: {other}")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoodLogEntry {
    pub time: String,
    pub mood: Mood,
    pub action: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPattern {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl FocusPattern {
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            6..=10 => Self::Morning,
            11..=15 => Self::Afternoon,
            16..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Morning => "Morning: high focus, analytical energy peak.",
            Self::Afternoon => "Afternoon: balanced productivity and creativity.",
            Self::Evening => "Evening: moderate focus, good for light or follow-up work.",
            Self::Night => "Night: low focus, avoid heavy cognitive tasks.",
        }
    }
}

/// One saved day of a user's plan, keyed by `YYYY-MM-DD`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyRecord {
    pub date_key: String,
    pub tasks: Vec<Task>,
}

pub fn validate_date_key(value: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("date key '{value}' must be YYYY-MM-DD"))?;
    Ok(())
}

/// Tolerant reading of free-text durations such as `1 hour 30 min` or `45`.
pub fn parse_duration_text(value: &str) -> u32 {
    let lowered = value.to_lowercase();
    let tokens = lowered.split_whitespace().collect::<Vec<_>>();
    let mut minutes: u32 = 0;
    let mut matched = false;

    for (index, token) in tokens.iter().enumerate() {
        let digits_end = token
            .find(|character: char| !character.is_ascii_digit())
            .unwrap_or(token.len());
        let (number_part, unit_part) = token.split_at(digits_end);

        if !number_part.is_empty() && !unit_part.is_empty() {
            if is_fractional(token) {
                return DEFAULT_DURATION_MINUTES;
            }
            if let (Ok(number), Some(unit)) = (number_part.parse::<u32>(), unit_minutes(unit_part)) {
                minutes = minutes.saturating_add(number.saturating_mul(unit));
                matched = true;
            }
            continue;
        }

        let Some(unit) = unit_minutes(token) else {
            continue;
        };
        let previous = index
            .checked_sub(1)
            .and_then(|previous| tokens.get(previous))
            .copied();
        if previous.is_some_and(is_fractional) {
            return DEFAULT_DURATION_MINUTES;
        }
        match previous.and_then(|previous| previous.parse::<u32>().ok()) {
            Some(number) => minutes = minutes.saturating_add(number.saturating_mul(unit)),
            None if unit == 60 => minutes = minutes.saturating_add(60),
            None => minutes = minutes.saturating_add(DEFAULT_DURATION_MINUTES),
        }
        matched = true;
    }

    if !matched {
        minutes = tokens
            .first()
            .and_then(|first| first.parse::<u32>().ok())
            .unwrap_or(0);
    }

    if minutes == 0 {
        DEFAULT_DURATION_MINUTES
    } else {
        minutes
    }
}

fn unit_minutes(token: &str) -> Option<u32> {
    match token.trim_matches(|character: char| !character.is_alphanumeric()) {
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(60),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(1),
        _ => None,
    }
}

/// A leading amount like `1.5` or `2,5` is too vague to round.
fn is_fractional(token: &str) -> bool {
    let numeric = token
        .find(|character: char| !(character.is_ascii_digit() || character == '.' || character == ','))
        .map_or(token, |end| &token[..end]);
    let trimmed = numeric.trim_end_matches(|character: char| character == '.' || character == ',');
    trimmed.contains(|character: char| character.is_ascii_digit())
        && trimmed.contains(|character: char| character == '.' || character == ',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_task() -> Task {
        Task::new("Write quarterly report", Priority::High, 60)
    }

    #[test]
    fn task_validate_rejects_empty_description_and_zero_duration() {
        assert!(sample_task().validate().is_ok());

        let mut task = sample_task();
        task.description = "   ".to_string();
        assert!(task.validate().is_err());

        let mut task = sample_task();
        task.duration_minutes = 0;
        assert!(task.validate().is_err());
    }

    #[test]
    fn tags_follow_description_edits() {
        let mut task = sample_task();
        assert!(!task.is_evening());
        assert!(!task.is_break_or_low());

        task.description = "Cook DINNER with family".to_string();
        assert!(task.is_evening());
        assert!(!task.is_break_or_low());

        task.description = "Relax and Wind Down".to_string();
        assert!(task.is_evening());
        assert!(task.is_break_or_low());

        task.description = "Coffee break".to_string();
        assert!(!task.is_evening());
        assert!(task.is_break_or_low());
    }

    #[test]
    fn focus_pattern_buckets_by_hour() {
        assert_eq!(FocusPattern::from_hour(5), FocusPattern::Night);
        assert_eq!(FocusPattern::from_hour(6), FocusPattern::Morning);
        assert_eq!(FocusPattern::from_hour(10), FocusPattern::Morning);
        assert_eq!(FocusPattern::from_hour(11), FocusPattern::Afternoon);
        assert_eq!(FocusPattern::from_hour(15), FocusPattern::Afternoon);
        assert_eq!(FocusPattern::from_hour(16), FocusPattern::Evening);
        assert_eq!(FocusPattern::from_hour(20), FocusPattern::Evening);
        assert_eq!(FocusPattern::from_hour(21), FocusPattern::Night);
        assert_eq!(FocusPattern::from_hour(0), FocusPattern::Night);
    }

    #[test]
    fn duration_text_handles_common_shapes() {
        assert_eq!(parse_duration_text("1 hour"), 60);
        assert_eq!(parse_duration_text("2 hours 15 minutes"), 135);
        assert_eq!(parse_duration_text("30 min"), 30);
        assert_eq!(parse_duration_text("90min"), 90);
        assert_eq!(parse_duration_text("1hr 30mins"), 90);
        assert_eq!(parse_duration_text("45"), 45);
        assert_eq!(parse_duration_text("an hour"), 60);
        assert_eq!(parse_duration_text("a few minutes"), 30);
        assert_eq!(parse_duration_text("2 hrs"), 120);
        assert_eq!(parse_duration_text("15m"), 15);
        assert_eq!(parse_duration_text("20 min."), 20);
    }

    #[test]
    fn duration_text_ignores_words_that_only_start_like_units() {
        assert_eq!(parse_duration_text("10 minimal edits, 20 min"), 20);
        assert_eq!(parse_duration_text("3 hourglass sketches 45 minutes"), 45);
        assert_eq!(parse_duration_text("mindful stretching 10 mins"), 10);
    }

    #[test]
    fn duration_text_defaults_on_ambiguity() {
        assert_eq!(parse_duration_text(""), 30);
        assert_eq!(parse_duration_text("soon"), 30);
        assert_eq!(parse_duration_text("0 min"), 30);
        assert_eq!(parse_duration_text("1.5 hours"), 30);
        assert_eq!(parse_duration_text("2.5hrs"), 30);
        assert_eq!(parse_duration_text("1,5 hours"), 30);
    }

    #[test]
    fn parse_priority_and_mood_are_case_insensitive() {
        assert_eq!(parse_priority(" HIGH "), Ok(Priority::High));
        assert_eq!(parse_priority("low"), Ok(Priority::Low));
        assert!(parse_priority("urgent").is_err());
        assert_eq!(parse_mood("Great"), Ok(Mood::Great));
        assert!(parse_mood("tired").is_err());
    }

    #[test]
    fn date_key_must_be_iso_date() {
        assert!(validate_date_key("2026-02-16").is_ok());
        assert!(validate_date_key("16/02/2026").is_err());
    }

    proptest! {
        #[test]
        fn parsed_duration_is_always_positive(text in "[a-z0-9 ]{0,24}") {
            prop_assert!(parse_duration_text(&text) > 0);
        }
    }

    #[test]
    fn task_supports_serde_roundtrip() {
        let mut task = sample_task();
        task.completed = true;
        task.slot = Placement::Scheduled("09:00 AM - 10:00 AM".parse().expect("valid slot"));

        let roundtrip: Task =
            serde_json::from_str(&serde_json::to_string(&task).expect("serialize task"))
                .expect("deserialize task");
        assert_eq!(roundtrip, task);
    }
}
