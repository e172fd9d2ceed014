use crate::domain::models::{DailyRecord, Priority, Task};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PriorityTally {
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayProgress {
    pub date_key: String,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyInsights {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub average_progress: f64,
    pub daily_progress: Vec<DayProgress>,
    pub priority_breakdown: BTreeMap<Priority, PriorityTally>,
    pub most_productive_day: Option<String>,
}

/// Completion percentage; 0 for an empty plan.
pub fn progress_percent(tasks: &[Task]) -> f64 {
    if tasks.is_empty() {
        return 0.0;
    }
    let completed = tasks.iter().filter(|task| task.completed).count();
    completed as f64 / tasks.len() as f64 * 100.0
}

pub fn weekly_insights(records: &[DailyRecord]) -> WeeklyInsights {
    let mut by_date = records.iter().collect::<Vec<_>>();
    by_date.sort_by(|left, right| left.date_key.cmp(&right.date_key));

    let mut priority_breakdown = BTreeMap::new();
    let mut total_tasks = 0;
    let mut completed_tasks = 0;
    let mut daily_progress = Vec::with_capacity(by_date.len());
    let mut most_productive: Option<(&str, f64)> = None;

    for record in by_date {
        total_tasks += record.tasks.len();
        for task in &record.tasks {
            let tally = priority_breakdown
                .entry(task.priority)
                .or_insert_with(PriorityTally::default);
            tally.total += 1;
            if task.completed {
                tally.completed += 1;
                completed_tasks += 1;
            }
        }

        let progress = progress_percent(&record.tasks);
        // Ascending walk, so `>=` hands ties to the most recent day.
        let beats_best = most_productive.is_none_or(|(_, best)| progress >= best);
        if progress > 0.0 && beats_best {
            most_productive = Some((record.date_key.as_str(), progress));
        }
        daily_progress.push(DayProgress {
            date_key: record.date_key.clone(),
            progress,
        });
    }

    let average_progress = if total_tasks == 0 {
        0.0
    } else {
        completed_tasks as f64 / total_tasks as f64 * 100.0
    };

    WeeklyInsights {
        total_tasks,
        completed_tasks,
        average_progress,
        daily_progress,
        priority_breakdown,
        most_productive_day: most_productive.map(|(date_key, _)| date_key.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(priority: Priority, completed: bool) -> Task {
        let mut task = Task::new("sample", priority, 30);
        task.completed = completed;
        task
    }

    fn record(date_key: &str, tasks: Vec<Task>) -> DailyRecord {
        DailyRecord {
            date_key: date_key.to_string(),
            tasks,
        }
    }

    #[test]
    fn progress_is_zero_for_empty_plan() {
        assert_eq!(progress_percent(&[]), 0.0);
        assert_eq!(
            progress_percent(&[task(Priority::High, true), task(Priority::Low, false)]),
            50.0
        );
    }

    #[test]
    fn weekly_insights_aggregates_days_and_priorities() {
        let records = vec![
            record(
                "2026-02-16",
                vec![task(Priority::High, true), task(Priority::Low, false)],
            ),
            record(
                "2026-02-15",
                vec![
                    task(Priority::High, true),
                    task(Priority::Medium, true),
                    task(Priority::Medium, true),
                    task(Priority::Low, false),
                ],
            ),
        ];
        let insights = weekly_insights(&records);

        assert_eq!(insights.total_tasks, 6);
        assert_eq!(insights.completed_tasks, 4);
        assert!((insights.average_progress - 66.666).abs() < 0.01);
        assert_eq!(insights.daily_progress[0].date_key, "2026-02-15");
        assert_eq!(insights.daily_progress[0].progress, 75.0);
        assert_eq!(
            insights.priority_breakdown[&Priority::Medium],
            PriorityTally {
                total: 2,
                completed: 2
            }
        );
        assert_eq!(insights.most_productive_day.as_deref(), Some("2026-02-15"));
    }

    #[test]
    fn most_productive_day_ties_go_to_most_recent_date() {
        let records = vec![
            record("2026-02-16", vec![task(Priority::Low, true)]),
            record("2026-02-17", vec![task(Priority::High, true)]),
            record("2026-02-15", vec![task(Priority::Medium, true)]),
        ];
        assert_eq!(
            weekly_insights(&records).most_productive_day.as_deref(),
            Some("2026-02-17")
        );
    }

    #[test]
    fn most_productive_day_requires_some_progress() {
        let records = vec![
            record("2026-02-16", vec![task(Priority::High, false)]),
            record("2026-02-17", Vec::new()),
        ];
        let insights = weekly_insights(&records);
        assert_eq!(insights.most_productive_day, None);
        assert_eq!(insights.average_progress, 0.0);
    }
}
