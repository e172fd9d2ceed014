pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    add_task_impl, apply_mood_impl, clear_api_key_impl, list_plan_impl, load_day_impl,
    load_draft_impl, load_history_impl, progress_impl, reschedule_task_impl, save_day_impl,
    schedule_plan_impl, set_api_key_impl, set_completed_impl, shift_task_impl, sort_plan_impl,
    weekly_insights_impl, AppState,
};
use infrastructure::error::InfraError;
use infrastructure::logging::init_logging;
use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

/// One line of input on the command channel, e.g.
/// `{"command":"shift_task","index":2}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Invocation {
    Ping,
    LoadDraft {
        goal: String,
    },
    AddTask {
        description: String,
        priority: String,
        #[serde(default)]
        duration: String,
    },
    ListPlan,
    SchedulePlan,
    SortPlan,
    RescheduleTask {
        index: usize,
    },
    ShiftTask {
        index: usize,
    },
    SetCompleted {
        index: usize,
        completed: bool,
    },
    ApplyMood {
        mood: String,
    },
    Progress,
    SaveDay {
        #[serde(default)]
        date_key: Option<String>,
    },
    LoadDay {
        date_key: String,
    },
    LoadHistory {
        #[serde(default)]
        days: Option<usize>,
    },
    WeeklyInsights,
    SetApiKey {
        api_key: String,
    },
    ClearApiKey,
}

impl Invocation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::LoadDraft { .. } => "load_draft",
            Self::AddTask { .. } => "add_task",
            Self::ListPlan => "list_plan",
            Self::SchedulePlan => "schedule_plan",
            Self::SortPlan => "sort_plan",
            Self::RescheduleTask { .. } => "reschedule_task",
            Self::ShiftTask { .. } => "shift_task",
            Self::SetCompleted { .. } => "set_completed",
            Self::ApplyMood { .. } => "apply_mood",
            Self::Progress => "progress",
            Self::SaveDay { .. } => "save_day",
            Self::LoadDay { .. } => "load_day",
            Self::LoadHistory { .. } => "load_history",
            Self::WeeklyInsights => "weekly_insights",
            Self::SetApiKey { .. } => "set_api_key",
            Self::ClearApiKey => "clear_api_key",
        }
    }
}

fn reply<T: Serialize>(
    state: &AppState,
    command: &str,
    result: Result<T, InfraError>,
) -> Result<serde_json::Value, String> {
    let value = result.map_err(|error| state.command_error(command, &error))?;
    serde_json::to_value(value).map_err(|error| state.command_error(command, &error.into()))
}

pub async fn dispatch(
    state: &AppState,
    invocation: Invocation,
) -> Result<serde_json::Value, String> {
    let command = invocation.name();
    match invocation {
        Invocation::Ping => Ok(serde_json::Value::from("pong")),
        Invocation::LoadDraft { goal } => reply(state, command, load_draft_impl(state, goal).await),
        Invocation::AddTask {
            description,
            priority,
            duration,
        } => reply(
            state,
            command,
            add_task_impl(state, description, priority, duration),
        ),
        Invocation::ListPlan => reply(state, command, list_plan_impl(state)),
        Invocation::SchedulePlan => reply(state, command, schedule_plan_impl(state)),
        Invocation::SortPlan => reply(state, command, sort_plan_impl(state)),
        Invocation::RescheduleTask { index } => {
            reply(state, command, reschedule_task_impl(state, index).await)
        }
        Invocation::ShiftTask { index } => reply(state, command, shift_task_impl(state, index)),
        Invocation::SetCompleted { index, completed } => {
            reply(state, command, set_completed_impl(state, index, completed))
        }
        Invocation::ApplyMood { mood } => reply(state, command, apply_mood_impl(state, mood)),
        Invocation::Progress => reply(state, command, progress_impl(state)),
        Invocation::SaveDay { date_key } => {
            reply(state, command, save_day_impl(state, date_key))
        }
        Invocation::LoadDay { date_key } => reply(state, command, load_day_impl(state, date_key)),
        Invocation::LoadHistory { days } => reply(state, command, load_history_impl(state, days)),
        Invocation::WeeklyInsights => reply(state, command, weekly_insights_impl(state)),
        Invocation::SetApiKey { api_key } => {
            reply(state, command, set_api_key_impl(state, api_key))
        }
        Invocation::ClearApiKey => reply(state, command, clear_api_key_impl(state)),
    }
}

fn envelope(result: Result<serde_json::Value, String>) -> serde_json::Value {
    match result {
        Ok(data) => serde_json::json!({ "ok": true, "data": data }),
        Err(error) => serde_json::json!({ "ok": false, "error": error }),
    }
}

/// Serves one session over stdin/stdout: a JSON invocation per input line,
/// a JSON `{ok, data | error}` envelope per output line.
pub fn run() -> Result<(), InfraError> {
    let workspace_root = std::env::current_dir()?;
    let state = AppState::new(workspace_root)?;
    init_logging(Some(state.logs_dir()));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let result = match serde_json::from_str::<Invocation>(&line) {
            Ok(invocation) => runtime.block_on(dispatch(&state, invocation)),
            Err(error) => {
                state.log_error("dispatch", &format!("unreadable invocation: {error}"));
                Err(format!("invalid command: {error}"))
            }
        };
        writeln!(stdout, "{}", envelope(result))?;
        stdout.flush()?;
    }
    Ok(())
}
