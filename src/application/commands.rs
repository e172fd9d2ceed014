use crate::application::bootstrap::bootstrap_workspace;
use crate::application::reschedule::{
    NowProvider, RescheduleRequest, RescheduleService, UnavailableOracle,
};
use crate::domain::insights::{progress_percent, weekly_insights, WeeklyInsights};
use crate::domain::models::{
    parse_duration_text, parse_mood, parse_priority, validate_date_key, DailyRecord, Mood,
    MoodLogEntry, Priority, Task,
};
use crate::domain::scheduling::{
    conflict_set, resequence_for_mood, schedule_plan, shift_task, sort_chronologically,
};
use crate::domain::slot::{Placement, ScheduleError};
use crate::infrastructure::config::{
    load_oracle_settings, load_runtime_policy, OracleSettings, RuntimePolicy,
};
use crate::infrastructure::credential_store::{
    load_api_key_from_env, ApiKeyStore, KeyringApiKeyStore,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::gemini_client::{ReqwestGeminiClient, SuggestionOracle, TaskGenerator};
use crate::infrastructure::history_repository::{HistoryRepository, SqliteHistoryRepository};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, info, warn};

/// The single live session: one user, one day, one plan.
pub struct AppState {
    logs_dir: PathBuf,
    policy: RuntimePolicy,
    oracle_settings: OracleSettings,
    history: Arc<dyn HistoryRepository>,
    api_keys: Arc<dyn ApiKeyStore>,
    now_provider: NowProvider,
    runtime: Mutex<RuntimeState>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let policy = load_runtime_policy(&bootstrap.config_dir);
        let oracle_settings = load_oracle_settings(&bootstrap.config_dir);
        let history = Arc::new(SqliteHistoryRepository::new(&bootstrap.database_path));

        Ok(Self {
            logs_dir: bootstrap.logs_dir,
            policy,
            oracle_settings,
            history,
            api_keys: Arc::new(KeyringApiKeyStore::default()),
            now_provider: Arc::new(Utc::now),
            runtime: Mutex::new(RuntimeState::default()),
        })
    }

    pub fn with_history_repository(mut self, history: Arc<dyn HistoryRepository>) -> Self {
        self.history = history;
        self
    }

    pub fn with_api_key_store(mut self, api_keys: Arc<dyn ApiKeyStore>) -> Self {
        self.api_keys = api_keys;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        info!(command, "{message}");
    }

    pub fn log_error(&self, command: &str, message: &str) {
        error!(command, "{message}");
    }

    fn today_key(&self) -> String {
        (self.now_provider)()
            .with_timezone(&self.policy.timezone)
            .format("%Y-%m-%d")
            .to_string()
    }

    fn local_clock(&self) -> String {
        (self.now_provider)()
            .with_timezone(&self.policy.timezone)
            .format("%I:%M %p")
            .to_string()
    }
}

#[derive(Debug, Default)]
struct RuntimeState {
    plan: Vec<Task>,
    /// Day the live plan belongs to; `None` means today.
    active_date: Option<String>,
    mood_log: Vec<MoodLogEntry>,
    last_mood: Option<Mood>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulePlanResponse {
    pub break_minutes: i64,
    pub scheduled: usize,
    pub unscheduled: usize,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RescheduleTaskResponse {
    pub time_slot: String,
    pub reason: String,
    pub source: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShiftTaskResponse {
    pub message: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApplyMoodResponse {
    pub applied: bool,
    pub tasks: Vec<Task>,
    pub mood_log: Vec<MoodLogEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveDayResponse {
    pub user_id: String,
    pub date_key: String,
    pub task_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadDayResponse {
    pub date_key: String,
    pub saved: bool,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiKeyStatusResponse {
    pub stored: bool,
}

pub async fn load_draft_impl(state: &AppState, goal: String) -> Result<Vec<Task>, InfraError> {
    let client = gemini_client(state)?;
    load_draft_with_generator(state, &client, goal).await
}

/// Replaces the live plan with an unscheduled draft built from generated tasks.
pub async fn load_draft_with_generator<G>(
    state: &AppState,
    generator: &G,
    goal: String,
) -> Result<Vec<Task>, InfraError>
where
    G: TaskGenerator + ?Sized,
{
    let goal = goal.trim();
    if goal.is_empty() {
        return Err(InfraError::InvalidConfig("goal must not be empty".to_string()));
    }

    let generated = generator.generate_tasks(goal).await?;
    let draft = generated
        .into_iter()
        .filter_map(|item| {
            let description = item.description.trim();
            if description.is_empty() {
                return None;
            }
            let priority = parse_priority(&item.priority).unwrap_or_else(|reason| {
                warn!(task = description, %reason, "defaulting generated task to Medium");
                Priority::Medium
            });
            Some(Task::new(
                description,
                priority,
                parse_duration_text(&item.duration_text),
            ))
        })
        .collect::<Vec<_>>();

    if draft.is_empty() {
        return Err(InfraError::Oracle(
            "task generator returned no usable tasks".to_string(),
        ));
    }

    {
        let mut runtime = lock_runtime(state)?;
        runtime.plan = draft.clone();
        runtime.active_date = None;
        runtime.last_mood = None;
    }

    state.log_info("load_draft", &format!("loaded {} draft tasks", draft.len()));
    Ok(draft)
}

pub fn add_task_impl(
    state: &AppState,
    description: String,
    priority: String,
    duration_text: String,
) -> Result<Task, InfraError> {
    let priority = parse_priority(&priority).map_err(InfraError::InvalidConfig)?;
    let task = Task::new(
        description.trim(),
        priority,
        parse_duration_text(&duration_text),
    );
    task.validate().map_err(InfraError::InvalidConfig)?;

    {
        let mut runtime = lock_runtime(state)?;
        runtime.plan.push(task.clone());
    }

    state.log_info(
        "add_task",
        &format!(
            "added task '{}' ({} min)",
            task.description, task.duration_minutes
        ),
    );
    Ok(task)
}

pub fn list_plan_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(runtime.plan.clone())
}

/// Lays out the whole plan; the result stays in priority order until sorted.
pub fn schedule_plan_impl(state: &AppState) -> Result<SchedulePlanResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let summary = schedule_plan(&mut runtime.plan, &state.policy.work_window);
    let response = SchedulePlanResponse {
        break_minutes: summary.break_minutes,
        scheduled: summary.scheduled,
        unscheduled: summary.unscheduled,
        tasks: runtime.plan.clone(),
    };
    drop(runtime);

    state.log_info(
        "schedule_plan",
        &format!(
            "scheduled={} unscheduled={} break_minutes={}",
            summary.scheduled, summary.unscheduled, summary.break_minutes
        ),
    );
    Ok(response)
}

pub fn sort_plan_impl(state: &AppState) -> Result<Vec<Task>, InfraError> {
    let mut runtime = lock_runtime(state)?;
    sort_chronologically(&mut runtime.plan);
    let tasks = runtime.plan.clone();
    drop(runtime);

    state.log_info("sort_plan", &format!("sorted {} tasks", tasks.len()));
    Ok(tasks)
}

pub async fn reschedule_task_impl(
    state: &AppState,
    index: usize,
) -> Result<RescheduleTaskResponse, InfraError> {
    match gemini_client(state) {
        Ok(client) => reschedule_task_with_oracle(state, Arc::new(client), index).await,
        Err(error) => {
            warn!(%error, "gemini client unavailable; rescheduling without oracle");
            let oracle = Arc::new(UnavailableOracle::new(error.to_string()));
            reschedule_task_with_oracle(state, oracle, index).await
        }
    }
}

pub async fn reschedule_task_with_oracle<O>(
    state: &AppState,
    oracle: Arc<O>,
    index: usize,
) -> Result<RescheduleTaskResponse, InfraError>
where
    O: SuggestionOracle,
{
    let (snapshot, conflicts) = {
        let runtime = lock_runtime(state)?;
        let task = runtime.plan.get(index).ok_or_else(|| invalid_index(index))?;
        (task.clone(), conflict_set(&runtime.plan, index))
    };
    let description = snapshot.description.as_str();

    let service = RescheduleService::new(oracle)
        .with_timeout(Duration::from_secs(state.oracle_settings.timeout_seconds))
        .with_timezone(state.policy.timezone)
        .with_now_provider(Arc::clone(&state.now_provider));
    let outcome = service
        .reschedule(RescheduleRequest {
            task_description: description,
            window: &state.policy.work_window,
            conflicts: &conflicts,
        })
        .await;

    let mut runtime = lock_runtime(state)?;
    let task = runtime
        .plan
        .get_mut(index)
        .filter(|task| **task == snapshot)
        .ok_or_else(|| {
            InfraError::Schedule(ScheduleError::InvalidOperation(
                "The plan changed while rescheduling; try again.".to_string(),
            ))
        })?;
    task.slot = Placement::Scheduled(outcome.slot);
    task.completed = false;
    sort_chronologically(&mut runtime.plan);
    let tasks = runtime.plan.clone();
    drop(runtime);

    state.log_info(
        "reschedule_task",
        &format!(
            "task '{description}' moved to {} via {}",
            outcome.slot,
            outcome.source.as_str()
        ),
    );
    Ok(RescheduleTaskResponse {
        time_slot: outcome.slot.to_string(),
        reason: outcome.reason,
        source: outcome.source.as_str().to_string(),
        tasks,
    })
}

pub fn shift_task_impl(state: &AppState, index: usize) -> Result<ShiftTaskResponse, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let description = runtime
        .plan
        .get(index)
        .map(|task| task.description.clone())
        .ok_or_else(|| invalid_index(index))?;
    let shifted = shift_task(&mut runtime.plan, index)?;
    let tasks = runtime.plan.clone();
    drop(runtime);

    let message = format!("Task '{description}' rescheduled by ~30% to {shifted}. List sorted.");
    state.log_info("shift_task", &message);
    Ok(ShiftTaskResponse { message, tasks })
}

pub fn set_completed_impl(
    state: &AppState,
    index: usize,
    completed: bool,
) -> Result<Task, InfraError> {
    let mut runtime = lock_runtime(state)?;
    let task = runtime.plan.get_mut(index).ok_or_else(|| invalid_index(index))?;
    task.completed = completed;
    let task = task.clone();
    drop(runtime);

    state.log_info(
        "set_completed",
        &format!("task '{}' completed={completed}", task.description),
    );
    Ok(task)
}

/// Resequences for the reported mood. Repeating the previous mood does nothing.
pub fn apply_mood_impl(state: &AppState, mood: String) -> Result<ApplyMoodResponse, InfraError> {
    let mood = parse_mood(&mood).map_err(InfraError::InvalidConfig)?;
    let mut runtime = lock_runtime(state)?;

    let applied = runtime.last_mood != Some(mood);
    if applied {
        resequence_for_mood(&mut runtime.plan, mood);
        let entry = MoodLogEntry {
            time: state.local_clock(),
            mood,
            action: mood.action().to_string(),
        };
        runtime.mood_log.push(entry);
        runtime.last_mood = Some(mood);
    }

    let response = ApplyMoodResponse {
        applied,
        tasks: runtime.plan.clone(),
        mood_log: runtime.mood_log.clone(),
    };
    drop(runtime);

    state.log_info("apply_mood", &format!("mood={mood:?} applied={applied}"));
    Ok(response)
}

pub fn progress_impl(state: &AppState) -> Result<f64, InfraError> {
    let runtime = lock_runtime(state)?;
    Ok(progress_percent(&runtime.plan))
}

/// Saves the live plan under `date_key`, else the day it was loaded from, else today.
pub fn save_day_impl(
    state: &AppState,
    date_key: Option<String>,
) -> Result<SaveDayResponse, InfraError> {
    let (plan, active_date) = {
        let runtime = lock_runtime(state)?;
        (runtime.plan.clone(), runtime.active_date.clone())
    };
    let date_key = match date_key {
        Some(date_key) => normalize_date_key(&date_key)?,
        None => active_date.unwrap_or_else(|| state.today_key()),
    };
    state
        .history
        .save_plan(&state.policy.user_id, &date_key, &plan)?;

    state.log_info(
        "save_day",
        &format!("saved {} tasks for {date_key}", plan.len()),
    );
    Ok(SaveDayResponse {
        user_id: state.policy.user_id.clone(),
        date_key,
        task_count: plan.len(),
    })
}

/// Makes a stored day the live plan so it can be edited and saved back.
/// A day that was never saved starts empty.
pub fn load_day_impl(state: &AppState, date_key: String) -> Result<LoadDayResponse, InfraError> {
    let date_key = normalize_date_key(&date_key)?;
    let stored = state.history.load_day(&state.policy.user_id, &date_key)?;
    let saved = stored.is_some();
    let tasks = stored.unwrap_or_default();

    {
        let mut runtime = lock_runtime(state)?;
        runtime.plan = tasks.clone();
        runtime.active_date = Some(date_key.clone());
        runtime.last_mood = None;
    }

    state.log_info(
        "load_day",
        &format!("loaded {} tasks for {date_key} (saved={saved})", tasks.len()),
    );
    Ok(LoadDayResponse {
        date_key,
        saved,
        tasks,
    })
}

pub fn load_history_impl(
    state: &AppState,
    days: Option<usize>,
) -> Result<Vec<DailyRecord>, InfraError> {
    let days = days.unwrap_or(state.policy.history_days);
    let records = state.history.load_recent(&state.policy.user_id, days)?;
    state.log_info("load_history", &format!("loaded {} days", records.len()));
    Ok(records)
}

pub fn weekly_insights_impl(state: &AppState) -> Result<WeeklyInsights, InfraError> {
    let records = state
        .history
        .load_recent(&state.policy.user_id, state.policy.history_days)?;
    let insights = weekly_insights(&records);
    state.log_info(
        "weekly_insights",
        &format!(
            "days={} total={} completed={}",
            records.len(),
            insights.total_tasks,
            insights.completed_tasks
        ),
    );
    Ok(insights)
}

pub fn set_api_key_impl(
    state: &AppState,
    api_key: String,
) -> Result<ApiKeyStatusResponse, InfraError> {
    state.api_keys.save_api_key(&api_key)?;
    state.log_info("set_api_key", "stored gemini api key");
    Ok(ApiKeyStatusResponse { stored: true })
}

pub fn clear_api_key_impl(state: &AppState) -> Result<ApiKeyStatusResponse, InfraError> {
    state.api_keys.delete_api_key()?;
    state.log_info("clear_api_key", "removed stored gemini api key");
    Ok(ApiKeyStatusResponse { stored: false })
}

fn normalize_date_key(date_key: &str) -> Result<String, InfraError> {
    let date_key = date_key.trim();
    validate_date_key(date_key).map_err(InfraError::InvalidConfig)?;
    Ok(date_key.to_string())
}

fn lock_runtime(state: &AppState) -> Result<MutexGuard<'_, RuntimeState>, InfraError> {
    state
        .runtime
        .lock()
        .map_err(|error| InfraError::InvalidConfig(format!("runtime lock poisoned: {error}")))
}

fn invalid_index(index: usize) -> InfraError {
    InfraError::Schedule(ScheduleError::InvalidOperation(format!(
        "Task index {index} is invalid."
    )))
}

fn gemini_client(state: &AppState) -> Result<ReqwestGeminiClient, InfraError> {
    let api_key = load_api_key_from_env(state.api_keys.as_ref())?;
    Ok(ReqwestGeminiClient::new(
        api_key,
        state.oracle_settings.clone(),
    ))
}
