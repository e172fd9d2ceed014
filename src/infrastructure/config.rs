use crate::domain::slot::{format_clock, parse_clock, WorkWindow};
use crate::infrastructure::error::InfraError;
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

const APP_JSON: &str = "app.json";
const POLICIES_JSON: &str = "policies.json";
const ORACLE_JSON: &str = "oracle.json";

pub const DEFAULT_USER_ID: &str = "default";
pub const DEFAULT_HISTORY_DAYS: usize = 7;
pub const DEFAULT_ORACLE_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_ORACLE_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_ORACLE_TIMEOUT_SECONDS: u64 = 20;
pub const DEFAULT_ORACLE_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBundle {
    pub app: serde_json::Value,
    pub policies: serde_json::Value,
    pub oracle: serde_json::Value,
}

fn default_files() -> HashMap<&'static str, serde_json::Value> {
    HashMap::from([
        (
            APP_JSON,
            serde_json::json!({
                "schema": 1,
                "appName": "LifeLoop",
                "timezone": "UTC",
                "userId": DEFAULT_USER_ID
            }),
        ),
        (
            POLICIES_JSON,
            serde_json::json!({
                "schema": 1,
                "workWindow": {
                    "start": "08:00 AM",
                    "end": "09:00 PM"
                },
                "historyDays": DEFAULT_HISTORY_DAYS
            }),
        ),
        (
            ORACLE_JSON,
            serde_json::json!({
                "schema": 1,
                "model": DEFAULT_ORACLE_MODEL,
                "temperature": DEFAULT_ORACLE_TEMPERATURE,
                "timeoutSeconds": DEFAULT_ORACLE_TIMEOUT_SECONDS,
                "endpoint": DEFAULT_ORACLE_ENDPOINT
            }),
        ),
    ])
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    for (name, value) in default_files() {
        let path = config_dir.join(name);
        if !path.exists() {
            let formatted = serde_json::to_string_pretty(&value)?;
            fs::write(path, format!("{formatted}\n"))?;
        }
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_configs(config_dir: &Path) -> Result<ConfigBundle, InfraError> {
    Ok(ConfigBundle {
        app: read_config(&config_dir.join(APP_JSON))?,
        policies: read_config(&config_dir.join(POLICIES_JSON))?,
        oracle: read_config(&config_dir.join(ORACLE_JSON))?,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimePolicy {
    pub user_id: String,
    pub timezone: Tz,
    pub work_window: WorkWindow,
    pub history_days: usize,
}

impl Default for RuntimePolicy {
    fn default() -> Self {
        Self {
            user_id: DEFAULT_USER_ID.to_string(),
            timezone: Tz::UTC,
            work_window: default_work_window(),
            history_days: DEFAULT_HISTORY_DAYS,
        }
    }
}

fn default_work_window() -> WorkWindow {
    let start = NaiveTime::from_hms_opt(8, 0, 0).expect("valid default window start");
    let end = NaiveTime::from_hms_opt(21, 0, 0).expect("valid default window end");
    WorkWindow::new(start, end).expect("default window is ordered")
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleSettings {
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
    pub endpoint: String,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_ORACLE_MODEL.to_string(),
            temperature: DEFAULT_ORACLE_TEMPERATURE,
            timeout_seconds: DEFAULT_ORACLE_TIMEOUT_SECONDS,
            endpoint: DEFAULT_ORACLE_ENDPOINT.to_string(),
        }
    }
}

fn read_json_lenient(path: &Path) -> Option<serde_json::Value> {
    let raw = fs::read_to_string(path).ok()?;
    serde_json::from_str::<serde_json::Value>(&raw).ok()
}

fn non_empty_str<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Reads `app.json` and `policies.json`, keeping the default for any field
/// that is missing or unparsable.
pub fn load_runtime_policy(config_dir: &Path) -> RuntimePolicy {
    let mut policy = RuntimePolicy::default();

    if let Some(app) = read_json_lenient(&config_dir.join(APP_JSON)) {
        if let Some(user_id) = non_empty_str(&app, "userId") {
            policy.user_id = user_id.to_string();
        }
        if let Some(timezone) = non_empty_str(&app, "timezone") {
            match timezone.parse::<Tz>() {
                Ok(parsed) => policy.timezone = parsed,
                Err(error) => warn!(timezone, %error, "ignoring unknown timezone"),
            }
        }
    }

    let Some(policies) = read_json_lenient(&config_dir.join(POLICIES_JSON)) else {
        return policy;
    };

    if let Some(work_window) = policies.get("workWindow") {
        let start = non_empty_str(work_window, "start")
            .and_then(|raw| parse_clock(raw).ok())
            .unwrap_or(policy.work_window.start());
        let end = non_empty_str(work_window, "end")
            .and_then(|raw| parse_clock(raw).ok())
            .unwrap_or(policy.work_window.end());
        match WorkWindow::new(start, end) {
            Ok(window) => policy.work_window = window,
            Err(error) => warn!(
                start = %format_clock(start),
                end = %format_clock(end),
                %error,
                "ignoring inverted work window"
            ),
        }
    }

    if let Some(value) = policies
        .get("historyDays")
        .and_then(serde_json::Value::as_u64)
    {
        policy.history_days = value.max(1) as usize;
    }

    policy
}

pub fn load_oracle_settings(config_dir: &Path) -> OracleSettings {
    let mut settings = OracleSettings::default();
    let Some(oracle) = read_json_lenient(&config_dir.join(ORACLE_JSON)) else {
        return settings;
    };

    if let Some(model) = non_empty_str(&oracle, "model") {
        settings.model = model.to_string();
    }
    if let Some(value) = oracle.get("temperature").and_then(serde_json::Value::as_f64) {
        settings.temperature = value.clamp(0.0, 2.0) as f32;
    }
    if let Some(value) = oracle
        .get("timeoutSeconds")
        .and_then(serde_json::Value::as_u64)
    {
        settings.timeout_seconds = value.max(1);
    }
    if let Some(endpoint) = non_empty_str(&oracle, "endpoint") {
        settings.endpoint = endpoint.trim_end_matches('/').to_string();
    }

    settings
}
