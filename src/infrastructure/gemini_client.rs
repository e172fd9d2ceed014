use crate::infrastructure::config::OracleSettings;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Inputs handed to the oracle; window bounds use the slot clock format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionRequest {
    pub task_description: String,
    pub focus_pattern: String,
    pub window_start: String,
    pub window_end: String,
}

/// Raw oracle answer; `time_slot` is untrusted text until validated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OracleSuggestion {
    pub time_slot: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratedTask {
    #[serde(alias = "task", alias = "Task")]
    pub description: String,
    #[serde(alias = "Priority", default)]
    pub priority: String,
    #[serde(alias = "time", alias = "Time", alias = "duration", default)]
    pub duration_text: String,
}

#[async_trait]
pub trait SuggestionOracle: Send + Sync {
    async fn suggest_slot(&self, request: &SuggestionRequest) -> Result<OracleSuggestion, InfraError>;
}

#[async_trait]
pub trait TaskGenerator: Send + Sync {
    async fn generate_tasks(&self, goal: &str) -> Result<Vec<GeneratedTask>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGeminiClient {
    client: Client,
    api_key: String,
    settings: OracleSettings,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Option<Vec<CandidatePart>>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl ReqwestGeminiClient {
    pub fn new(api_key: impl Into<String>, settings: OracleSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            settings,
        }
    }

    fn generate_endpoint(&self) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.settings.endpoint)
            .map_err(|error| InfraError::Oracle(format!("invalid oracle endpoint: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Oracle("oracle endpoint URL cannot be a base".to_string())
            })?;
            segments
                .pop_if_empty()
                .push("models")
                .push(&format!("{}:generateContent", self.settings.model));
        }
        Ok(url)
    }

    async fn generate_text(&self, prompt: &str) -> Result<String, InfraError> {
        if self.api_key.trim().is_empty() {
            return Err(InfraError::Oracle("api key must not be empty".to_string()));
        }
        let request = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.settings.temperature,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(self.generate_endpoint()?)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|error| InfraError::Oracle(format!("network error while calling gemini: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Oracle(format!("failed reading gemini response: {error}")))?;

        if !status.is_success() {
            return Err(InfraError::Oracle(format!(
                "gemini api error: http {}; body={body}",
                status.as_u16()
            )));
        }

        extract_candidate_text(&body)
    }
}

fn extract_candidate_text(body: &str) -> Result<String, InfraError> {
    let parsed: GenerateContentResponse = serde_json::from_str(body).map_err(|error| {
        InfraError::Oracle(format!("invalid gemini payload: {error}; body={body}"))
    })?;
    parsed
        .candidates
        .unwrap_or_default()
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts.unwrap_or_default())
        .find_map(|part| part.text.filter(|text| !text.trim().is_empty()))
        .ok_or_else(|| InfraError::Oracle(format!("gemini returned no candidate text; body={body}")))
}

/// Drops a surrounding Markdown code fence (```json ... ```) if present.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn parse_json_text<T: serde::de::DeserializeOwned>(text: &str, what: &str) -> Result<T, InfraError> {
    let cleaned = strip_code_fences(text);
    serde_json::from_str(cleaned)
        .map_err(|error| InfraError::Oracle(format!("invalid {what} payload: {error}; body={cleaned}")))
}

fn suggestion_prompt(request: &SuggestionRequest) -> String {
    format!(
        "You are a scheduling assistant. A task was skipped and needs a new time today.\n\
         Suggest one slot inside the working hours that suits the focus pattern.\n\n\
         Task: {task}\n\
         Focus pattern: {focus}\n\
         Working hours: {start} - {end}\n\n\
         Reply with JSON only:\n\
         {{\"time_slot\": \"hh:mm AM - hh:mm PM\", \"reason\": \"one short sentence\"}}",
        task = request.task_description,
        focus = request.focus_pattern,
        start = request.window_start,
        end = request.window_end,
    )
}

fn generation_prompt(goal: &str) -> String {
    format!(
        "Break this goal into a short list of concrete tasks for today.\n\n\
         Goal: {goal}\n\n\
         Reply with a JSON array only. Each item must look like:\n\
         {{\"task\": \"what to do\", \"priority\": \"High|Medium|Low\", \"time\": \"e.g. 1 hour or 30 min\"}}"
    )
}

#[async_trait]
impl SuggestionOracle for ReqwestGeminiClient {
    async fn suggest_slot(&self, request: &SuggestionRequest) -> Result<OracleSuggestion, InfraError> {
        let text = self.generate_text(&suggestion_prompt(request)).await?;
        parse_json_text(&text, "suggestion")
    }
}

#[async_trait]
impl TaskGenerator for ReqwestGeminiClient {
    async fn generate_tasks(&self, goal: &str) -> Result<Vec<GeneratedTask>, InfraError> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(InfraError::InvalidConfig("goal must not be empty".to_string()));
        }
        let text = self.generate_text(&generation_prompt(goal)).await?;
        parse_json_text(&text, "task list")
    }
}
