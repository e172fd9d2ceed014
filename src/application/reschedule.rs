use crate::domain::models::{FocusPattern, DEFAULT_DURATION_MINUTES};
use crate::domain::scheduling::{find_free_slot, validate_candidate};
use crate::domain::slot::{format_clock, Slot, WorkWindow};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::gemini_client::{OracleSuggestion, SuggestionOracle, SuggestionRequest};
use async_trait::async_trait;
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub const FALLBACK_REASON: &str = "AI-selected free non-overlapping slot.";
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    Oracle,
    Fallback,
}

impl SlotSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Oracle => "oracle",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleOutcome {
    pub slot: Slot,
    pub reason: String,
    pub source: SlotSource,
}

/// What is being moved and what it must avoid.
#[derive(Debug, Clone)]
pub struct RescheduleRequest<'a> {
    pub task_description: &'a str,
    pub window: &'a WorkWindow,
    pub conflicts: &'a [Slot],
}

/// Picks a new slot for one task: the oracle's suggestion when it survives
/// validation, otherwise a scan for a free default-length slot. Never fails and never touches
/// the plan; writing the slot back and re-sorting is the caller's job.
pub struct RescheduleService<O>
where
    O: SuggestionOracle,
{
    oracle: Arc<O>,
    oracle_timeout: Duration,
    timezone: Tz,
    now_provider: NowProvider,
}

impl<O> RescheduleService<O>
where
    O: SuggestionOracle,
{
    pub fn new(oracle: Arc<O>) -> Self {
        Self {
            oracle,
            oracle_timeout: DEFAULT_ORACLE_TIMEOUT,
            timezone: Tz::UTC,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_timeout(mut self, oracle_timeout: Duration) -> Self {
        self.oracle_timeout = oracle_timeout;
        self
    }

    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn focus_pattern(&self) -> FocusPattern {
        let local = (self.now_provider)().with_timezone(&self.timezone);
        FocusPattern::from_hour(local.hour())
    }

    pub async fn reschedule(&self, request: RescheduleRequest<'_>) -> RescheduleOutcome {
        let suggestion_request = SuggestionRequest {
            task_description: request.task_description.to_string(),
            focus_pattern: self.focus_pattern().describe().to_string(),
            window_start: format_clock(request.window.start()),
            window_end: format_clock(request.window.end()),
        };

        match self.ask_oracle(&suggestion_request, request.window).await {
            Ok((slot, reason)) => {
                info!(task = request.task_description, %slot, "oracle slot accepted");
                RescheduleOutcome {
                    slot,
                    reason,
                    source: SlotSource::Oracle,
                }
            }
            Err(error) => {
                warn!(
                    task = request.task_description,
                    %error,
                    "oracle suggestion unusable; scanning for a free slot"
                );
                RescheduleOutcome {
                    slot: find_free_slot(
                        request.conflicts,
                        request.window,
                        DEFAULT_DURATION_MINUTES,
                    ),
                    reason: FALLBACK_REASON.to_string(),
                    source: SlotSource::Fallback,
                }
            }
        }
    }

    async fn ask_oracle(
        &self,
        request: &SuggestionRequest,
        window: &WorkWindow,
    ) -> Result<(Slot, String), InfraError> {
        let suggestion = timeout(self.oracle_timeout, self.oracle.suggest_slot(request))
            .await
            .map_err(|_| InfraError::OracleTimeout(self.oracle_timeout.as_secs()))??;
        let slot = validate_candidate(&suggestion.time_slot, window)?;
        let reason = match suggestion.reason.trim() {
            "" => FALLBACK_REASON.to_string(),
            reason => reason.to_string(),
        };
        Ok((slot, reason))
    }
}

/// Stands in for the oracle when no client can be built (e.g. no API key),
/// so rescheduling still degrades to the free-slot scan.
#[derive(Debug, Clone)]
pub struct UnavailableOracle {
    reason: String,
}

impl UnavailableOracle {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl SuggestionOracle for UnavailableOracle {
    async fn suggest_slot(&self, _request: &SuggestionRequest) -> Result<OracleSuggestion, InfraError> {
        Err(InfraError::Oracle(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    enum FakeOracleResponse {
        Suggest(&'static str, &'static str),
        Raw(String),
        Error,
        Hang,
    }

    #[derive(Debug)]
    struct FakeOracle {
        responses: Mutex<VecDeque<FakeOracleResponse>>,
        calls: AtomicUsize,
        seen: Mutex<Vec<SuggestionRequest>>,
    }

    impl FakeOracle {
        fn with_responses(responses: Vec<FakeOracleResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SuggestionOracle for FakeOracle {
        async fn suggest_slot(&self, request: &SuggestionRequest) -> Result<OracleSuggestion, InfraError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .expect("seen lock poisoned")
                .push(request.clone());
            let response = self
                .responses
                .lock()
                .expect("response lock poisoned")
                .pop_front()
                .unwrap_or(FakeOracleResponse::Error);

            match response {
                FakeOracleResponse::Suggest(time_slot, reason) => Ok(OracleSuggestion {
                    time_slot: time_slot.to_string(),
                    reason: reason.to_string(),
                }),
                FakeOracleResponse::Raw(time_slot) => Ok(OracleSuggestion {
                    time_slot,
                    reason: String::new(),
                }),
                FakeOracleResponse::Error => {
                    Err(InfraError::Oracle("network error while calling gemini".to_string()))
                }
                FakeOracleResponse::Hang => {
                    std::future::pending::<()>().await;
                    Err(InfraError::Oracle("unreachable".to_string()))
                }
            }
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 16, 9, 30, 0)
            .single()
            .expect("valid fixed time")
    }

    fn sample_window() -> WorkWindow {
        WorkWindow::parse("09:00 AM", "05:00 PM").expect("valid window")
    }

    fn sample_conflicts() -> Vec<Slot> {
        vec!["09:00 AM - 10:00 AM".parse().expect("valid slot")]
    }

    fn service(oracle: Arc<FakeOracle>) -> RescheduleService<FakeOracle> {
        RescheduleService::new(oracle)
            .with_timeout(Duration::from_millis(50))
            .with_now_provider(Arc::new(fixed_time))
    }

    fn request<'a>(window: &'a WorkWindow, conflicts: &'a [Slot]) -> RescheduleRequest<'a> {
        RescheduleRequest {
            task_description: "Review budget",
            window,
            conflicts,
        }
    }

    #[tokio::test]
    async fn accepts_valid_oracle_suggestion() {
        let oracle = Arc::new(FakeOracle::with_responses(vec![FakeOracleResponse::Suggest(
            "02:00 PM - 02:45 PM",
            "Afternoon is quieter.",
        )]));
        let window = sample_window();
        let conflicts = sample_conflicts();

        let outcome = service(Arc::clone(&oracle))
            .reschedule(request(&window, &conflicts))
            .await;

        assert_eq!(outcome.slot.to_string(), "02:00 PM - 02:45 PM");
        assert_eq!(outcome.reason, "Afternoon is quieter.");
        assert_eq!(outcome.source, SlotSource::Oracle);
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);

        let seen = oracle.seen.lock().expect("seen lock").clone();
        assert_eq!(seen[0].window_start, "09:00 AM");
        assert_eq!(seen[0].window_end, "05:00 PM");
        assert_eq!(seen[0].focus_pattern, FocusPattern::Morning.describe());
    }

    #[tokio::test]
    async fn clamps_out_of_window_suggestion() {
        let oracle = Arc::new(FakeOracle::with_responses(vec![FakeOracleResponse::Suggest(
            "07:00 AM - 07:30 AM",
            "",
        )]));
        let window = sample_window();
        let conflicts = sample_conflicts();

        let outcome = service(oracle).reschedule(request(&window, &conflicts)).await;

        assert_eq!(outcome.slot.to_string(), "09:00 AM - 09:30 AM");
        assert_eq!(outcome.reason, FALLBACK_REASON);
        assert_eq!(outcome.source, SlotSource::Oracle);
    }

    #[tokio::test]
    async fn falls_back_on_error_malformed_and_timeout() {
        for response in [
            FakeOracleResponse::Error,
            FakeOracleResponse::Raw("sometime after lunch".to_string()),
            FakeOracleResponse::Hang,
        ] {
            let oracle = Arc::new(FakeOracle::with_responses(vec![response]));
            let window = sample_window();
            let conflicts = sample_conflicts();

            let outcome = service(Arc::clone(&oracle))
                .reschedule(request(&window, &conflicts))
                .await;

            assert_eq!(outcome.slot.to_string(), "10:00 AM - 10:30 AM");
            assert_eq!(outcome.reason, FALLBACK_REASON);
            assert_eq!(outcome.source, SlotSource::Fallback);
            assert_eq!(oracle.calls.load(Ordering::SeqCst), 1);
        }
    }

    #[tokio::test]
    async fn falls_back_when_window_is_too_short_to_clamp() {
        let oracle = Arc::new(FakeOracle::with_responses(vec![FakeOracleResponse::Suggest(
            "06:00 AM - 06:30 AM",
            "early bird",
        )]));
        let window = WorkWindow::parse("09:00 AM", "09:20 AM").expect("valid window");

        let outcome = service(oracle).reschedule(request(&window, &[])).await;

        assert_eq!(outcome.source, SlotSource::Fallback);
        assert_eq!(outcome.slot.to_string(), "09:00 AM - 09:20 AM");
    }

    #[tokio::test]
    async fn unavailable_oracle_degrades_to_scan() {
        let window = sample_window();
        let conflicts = sample_conflicts();
        let outcome = RescheduleService::new(Arc::new(UnavailableOracle::new("missing api key")))
            .reschedule(request(&window, &conflicts))
            .await;
        assert_eq!(outcome.source, SlotSource::Fallback);
        assert_eq!(outcome.slot.to_string(), "10:00 AM - 10:30 AM");
    }

    #[test]
    fn focus_pattern_uses_configured_timezone() {
        let oracle = Arc::new(FakeOracle::with_responses(Vec::new()));
        let utc = service(Arc::clone(&oracle));
        assert_eq!(utc.focus_pattern(), FocusPattern::Morning);

        let tokyo = service(oracle).with_timezone(chrono_tz::Asia::Tokyo);
        assert_eq!(tokyo.focus_pattern(), FocusPattern::Evening);
    }

    proptest! {
        #[test]
        fn reschedule_is_total_for_any_oracle_text(time_slot in "\\PC{0,40}", fail in any::<bool>()) {
            let runtime = tokio::runtime::Runtime::new().expect("runtime");
            runtime.block_on(async move {
                let response = if fail {
                    FakeOracleResponse::Error
                } else {
                    FakeOracleResponse::Raw(time_slot)
                };
                let oracle = Arc::new(FakeOracle::with_responses(vec![response]));
                let window = sample_window();
                let conflicts = sample_conflicts();

                let outcome = service(oracle).reschedule(request(&window, &conflicts)).await;

                assert!(outcome.slot.is_within(&window));
                assert!(!outcome.reason.is_empty());
            });
        }
    }
}
