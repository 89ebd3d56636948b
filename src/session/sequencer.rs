//! Pipeline sequencer — drives the four stages in order over one profile.
//!
//! Exactly one stage is active at a time. `advance` is accepted only once the
//! active stage has succeeded, and never past Remedies. Provider calls run as
//! spawned tasks that report back over a channel; `settle`, `next_completion`
//! and `drain_ready` feed those results into the active stage's executor,
//! which drops anything superseded.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Notify, mpsc};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::intake::Profile;
use crate::stages::{
    Disposition, Horizon, RoadmapCache, Stage, StageCompletion, StageExecutor, StageGenerator,
    StageRequest, StageResult,
};

pub struct PipelineSequencer {
    profile: Arc<Profile>,
    generator: Arc<StageGenerator>,
    cache: Arc<RoadmapCache>,
    executor: StageExecutor,
    /// Outstanding roadmap requests by horizon, keyed to their ticket.
    in_flight: HashMap<Horizon, u64>,
    completions_tx: mpsc::UnboundedSender<StageCompletion>,
    completions_rx: mpsc::UnboundedReceiver<StageCompletion>,
    arrivals: Arc<Notify>,
}

impl PipelineSequencer {
    /// Take ownership of the finalized profile and enter the Analysis stage.
    ///
    /// Must be called inside a tokio runtime: the first request is
    /// dispatched immediately.
    pub fn start(profile: Profile, generator: Arc<StageGenerator>) -> Self {
        Self::with_cache(profile, generator, Arc::new(RoadmapCache::new()))
    }

    /// Like `start`, with an explicit roadmap cache.
    pub fn with_cache(
        profile: Profile,
        generator: Arc<StageGenerator>,
        cache: Arc<RoadmapCache>,
    ) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (executor, request) = StageExecutor::start(Stage::Analysis, None);
        let mut sequencer = Self {
            profile: Arc::new(profile),
            generator,
            cache,
            executor,
            in_flight: HashMap::new(),
            completions_tx,
            completions_rx,
            arrivals: Arc::new(Notify::new()),
        };
        info!(name = %sequencer.profile.name, "Pipeline started");
        sequencer.dispatch(request);
        sequencer
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn active_stage(&self) -> Stage {
        self.executor.stage()
    }

    pub fn state(&self) -> &StageResult {
        self.executor.state()
    }

    /// Horizon shown by the roadmap stage; `None` for every other stage.
    pub fn horizon(&self) -> Option<Horizon> {
        self.executor.horizon()
    }

    pub fn cache(&self) -> &RoadmapCache {
        &self.cache
    }

    /// Notified once per completion sent back by a provider task. A
    /// notification with no waiter is kept until the next `notified()`.
    pub fn arrivals(&self) -> Arc<Notify> {
        Arc::clone(&self.arrivals)
    }

    /// Whether the final stage has produced its artifact.
    pub fn is_finished(&self) -> bool {
        self.active_stage().is_terminal() && self.state().is_success()
    }

    /// Move to the next stage. Only valid once the active stage succeeded.
    pub fn advance(&mut self) -> Result<Stage, SessionError> {
        let current = self.executor.stage();
        if !self.executor.state().is_success() {
            return Err(rejected(SessionError::invalid(
                format!("advance from {current}"),
                self.executor.state(),
            )));
        }

        let Some(next) = current.next().filter(|n| current.can_transition_to(*n)) else {
            return Err(rejected(SessionError::invalid(
                "advance",
                format!("{current} is the final stage"),
            )));
        };

        info!(from = %current, to = %next, "Advancing pipeline");
        self.enter(next);
        Ok(next)
    }

    /// Re-run the active stage after a failure.
    pub fn retry(&mut self) -> Result<(), SessionError> {
        let request = self.executor.retry().map_err(rejected)?;
        info!(stage = %request.stage, horizon = ?request.horizon, "Retrying stage");
        self.dispatch(request);
        Ok(())
    }

    /// Show the roadmap for `horizon`.
    ///
    /// A cached artifact is shown at once. A horizon whose request is still
    /// outstanding waits on that request again. Otherwise a new request is
    /// made. Either way any other outstanding request stops counting for the
    /// displayed state.
    pub fn select_horizon(&mut self, horizon: Horizon) -> Result<(), SessionError> {
        let stage = self.executor.stage();
        if !stage.takes_horizon() {
            return Err(rejected(SessionError::invalid(
                "select a horizon",
                format!("in the {stage} stage"),
            )));
        }

        if self.executor.horizon() == Some(horizon) {
            debug!(horizon = %horizon, "Horizon already selected");
            return Ok(());
        }

        if let Some(text) = self.cache.get(horizon) {
            info!(horizon = %horizon, "Roadmap served from cache");
            self.executor.seed(horizon, text);
            return Ok(());
        }

        if let Some(&ticket) = self.in_flight.get(&horizon) {
            info!(horizon = %horizon, ticket, "Roadmap request already outstanding");
            self.executor.resume(horizon, ticket);
            return Ok(());
        }

        let request = self.executor.rerun_with(horizon);
        info!(horizon = %horizon, ticket = request.ticket, "Requesting roadmap for horizon");
        self.dispatch(request);
        Ok(())
    }

    /// Apply a completion to the active stage.
    ///
    /// Successful roadmap results are cached for their horizon even when
    /// superseded; they are still valid for that horizon. Only the current
    /// request may change the observable state.
    pub fn apply(&mut self, completion: StageCompletion) -> Disposition {
        if completion.stage == Stage::Roadmap {
            if let Some(horizon) = completion.horizon {
                if self.in_flight.get(&horizon) == Some(&completion.ticket) {
                    self.in_flight.remove(&horizon);
                }
                if let Some(text) = completion.success_text() {
                    self.cache.put(horizon, text);
                }
            }
        }
        self.executor.apply(&completion)
    }

    /// Wait for the next completion and apply it.
    pub async fn next_completion(&mut self) -> Option<Disposition> {
        let completion = self.completions_rx.recv().await?;
        Some(self.apply(completion))
    }

    /// Wait until the active stage leaves `Pending`.
    pub async fn settle(&mut self) -> &StageResult {
        while self.executor.state().is_pending() {
            if self.next_completion().await.is_none() {
                break;
            }
        }
        self.executor.state()
    }

    /// Apply every completion that has already arrived, without waiting.
    pub fn drain_ready(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completions_rx.try_recv() {
            self.apply(completion);
            applied += 1;
        }
        applied
    }

    fn enter(&mut self, stage: Stage) {
        self.in_flight.clear();
        if !stage.takes_horizon() {
            let (executor, request) = StageExecutor::start(stage, None);
            self.executor = executor;
            self.dispatch(request);
            return;
        }

        let horizon = Horizon::default();
        if let Some(text) = self.cache.get(horizon) {
            info!(stage = %stage, horizon = %horizon, "Stage served from cache");
            self.executor = StageExecutor::seeded(stage, Some(horizon), text);
            return;
        }
        let (executor, request) = StageExecutor::start(stage, Some(horizon));
        self.executor = executor;
        self.dispatch(request);
    }

    fn dispatch(&mut self, request: StageRequest) {
        if let Some(horizon) = request.horizon {
            self.in_flight.insert(horizon, request.ticket);
        }
        let generator = Arc::clone(&self.generator);
        let profile = Arc::clone(&self.profile);
        let tx = self.completions_tx.clone();
        let arrivals = Arc::clone(&self.arrivals);
        debug!(stage = %request.stage, ticket = request.ticket, "Dispatching stage request");
        tokio::spawn(async move {
            let outcome = generator
                .generate(request.stage, &profile, request.horizon)
                .await;
            // The receiver lives as long as the sequencer; a closed channel
            // means the session is gone and the result has no reader.
            if tx.send(StageCompletion::new(request, outcome)).is_ok() {
                arrivals.notify_one();
            }
        });
    }
}

/// Log a refused transition. Debug builds also report it at error level.
/// The session state is unchanged.
fn rejected(err: SessionError) -> SessionError {
    warn!(error = %err, "Rejected pipeline transition");
    #[cfg(debug_assertions)]
    tracing::error!(error = %err, "Invalid pipeline transition requested");
    err
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::error::{LlmError, StageError};
    use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};
    use crate::stages::GeneratorConfig;

    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    /// Echoes the requested stage and horizon, counting calls per request
    /// payload. The first `fail_next` calls fail.
    #[derive(Default)]
    struct CountingLlm {
        calls: Mutex<HashMap<String, usize>>,
        fail_next: AtomicUsize,
    }

    impl CountingLlm {
        fn calls_matching(&self, needle: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(k, _)| k.contains(needle))
                .map(|(_, n)| *n)
                .sum()
        }
    }

    #[async_trait]
    impl LlmProvider for CountingLlm {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<CompletionResponse, LlmError> {
            let task = request
                .system_text()
                .lines()
                .find(|l| l.starts_with("TASK:"))
                .unwrap_or("TASK: ?")
                .to_string();
            let horizon = request
                .conversation_text()
                .lines()
                .find(|l| l.starts_with("Horizon:"))
                .unwrap_or("")
                .to_string();
            let key = format!("{task} {horizon}");
            *self.calls.lock().unwrap().entry(key.clone()).or_default() += 1;

            let failing = self
                .fail_next
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(LlmError::RequestFailed {
                    provider: "counting".into(),
                    reason: "scripted failure".into(),
                });
            }
            Ok(CompletionResponse {
                content: key,
                input_tokens: 1,
                output_tokens: 1,
            })
        }
    }

    fn profile() -> Profile {
        Profile {
            name: "Asha".into(),
            birth_details: "12/05/1990, 14:30, Mumbai".into(),
            location_focus: "Pune; Career".into(),
            problems: "Job stress".into(),
            comfort_level: "Mix".into(),
        }
    }

    fn sequencer(llm: &Arc<CountingLlm>) -> PipelineSequencer {
        let provider: Arc<dyn LlmProvider> = llm.clone();
        let generator = Arc::new(StageGenerator::new(provider, GeneratorConfig::default()));
        PipelineSequencer::start(profile(), generator)
    }

    async fn settle(seq: &mut PipelineSequencer) -> StageResult {
        timeout(TEST_TIMEOUT, seq.settle())
            .await
            .expect("stage never settled")
            .clone()
    }

    async fn settle_and_advance(seq: &mut PipelineSequencer) {
        assert!(settle(seq).await.is_success());
        seq.advance().unwrap();
    }

    #[tokio::test]
    async fn starts_in_pending_analysis() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        assert_eq!(seq.active_stage(), Stage::Analysis);
        assert!(seq.state().is_pending());
        assert!(seq.horizon().is_none());

        let state = settle(&mut seq).await;
        assert_eq!(state.text(), Some("TASK: Profile Analysis"));
        assert_eq!(llm.calls_matching("Profile Analysis"), 1);
    }

    #[tokio::test]
    async fn advance_while_pending_is_rejected() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        let err = seq.advance().unwrap_err();
        assert!(matches!(err, SessionError::InvalidTransition { .. }));
        assert_eq!(seq.active_stage(), Stage::Analysis);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn rejected_transitions_are_reported_and_leave_state_alone() {
        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer({
                let logs = logs.clone();
                move || logs.clone()
            })
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        assert!(seq.advance().is_err());
        assert!(seq.retry().is_err());
        assert!(seq.select_horizon(Horizon::Week).is_err());
        assert_eq!(seq.active_stage(), Stage::Analysis);
        assert!(seq.state().is_pending());
        assert!(seq.horizon().is_none());

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("Rejected pipeline transition").count(), 3);
        assert!(output.contains("WARN"));
        if cfg!(debug_assertions) {
            assert_eq!(output.matches("Invalid pipeline transition requested").count(), 3);
            assert!(output.contains("ERROR"));
        }
    }

    #[tokio::test]
    async fn failure_blocks_advance_until_retry_succeeds() {
        let llm = Arc::new(CountingLlm::default());
        llm.fail_next.store(1, Ordering::SeqCst);
        let mut seq = sequencer(&llm);

        assert!(settle(&mut seq).await.is_failure());
        assert!(seq.advance().is_err());
        assert_eq!(seq.active_stage(), Stage::Analysis);

        seq.retry().unwrap();
        assert!(seq.state().is_pending());
        assert!(seq.retry().is_err(), "retry is only valid from failure");

        assert!(settle(&mut seq).await.is_success());
        assert_eq!(seq.advance().unwrap(), Stage::Daily);
        assert_eq!(llm.calls_matching("Profile Analysis"), 2);
    }

    #[tokio::test]
    async fn walks_all_stages_then_stops() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);

        settle_and_advance(&mut seq).await;
        assert_eq!(seq.active_stage(), Stage::Daily);
        settle_and_advance(&mut seq).await;
        assert_eq!(seq.active_stage(), Stage::Roadmap);
        assert_eq!(seq.horizon(), Some(Horizon::Month));
        settle_and_advance(&mut seq).await;
        assert_eq!(seq.active_stage(), Stage::Remedies);

        assert!(settle(&mut seq).await.is_success());
        assert!(seq.is_finished());
        assert!(seq.advance().is_err());
        assert_eq!(seq.active_stage(), Stage::Remedies);
    }

    #[tokio::test]
    async fn horizon_only_in_roadmap() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        assert!(seq.select_horizon(Horizon::Year).is_err());
        assert!(seq.horizon().is_none());
    }

    #[tokio::test]
    async fn revisiting_a_horizon_uses_the_cache() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        settle_and_advance(&mut seq).await;
        settle_and_advance(&mut seq).await;

        let month = settle(&mut seq).await;
        assert!(month.is_success());

        seq.select_horizon(Horizon::Year).unwrap();
        assert!(seq.state().is_pending());
        assert!(settle(&mut seq).await.is_success());

        seq.select_horizon(Horizon::Month).unwrap();
        assert_eq!(seq.state(), &month, "cache hit settles immediately");
        assert_eq!(llm.calls_matching("Horizon: Month"), 1);
        assert_eq!(llm.calls_matching("Horizon: Year"), 1);
        assert_eq!(seq.cache().horizons(), vec![Horizon::Month, Horizon::Year]);
    }

    #[tokio::test]
    async fn returning_to_an_outstanding_horizon_waits_on_it() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        settle_and_advance(&mut seq).await;
        settle_and_advance(&mut seq).await;

        // Month is dispatched but has not run yet.
        seq.select_horizon(Horizon::Year).unwrap();
        seq.select_horizon(Horizon::Month).unwrap();
        assert!(seq.state().is_pending());
        assert_eq!(seq.horizon(), Some(Horizon::Month));

        let month = settle(&mut seq).await;
        assert!(month.text().unwrap().contains("Horizon: Month"));
        assert_eq!(llm.calls_matching("Horizon: Month"), 1);

        timeout(TEST_TIMEOUT, async {
            while !seq.cache().contains(Horizon::Year) {
                seq.drain_ready();
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("year completion never arrived");
        assert_eq!(seq.state(), &month);
        assert_eq!(llm.calls_matching("Horizon: Year"), 1);
    }

    #[tokio::test]
    async fn reselecting_current_horizon_is_a_no_op() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        settle_and_advance(&mut seq).await;
        settle_and_advance(&mut seq).await;
        settle(&mut seq).await;

        seq.select_horizon(Horizon::Month).unwrap();
        assert!(seq.state().is_success());
        assert_eq!(llm.calls_matching("Horizon: Month"), 1);
    }

    #[tokio::test]
    async fn failed_horizon_is_not_cached_and_retry_calls_again() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        settle_and_advance(&mut seq).await;
        settle_and_advance(&mut seq).await;
        settle(&mut seq).await;

        llm.fail_next.store(1, Ordering::SeqCst);
        seq.select_horizon(Horizon::Week).unwrap();
        assert!(settle(&mut seq).await.is_failure());
        assert!(!seq.cache().contains(Horizon::Week));

        seq.retry().unwrap();
        assert!(settle(&mut seq).await.is_success());
        assert_eq!(llm.calls_matching("Horizon: Week"), 2);
        assert!(seq.cache().contains(Horizon::Week));
    }

    #[tokio::test]
    async fn superseded_roadmap_success_is_cached_but_not_shown() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        settle_and_advance(&mut seq).await;
        settle_and_advance(&mut seq).await;
        settle(&mut seq).await;

        seq.select_horizon(Horizon::Year).unwrap();
        let stale = StageCompletion::new(
            StageRequest {
                stage: Stage::Roadmap,
                ticket: 0,
                horizon: Some(Horizon::Week),
            },
            Ok("late week plan".to_string()),
        );
        assert_eq!(seq.apply(stale), Disposition::Superseded);
        assert!(seq.state().is_pending());
        assert_eq!(seq.cache().get(Horizon::Week).as_deref(), Some("late week plan"));

        let stale_failure = StageCompletion::new(
            StageRequest {
                stage: Stage::Roadmap,
                ticket: 0,
                horizon: Some(Horizon::Year),
            },
            Err(StageError::provider(Stage::Roadmap, "boom")),
        );
        assert_eq!(seq.apply(stale_failure), Disposition::Superseded);
        assert!(seq.state().is_pending());
    }

    #[tokio::test]
    async fn entering_roadmap_uses_a_warm_cache() {
        let llm = Arc::new(CountingLlm::default());
        let provider: Arc<dyn LlmProvider> = llm.clone();
        let generator = Arc::new(StageGenerator::new(provider, GeneratorConfig::default()));
        let cache = Arc::new(RoadmapCache::new());
        cache.put(Horizon::Month, "known month");
        let mut seq = PipelineSequencer::with_cache(profile(), generator, cache);

        settle_and_advance(&mut seq).await;
        settle_and_advance(&mut seq).await;
        assert_eq!(seq.state().text(), Some("known month"));
        assert_eq!(llm.calls_matching("TASK: Roadmap"), 0);
    }

    #[tokio::test]
    async fn drain_ready_applies_arrived_completions() {
        let llm = Arc::new(CountingLlm::default());
        let mut seq = sequencer(&llm);
        timeout(TEST_TIMEOUT, async {
            while seq.state().is_pending() {
                seq.drain_ready();
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("completion never arrived");
        assert!(seq.state().is_success());
    }
}
