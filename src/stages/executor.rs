//! Stage executor — the Pending → Success | Failure machine for one stage.
//!
//! The executor never talks to the provider itself. Every operation that
//! needs a provider call hands back a `StageRequest`; whoever dispatches it
//! feeds the outcome back as a `StageCompletion`. Each request carries a
//! ticket, and only a completion carrying the current ticket is applied, so
//! results for a superseded horizon can never overwrite the current one.

use tracing::debug;

use crate::error::{SessionError, StageError};

use super::state::{Horizon, Stage, StageResult};

/// A provider call the executor wants made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageRequest {
    pub stage: Stage,
    pub ticket: u64,
    pub horizon: Option<Horizon>,
}

/// Outcome of a dispatched `StageRequest`.
#[derive(Debug, Clone)]
pub struct StageCompletion {
    pub stage: Stage,
    pub ticket: u64,
    pub horizon: Option<Horizon>,
    pub outcome: Result<String, StageError>,
}

impl StageCompletion {
    pub fn new(request: StageRequest, outcome: Result<String, StageError>) -> Self {
        Self {
            stage: request.stage,
            ticket: request.ticket,
            horizon: request.horizon,
            outcome,
        }
    }

    /// The artifact text, if this completion carries a usable one.
    pub fn success_text(&self) -> Option<&str> {
        match &self.outcome {
            Ok(text) if !text.trim().is_empty() => Some(text.as_str()),
            _ => None,
        }
    }
}

/// What happened to a completion handed to `StageExecutor::apply`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The completion settled the executor.
    Applied,
    /// The completion belonged to an older request and was dropped.
    Superseded,
}

/// Tracks one stage's request lifecycle.
#[derive(Debug, Clone)]
pub struct StageExecutor {
    stage: Stage,
    horizon: Option<Horizon>,
    state: StageResult,
    /// Ticket of the request whose completion may settle this executor.
    ticket: u64,
    /// Highest ticket handed out so far.
    issued: u64,
}

impl StageExecutor {
    /// Enter `Pending` for `stage` and return the first request.
    pub fn start(stage: Stage, horizon: Option<Horizon>) -> (Self, StageRequest) {
        let executor = Self {
            stage,
            horizon,
            state: StageResult::Pending,
            ticket: 1,
            issued: 1,
        };
        let request = executor.current_request();
        debug!(stage = %stage, horizon = ?horizon, "Stage executor started");
        (executor, request)
    }

    /// Start directly in `Success` with a previously obtained artifact.
    pub fn seeded(stage: Stage, horizon: Option<Horizon>, text: impl Into<String>) -> Self {
        Self {
            stage,
            horizon,
            state: StageResult::Success(text.into()),
            ticket: 1,
            issued: 1,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn horizon(&self) -> Option<Horizon> {
        self.horizon
    }

    pub fn state(&self) -> &StageResult {
        &self.state
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Feed back the outcome of a dispatched request.
    ///
    /// Only a completion for this stage and horizon, carrying the current
    /// ticket, while `Pending`, is applied. A successful call with blank text
    /// counts as a failure.
    pub fn apply(&mut self, completion: &StageCompletion) -> Disposition {
        if completion.stage != self.stage
            || completion.ticket != self.ticket
            || completion.horizon != self.horizon
            || !self.state.is_pending()
        {
            debug!(
                stage = %completion.stage,
                ticket = completion.ticket,
                current = self.ticket,
                "Dropping superseded stage completion"
            );
            return Disposition::Superseded;
        }

        self.state = match &completion.outcome {
            Ok(_) => match completion.success_text() {
                Some(text) => StageResult::Success(text.to_string()),
                None => StageResult::Failure("provider returned no text".to_string()),
            },
            Err(e) => StageResult::Failure(e.to_string()),
        };
        debug!(stage = %self.stage, ticket = self.ticket, state = %self.state, "Stage settled");
        Disposition::Applied
    }

    /// Re-enter `Pending` after a failure.
    pub fn retry(&mut self) -> Result<StageRequest, SessionError> {
        if !self.state.is_failure() {
            return Err(SessionError::invalid("retry", &self.state));
        }
        Ok(self.reissue())
    }

    /// Switch to another horizon and request it. Any outstanding request is
    /// superseded.
    pub fn rerun_with(&mut self, horizon: Horizon) -> StageRequest {
        self.horizon = Some(horizon);
        self.reissue()
    }

    /// Switch to another horizon whose artifact is already known. Any
    /// outstanding request is superseded.
    pub fn seed(&mut self, horizon: Horizon, text: impl Into<String>) {
        self.horizon = Some(horizon);
        self.ticket = self.next_ticket();
        self.state = StageResult::Success(text.into());
    }

    /// Switch back to a horizon whose earlier request is still outstanding
    /// and wait on it again. No new request is made; `ticket` must be one
    /// this executor handed out.
    pub fn resume(&mut self, horizon: Horizon, ticket: u64) {
        debug!(horizon = %horizon, ticket, "Resuming outstanding stage request");
        self.horizon = Some(horizon);
        self.ticket = ticket;
        self.state = StageResult::Pending;
    }

    fn reissue(&mut self) -> StageRequest {
        self.ticket = self.next_ticket();
        self.state = StageResult::Pending;
        self.current_request()
    }

    fn next_ticket(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    fn current_request(&self) -> StageRequest {
        StageRequest {
            stage: self.stage,
            ticket: self.ticket,
            horizon: self.horizon,
        }
    }
}
