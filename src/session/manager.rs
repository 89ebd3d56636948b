//! GuideSession — one seeker's journey from the first intake question to the
//! remedy list.
//!
//! The session owns the intake machine until it finalizes a profile, waits a
//! short settle delay so the seeker can read the summary, then hands the
//! profile to a `PipelineSequencer`. The handoff happens at most once.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tracing::info;
use uuid::Uuid;

use crate::error::SessionError;
use crate::intake::{IntakeMachine, IntakeReply, Profile, Turn};
use crate::stages::{Horizon, Stage, StageGenerator, StageResult};

use super::sequencer::PipelineSequencer;

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Collecting profile fields.
    Intake,
    /// Profile finalized, pipeline not yet started.
    Handoff,
    /// Stages are running.
    Pipeline,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Intake => "intake",
            Self::Handoff => "handoff",
            Self::Pipeline => "pipeline",
        };
        write!(f, "{}", s)
    }
}

/// Point-in-time view of a session, used by the REST surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub phase: SessionPhase,
    pub intake_cursor: usize,
    pub prompt: Option<String>,
    pub transcript: Vec<Turn>,
    pub profile: Option<Profile>,
    pub stage: Option<Stage>,
    pub state: Option<StageResult>,
    pub horizon: Option<Horizon>,
    pub cached_horizons: Vec<Horizon>,
}

pub struct GuideSession {
    id: Uuid,
    generator: Arc<StageGenerator>,
    settle_delay: Duration,
    intake: IntakeMachine,
    handoff: Option<Profile>,
    pipeline: Option<PipelineSequencer>,
}

impl GuideSession {
    pub fn new(generator: Arc<StageGenerator>, settle_delay: Duration) -> Self {
        let id = Uuid::new_v4();
        info!(session = %id, "Guide session created");
        Self {
            id,
            generator,
            settle_delay,
            intake: IntakeMachine::new(),
            handoff: None,
            pipeline: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> SessionPhase {
        if self.pipeline.is_some() {
            SessionPhase::Pipeline
        } else if self.intake.is_complete() {
            SessionPhase::Handoff
        } else {
            SessionPhase::Intake
        }
    }

    pub fn intake(&self) -> &IntakeMachine {
        &self.intake
    }

    /// The question currently awaiting an answer, if intake is still open.
    pub fn current_prompt(&self) -> Option<&'static str> {
        self.intake.current_prompt()
    }

    pub fn pipeline(&self) -> Option<&PipelineSequencer> {
        self.pipeline.as_ref()
    }

    /// Signal raised whenever a stage result arrives. `None` before the
    /// handoff.
    pub fn arrivals(&self) -> Option<Arc<Notify>> {
        self.pipeline.as_ref().map(PipelineSequencer::arrivals)
    }

    pub fn pipeline_mut(&mut self) -> Result<&mut PipelineSequencer, SessionError> {
        self.pipeline.as_mut().ok_or(SessionError::NotReady)
    }

    /// Submit one intake answer. The completing answer parks the profile for
    /// `hand_off`.
    pub fn submit(&mut self, raw: &str) -> IntakeReply {
        let reply = self.intake.submit(raw);
        if let Some(ref profile) = reply.profile {
            self.handoff = Some(profile.clone());
        }
        reply
    }

    /// Start the pipeline with the finalized profile after the settle delay.
    ///
    /// Returns false when there is nothing to hand off: intake is still open
    /// or the pipeline already started.
    pub async fn hand_off(&mut self) -> bool {
        let Some(profile) = self.handoff.take() else {
            return false;
        };
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        info!(session = %self.id, name = %profile.name, "Handing profile to pipeline");
        self.pipeline = Some(PipelineSequencer::start(
            profile,
            Arc::clone(&self.generator),
        ));
        true
    }

    /// `submit`, followed by `hand_off` when the answer completed intake.
    pub async fn submit_and_hand_off(&mut self, raw: &str) -> IntakeReply {
        let reply = self.submit(raw);
        if reply.profile.is_some() {
            self.hand_off().await;
        }
        reply
    }

    pub fn advance(&mut self) -> Result<Stage, SessionError> {
        self.pipeline_mut()?.advance()
    }

    pub fn retry(&mut self) -> Result<(), SessionError> {
        self.pipeline_mut()?.retry()
    }

    pub fn select_horizon(&mut self, horizon: Horizon) -> Result<(), SessionError> {
        self.pipeline_mut()?.select_horizon(horizon)
    }

    /// Wait for the active stage to settle. `None` before the pipeline starts.
    pub async fn settle(&mut self) -> Option<StageResult> {
        let pipeline = self.pipeline.as_mut()?;
        Some(pipeline.settle().await.clone())
    }

    /// Apply any stage results that have already arrived.
    pub fn drain_ready(&mut self) -> usize {
        self.pipeline
            .as_mut()
            .map(PipelineSequencer::drain_ready)
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let pipeline = self.pipeline.as_ref();
        SessionSnapshot {
            session_id: self.id,
            phase: self.phase(),
            intake_cursor: self.intake.cursor(),
            prompt: self.intake.current_prompt().map(str::to_string),
            transcript: self.intake.transcript().to_vec(),
            profile: pipeline
                .map(|p| p.profile().clone())
                .or_else(|| self.handoff.clone()),
            stage: pipeline.map(PipelineSequencer::active_stage),
            state: pipeline.map(|p| p.state().clone()),
            horizon: pipeline.and_then(PipelineSequencer::horizon),
            cached_horizons: pipeline
                .map(|p| p.cache().horizons())
                .unwrap_or_default(),
        }
    }
}
