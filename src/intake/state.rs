//! Intake state machine — asks the fixed questions, one field per turn.

use serde::Serialize;
use tracing::{debug, info};

use super::model::{Profile, ProfileDraft, Turn};
use super::prompts::{INTAKE_LEN, completion_summary, field_at, prompt_at};

/// Result of submitting one user turn.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntakeReply {
    /// Whether the input was taken. Blank input and input after completion
    /// are not.
    pub accepted: bool,
    /// Next question, or the summary on the completing turn.
    pub next_prompt: Option<String>,
    /// Everything collected so far.
    pub accumulated: ProfileDraft,
    /// Whether intake has finished.
    pub is_complete: bool,
    /// The finalized profile. Present only in the reply to the completing
    /// turn, so the handoff happens exactly once.
    #[serde(skip)]
    pub profile: Option<Profile>,
}

/// Drives the intake conversation.
///
/// The cursor moves forward by exactly one per accepted turn and the
/// terminal flag, once set, is never cleared.
#[derive(Debug, Clone)]
pub struct IntakeMachine {
    cursor: usize,
    complete: bool,
    draft: ProfileDraft,
    transcript: Vec<Turn>,
}

impl Default for IntakeMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl IntakeMachine {
    /// Start a fresh intake. The opening question is already on the
    /// transcript.
    pub fn new() -> Self {
        let mut transcript = Vec::new();
        if let Some(prompt) = prompt_at(0) {
            transcript.push(Turn::system(prompt));
        }
        Self {
            cursor: 0,
            complete: false,
            draft: ProfileDraft::new(),
            transcript,
        }
    }

    /// Index of the field being asked for. Equals the field count once
    /// complete.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn draft(&self) -> &ProfileDraft {
        &self.draft
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    /// The question currently awaiting an answer.
    pub fn current_prompt(&self) -> Option<&'static str> {
        if self.complete {
            None
        } else {
            prompt_at(self.cursor)
        }
    }

    /// Submit the user's answer to the current question.
    pub fn submit(&mut self, raw: &str) -> IntakeReply {
        if self.complete {
            debug!("Ignoring intake input after completion");
            return self.reply(false, None, None);
        }

        let Some(field) = field_at(self.cursor) else {
            return self.reply(false, None, None);
        };

        if !self.draft.set(field, raw) {
            debug!(cursor = self.cursor, field = %field, "Ignoring blank intake input");
            return self.reply(false, None, None);
        }

        self.transcript.push(Turn::user(raw.trim()));
        self.cursor += 1;
        debug!(field = %field, cursor = self.cursor, "Intake field accepted");

        if self.cursor < INTAKE_LEN {
            let next = prompt_at(self.cursor).map(str::to_string);
            if let Some(ref prompt) = next {
                self.transcript.push(Turn::system(prompt.clone()));
            }
            return self.reply(true, next, None);
        }

        self.complete = true;
        let summary = completion_summary(&self.draft);
        self.transcript.push(Turn::system(summary.clone()));
        let profile = self.draft.finalize();
        if let Some(ref p) = profile {
            info!(name = %p.name, "Intake complete");
        }
        self.reply(true, Some(summary), profile)
    }

    fn reply(
        &self,
        accepted: bool,
        next_prompt: Option<String>,
        profile: Option<Profile>,
    ) -> IntakeReply {
        IntakeReply {
            accepted,
            next_prompt,
            accumulated: self.draft.clone(),
            is_complete: self.complete,
            profile,
        }
    }
}
