//! Intake — the opening conversation that builds the seeker profile.
//!
//! The guide asks a fixed sequence of questions, one field per turn. Blank
//! answers are ignored. After the last answer the collected values are
//! frozen into a `Profile` and handed to the stage pipeline.

pub mod model;
pub mod prompts;
pub mod state;

pub use model::{IntakeField, Profile, ProfileDraft, Speaker, Turn};
pub use prompts::{INTAKE_LEN, INTAKE_STEPS, IntakeStep};
pub use state::{IntakeMachine, IntakeReply};
