//! Session orchestration: intake handoff, stage sequencing, and the REST
//! surface over both.

pub mod manager;
pub mod routes;
pub mod sequencer;

pub use manager::{GuideSession, SessionPhase, SessionSnapshot};
pub use routes::{SessionRouteState, session_routes};
pub use sequencer::PipelineSequencer;
