//! Content-generation stages.
//!
//! After intake, the seeker moves through four stages, each producing one
//! artifact from the same profile: a profile analysis, a daily plan, a
//! roadmap for a chosen horizon, and a remedy list. A stage's executor tracks
//! its request lifecycle; the generator performs the provider call; the
//! roadmap cache keeps horizon switches from repeating calls.

pub mod cache;
pub mod executor;
pub mod generator;
pub mod prompts;
pub mod state;

pub use cache::RoadmapCache;
pub use executor::{Disposition, StageCompletion, StageExecutor, StageRequest};
pub use generator::{GeneratorConfig, StageGenerator};
pub use state::{Horizon, Stage, StageResult};
