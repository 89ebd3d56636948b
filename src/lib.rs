//! Astro Guide — conversational astrology guidance.
//!
//! An intake conversation builds a seeker profile, then four generated
//! stages (analysis, daily plan, roadmap, remedies) run one at a time over it.

pub mod cli;
pub mod config;
pub mod error;
pub mod intake;
pub mod llm;
pub mod progress;
pub mod session;
pub mod stages;
