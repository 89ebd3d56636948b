//! Progress captions shown while a stage is pending.
//!
//! Purely cosmetic. The ticker runs beside a pending request and is stopped
//! when the stage settles; it never reads or changes stage state.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::stages::Stage;

/// Captions cycled while `stage` is pending.
pub fn captions(stage: Stage) -> &'static [&'static str] {
    match stage {
        Stage::Analysis => &[
            "Casting your birth chart...",
            "Reading planetary positions...",
            "Weighing the houses...",
        ],
        Stage::Daily => &[
            "Checking today's transits...",
            "Finding auspicious hours...",
            "Shaping your day...",
        ],
        Stage::Roadmap => &[
            "Tracing upcoming dashas...",
            "Mapping key transits...",
            "Marking favourable windows...",
        ],
        Stage::Remedies => &[
            "Choosing mantras...",
            "Matching practices to your comfort...",
            "Preparing your remedies...",
        ],
    }
}

/// Background timer that emits one caption per interval until stopped or
/// dropped.
pub struct ProgressTicker {
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    pub fn spawn<F>(stage: Stage, interval: Duration, mut emit: F) -> Self
    where
        F: FnMut(&'static str) + Send + 'static,
    {
        // tokio rejects a zero period
        let period = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            for caption in captions(stage).iter().copied().cycle() {
                ticker.tick().await;
                emit(caption);
            }
        });
        Self { handle }
    }

    /// Stop emitting. Dropping the ticker has the same effect.
    pub fn stop(self) {}
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
