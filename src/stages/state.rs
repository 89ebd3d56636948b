//! Stage ordering, roadmap horizons and the per-stage result.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The content-generation stages, in the order the pipeline visits them.
///
/// Progresses linearly: Analysis → Daily → Roadmap → Remedies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Analysis,
    Daily,
    Roadmap,
    Remedies,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Self::Analysis, Self::Daily, Self::Roadmap, Self::Remedies];

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, target),
            (Analysis, Daily) | (Daily, Roadmap) | (Roadmap, Remedies)
        )
    }

    /// Whether this stage ends the pipeline.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Remedies)
    }

    /// Get the next stage in the linear progression, if any.
    pub fn next(&self) -> Option<Stage> {
        use Stage::*;
        match self {
            Analysis => Some(Daily),
            Daily => Some(Roadmap),
            Roadmap => Some(Remedies),
            Remedies => None,
        }
    }

    /// Whether this stage takes a horizon parameter.
    pub fn takes_horizon(&self) -> bool {
        matches!(self, Self::Roadmap)
    }

    /// Title shown above the stage's artifact.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Analysis => "Profile Analysis",
            Self::Daily => "Daily Plan",
            Self::Roadmap => "Roadmap",
            Self::Remedies => "Remedies",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Analysis => "analysis",
            Self::Daily => "daily",
            Self::Roadmap => "roadmap",
            Self::Remedies => "remedies",
        };
        write!(f, "{s}")
    }
}

/// Time scope of the roadmap stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Horizon {
    Week,
    Month,
    Year,
}

impl Horizon {
    pub const ALL: [Horizon; 3] = [Self::Week, Self::Month, Self::Year];

    /// Phrase describing the covered period, used in the request payload.
    pub fn span(&self) -> &'static str {
        match self {
            Self::Week => "the next 7 days",
            Self::Month => "the next 30 days",
            Self::Year => "the next 12 months",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Week => "Week",
            Self::Month => "Month",
            Self::Year => "Year",
        }
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self::Month
    }
}

impl std::fmt::Display for Horizon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Horizon {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            "year" | "yearly" => Ok(Self::Year),
            other => Err(format!("unknown horizon {other:?} (expected week, month or year)")),
        }
    }
}

/// Observable state of one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum StageResult {
    /// A request is outstanding.
    Pending,
    /// The provider returned this artifact.
    Success(String),
    /// The provider failed; the reason is for logs, not for display.
    Failure(String),
}

impl StageResult {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success(text) => Some(text),
            _ => None,
        }
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success(_) => "success",
            Self::Failure(_) => "failure",
        }
    }
}

impl std::fmt::Display for StageResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
