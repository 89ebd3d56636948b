//! System instructions and request payloads for each stage.

use crate::intake::Profile;

use super::state::{Horizon, Stage};

const BASE: &str = "\
You are an experienced Vedic astrologer writing for a single seeker.
Guidelines:
- Base everything on the seeker profile provided in the user message.
- Write warm, plain-language markdown with short headings and bullet points.
- Do not ask questions and do not request more information.
- Never predict death, serious illness or disaster. Keep the tone hopeful and practical.";

/// Role and behavioral contract for `stage`.
pub fn stage_instruction(stage: Stage) -> String {
    let task = match stage {
        Stage::Analysis => "\

TASK: Profile Analysis
From the birth details, describe the likely ascendant, moon sign and the planetary \
influences most relevant to the seeker's focus area and stated problems. Explain how \
these influences show up in daily life. Keep it under 400 words.",

        Stage::Daily => "\

TASK: Daily Plan
Write a daily routine (morning, afternoon, evening) aligned with the seeker's chart \
and focus area. Include one small practice for each part of the day that fits the \
seeker's remedy comfort level. Keep it under 300 words.",

        Stage::Roadmap => "\

TASK: Roadmap
Write a roadmap for the horizon named in the request. Break the period into phases, \
mark favourable windows and periods that call for caution, and tie each phase to the \
seeker's focus area. Keep it under 400 words.",

        Stage::Remedies => "\

TASK: Remedies
List 5 to 7 remedies for the seeker's problems. Only suggest kinds of remedies the \
seeker is comfortable with. For each remedy give what to do, when and how often, and \
which influence it addresses.",
    };
    format!("{BASE}\n{task}")
}

/// Serialized request payload: the profile, plus the horizon for the roadmap.
pub fn profile_context(profile: &Profile, horizon: Option<Horizon>) -> String {
    let mut context = profile.to_prompt_section();
    if let Some(horizon) = horizon {
        context.push_str(&format!(
            "\n\n# Roadmap Horizon\nHorizon: {} ({})",
            horizon.label(),
            horizon.span()
        ));
    }
    context
}
