//! Fixed intake prompts and the completion summary.

use super::model::{IntakeField, ProfileDraft};

/// One row of the intake table: the field collected and the question that
/// asks for it.
#[derive(Debug, Clone, Copy)]
pub struct IntakeStep {
    pub field: IntakeField,
    pub prompt: &'static str,
}

/// The intake conversation, in order. One field per user turn.
pub const INTAKE_STEPS: [IntakeStep; 5] = [
    IntakeStep {
        field: IntakeField::Name,
        prompt: "Namaste! I'm your astrology guide. Before we look at your chart, \
                 may I know your name?",
    },
    IntakeStep {
        field: IntakeField::BirthDetails,
        prompt: "Thank you. Please share your birth date, exact birth time and place of birth \
                 (for example: 12/05/1990, 14:30, Mumbai).",
    },
    IntakeStep {
        field: IntakeField::LocationFocus,
        prompt: "Where are you living right now, and which area of life would you like to focus on \
                 (career, relationships, health, finances)?",
    },
    IntakeStep {
        field: IntakeField::Problems,
        prompt: "What problems or concerns are weighing on you at the moment?",
    },
    IntakeStep {
        field: IntakeField::ComfortLevel,
        prompt: "Last question: which remedies are you comfortable with? Spiritual (mantras, fasting), \
                 practical (lifestyle changes), gemstones, or a mix?",
    },
];

/// Number of fields collected by intake.
pub const INTAKE_LEN: usize = INTAKE_STEPS.len();

/// Question asked at `cursor`, if any remain.
pub fn prompt_at(cursor: usize) -> Option<&'static str> {
    INTAKE_STEPS.get(cursor).map(|s| s.prompt)
}

/// Field collected at `cursor`, if any remain.
pub fn field_at(cursor: usize) -> Option<IntakeField> {
    INTAKE_STEPS.get(cursor).map(|s| s.field)
}

/// Summary shown once every field is collected.
pub fn completion_summary(draft: &ProfileDraft) -> String {
    let mut parts = vec!["Here is what I have noted:".to_string()];
    for (field, value) in draft.entries() {
        parts.push(format!("- {}: {}", field.label(), value));
    }
    parts.push(String::new());
    parts.push("Preparing your chart analysis...".to_string());
    parts.join("\n")
}
