//! Seeker profile and intake data models.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One field collected during intake, in the order it is asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeField {
    Name,
    BirthDetails,
    LocationFocus,
    Problems,
    ComfortLevel,
}

impl IntakeField {
    /// All fields in asking order.
    pub const ALL: [IntakeField; 5] = [
        Self::Name,
        Self::BirthDetails,
        Self::LocationFocus,
        Self::Problems,
        Self::ComfortLevel,
    ];

    /// Human-readable label, used in summaries and profile context.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::BirthDetails => "Birth details",
            Self::LocationFocus => "Current location & focus",
            Self::Problems => "Problems / concerns",
            Self::ComfortLevel => "Remedy comfort level",
        }
    }
}

impl std::fmt::Display for IntakeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Name => "name",
            Self::BirthDetails => "birth_details",
            Self::LocationFocus => "location_focus",
            Self::Problems => "problems",
            Self::ComfortLevel => "comfort_level",
        };
        write!(f, "{s}")
    }
}

/// Finalized seeker profile. Built once by intake and shared read-only with
/// every stage afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub name: String,
    pub birth_details: String,
    pub location_focus: String,
    pub problems: String,
    pub comfort_level: String,
}

impl Profile {
    pub fn get(&self, field: IntakeField) -> &str {
        match field {
            IntakeField::Name => &self.name,
            IntakeField::BirthDetails => &self.birth_details,
            IntakeField::LocationFocus => &self.location_focus,
            IntakeField::Problems => &self.problems,
            IntakeField::ComfortLevel => &self.comfort_level,
        }
    }

    /// Render the profile as a markdown section for prompt injection.
    pub fn to_prompt_section(&self) -> String {
        let mut parts = vec!["# Seeker Profile".to_string()];
        for field in IntakeField::ALL {
            parts.push(format!("- **{}:** {}", field.label(), self.get(field)));
        }
        parts.join("\n")
    }
}

/// Field-by-field accumulator filled during intake.
///
/// Values are stored trimmed and are never empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProfileDraft {
    fields: BTreeMap<IntakeField, String>,
}

impl ProfileDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value for `field`. Blank values are refused.
    pub(crate) fn set(&mut self, field: IntakeField, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        self.fields.insert(field, value.to_string());
        true
    }

    pub fn get(&self, field: IntakeField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Collected values in asking order.
    pub fn entries(&self) -> impl Iterator<Item = (IntakeField, &str)> {
        self.fields.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Freeze into a `Profile` once every field is present.
    pub fn finalize(&self) -> Option<Profile> {
        Some(Profile {
            name: self.get(IntakeField::Name)?.to_string(),
            birth_details: self.get(IntakeField::BirthDetails)?.to_string(),
            location_focus: self.get(IntakeField::LocationFocus)?.to_string(),
            problems: self.get(IntakeField::Problems)?.to_string(),
            comfort_level: self.get(IntakeField::ComfortLevel)?.to_string(),
        })
    }
}

/// Who spoke a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    System,
    User,
}

/// One exchange in the intake transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::System,
            text: text.into(),
            at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_draft() -> ProfileDraft {
        let mut draft = ProfileDraft::new();
        draft.set(IntakeField::Name, "Asha");
        draft.set(IntakeField::BirthDetails, "12/05/1990, 14:30, Mumbai");
        draft.set(IntakeField::LocationFocus, "Pune; Career");
        draft.set(IntakeField::Problems, "Job stress");
        draft.set(IntakeField::ComfortLevel, "Mix");
        draft
    }

    #[test]
    fn draft_refuses_blank_values() {
        let mut draft = ProfileDraft::new();
        assert!(!draft.set(IntakeField::Name, "   "));
        assert!(draft.is_empty());
        assert!(draft.set(IntakeField::Name, "  Asha \n"));
        assert_eq!(draft.get(IntakeField::Name), Some("Asha"));
    }

    #[test]
    fn finalize_requires_every_field() {
        let mut draft = ProfileDraft::new();
        draft.set(IntakeField::Name, "Asha");
        assert!(draft.finalize().is_none());

        let profile = full_draft().finalize().unwrap();
        assert_eq!(profile.name, "Asha");
        assert_eq!(profile.comfort_level, "Mix");
    }

    #[test]
    fn entries_follow_asking_order() {
        let fields: Vec<IntakeField> = full_draft().entries().map(|(f, _)| f).collect();
        assert_eq!(fields, IntakeField::ALL.to_vec());
    }

    #[test]
    fn profile_serializes_camel_case() {
        let profile = full_draft().finalize().unwrap();
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["birthDetails"], "12/05/1990, 14:30, Mumbai");
        assert_eq!(json["locationFocus"], "Pune; Career");
        assert_eq!(json["comfortLevel"], "Mix");
    }

    #[test]
    fn prompt_section_lists_all_fields() {
        let section = full_draft().finalize().unwrap().to_prompt_section();
        assert!(section.starts_with("# Seeker Profile"));
        for field in IntakeField::ALL {
            assert!(section.contains(field.label()));
        }
        assert!(section.contains("Job stress"));
    }

    #[test]
    fn field_display_matches_serde() {
        for field in IntakeField::ALL {
            let json = serde_json::to_string(&field).unwrap();
            assert_eq!(format!("\"{field}\""), json);
        }
    }
}
