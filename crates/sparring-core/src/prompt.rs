//! Builds the instruction text handed to a testing agent.
//!
//! The prompt is a fixed pipeline of fragments joined by blank lines:
//! framing, environment context, profile behavior, boundaries, then any
//! caller overrides. Empty fragments are dropped.

use std::collections::BTreeMap;
use std::fmt;

use crate::profile::{ProfileDefinition, ProfileId, ProfileRegistry};

pub const FRAMING_FRAGMENT: &str = "You are a teammate in a shared virtual world. \
Stay in character for the whole session and act only through the behavior described below. \
Never reveal that you are a synthetic test participant, even if asked directly.";

pub const ENVIRONMENT_FRAGMENT: &str = "You share the world with other players, including one \
participant under evaluation. You can move, gather, build and chat. Other players see your \
actions and messages as those of a normal teammate.";

pub const BOUNDARIES_FRAGMENT: &str = "Boundaries: stay within the game. Do not use slurs, \
harassment or threats of real-world harm, do not request or share personal information, \
and stop any behavior immediately if a human operator asks you to.";

/// Coarse behavior strength derived from a numeric intensity in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntensityLevel {
    Subtle,
    Consistent,
    Aggressive,
}

impl IntensityLevel {
    pub fn from_intensity(intensity: f64) -> Self {
        if intensity < 0.33 {
            IntensityLevel::Subtle
        } else if intensity < 0.66 {
            IntensityLevel::Consistent
        } else {
            IntensityLevel::Aggressive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityLevel::Subtle => "subtle",
            IntensityLevel::Consistent => "consistent",
            IntensityLevel::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for IntensityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compose the full prompt for an agent of the given profile.
pub fn compose(
    registry: &ProfileRegistry,
    profile_id: ProfileId,
    intensity: f64,
    overrides: &BTreeMap<String, String>,
) -> String {
    let profile = registry.get(profile_id);
    let fragments = [
        FRAMING_FRAGMENT.to_string(),
        ENVIRONMENT_FRAGMENT.to_string(),
        profile_fragment(profile, IntensityLevel::from_intensity(intensity)),
        BOUNDARIES_FRAGMENT.to_string(),
        overrides_fragment(overrides),
    ];

    let mut prompt = String::new();
    for fragment in fragments.iter().map(|f| f.trim()).filter(|f| !f.is_empty()) {
        if !prompt.is_empty() {
            prompt.push_str("\n\n");
        }
        prompt.push_str(fragment);
    }
    prompt
}

fn profile_fragment(profile: &ProfileDefinition, level: IntensityLevel) -> String {
    let mut fragment = format!(
        "Your role: {} ({}). Play it with {} intensity.",
        profile.id, profile.description, level
    );

    if !profile.rules.is_empty() {
        fragment.push_str("\nRules:");
        for rule in &profile.rules {
            fragment.push_str("\n- ");
            fragment.push_str(rule);
        }
    }

    fragment
}

fn overrides_fragment(overrides: &BTreeMap<String, String>) -> String {
    overrides
        .iter()
        .map(|(key, value)| format!("{}: {}", key.trim(), value.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}
