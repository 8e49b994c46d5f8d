//! Behavioral profiles: closed set of identifiers mapped to plain data.

mod builtin;
pub mod registry;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SparringError};

pub use registry::ProfileRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileId {
    Cooperative,
    Adversarial,
    Chaotic,
    Passive,
    Dominant,
}

impl ProfileId {
    pub const ALL: [ProfileId; 5] = [
        ProfileId::Cooperative,
        ProfileId::Adversarial,
        ProfileId::Chaotic,
        ProfileId::Passive,
        ProfileId::Dominant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileId::Cooperative => "cooperative",
            ProfileId::Adversarial => "adversarial",
            ProfileId::Chaotic => "chaotic",
            ProfileId::Passive => "passive",
            ProfileId::Dominant => "dominant",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileId {
    type Err = SparringError;

    fn from_str(s: &str) -> Result<Self> {
        ProfileId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| SparringError::UnknownProfile(s.to_string()))
    }
}

/// Declared pace of environment actions, in actions per minute.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionFrequency {
    pub min: u32,
    pub max: u32,
}

impl ActionFrequency {
    /// Fixed tick period derived from the average declared rate.
    pub fn tick_period(&self) -> Duration {
        let average = f64::from(self.min + self.max) / 2.0;
        Duration::from_millis((60_000.0 / average).round() as u64)
    }
}

/// Inclusive delay range in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayRange {
    pub min: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResponsePattern {
    /// Probability in [0, 1] that an incoming message is ignored
    pub ignore_rate: f64,
    pub response_delay: DelayRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDefinition {
    pub id: ProfileId,
    pub description: String,
    pub rules: Vec<String>,
    pub action_frequency: ActionFrequency,
    pub response_pattern: ResponsePattern,
    pub environment_actions: Vec<String>,
    pub chat_actions: Vec<String>,
}

impl ProfileDefinition {
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(SparringError::Validation(message));

        let frequency = &self.action_frequency;
        if frequency.min > frequency.max {
            return invalid(format!(
                "profile {}: action frequency min {} exceeds max {}",
                self.id, frequency.min, frequency.max
            ));
        }
        if frequency.max == 0 {
            return invalid(format!("profile {}: action frequency is zero", self.id));
        }

        let delay = &self.response_pattern.response_delay;
        if delay.min > delay.max {
            return invalid(format!(
                "profile {}: response delay min {} exceeds max {}",
                self.id, delay.min, delay.max
            ));
        }

        let ignore_rate = self.response_pattern.ignore_rate;
        if !(0.0..=1.0).contains(&ignore_rate) {
            return invalid(format!(
                "profile {}: ignore rate {} outside [0, 1]",
                self.id, ignore_rate
            ));
        }

        if self.environment_actions.is_empty() || self.chat_actions.is_empty() {
            return invalid(format!("profile {}: empty action list", self.id));
        }

        if let Some(shared) = self
            .environment_actions
            .iter()
            .find(|action| self.chat_actions.contains(action))
        {
            return invalid(format!(
                "profile {}: action '{}' is both an environment and a chat action",
                self.id, shared
            ));
        }

        Ok(())
    }
}
