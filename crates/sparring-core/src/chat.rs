//! Response policy for the external chat adapter.
//!
//! Chat is handled outside the core; the adapter asks this policy whether to
//! answer an incoming message and how long to wait before doing so.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use crate::profile::{DelayRange, ProfileDefinition, ProfileId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsePolicy {
    pub profile_id: ProfileId,
    pub ignore_rate: f64,
    pub response_delay: DelayRange,
    pub chat_actions: Vec<String>,
}

impl ResponsePolicy {
    pub fn for_profile(profile: &ProfileDefinition) -> Self {
        Self {
            profile_id: profile.id,
            ignore_rate: profile.response_pattern.ignore_rate,
            response_delay: profile.response_pattern.response_delay,
            chat_actions: profile.chat_actions.clone(),
        }
    }

    pub fn should_ignore<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() < self.ignore_rate
    }

    /// Uniform delay within the profile's inclusive range.
    pub fn sample_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let DelayRange { min, max } = self.response_delay;
        Duration::from_millis(rng.gen_range(min..=max))
    }
}
