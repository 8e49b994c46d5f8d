use super::{builtin, ProfileDefinition, ProfileId};
use crate::error::{Result, SparringError};

/// Immutable lookup table from profile identifier to definition.
///
/// Definitions are stored in `ProfileId::ALL` order, so `get` is total.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    definitions: Vec<ProfileDefinition>,
}

impl ProfileRegistry {
    /// Load the built-in profiles, validating every definition.
    pub fn builtin() -> Result<Self> {
        let definitions = ProfileId::ALL
            .into_iter()
            .map(builtin::definition)
            .collect::<Vec<_>>();

        for definition in &definitions {
            definition.validate()?;
        }

        log::debug!("Loaded {} behavior profiles", definitions.len());
        Ok(Self { definitions })
    }

    pub fn get(&self, id: ProfileId) -> &ProfileDefinition {
        &self.definitions[id.index()]
    }

    pub fn list(&self) -> &[ProfileDefinition] {
        &self.definitions
    }

    /// Check an untrusted identifier before it reaches any other operation.
    pub fn exists(&self, candidate: &str) -> bool {
        self.definitions
            .iter()
            .any(|definition| definition.id.as_str() == candidate)
    }

    pub fn resolve(&self, candidate: &str) -> Result<ProfileId> {
        if !self.exists(candidate) {
            return Err(SparringError::UnknownProfile(candidate.to_string()));
        }
        candidate.parse()
    }
}
