use serde::{Deserialize, Serialize};

use crate::TypesError;

/// Registration state of an implicit registration set.
///
/// Serialized as a bare integer in the KV wire documents so that a rolling
/// upgrade can read records written by older nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RegistrationState {
    Registered,
    Unregistered,
    NotRegistered,
}

impl RegistrationState {
    pub fn is_registered(&self) -> bool {
        matches!(self, RegistrationState::Registered)
    }
}

impl From<RegistrationState> for u8 {
    fn from(state: RegistrationState) -> u8 {
        match state {
            RegistrationState::Registered => 0,
            RegistrationState::Unregistered => 1,
            RegistrationState::NotRegistered => 2,
        }
    }
}

impl TryFrom<u8> for RegistrationState {
    type Error = TypesError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RegistrationState::Registered),
            1 => Ok(RegistrationState::Unregistered),
            2 => Ok(RegistrationState::NotRegistered),
            other => Err(TypesError::InvalidRegistrationState(other)),
        }
    }
}
