use serde::{Deserialize, Serialize};

/// S-CSCF capability set carried in UAA/LIA when the HSS returns a set of
/// candidate servers rather than a single assignment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub mandatory: Vec<i32>,
    pub optional: Vec<i32>,
    pub server_name: String,
}

impl ServerCapabilities {
    pub fn is_empty(&self) -> bool {
        self.mandatory.is_empty() && self.optional.is_empty() && self.server_name.is_empty()
    }
}

/// Server-Assignment-Type (3GPP TS 29.229).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAssignmentType {
    NoAssignment,
    Registration,
    ReRegistration,
    UnregisteredUser,
    TimeoutDeregistration,
    UserDeregistration,
    TimeoutDeregistrationStoreServerName,
    UserDeregistrationStoreServerName,
    AdministrativeDeregistration,
    AuthenticationFailure,
    AuthenticationTimeout,
    DeregistrationTooMuchData,
    AaaUserDataRequest,
    PgwUpdate,
    Restoration,
}

impl ServerAssignmentType {
    pub fn code(&self) -> i32 {
        match self {
            ServerAssignmentType::NoAssignment => 0,
            ServerAssignmentType::Registration => 1,
            ServerAssignmentType::ReRegistration => 2,
            ServerAssignmentType::UnregisteredUser => 3,
            ServerAssignmentType::TimeoutDeregistration => 4,
            ServerAssignmentType::UserDeregistration => 5,
            ServerAssignmentType::TimeoutDeregistrationStoreServerName => 6,
            ServerAssignmentType::UserDeregistrationStoreServerName => 7,
            ServerAssignmentType::AdministrativeDeregistration => 8,
            ServerAssignmentType::AuthenticationFailure => 9,
            ServerAssignmentType::AuthenticationTimeout => 10,
            ServerAssignmentType::DeregistrationTooMuchData => 11,
            ServerAssignmentType::AaaUserDataRequest => 12,
            ServerAssignmentType::PgwUpdate => 13,
            ServerAssignmentType::Restoration => 14,
        }
    }

    /// Whether this assignment tears registration state down rather than
    /// establishing or refreshing it.
    pub fn is_deregistration(&self) -> bool {
        matches!(
            self,
            ServerAssignmentType::TimeoutDeregistration
                | ServerAssignmentType::UserDeregistration
                | ServerAssignmentType::TimeoutDeregistrationStoreServerName
                | ServerAssignmentType::UserDeregistrationStoreServerName
                | ServerAssignmentType::AdministrativeDeregistration
                | ServerAssignmentType::DeregistrationTooMuchData
                | ServerAssignmentType::AuthenticationFailure
                | ServerAssignmentType::AuthenticationTimeout
        )
    }
}

/// User-Authorization-Type on the UAR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAuthorizationType {
    Registration,
    DeRegistration,
    RegistrationAndCapabilities,
}

impl UserAuthorizationType {
    pub fn code(&self) -> i32 {
        match self {
            UserAuthorizationType::Registration => 0,
            UserAuthorizationType::DeRegistration => 1,
            UserAuthorizationType::RegistrationAndCapabilities => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deregistration_types_are_classified() {
        assert!(ServerAssignmentType::UserDeregistration.is_deregistration());
        assert!(ServerAssignmentType::AdministrativeDeregistration.is_deregistration());
        assert!(!ServerAssignmentType::Registration.is_deregistration());
        assert!(!ServerAssignmentType::ReRegistration.is_deregistration());
        assert!(!ServerAssignmentType::UnregisteredUser.is_deregistration());
    }

    #[test]
    fn wire_codes_are_stable() {
        assert_eq!(ServerAssignmentType::Registration.code(), 1);
        assert_eq!(ServerAssignmentType::Restoration.code(), 14);
        assert_eq!(UserAuthorizationType::RegistrationAndCapabilities.code(), 2);
    }
}
