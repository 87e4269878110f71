//! Error types for the team hub.

use thiserror::Error;

/// Errors that can occur in team hub operations.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid time '{0}'. Expected HH:MM")]
    InvalidTime(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Missing required parameter `{0}`")]
    MissingParameter(&'static str),

    #[error("Invalid role pattern '{pattern}': {reason}")]
    InvalidRolePattern { pattern: String, reason: String },

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("Equipment not found: {0}")]
    EquipmentNotFound(i64),

    #[error("Custody record {record} not found for equipment {equipment}")]
    CustodyRecordNotFound { equipment: i64, record: i64 },

    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Participations blob error: {0}")]
    Participations(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Chat error: {0}")]
    Chat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// Short, stable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            HubError::Config(_) => "config_error",
            HubError::InvalidTime(_) => "invalid_time",
            HubError::InvalidTimeRange(_) => "invalid_time_range",
            HubError::MissingParameter(_) => "missing_parameter",
            HubError::InvalidRolePattern { .. } => "invalid_role_pattern",
            HubError::EventNotFound(_)
            | HubError::EquipmentNotFound(_)
            | HubError::CustodyRecordNotFound { .. }
            | HubError::MemberNotFound(_) => "not_found",
            HubError::Participations(_) => "invalid_participations",
            HubError::Store(_) | HubError::Io(_) => "store_error",
            HubError::Chat(_) => "chat_error",
        }
    }

    /// Whether the error was caused by caller input rather than a collaborator.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            HubError::InvalidTime(_)
                | HubError::InvalidTimeRange(_)
                | HubError::MissingParameter(_)
                | HubError::InvalidRolePattern { .. }
                | HubError::Participations(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == "not_found"
    }
}

/// Result type alias for team hub operations.
pub type HubResult<T> = Result<T, HubError>;
