use crate::CoreError;
use serde::Serialize;
use std::fmt;

/// Progress of one initialization attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InitPhase {
    Uninitialized,
    PrimaryLoadAttempted,
    FallbackLoadAttempted,
}

impl fmt::Display for InitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::PrimaryLoadAttempted => f.write_str("primary_load_attempted"),
            Self::FallbackLoadAttempted => f.write_str("fallback_load_attempted"),
        }
    }
}

impl InitPhase {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Uninitialized)
    }
}

pub fn validate_transition(from: InitPhase, to: InitPhase) -> Result<(), CoreError> {
    let valid = matches!(
        (from, to),
        (InitPhase::Uninitialized, InitPhase::PrimaryLoadAttempted)
            | (InitPhase::PrimaryLoadAttempted, InitPhase::FallbackLoadAttempted)
    );

    if valid {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
