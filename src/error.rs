use thiserror::Error;

use crate::models::classification::PredicateKind;

/// Failure kinds surfaced to consumers. None of them is fatal: each degrades
/// the messaging feature instead of the host application.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MessagesError {
    /// The raw message feed could not be fetched.
    #[error("message feed unavailable: {0}")]
    Transport(String),

    /// An audience predicate failed, so no eligible set could be computed.
    #[error("classification unavailable: {predicate} predicate failed: {reason}")]
    ClassificationUnavailable {
        predicate: PredicateKind,
        reason: String,
    },

    /// The seen-state write did not reach the key-value store.
    #[error("seen-state persistence failed: {0}")]
    Persistence(String),

    /// Messaging is switched off for this session.
    #[error("messages features disabled: {0}")]
    FeatureDisabled(String),
}

impl MessagesError {
    pub fn transport(error: impl std::fmt::Display) -> Self {
        MessagesError::Transport(error.to_string())
    }

    pub fn persistence(error: impl std::fmt::Display) -> Self {
        MessagesError::Persistence(error.to_string())
    }

    pub fn classification(predicate: PredicateKind, error: impl std::fmt::Display) -> Self {
        MessagesError::ClassificationUnavailable {
            predicate,
            reason: error.to_string(),
        }
    }

    /// Whether consumers should hide the messaging feature outright.
    pub fn hides_feature(&self) -> bool {
        matches!(
            self,
            MessagesError::Transport(_) | MessagesError::FeatureDisabled(_)
        )
    }
}
