use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Idle,
    Resolving,
    Resolved,
    Failed,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeenAction {
    Dismiss,
    Restore,
    MarkAll,
}

impl Display for ResolutionStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            ResolutionStatus::Idle => write!(f, "idle"),
            ResolutionStatus::Resolving => write!(f, "resolving"),
            ResolutionStatus::Resolved => write!(f, "resolved"),
            ResolutionStatus::Failed => write!(f, "failed"),
            ResolutionStatus::Hidden => write!(f, "hidden"),
        }
    }
}

impl Display for SeenAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            SeenAction::Dismiss => write!(f, "dismiss"),
            SeenAction::Restore => write!(f, "restore"),
            SeenAction::MarkAll => write!(f, "mark_all"),
        }
    }
}
