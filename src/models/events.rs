use std::sync::Arc;

use crate::{
    error::MessagesError,
    models::{seen::SeenRecord, view::ResolvedView},
};

/// Signals published by the resolution pipeline.
///
/// Per cycle: exactly one `Started`, then at most one of `Completed` or
/// `Failed`. `StateChanged` follows every persisted seen-state mutation.
#[derive(Debug, Clone)]
pub enum ResolutionEvent {
    Started { cycle: u64 },
    Completed(Arc<ResolvedView>),
    Failed { cycle: u64, reason: MessagesError },
    StateChanged(SeenRecord),
}

impl ResolutionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ResolutionEvent::Started { .. } => "resolution_started",
            ResolutionEvent::Completed(_) => "resolution_completed",
            ResolutionEvent::Failed { .. } => "resolution_failed",
            ResolutionEvent::StateChanged(_) => "state_changed",
        }
    }
}
