use std::{
    fmt::{Display, Formatter},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast::error::RecvError};
use tracing::{debug, info, warn};

use crate::{
    models::{
        events::ResolutionEvent,
        message::{Category, Message, compare_ids},
        view::ResolvedView,
    },
    pipeline::ResolutionPipeline,
    seen_state::SeenUpdate,
};

/// How the user got rid of a popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DismissPath {
    /// An explicit button in the popup, labelled by its action.
    Closed { action: String },
    /// Click outside the dialog or escape.
    OutsideClick,
}

impl Display for DismissPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DismissPath::Closed { action } => write!(f, "{}", action),
            DismissPath::OutsideClick => write!(f, "dismissed"),
        }
    }
}

/// UI collaborator that shows a popup and resolves once it is gone.
#[async_trait]
pub trait PopupPresenter: Send + Sync {
    async fn present(&self, message: &Message) -> DismissPath;
}

/// Oldest go-live date first, ties broken by id.
pub fn select_popup(candidates: &[Message]) -> Option<&Message> {
    candidates.iter().min_by(|a, b| {
        a.go_live_date
            .cmp(&b.go_live_date)
            .then_with(|| compare_ids(&a.id, &b.id))
    })
}

#[derive(Default)]
struct SchedulerState {
    showing: Option<Message>,
    last_cycle: Option<u64>,
}

pub struct PopupScheduler {
    pipeline: Arc<ResolutionPipeline>,
    category: Category,
    state: Mutex<SchedulerState>,
}

impl PopupScheduler {
    pub fn new(pipeline: Arc<ResolutionPipeline>) -> Self {
        Self::for_category(pipeline, Category::Announcement)
    }

    pub fn for_category(pipeline: Arc<ResolutionPipeline>, category: Category) -> Self {
        Self {
            pipeline,
            category,
            state: Mutex::new(SchedulerState::default()),
        }
    }

    pub async fn showing(&self) -> Option<Message> {
        self.state.lock().await.showing.clone()
    }

    /// Picks the popup for a freshly resolved view. At most one popup per
    /// cycle, and none while another is still on screen.
    pub async fn on_resolved(&self, view: &ResolvedView) -> Option<Message> {
        let mut state = self.state.lock().await;

        if state.last_cycle.is_some_and(|last| last >= view.cycle) {
            return None;
        }
        // A cycle skipped while a popup is on screen is spent too.
        state.last_cycle = Some(view.cycle);

        if let Some(current) = state.showing.as_ref() {
            debug!(message_id = %current.id, "Popup already showing, skipping selection");
            return None;
        }

        // Queued views predate dismissals made while their popup was showing.
        let seen = self.pipeline.seen_snapshot().await;
        let candidates: Vec<Message> = view
            .unseen_high_priority(self.category)
            .into_iter()
            .filter(|message| !seen.contains(&message.id))
            .collect();
        let selected = select_popup(&candidates).cloned()?;

        info!(
            cycle = view.cycle,
            message_id = %selected.id,
            candidates = candidates.len(),
            "Priority popup selected"
        );

        state.showing = Some(selected.clone());
        Some(selected)
    }

    /// Marks the showing popup seen. Whichever path arrives first wins; any
    /// later call for the same popup returns `None`.
    pub async fn close(&self, id: &str, path: DismissPath) -> Option<SeenUpdate> {
        let closed = self
            .state
            .lock()
            .await
            .showing
            .take_if(|message| message.id == id);

        let Some(message) = closed else {
            debug!(message_id = id, path = %path, "Popup not showing, ignoring close");
            return None;
        };

        info!(message_id = %message.id, path = %path, "Priority popup closed");
        Some(self.pipeline.dismiss(&message.id).await)
    }

    /// Presents popups for every completed cycle until the pipeline goes away.
    pub async fn run(self: Arc<Self>, presenter: Arc<dyn PopupPresenter>) {
        let mut events = self.pipeline.subscribe();

        loop {
            let view = match events.recv().await {
                Ok(ResolutionEvent::Completed(view)) => view,
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Popup scheduler lagged behind resolution events");
                    match self.pipeline.current_view().await {
                        Some(view) => view,
                        None => continue,
                    }
                }
                Err(RecvError::Closed) => {
                    debug!("Resolution events closed, popup scheduler stopping");
                    break;
                }
            };

            if let Some(message) = self.on_resolved(&view).await {
                let path = presenter.present(&message).await;
                self.close(&message.id, path).await;
            }
        }
    }
}
