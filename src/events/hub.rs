use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Progress notifications from a session, for whoever is watching.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    /// A plan has been built and is ready for review.
    PlanReady { session_id: Uuid, total_moves: u32, total_bytes: u64, conflicts: u32 },

    /// A single file operation has been classified.
    MoveComplete {
        session_id: Uuid,
        /// 1-based position in the plan.
        index: u32,
        total: u32,
        file_path: String,
        status: String, // "moved" | "skipped" | "failed"
        dry_run: bool,
        error: Option<String>,
    },

    /// Every operation has been classified; carries the run's totals.
    ExecutionComplete {
        session_id: Uuid,
        moves_completed: u32,
        moves_failed: u32,
        moves_skipped: u32,
        bytes_moved: u64,
        duration_seconds: f64,
    },

    /// A session task failed outside of per-file handling.
    SessionError { session_id: Uuid, message: String },
}

impl Event {
    /// Stable snake_case name of the variant.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::PlanReady { .. } => "plan_ready",
            Self::MoveComplete { .. } => "move_complete",
            Self::ExecutionComplete { .. } => "execution_complete",
            Self::SessionError { .. } => "session_error",
        }
    }
}

/// Fan-out of session events to any number of listeners.
///
/// Cloning shares the same channel, so the executor and the CLI can each hold one.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Event>,
}

impl EventHub {
    /// Subscribers falling behind by more than `capacity` events receive a
    /// `Lagged` error and miss intermediate events.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Events are fire-and-forget: having no subscriber is not an error.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
