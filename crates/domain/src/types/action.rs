//! Queued mutation types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::connectivity::Tier;
use crate::constants::MAX_RETRIES;

/// The closed set of mutations the engine knows how to replay.
///
/// Each variant carries its own typed payload; the serialized form is
/// `{"kind": "...", "payload": {...}}` so persisted queues remain readable
/// by the host application. Adding a mutation kind is a compile-time
/// checked change: every handler must match exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum ActionKind {
    SendMessage { channel_id: String, message: String },
    Rsvp { event_id: String, family_name: String, attendee_count: u32 },
    Feedback { category: String, message: String },
    VolunteerSignup { need_id: String, volunteer_name: String },
    CreateNote { title: String, body: String },
    UpdateNote { note_id: String, title: String, body: String },
    DeleteNote { note_id: String },
    TogglePinNote { note_id: String, pinned: bool },
}

impl ActionKind {
    /// Stable label for logging and UI counts.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::SendMessage { .. } => "send_message",
            ActionKind::Rsvp { .. } => "rsvp",
            ActionKind::Feedback { .. } => "feedback",
            ActionKind::VolunteerSignup { .. } => "volunteer_signup",
            ActionKind::CreateNote { .. } => "create_note",
            ActionKind::UpdateNote { .. } => "update_note",
            ActionKind::DeleteNote { .. } => "delete_note",
            ActionKind::TogglePinNote { .. } => "toggle_pin_note",
        }
    }

    /// Default connectivity requirement for this mutation.
    ///
    /// Chat and notes go against the local backend and work on a LAN
    /// without uplink; RSVP, feedback, and volunteer signups call hosted
    /// functions and need real internet.
    pub fn default_requires_internet(&self) -> bool {
        match self {
            ActionKind::SendMessage { .. }
            | ActionKind::CreateNote { .. }
            | ActionKind::UpdateNote { .. }
            | ActionKind::DeleteNote { .. }
            | ActionKind::TogglePinNote { .. } => false,
            ActionKind::Rsvp { .. }
            | ActionKind::Feedback { .. }
            | ActionKind::VolunteerSignup { .. } => true,
        }
    }
}

/// A durably recorded mutation awaiting delivery.
///
/// The queue persists the full action list after every mutation, so the
/// serialized shape below is the crash-recovery format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub id: String,
    #[serde(flatten)]
    pub kind: ActionKind,
    #[serde(rename = "enqueuedAt")]
    pub enqueued_at_ms: u64,
    #[serde(rename = "retryCount")]
    pub retry_count: u32,
    #[serde(rename = "requiresInternet")]
    pub requires_internet: bool,
}

impl QueuedAction {
    /// Create a fresh action with a random id and zero retries.
    pub fn new(kind: ActionKind, requires_internet: bool, enqueued_at_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            enqueued_at_ms,
            retry_count: 0,
            requires_internet,
        }
    }

    /// Whether this action may be attempted at the given tier.
    pub fn can_execute(&self, tier: Tier) -> bool {
        if self.requires_internet {
            tier == Tier::Full
        } else {
            tier != Tier::Offline
        }
    }

    /// Whether another attempt is allowed after a failure.
    pub fn can_retry(&self) -> bool {
        self.retry_count < MAX_RETRIES
    }
}

/// An action that exhausted its retries and was removed from the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentFailure {
    pub action: QueuedAction,
    pub error: String,
    #[serde(rename = "failedAt")]
    pub failed_at_ms: u64,
}
