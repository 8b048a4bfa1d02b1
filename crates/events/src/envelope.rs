use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bookstore_core::SessionId;

use crate::event::Event;

/// Envelope for an event, carrying stream metadata.
///
/// - `sequence_number` is monotonically increasing per session stream and equals
///   the aggregate version after the event was applied.
/// - `payload` is the typed domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    session_id: SessionId,
    event_type: String,
    sequence_number: u64,
    occurred_at: DateTime<Utc>,
    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        session_id: SessionId,
        event_type: impl Into<String>,
        sequence_number: u64,
        occurred_at: DateTime<Utc>,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            session_id,
            event_type: event_type.into(),
            sequence_number,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event, taking type and time from the event itself.
    pub fn wrap(session_id: SessionId, sequence_number: u64, event: E) -> Self {
        Self::new(
            Uuid::now_v7(),
            session_id,
            event.event_type(),
            sequence_number,
            event.occurred_at(),
            event,
        )
    }
}
