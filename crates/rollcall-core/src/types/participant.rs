//! Participant records as held by the remote store.

use serde::{Deserialize, Serialize};

use super::id::{ParticipantId, ParticipantKey};
use super::pagination::PageResponse;

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Store identity.
    pub key: ParticipantKey,
    /// Identifier the participant submits with.
    pub external_id: ParticipantId,
    /// Display name.
    pub name: String,
}

/// Data for registering a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParticipant {
    pub external_id: ParticipantId,
    pub name: String,
}

/// One page of the participant directory.
pub type ParticipantPage = PageResponse<Participant>;
