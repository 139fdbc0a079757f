//! Identifier newtypes.
//!
//! Store-assigned identities wrap [`uuid::Uuid`]; the participant-facing
//! identifier (a student number or badge code) is free-form text.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a newtype ID wrapper around `Uuid`.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Return a reference to the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id!(
    /// Unique identifier for an attendance session (a group).
    SessionId
);

define_id!(
    /// Unique identifier for an administrator.
    AdminId
);

define_id!(
    /// The store's durable identity for a participant row.
    ParticipantKey
);

/// Participant-facing identifier, as typed by the participant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Wrap an identifier, trimming surrounding whitespace.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// Borrow the identifier text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the identifier is blank.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ParticipantId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_new_is_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[test]
    fn test_session_id_from_str_trims() {
        let uuid = Uuid::new_v4();
        let id: SessionId = format!("  {uuid} ").parse().expect("should parse");
        assert_eq!(id.0, uuid);
    }

    #[test]
    fn test_participant_id_trims_whitespace() {
        let id = ParticipantId::new(" S-1001 ");
        assert_eq!(id.as_str(), "S-1001");
        assert!(ParticipantId::new("   ").is_empty());
    }

    #[test]
    fn test_participant_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&ParticipantId::new("S-7")).expect("serialize");
        assert_eq!(json, "\"S-7\"");
    }
}
