//! Identifiers and small value types shared across the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_string(s: &str) -> std::result::Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
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
    };
}

uuid_id!(
    /// Identity of a playback session in the registry.
    SessionId
);
uuid_id!(
    /// Identity of a live binding.
    BindingId
);
uuid_id!(
    /// Identity of a host-scoped manager.
    ManagerId
);
uuid_id!(
    /// Identity of a root-scoped group.
    GroupId
);

/// Stable client-facing identity of a session.
///
/// Sessions set up with the same non-sentinel tag share one registry entry,
/// which is what lets a session move between containers. [`Tag::None`] opts a
/// session out of position persistence and client play/pause routing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum Tag {
    #[default]
    None,
    Key(String),
}

impl Tag {
    pub fn new(key: impl Into<String>) -> Self {
        Tag::Key(key.into())
    }

    /// Random tag for clients that want persistence without naming media.
    pub fn generate() -> Self {
        Tag::Key(Uuid::new_v4().to_string())
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Tag::None)
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::None => write!(f, "<none>"),
            Tag::Key(key) => write!(f, "{}", key),
        }
    }
}

/// Client playback intent recorded by `play`/`pause`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackIntent {
    Play,
    Pause,
}
