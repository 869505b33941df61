use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error type for parsing an ID from a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[must_use]
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generates a fresh random identifier.
            #[must_use]
            pub fn random() -> Self {
                Self(Uuid::new_v4())
            }

            #[must_use]
            pub fn value(&self) -> Uuid {
                self.0
            }

            /// String form used as a key inside the progress tree.
            #[must_use]
            pub fn key(&self) -> String {
                self.0.to_string()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self).map_err(|_| ParseIdError {
                    kind: stringify!($name),
                })
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a learner
    UserId
);
uuid_id!(
    /// Unique identifier for a Course
    CourseId
);
uuid_id!(
    /// Unique identifier for a Lesson
    LessonId
);
uuid_id!(
    /// Unique identifier for a Deck
    DeckId
);
uuid_id!(
    /// Unique identifier for a Card
    CardId
);
uuid_id!(
    /// Unique identifier for one of a card's possible answers
    AnswerId
);

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "6f1c1b9e-3a57-4b8a-9d0f-2a4c5e7f9b10";

    #[test]
    fn test_card_id_display() {
        let id: CardId = RAW.parse().unwrap();
        assert_eq!(id.to_string(), RAW);
        assert_eq!(id.key(), RAW);
    }

    #[test]
    fn test_deck_id_from_str_invalid() {
        let err = "not-a-uuid".parse::<DeckId>().unwrap_err();
        assert_eq!(err.to_string(), "failed to parse DeckId from string");
    }

    #[test]
    fn test_lesson_id_debug() {
        let id: LessonId = RAW.parse().unwrap();
        assert_eq!(format!("{id:?}"), format!("LessonId({RAW})"));
    }

    #[test]
    fn test_ids_serialize_as_plain_uuid() {
        let id: CourseId = RAW.parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{RAW}\""));
    }
}
