use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Coarse family of a hook event. Drives the first path segment of every
/// logical sound path (`<category>/<name>.wav`).
///
/// The integer encoding is persisted inside `hook_events.context` and queried
/// by analytics, so it must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum EventCategory {
    Loading = 0,
    Success = 1,
    Error = 2,
    #[default]
    Interactive = 3,
    Completion = 4,
    System = 5,
}

impl EventCategory {
    pub const ALL: [EventCategory; 6] = [
        Self::Loading,
        Self::Success,
        Self::Error,
        Self::Interactive,
        Self::Completion,
        Self::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Success => "success",
            Self::Error => "error",
            Self::Interactive => "interactive",
            Self::Completion => "completion",
            Self::System => "system",
        }
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Loading),
            1 => Some(Self::Success),
            2 => Some(Self::Error),
            3 => Some(Self::Interactive),
            4 => Some(Self::Completion),
            5 => Some(Self::System),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "loading" | "0" => Ok(Self::Loading),
            "success" | "1" => Ok(Self::Success),
            "error" | "2" => Ok(Self::Error),
            "interactive" | "3" => Ok(Self::Interactive),
            "completion" | "4" => Ok(Self::Completion),
            "system" | "5" => Ok(Self::System),
            _ => Err(format!("unknown event category: {s}")),
        }
    }
}

impl Serialize for EventCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for EventCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CategoryVisitor;

        impl Visitor<'_> for CategoryVisitor {
            type Value = EventCategory;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("an event category code (0-5) or name")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
                i64::try_from(v)
                    .ok()
                    .and_then(EventCategory::from_code)
                    .ok_or_else(|| E::custom(format!("unknown event category code: {v}")))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
                EventCategory::from_code(v)
                    .ok_or_else(|| E::custom(format!("unknown event category code: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_any(CategoryVisitor)
    }
}
