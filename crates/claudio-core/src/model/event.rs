use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;
use serde_json::{Map, Value};

use crate::error::ParseError;

/// Lifecycle event names sent by Claude Code in `hook_event_name`.
///
/// Names outside the known set are kept verbatim in [`HookEventName::Other`];
/// the context extractor classifies them with the generic fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HookEventName {
    UserPromptSubmit,
    Notification,
    PreToolUse,
    PostToolUse,
    Stop,
    SubagentStop,
    PreCompact,
    SessionStart,
    Other(String),
}

impl HookEventName {
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::Notification => "Notification",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
            Self::PreCompact => "PreCompact",
            Self::SessionStart => "SessionStart",
            Self::Other(name) => name,
        }
    }

    /// `true` for every name in the closed set Claude Code documents.
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for HookEventName {
    fn from(s: &str) -> Self {
        match s {
            "UserPromptSubmit" => Self::UserPromptSubmit,
            "Notification" => Self::Notification,
            "PreToolUse" => Self::PreToolUse,
            "PostToolUse" => Self::PostToolUse,
            "Stop" => Self::Stop,
            "SubagentStop" => Self::SubagentStop,
            "PreCompact" => Self::PreCompact,
            "SessionStart" => Self::SessionStart,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for HookEventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for HookEventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for HookEventName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// The `tool_response` payload, kept as raw JSON.
///
/// Every tool reports a different shape, so nothing is decoded until an
/// inspector asks for it via [`ToolResponse::decode`].
#[derive(Debug, Clone)]
pub struct ToolResponse(Box<RawValue>);

impl ToolResponse {
    pub fn from_raw(raw: Box<RawValue>) -> Self {
        Self(raw)
    }

    /// Build from an already-parsed value.
    pub fn from_value(value: &Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::value::to_raw_value(value).map(Self)
    }

    pub fn raw(&self) -> &str {
        self.0.get()
    }

    /// Decode into a string-keyed map. Non-object payloads are an error.
    pub fn decode(&self) -> std::result::Result<Map<String, Value>, serde_json::Error> {
        serde_json::from_str(self.0.get())
    }
}

impl PartialEq for ToolResponse {
    fn eq(&self, other: &Self) -> bool {
        self.raw() == other.raw()
    }
}

impl Serialize for ToolResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

/// JSON payload received from Claude Code hooks on stdin.
///
/// One value lives for exactly one hook invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookEvent {
    pub session_id: String,
    pub transcript_path: String,
    pub cwd: String,
    #[serde(rename = "hook_event_name")]
    pub event_name: HookEventName,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_response: Option<ToolResponse>,
    /// Present on UserPromptSubmit events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Present on Notification events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Loose wire shape: every field optional and untyped so validation can
/// name the exact field that failed.
#[derive(Deserialize)]
struct WireEvent {
    #[serde(default)]
    session_id: Option<Value>,
    #[serde(default)]
    transcript_path: Option<Value>,
    #[serde(default)]
    cwd: Option<Value>,
    #[serde(default)]
    hook_event_name: Option<Value>,
    /// Older payloads name the lifecycle event `event_name`.
    #[serde(default)]
    event_name: Option<Value>,
    #[serde(default)]
    tool_name: Option<Value>,
    #[serde(default)]
    tool_input: Option<Value>,
    #[serde(default)]
    tool_response: Option<Box<RawValue>>,
    #[serde(default)]
    prompt: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

impl HookEvent {
    /// Parse and validate a hook event from raw stdin bytes.
    pub fn parse(input: &[u8]) -> std::result::Result<Self, ParseError> {
        let first = input.iter().find(|b| !b.is_ascii_whitespace());
        match first {
            None => return Err(ParseError::EmptyInput),
            Some(b'{') => {}
            Some(_) => {
                return Err(ParseError::MalformedJson(
                    "expected a JSON object".to_string(),
                ))
            }
        }

        let wire: WireEvent = serde_json::from_slice(input)
            .map_err(|e| ParseError::MalformedJson(e.to_string()))?;

        let session_id = required_string(wire.session_id, "session_id")?;
        let transcript_path = required_string(wire.transcript_path, "transcript_path")?;
        let cwd = required_string(wire.cwd, "cwd")?;
        let event_name = match wire.hook_event_name {
            Some(v) if !v.is_null() => Some(v),
            _ => wire.event_name,
        };
        let event_name = required_string(event_name, "hook_event_name")?;

        Ok(Self {
            session_id,
            transcript_path,
            cwd,
            event_name: HookEventName::from(event_name.as_str()),
            tool_name: optional_string(wire.tool_name, "tool_name")?,
            tool_input: wire.tool_input,
            tool_response: wire.tool_response.map(ToolResponse::from_raw),
            prompt: optional_string(wire.prompt, "prompt")?,
            message: optional_string(wire.message, "message")?,
        })
    }

    /// Tool name with surrounding whitespace removed; empty when absent.
    pub fn tool(&self) -> &str {
        self.tool_name.as_deref().map(str::trim).unwrap_or("")
    }

    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl std::str::FromStr for HookEvent {
    type Err = ParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s.as_bytes())
    }
}

fn required_string(
    value: Option<Value>,
    name: &'static str,
) -> std::result::Result<String, ParseError> {
    match value {
        None => Err(ParseError::MissingField(name)),
        Some(Value::String(s)) if s.trim().is_empty() => Err(ParseError::MissingField(name)),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ParseError::TypeMismatch(name)),
    }
}

fn optional_string(
    value: Option<Value>,
    name: &'static str,
) -> std::result::Result<Option<String>, ParseError> {
    match value {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ParseError::TypeMismatch(name)),
    }
}
