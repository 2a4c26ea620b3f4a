use serde::{Deserialize, Serialize};

use super::category::EventCategory;

/// Classifier output for a single hook event.
///
/// For `PostToolUse` exactly one of `is_success` / `has_error` is set; for
/// every other event both are false.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub category: EventCategory,
    /// Raw `hook_event_name` this context was derived from.
    #[serde(default)]
    pub event_name: String,
    /// Tool name, or the command extracted from a Bash invocation (`git`).
    #[serde(default)]
    pub tool_name: String,
    /// Set only when `tool_name` was extracted from a shell command.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub original_tool: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub subcommand: String,
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub has_error: bool,
    #[serde(default)]
    pub sound_hint: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_type: String,
    #[serde(default)]
    pub operation: String,
}

impl EventContext {
    /// A context that carries no information and produces the degenerate
    /// `[default.wav]` chain.
    pub fn is_empty(&self) -> bool {
        self.event_name.is_empty()
            && self.tool_name.is_empty()
            && self.sound_hint.is_empty()
            && self.operation.is_empty()
    }

    pub fn has_tool(&self) -> bool {
        !self.tool_name.is_empty()
    }

    /// Key used by the tracker to decide when a new event row starts.
    pub fn group_key(&self) -> (EventCategory, &str, &str) {
        (self.category, &self.tool_name, &self.operation)
    }

    /// `success` / `error` for post-tool contexts, `start` otherwise.
    pub fn phase_suffix(&self) -> &'static str {
        if self.has_error {
            "error"
        } else if self.is_success {
            "success"
        } else {
            "start"
        }
    }
}

/// A shell command split into its leading words.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub command: String,
    pub subcommand: String,
    pub has_subcommand: bool,
}

impl CommandInfo {
    pub fn is_empty(&self) -> bool {
        self.command.is_empty()
    }

    /// `command` or `command-subcommand`, the stem of a command-aware hint.
    pub fn stem(&self) -> String {
        if self.has_subcommand {
            format!("{}-{}", self.command, self.subcommand)
        } else {
            self.command.clone()
        }
    }
}
