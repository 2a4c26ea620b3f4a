//! Context extraction: turn a parsed [`HookEvent`] into an [`EventContext`].

use serde_json::{Map, Value};

use crate::command;
use crate::model::{EventCategory, EventContext, HookEvent, HookEventName};

/// Extensions that name scratch or backup files rather than a file type.
const IGNORED_EXTENSIONS: &[&str] = &["tmp", "bak", "log", "old", "orig"];

/// How a finished tool call turned out, judged from its `tool_response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    Success,
    Error(Option<ErrorKind>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The user interrupted the tool; the only kind that overrides the hint.
    Interrupted,
    Stderr,
    /// The tool-specific inspector judged the response a failure.
    ToolReported,
}

impl ResponseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    fn hint_override(&self) -> Option<&'static str> {
        match self {
            Self::Error(Some(ErrorKind::Interrupted)) => Some("tool-interrupted"),
            _ => None,
        }
    }
}

/// Classify a hook event. Never fails: unknown events get the generic
/// interactive context.
pub fn classify(event: &HookEvent) -> EventContext {
    let mut ctx = match &event.event_name {
        HookEventName::UserPromptSubmit => {
            simple(EventCategory::Interactive, "prompt", "message-sent")
        }
        HookEventName::Notification => classify_notification(event),
        HookEventName::PreToolUse => classify_pre_tool_use(event),
        HookEventName::PostToolUse => classify_post_tool_use(event),
        HookEventName::Stop => simple(EventCategory::Completion, "stop", "agent-complete"),
        HookEventName::SubagentStop => {
            simple(EventCategory::Completion, "subagent-stop", "subagent-complete")
        }
        HookEventName::PreCompact => simple(EventCategory::System, "compact", "compacting"),
        HookEventName::SessionStart => simple(EventCategory::Interactive, "unknown", "default"),
        HookEventName::Other(name) => {
            tracing::warn!("unknown hook event '{name}', using default classification");
            simple(EventCategory::Interactive, "unknown", "default")
        }
    };
    ctx.event_name = event.event_name.as_str().to_string();

    if ctx.has_tool() && ctx.original_tool.is_empty() {
        ctx.file_type = extract_file_type(event.tool_input.as_ref()).unwrap_or_default();
    }

    tracing::debug!(
        category = %ctx.category,
        tool = %ctx.tool_name,
        hint = %ctx.sound_hint,
        "classified {}",
        ctx.event_name
    );
    ctx
}

fn simple(category: EventCategory, operation: &str, hint: &str) -> EventContext {
    EventContext {
        category,
        operation: operation.to_string(),
        sound_hint: hint.to_string(),
        ..Default::default()
    }
}

/// Notification: permission and idle prompts get their own hints.
fn classify_notification(event: &HookEvent) -> EventContext {
    let message = event.message.as_deref().unwrap_or("").to_lowercase();
    let hint = notification_hint(&message);
    simple(EventCategory::Interactive, "notification", hint)
}

fn notification_hint(message: &str) -> &'static str {
    const PERMISSION: &[&str] = &["permission", "needs permission", "needs your permission"];
    const IDLE: &[&str] = &["idle", "been idle", "idle for"];

    if PERMISSION.iter().any(|p| message.contains(p)) {
        "notification-permission"
    } else if IDLE.iter().any(|p| message.contains(p)) {
        "notification-idle"
    } else {
        "notification"
    }
}

fn classify_pre_tool_use(event: &HookEvent) -> EventContext {
    let mut ctx = simple(EventCategory::Loading, "tool-start", "");
    apply_tool_hint(&mut ctx, event, "start");
    ctx
}

fn classify_post_tool_use(event: &HookEvent) -> EventContext {
    let outcome = analyze_response(event);
    let (category, suffix) = if outcome.is_success() {
        (EventCategory::Success, "success")
    } else {
        (EventCategory::Error, "error")
    };

    let mut ctx = simple(category, "tool-complete", "");
    ctx.is_success = outcome.is_success();
    ctx.has_error = !outcome.is_success();
    apply_tool_hint(&mut ctx, event, suffix);

    if let Some(hint) = outcome.hint_override() {
        ctx.sound_hint = hint.to_string();
    }
    ctx
}

/// Fill `tool_name`, `original_tool`, `subcommand` and a tool-aware hint.
fn apply_tool_hint(ctx: &mut EventContext, event: &HookEvent, suffix: &str) {
    let tool = event.tool();

    if tool.is_empty() {
        ctx.sound_hint = format!("tool-{suffix}");
        return;
    }

    if tool == "Bash" {
        let info = command::extract_command(event.tool_input.as_ref());
        if info.is_empty() {
            ctx.tool_name = tool.to_string();
            ctx.sound_hint = format!("bash-{suffix}");
        } else {
            ctx.sound_hint = format!("{}-{suffix}", info.stem());
            ctx.original_tool = tool.to_string();
            ctx.tool_name = info.command;
            ctx.subcommand = info.subcommand;
        }
        return;
    }

    ctx.tool_name = tool.to_string();
    ctx.sound_hint = format!("{}-{suffix}", tool.to_lowercase());
}

/// Judge a `PostToolUse` response. Absent responses count as success.
pub fn analyze_response(event: &HookEvent) -> ResponseOutcome {
    let Some(response) = &event.tool_response else {
        return ResponseOutcome::Success;
    };

    let map = match response.decode() {
        Ok(map) => map,
        Err(e) => {
            tracing::debug!("tool_response is not a JSON object: {e}");
            return ResponseOutcome::Error(None);
        }
    };

    if map.get("interrupted").and_then(Value::as_bool) == Some(true) {
        return ResponseOutcome::Error(Some(ErrorKind::Interrupted));
    }

    if let Some(stderr) = map.get("stderr").and_then(Value::as_str) {
        if !stderr.is_empty() {
            return ResponseOutcome::Error(Some(ErrorKind::Stderr));
        }
    }

    inspect_tool_response(event.tool(), &map)
}

/// Tool-specific success policy, applied after the generic checks.
fn inspect_tool_response(tool: &str, map: &Map<String, Value>) -> ResponseOutcome {
    let ok = match tool {
        "Bash" => true,
        "Read" | "LS" | "Glob" => map.get("content").is_some_and(|v| !v.is_null()),
        "Edit" | "Write" | "MultiEdit" => {
            map.get("success").and_then(Value::as_bool) != Some(false)
        }
        "Grep" => match map.get("numLines") {
            None => true,
            Some(v) => v.as_i64().is_some_and(|n| n >= 0) || v.as_u64().is_some(),
        },
        _ => true,
    };

    if ok {
        ResponseOutcome::Success
    } else {
        ResponseOutcome::Error(Some(ErrorKind::ToolReported))
    }
}

/// Lowercased extension of the file a tool operates on, if meaningful.
pub fn extract_file_type(tool_input: Option<&Value>) -> Option<String> {
    let input = tool_input?;
    let path = ["file_path", "path", "filename"]
        .iter()
        .find_map(|key| input.get(key).and_then(Value::as_str))?;

    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_lowercase();

    if ext.is_empty() || IGNORED_EXTENSIONS.contains(&ext.as_str()) {
        return None;
    }
    Some(ext)
}
