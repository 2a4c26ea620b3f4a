//! Fallback chain generation.
//!
//! A chain is the ordered list of logical sound paths tried for one event,
//! most specific first, always ending in `default.wav`. Chains are pure
//! functions of the [`EventContext`]; nothing downstream rebuilds them.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::EventContext;

/// Last-resort sound at the soundpack root.
pub const DEFAULT_SOUND: &str = "default.wav";

static LOGICAL_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:default\.wav|(?:loading|success|error|interactive|completion|system)/[a-z0-9]+(?:-[a-z0-9]+)*\.wav)$",
    )
    .expect("logical path pattern is valid")
});

/// Which chain shape was generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
    /// Tool-less events: hint, operation, category, default.
    Simple,
    /// `PostToolUse` with a tool.
    #[serde(rename = "posttool")]
    PostTool,
    /// `PreToolUse` with a tool, including command/subcommand levels.
    Enhanced,
}

impl ChainType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::PostTool => "posttool",
            Self::Enhanced => "enhanced",
        }
    }
}

impl std::fmt::Display for ChainType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, duplicate-free, non-empty list of logical paths ending in
/// [`DEFAULT_SOUND`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackChain {
    chain_type: ChainType,
    paths: Vec<String>,
}

impl FallbackChain {
    pub fn chain_type(&self) -> ChainType {
        self.chain_type
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }

    /// Check the chain's structural invariants.
    pub fn is_well_formed(&self) -> bool {
        let ends_with_default = self.paths.last().map(String::as_str) == Some(DEFAULT_SOUND);
        let unique = self
            .paths
            .iter()
            .enumerate()
            .all(|(i, p)| !self.paths[..i].contains(p));
        ends_with_default && unique && self.paths.iter().all(|p| is_logical_path(p))
    }
}

/// Lowercase, collapse every run of characters outside `[a-z0-9]` into one
/// `-`, and strip leading/trailing dashes. Idempotent.
pub fn normalize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c);
        } else {
            pending_dash = true;
        }
    }
    out
}

/// Whether `path` matches `<category>/<name>.wav` or `default.wav`.
pub fn is_logical_path(path: &str) -> bool {
    LOGICAL_PATH.is_match(path)
}

/// Build the fallback chain for a context. `None` or an empty context yields
/// the degenerate `[default.wav]` chain.
pub fn generate(ctx: Option<&EventContext>) -> FallbackChain {
    let Some(ctx) = ctx.filter(|c| !c.is_empty()) else {
        return FallbackChain {
            chain_type: ChainType::Simple,
            paths: vec![DEFAULT_SOUND.to_string()],
        };
    };

    match (ctx.event_name.as_str(), ctx.has_tool()) {
        ("PreToolUse", true) => enhanced_chain(ctx),
        ("PostToolUse", true) => posttool_chain(ctx),
        _ => simple_chain(ctx),
    }
}

/// Event-specific operation used as the second level of a simple chain.
fn simple_operation(ctx: &EventContext) -> &str {
    match ctx.event_name.as_str() {
        "UserPromptSubmit" => "prompt-submit",
        "Notification" => "notification",
        "Stop" => "stop",
        "SubagentStop" => "subagent-stop",
        "PreCompact" => "pre-compact",
        "PreToolUse" => "tool-start",
        "PostToolUse" => "tool-complete",
        _ => &ctx.operation,
    }
}

fn simple_chain(ctx: &EventContext) -> FallbackChain {
    let mut chain = ChainBuilder::new(ctx);
    chain.push(&ctx.sound_hint);
    chain.push(simple_operation(ctx));
    chain.push(ctx.category.as_str());
    chain.finish(ChainType::Simple)
}

fn posttool_chain(ctx: &EventContext) -> FallbackChain {
    let suffix = ctx.phase_suffix();
    let mut chain = ChainBuilder::new(ctx);
    chain.push(&ctx.sound_hint);
    chain.push_joined(&ctx.tool_name, suffix);
    if !ctx.original_tool.is_empty() && normalize(&ctx.original_tool) != normalize(&ctx.tool_name)
    {
        chain.push_joined(&ctx.original_tool, suffix);
    }
    chain.push(&ctx.operation);
    chain.push(ctx.category.as_str());
    chain.finish(ChainType::PostTool)
}

fn enhanced_chain(ctx: &EventContext) -> FallbackChain {
    let mut chain = ChainBuilder::new(ctx);
    chain.push(&ctx.sound_hint);
    if !ctx.subcommand.is_empty() {
        chain.push_joined(&ctx.tool_name, &ctx.subcommand);
    }
    chain.push_joined(&ctx.tool_name, "start");
    chain.push(&ctx.tool_name);
    if !ctx.original_tool.is_empty() {
        chain.push_joined(&ctx.original_tool, "start");
        chain.push(&ctx.original_tool);
    }
    chain.push("tool-start");
    chain.push(ctx.category.as_str());
    chain.finish(ChainType::Enhanced)
}

struct ChainBuilder {
    category: &'static str,
    paths: Vec<String>,
}

impl ChainBuilder {
    fn new(ctx: &EventContext) -> Self {
        Self {
            category: ctx.category.as_str(),
            paths: Vec::with_capacity(9),
        }
    }

    /// Push `<category>/<norm(name)>.wav`; names that normalize to nothing
    /// are skipped.
    fn push(&mut self, name: &str) {
        let name = normalize(name);
        if !name.is_empty() {
            self.paths.push(format!("{}/{name}.wav", self.category));
        }
    }

    fn push_joined(&mut self, head: &str, tail: &str) {
        let (head, tail) = (normalize(head), normalize(tail));
        if !head.is_empty() && !tail.is_empty() {
            self.push(&format!("{head}-{tail}"));
        }
    }

    fn finish(self, chain_type: ChainType) -> FallbackChain {
        let mut paths: Vec<String> = Vec::with_capacity(self.paths.len() + 1);
        for path in self.paths {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths.push(DEFAULT_SOUND.to_string());
        FallbackChain { chain_type, paths }
    }
}
