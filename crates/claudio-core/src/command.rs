//! Command extraction from Bash tool invocations.
//!
//! `git commit -m 'fix'` becomes `CommandInfo { command: "git", subcommand:
//! "commit" }`, which lets a soundpack ship `git-commit-start.wav` without the
//! hook knowing anything about git.

use serde_json::Value;

use crate::model::CommandInfo;

/// Hosts whose subcommands are checked against a fixed whitelist rather than
/// the generic token rule.
pub const KNOWN_HOSTS: &[&str] = &["git", "npm", "docker", "cargo", "go", "pip", "yarn", "kubectl"];

const GIT_SUBCOMMANDS: &[&str] = &[
    "add", "am", "apply", "archive", "bisect", "blame", "branch", "bundle", "checkout",
    "cherry-pick", "clean", "clone", "commit", "config", "describe", "diff", "fetch",
    "format-patch", "gc", "grep", "init", "log", "ls-files", "merge", "mv", "notes", "pull",
    "push", "rebase", "reflog", "remote", "reset", "restore", "revert", "rm", "show",
    "sparse-checkout", "stash", "status", "submodule", "switch", "tag", "worktree",
];

const NPM_SUBCOMMANDS: &[&str] = &[
    "access", "audit", "cache", "ci", "config", "dedupe", "exec", "explain", "init",
    "install", "link", "list", "ls", "outdated", "pack", "prune", "publish", "rebuild",
    "run", "run-script", "start", "stop", "test", "uninstall", "update", "version", "view",
];

const DOCKER_SUBCOMMANDS: &[&str] = &[
    "attach", "build", "buildx", "commit", "compose", "container", "cp", "create", "exec",
    "image", "images", "inspect", "kill", "load", "login", "logout", "logs", "network",
    "ps", "pull", "push", "restart", "rm", "rmi", "run", "save", "start", "stop", "system",
    "tag", "volume",
];

const CARGO_SUBCOMMANDS: &[&str] = &[
    "add", "bench", "build", "check", "clean", "clippy", "doc", "fetch", "fix", "fmt",
    "init", "install", "metadata", "new", "publish", "remove", "run", "search", "test",
    "tree", "uninstall", "update", "vendor",
];

const GO_SUBCOMMANDS: &[&str] = &[
    "build", "clean", "doc", "env", "fix", "fmt", "generate", "get", "install", "list",
    "mod", "run", "test", "tool", "version", "vet", "work",
];

const PIP_SUBCOMMANDS: &[&str] = &[
    "cache", "check", "config", "download", "freeze", "hash", "index", "inspect", "install",
    "list", "search", "show", "uninstall", "wheel",
];

const YARN_SUBCOMMANDS: &[&str] = &[
    "add", "audit", "build", "cache", "dev", "dlx", "exec", "info", "init", "install",
    "link", "lint", "outdated", "remove", "run", "start", "test", "upgrade", "why",
    "workspace", "workspaces",
];

const KUBECTL_SUBCOMMANDS: &[&str] = &[
    "annotate", "apply", "attach", "autoscale", "config", "cp", "create", "delete",
    "describe", "diff", "drain", "edit", "exec", "explain", "expose", "get", "label",
    "logs", "patch", "port-forward", "rollout", "run", "scale", "set", "top", "wait",
];

/// Whitelist of accepted subcommands for a known host, `None` otherwise.
pub fn host_subcommands(command: &str) -> Option<&'static [&'static str]> {
    match command {
        "git" => Some(GIT_SUBCOMMANDS),
        "npm" => Some(NPM_SUBCOMMANDS),
        "docker" => Some(DOCKER_SUBCOMMANDS),
        "cargo" => Some(CARGO_SUBCOMMANDS),
        "go" => Some(GO_SUBCOMMANDS),
        "pip" => Some(PIP_SUBCOMMANDS),
        "yarn" => Some(YARN_SUBCOMMANDS),
        "kubectl" => Some(KUBECTL_SUBCOMMANDS),
        _ => None,
    }
}

/// Extract command/subcommand from a Bash `tool_input` (`{"command": "..."}`).
///
/// Returns an empty [`CommandInfo`] when there is no usable command.
pub fn extract_command(tool_input: Option<&Value>) -> CommandInfo {
    let Some(command_line) = tool_input
        .and_then(|input| input.get("command"))
        .and_then(|v| v.as_str())
    else {
        return CommandInfo::default();
    };
    parse_command_line(command_line)
}

/// Split a shell command line into command and optional subcommand.
pub fn parse_command_line(command_line: &str) -> CommandInfo {
    let mut words = command_line
        .split_whitespace()
        .filter(|word| !word.starts_with('-'));

    let Some(command) = words.next() else {
        return CommandInfo::default();
    };
    let command = command.to_lowercase();

    let subcommand = words
        .next()
        .filter(|word| is_valid_subcommand(&command, word))
        .map(str::to_lowercase);

    match subcommand {
        Some(subcommand) => CommandInfo {
            command,
            subcommand,
            has_subcommand: true,
        },
        None => CommandInfo {
            command,
            subcommand: String::new(),
            has_subcommand: false,
        },
    }
}

/// Whether `word` may follow `command` as its subcommand.
pub fn is_valid_subcommand(command: &str, word: &str) -> bool {
    if word.is_empty() || word.contains('/') || word.contains('.') || word.contains("://") {
        return false;
    }
    match host_subcommands(command) {
        Some(allowed) => allowed.contains(&word),
        None => word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    }
}
