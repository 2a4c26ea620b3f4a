//! CLI integration tests: run the claudio binary against a seeded database.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use claudio_core::classify::classify;
use claudio_core::model::HookEvent;
use claudio_core::resolver::DirectoryResolver;
use claudio_core::select::select;
use claudio_core::storage::{DbLocation, Tracker};
use serde_json::{json, Value};

struct Env {
    root: PathBuf,
}

impl Env {
    fn new() -> Self {
        let root = std::env::temp_dir().join(format!("claudio-cli-{}", uuid::Uuid::now_v7()));
        for sound in ["loading/git.wav", "success/success.wav", "default.wav"] {
            let path = root.join("pack").join(sound);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, b"RIFF").unwrap();
        }
        Self { root }
    }

    fn db_path(&self) -> PathBuf {
        self.root.join("sounds.db")
    }

    /// Run events through the engine the way the hook does.
    fn seed(&self, events: &[Value]) {
        let resolver = DirectoryResolver::new(self.root.join("pack"));
        for raw in events {
            let event = HookEvent::parse(raw.to_string().as_bytes()).unwrap();
            let ctx = classify(&event);
            let mut tracker = Tracker::new(
                DbLocation::File(self.db_path()),
                &event.session_id,
                "test-pack",
            );
            select(Some(&ctx), &resolver, Some(&mut tracker)).unwrap();
        }
    }

    fn claudio(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_claudio"));
        cmd.env("HOME", &self.root)
            .env("XDG_CONFIG_HOME", self.root.join("config"))
            .env("XDG_CACHE_HOME", self.root.join("cache"))
            .env("XDG_DATA_HOME", self.root.join("data"))
            .env("CLAUDIO_TRACKING__DB_PATH", self.db_path())
            .env("CLAUDIO_DEFAULT_SOUNDPACK", self.root.join("pack"))
            .env_remove("CLAUDIO_LOG")
            .current_dir(&self.root);
        cmd
    }

    fn run(&self, args: &[&str]) -> Output {
        self.claudio().args(args).output().expect("failed to execute")
    }

    fn json(&self, args: &[&str]) -> Value {
        let output = self.run(args);
        assert!(
            output.status.success(),
            "claudio {args:?} failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).expect("invalid JSON output")
    }

    fn preview(&self, input: &str, args: &[&str]) -> Output {
        let mut child = self
            .claudio()
            .arg("preview")
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn claudio");
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input.as_bytes()).unwrap();
        }
        child.wait_with_output().expect("failed to wait for claudio")
    }
}

impl Drop for Env {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn event(name: &str, extra: Value) -> Value {
    let mut base = json!({
        "session_id": "cli-session",
        "transcript_path": "/tmp/t.jsonl",
        "cwd": "/tmp",
        "hook_event_name": name,
    });
    if let (Some(obj), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        obj.extend(extra.clone());
    }
    base
}

fn git_commit() -> Value {
    event(
        "PreToolUse",
        json!({"tool_name": "Bash", "tool_input": {"command": "git commit -m 'fix'"}}),
    )
}

fn seeded() -> Env {
    let env = Env::new();
    env.seed(&[
        git_commit(),
        git_commit(),
        event(
            "PostToolUse",
            json!({
                "tool_name": "Read",
                "tool_input": {"file_path": "/src/main.rs"},
                "tool_response": {"content": "fn main() {}"},
            }),
        ),
        event("PreCompact", json!({})),
    ]);
    env
}

#[test]
fn test_cli_help_lists_commands() {
    let env = Env::new();
    let output = env.run(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in [
        "missing",
        "usage",
        "summary",
        "tools",
        "categories",
        "levels",
        "preview",
        "status",
    ] {
        assert!(stdout.contains(cmd), "help is missing {cmd}");
    }
}

#[test]
fn test_cli_summary_json() {
    let env = seeded();
    let summary = env.json(&["summary", "--json"]);
    assert_eq!(summary["total_events"], 4);
    assert_eq!(summary["unique_sessions"], 1);
    assert!(summary["fallback_histogram"].as_array().unwrap().len() >= 2);
}

#[test]
fn test_cli_missing_json() {
    let env = seeded();
    let missing = env.json(&["missing", "--json"]);
    let rows = missing.as_array().unwrap();
    let first = rows
        .iter()
        .find(|r| r["path"] == "loading/git-commit-start.wav")
        .unwrap();
    assert_eq!(first["misses"], 2);
    assert!(rows.iter().all(|r| r["path"] != "loading/git.wav"));
}

#[test]
fn test_cli_missing_tool_filter_and_limit() {
    let env = seeded();
    let missing = env.json(&["missing", "--tool", "Read", "--json", "--limit", "1"]);
    let rows = missing.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0]["path"].as_str().unwrap().starts_with("success/"));
}

#[test]
fn test_cli_usage_and_tools() {
    let env = seeded();
    let usage = env.json(&["usage", "--json"]);
    assert!(usage
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["path"] == "loading/git.wav" && r["uses"] == 2));

    let tools = env.json(&["tools", "--json"]);
    let tools = tools.as_array().unwrap();
    assert_eq!(tools[0]["tool"], "git");
    assert_eq!(tools[0]["events"], 2);
}

#[test]
fn test_cli_categories_by_name() {
    let env = seeded();
    let categories = env.json(&["categories", "--json"]);
    let rows = categories.as_array().unwrap();
    assert_eq!(rows[0]["category"], "loading");
    assert_eq!(rows[0]["code"], 0);
    let filtered = env.json(&["categories", "--category", "system", "--json"]);
    assert_eq!(filtered.as_array().unwrap().len(), 1);
}

#[test]
fn test_cli_levels_json() {
    let env = seeded();
    let levels = env.json(&["levels", "--json", "--sort", "name", "--asc"]);
    let levels: Vec<i64> = levels
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["level"].as_i64().unwrap())
        .collect();
    let mut sorted = levels.clone();
    sorted.sort();
    assert_eq!(levels, sorted);
}

#[test]
fn test_cli_time_window_flags() {
    let env = seeded();
    let today = env.json(&["summary", "--days", "1", "--json"]);
    assert_eq!(today["total_events"], 4);
    let old = env.json(&["summary", "--until", "2000-01-01", "--json"]);
    assert_eq!(old["total_events"], 0);
    let phrase = env.json(&["summary", "--when", "last 2 hours", "--json"]);
    assert_eq!(phrase["total_events"], 4);
}

#[test]
fn test_cli_bad_phrase_fails() {
    let env = seeded();
    let output = env.run(&["summary", "--when", "whenever"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("whenever"));
}

#[test]
fn test_cli_recent_json() {
    let env = seeded();
    let recent = env.json(&["recent", "--json", "--limit", "2"]);
    let rows = recent.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(!rows[0]["lookups"].as_array().unwrap().is_empty());
}

#[test]
fn test_cli_preview_json() {
    let env = Env::new();
    let output = env.preview(&git_commit().to_string(), &["--json"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let preview: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(preview["context"]["tool_name"], "git");
    assert_eq!(preview["chain_type"], "enhanced");
    assert_eq!(preview["chain"].as_array().unwrap().len(), 9);
    assert_eq!(preview["lookup"]["selected_path"], "loading/git.wav");
    assert_eq!(preview["lookup"]["fallback_level"], 4);
    // preview never records
    assert!(!env.db_path().exists());
}

#[test]
fn test_cli_preview_rejects_bad_input() {
    let env = Env::new();
    let output = env.preview("{\"cwd\": \"/tmp\"}", &[]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_status_output() {
    let env = Env::new();
    let output = env.run(&["status"]);
    assert!(
        output.status.success(),
        "claudio status failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("not created yet"));
}

#[test]
fn test_cli_config_prints_toml() {
    let env = Env::new();
    let output = env.claudio().env("CLAUDIO_VOLUME", "0.25").arg("config").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("volume = 0.25"));
    assert!(stdout.contains("[tracking]"));
}

#[test]
fn test_cli_prune() {
    let env = seeded();
    let output = env.run(&["prune", "--older-than-days", "0"]);
    assert!(output.status.success());
    let summary = env.json(&["summary", "--json"]);
    // events from this second may survive a zero-day cutoff
    assert!(summary["total_events"].as_i64().unwrap() <= 4);
}
