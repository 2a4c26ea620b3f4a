use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Args, Parser, ValueEnum};
use claudio_core::chain;
use claudio_core::classify::classify;
use claudio_core::config::{global_config_path, ClaudioConfig};
use claudio_core::model::{EventCategory, HookEvent};
use claudio_core::resolver::locate_soundpack;
use claudio_core::select::select_from_chain;
use claudio_core::storage::{
    AnalyticsFilter, OrderBy, SoundDb, SortOrder, TimePreset, TimeWindow,
};
use owo_colors::OwoColorize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "claudio", about = "Claudio: sounds for Claude Code hooks", version)]
enum Cli {
    /// Sounds that were looked up but missing from the soundpack
    Missing {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Sounds that were actually selected, by use count
    Usage {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Totals and fallback-level histogram
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Per-tool event counts
    Tools {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Event share per category
    Categories {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Event share per fallback level
    Levels {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Most recent recorded events with their lookups
    Recent {
        /// Maximum number of events to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete recorded events older than N days
    Prune {
        /// Age in days
        #[arg(long)]
        older_than_days: u32,
    },
    /// Classify a hook event from stdin and show which sound would play
    Preview {
        /// Soundpack name or path (default from config)
        #[arg(long)]
        soundpack: Option<String>,
        /// Output raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show configuration, soundpack, and database status
    Status,
    /// Print the effective configuration as TOML
    Config,
}

/// Filters shared by the analytics commands.
#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Only events from the last N days
    #[arg(long, conflicts_with_all = ["preset", "when", "since", "until"])]
    days: Option<u32>,
    /// today, yesterday, this-week, last-week, this-month, last-month, all-time
    #[arg(long, conflicts_with_all = ["when", "since", "until"])]
    preset: Option<TimePreset>,
    /// Natural-language window, e.g. "last 3 hours" or "since 2025-01-01"
    #[arg(long, conflicts_with_all = ["since", "until"])]
    when: Option<String>,
    /// Start date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    since: Option<String>,
    /// End date, inclusive (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    until: Option<String>,
    /// Filter by tool or extracted command (e.g. Read, git)
    #[arg(short, long)]
    tool: Option<String>,
    /// Filter by event category
    #[arg(short, long)]
    category: Option<EventCategory>,
    /// Filter by soundpack
    #[arg(long)]
    soundpack: Option<String>,
    /// Filter by session id
    #[arg(long)]
    session: Option<String>,
    /// Maximum number of rows
    #[arg(short, long)]
    limit: Option<usize>,
    /// Rows to skip
    #[arg(long, default_value = "0")]
    offset: usize,
    /// Sort key
    #[arg(long, value_enum, default_value = "count")]
    sort: SortKey,
    /// Sort ascending instead of descending
    #[arg(long)]
    asc: bool,
    /// Output raw JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum SortKey {
    #[default]
    Count,
    Recent,
    Name,
}

impl FilterArgs {
    fn to_filter(&self) -> Result<AnalyticsFilter> {
        let window = if let Some(days) = self.days {
            TimeWindow::LastDays(days)
        } else if let Some(preset) = self.preset {
            TimeWindow::Preset(preset)
        } else if let Some(phrase) = &self.when {
            TimeWindow::Phrase(phrase.clone())
        } else if self.since.is_some() || self.until.is_some() {
            let start = match &self.since {
                Some(s) => parse_instant(s, false)?,
                None => DateTime::<Utc>::UNIX_EPOCH,
            };
            let end = match &self.until {
                Some(s) => parse_instant(s, true)?,
                None => Utc::now(),
            };
            TimeWindow::Range { start, end }
        } else {
            TimeWindow::default()
        };

        let order_by = match self.sort {
            SortKey::Count => OrderBy::Count,
            SortKey::Recent => OrderBy::Recent,
            SortKey::Name => OrderBy::Name,
        };
        let order = if self.asc { SortOrder::Asc } else { SortOrder::Desc };

        Ok(AnalyticsFilter {
            window,
            tool: self.tool.clone(),
            category: self.category,
            soundpack: self.soundpack.clone(),
            session: self.session.clone(),
            limit: self.limit,
            offset: self.offset,
            order_by,
            order,
        })
    }
}

/// RFC 3339, or a local date (start of day, or end of day for `until`).
fn parse_instant(s: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD or RFC 3339"))?;
    let time = if end_of_day {
        NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN)
    } else {
        NaiveTime::MIN
    };
    Local
        .from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("'{s}' does not exist in the local timezone"))
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_env("CLAUDIO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .compact()
        .init();

    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;
    let config = ClaudioConfig::load(Some(&cwd)).unwrap_or_else(|e| {
        tracing::warn!("failed to load config, using defaults: {e}");
        ClaudioConfig::default_config()
    });

    run(cli, &config, &cwd)
}

fn run(cli: Cli, config: &ClaudioConfig, cwd: &Path) -> Result<()> {
    match cli {
        Cli::Missing { filter } => cmd_missing(&open_db(config)?, &filter),
        Cli::Usage { filter } => cmd_usage(&open_db(config)?, &filter),
        Cli::Summary { filter } => cmd_summary(&open_db(config)?, &filter),
        Cli::Tools { filter } => cmd_tools(&open_db(config)?, &filter),
        Cli::Categories { filter } => cmd_categories(&open_db(config)?, &filter),
        Cli::Levels { filter } => cmd_levels(&open_db(config)?, &filter),
        Cli::Recent { limit, json } => cmd_recent(&open_db(config)?, limit, json),
        Cli::Prune { older_than_days } => cmd_prune(&open_db(config)?, older_than_days),
        Cli::Preview { soundpack, json } => cmd_preview(config, soundpack, json),
        Cli::Status => cmd_status(config, cwd),
        Cli::Config => {
            print!("{}", toml::to_string_pretty(config)?);
            Ok(())
        }
    }
}

fn open_db(config: &ClaudioConfig) -> Result<SoundDb> {
    let path = config
        .db_path()
        .context("no cache directory found; set tracking.db_path")?;
    SoundDb::open(&path).with_context(|| format!("failed to open {}", path.display()))
}

fn fmt_ts(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// analytics
// ---------------------------------------------------------------------------

fn cmd_missing(db: &SoundDb, args: &FilterArgs) -> Result<()> {
    let rows = db.missing_sounds(&args.to_filter()?)?;
    if args.json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("{}", "No missing sounds.".dimmed());
        return Ok(());
    }
    println!(
        "{:<48} {:>8} {:<16}",
        "Path".dimmed(),
        "Misses".dimmed(),
        "Last seen".dimmed()
    );
    for row in &rows {
        println!(
            "{:<48} {:>8} {:<16}",
            row.path.yellow(),
            row.misses,
            fmt_ts(row.last_seen).dimmed()
        );
    }
    Ok(())
}

fn cmd_usage(db: &SoundDb, args: &FilterArgs) -> Result<()> {
    let rows = db.sound_usage(&args.to_filter()?)?;
    if args.json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("{}", "No sounds played yet.".dimmed());
        return Ok(());
    }
    println!(
        "{:<48} {:>6} {:>9} {:<16}",
        "Path".dimmed(),
        "Uses".dimmed(),
        "Avg level".dimmed(),
        "Last used".dimmed()
    );
    for row in &rows {
        println!(
            "{:<48} {:>6} {:>9.2} {:<16}",
            row.path.cyan(),
            row.uses,
            row.avg_fallback_level,
            fmt_ts(row.last_used).dimmed()
        );
    }
    Ok(())
}

fn cmd_summary(db: &SoundDb, args: &FilterArgs) -> Result<()> {
    let summary = db.usage_summary(&args.to_filter()?)?;
    if args.json {
        return print_json(&summary);
    }
    let hit_rate = if summary.total_lookups == 0 {
        0.0
    } else {
        100.0 * (summary.total_lookups - summary.missing_lookups) as f64
            / summary.total_lookups as f64
    };
    println!("{}", "Claudio Usage".bold());
    println!("  {}          {}", "Events:".dimmed(), summary.total_events.to_string().cyan());
    println!("  {}   {}", "Unique sounds:".dimmed(), summary.unique_sounds);
    println!("  {}        {}", "Sessions:".dimmed(), summary.unique_sessions);
    println!(
        "  {}         {} ({} missing, {hit_rate:.1}% found)",
        "Lookups:".dimmed(),
        summary.total_lookups,
        summary.missing_lookups.to_string().yellow()
    );
    println!("  {}       {:.2}", "Avg level:".dimmed(), summary.avg_fallback_level);
    if !summary.fallback_histogram.is_empty() {
        println!();
        print_level_bars(&summary.fallback_histogram);
    }
    Ok(())
}

fn cmd_tools(db: &SoundDb, args: &FilterArgs) -> Result<()> {
    let rows = db.tool_stats(&args.to_filter()?)?;
    if args.json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("{}", "No tool events recorded.".dimmed());
        return Ok(());
    }
    println!(
        "{:<20} {:>8} {:>8} {:>9}",
        "Tool".dimmed(),
        "Events".dimmed(),
        "Sounds".dimmed(),
        "Avg level".dimmed()
    );
    for row in &rows {
        println!(
            "{:<20} {:>8} {:>8} {:>9.2}",
            row.tool.cyan(),
            row.events,
            row.unique_sounds,
            row.avg_fallback_level
        );
    }
    Ok(())
}

fn cmd_categories(db: &SoundDb, args: &FilterArgs) -> Result<()> {
    let rows = db.category_distribution(&args.to_filter()?)?;
    if args.json {
        let named: Vec<_> = rows
            .iter()
            .map(|r| {
                json!({
                    "category": r.category.as_str(),
                    "code": r.category.code(),
                    "count": r.count,
                    "percent": r.percent,
                })
            })
            .collect();
        return print_json(&named);
    }
    if rows.is_empty() {
        println!("{}", "No events recorded.".dimmed());
        return Ok(());
    }
    for row in &rows {
        let name = row.category.as_str();
        let colored = match row.category {
            EventCategory::Success | EventCategory::Completion => name.green().to_string(),
            EventCategory::Error => name.red().to_string(),
            EventCategory::Loading => name.cyan().to_string(),
            EventCategory::Interactive => name.yellow().to_string(),
            EventCategory::System => name.dimmed().to_string(),
        };
        println!(
            "{:<21} {:>6} {:>6.1}%  {}",
            colored,
            row.count,
            row.percent,
            bar(row.percent)
        );
    }
    Ok(())
}

fn cmd_levels(db: &SoundDb, args: &FilterArgs) -> Result<()> {
    let rows = db.fallback_distribution(&args.to_filter()?)?;
    if args.json {
        return print_json(&rows);
    }
    if rows.is_empty() {
        println!("{}", "No events recorded.".dimmed());
        return Ok(());
    }
    print_level_bars(&rows);
    Ok(())
}

fn print_level_bars(rows: &[claudio_core::storage::LevelCount]) {
    println!("{}", "Fallback level".dimmed());
    for row in rows {
        println!(
            "  {:>2} {:>6} {:>6.1}%  {}",
            row.level,
            row.count,
            row.percent,
            bar(row.percent).green()
        );
    }
}

fn bar(percent: f64) -> String {
    "#".repeat((percent / 2.5).round() as usize)
}

fn cmd_recent(db: &SoundDb, limit: usize, json: bool) -> Result<()> {
    let events = db.recent_events(limit)?;
    if json {
        let mut out = Vec::with_capacity(events.len());
        for event in &events {
            out.push(json!({
                "event": event,
                "lookups": db.lookups_for_event(event.id)?,
            }));
        }
        return print_json(&out);
    }
    if events.is_empty() {
        println!("{}", "No events recorded.".dimmed());
        return Ok(());
    }
    for event in &events {
        let name = event.context["event_name"].as_str().unwrap_or("?");
        println!(
            "{} {} {} {}",
            fmt_ts(event.timestamp).dimmed(),
            name.bold(),
            event.tool_name.as_deref().unwrap_or("-").cyan(),
            format!("→ {} (level {})", event.selected_path, event.fallback_level).dimmed()
        );
        for lookup in db.lookups_for_event(event.id)? {
            let mark = if lookup.found {
                "✓".green().to_string()
            } else {
                "✗".red().to_string()
            };
            println!("    {} {:>2} {}", mark, lookup.sequence, lookup.path);
        }
    }
    Ok(())
}

fn cmd_prune(db: &SoundDb, older_than_days: u32) -> Result<()> {
    let cutoff = Utc::now().timestamp() - i64::from(older_than_days) * 86_400;
    let deleted = db.prune_before(cutoff)?;
    println!("Pruned {} event(s) older than {older_than_days} days.", deleted.to_string().cyan());
    Ok(())
}

// ---------------------------------------------------------------------------
// preview / status
// ---------------------------------------------------------------------------

fn cmd_preview(config: &ClaudioConfig, soundpack: Option<String>, json: bool) -> Result<()> {
    let mut input = Vec::new();
    std::io::stdin()
        .read_to_end(&mut input)
        .context("failed to read hook event from stdin")?;
    let event = HookEvent::parse(&input).context("invalid hook event")?;

    let ctx = classify(&event);
    let chain = chain::generate(Some(&ctx));
    let pack = soundpack.unwrap_or_else(|| config.default_soundpack.clone());
    let resolver = locate_soundpack(&pack, &config.soundpack_search_dirs());
    let result = match &resolver {
        Ok(resolver) => Some(select_from_chain(&chain, &ctx, resolver.as_ref(), None)?),
        Err(_) => None,
    };

    if json {
        return print_json(&json!({
            "context": ctx,
            "chain_type": chain.chain_type(),
            "chain": chain.paths(),
            "soundpack": resolver.as_ref().map(|r| r.describe()).ok(),
            "lookup": result,
        }));
    }

    println!("{}", "Context".bold());
    println!("  {}  {}", "Category:".dimmed(), ctx.category.to_string().cyan());
    println!("  {}      {}", "Event:".dimmed(), ctx.event_name);
    if ctx.has_tool() {
        let tool = if ctx.original_tool.is_empty() {
            ctx.tool_name.clone()
        } else {
            format!("{} (via {})", ctx.tool_name, ctx.original_tool)
        };
        println!("  {}       {}", "Tool:".dimmed(), tool);
    }
    if !ctx.subcommand.is_empty() {
        println!("  {} {}", "Subcommand:".dimmed(), ctx.subcommand);
    }
    println!("  {}       {}", "Hint:".dimmed(), ctx.sound_hint);
    println!("  {}  {}", "Operation:".dimmed(), ctx.operation);
    if !ctx.file_type.is_empty() {
        println!("  {}  {}", "File type:".dimmed(), ctx.file_type);
    }
    if ctx.is_success || ctx.has_error {
        let outcome = if ctx.has_error {
            "error".red().to_string()
        } else {
            "success".green().to_string()
        };
        println!("  {}    {}", "Outcome:".dimmed(), outcome);
    }

    println!();
    println!("{} ({})", "Fallback chain".bold(), chain.chain_type());
    match (&resolver, &result) {
        (Ok(resolver), Some(result)) => {
            println!("  {}  {}", "Soundpack:".dimmed(), resolver.describe());
            for (i, path) in result.all_paths.iter().enumerate() {
                let level = i + 1;
                let mark = if result.per_candidate_exists[i] {
                    "✓".green().to_string()
                } else {
                    "✗".red().to_string()
                };
                let line = format!("{mark} {level:>2} {path}");
                if level == result.fallback_level && result.found() {
                    println!("  {}  {}", line.bold(), "← plays".green());
                } else {
                    println!("  {line}");
                }
            }
            if !result.found() {
                println!("  {}", "No sound in this soundpack; nothing would play.".yellow());
            }
        }
        _ => {
            if let Err(e) = &resolver {
                println!("  {} {}", "Soundpack unavailable:".yellow(), e);
            }
            for (i, path) in chain.iter().enumerate() {
                println!("  {:>2} {path}", i + 1);
            }
        }
    }
    Ok(())
}

fn cmd_status(config: &ClaudioConfig, cwd: &Path) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    println!("{}", format!("Claudio Status v{version}").bold());

    let enabled = if config.enabled {
        "enabled".green().to_string()
    } else {
        "disabled".red().to_string()
    };
    println!("  {}      {}", "Hooks:".dimmed(), enabled);
    println!("  {}     {:.2}", "Volume:".dimmed(), config.volume);

    println!();
    println!("{}", "Config files".bold());
    let mut layers: Vec<std::path::PathBuf> = Vec::new();
    if let Some(global) = global_config_path() {
        layers.push(global);
    }
    layers.push(cwd.join(".claudio").join("config.toml"));
    layers.push(cwd.join(".claudio").join("config.local.toml"));
    for layer in &layers {
        let state = if layer.is_file() {
            "found".green().to_string()
        } else {
            "absent".dimmed().to_string()
        };
        println!("  {} {}", state, layer.display());
    }

    println!();
    println!("{}", "Soundpack".bold());
    match locate_soundpack(&config.default_soundpack, &config.soundpack_search_dirs()) {
        Ok(resolver) => println!(
            "  {} → {}",
            config.default_soundpack.cyan(),
            resolver.describe()
        ),
        Err(e) => println!("  {} {}", config.default_soundpack.yellow(), e.to_string().red()),
    }
    for dir in config.soundpack_search_dirs() {
        println!("  {} {}", "search:".dimmed(), dir.display());
    }

    println!();
    println!("{}", "Database".bold());
    if !config.tracking.enabled {
        println!("  {}", "tracking disabled".yellow());
    }
    match config.db_path() {
        Some(path) if path.exists() => match SoundDb::open(&path) {
            Ok(db) => println!(
                "  {} (schema v{}, {} events)",
                path.display(),
                db.schema_version()?,
                db.event_count()?.to_string().cyan()
            ),
            Err(e) => println!("  {} {}", path.display(), e.to_string().red()),
        },
        Some(path) => println!("  {} {}", path.display(), "(not created yet)".dimmed()),
        None => bail!("no cache directory found; set tracking.db_path"),
    }
    Ok(())
}
