mod player;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use claudio_core::classify::classify;
use claudio_core::config::ClaudioConfig;
use claudio_core::model::HookEvent;
use claudio_core::resolver::{locate_soundpack, MissingSoundpack, SoundResolver};
use claudio_core::select::select;
use claudio_core::storage::{DbLocation, Tracker};
use claudio_core::ClaudioError;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::player::{CommandPlayer, Player};

/// Input could not be parsed or validated.
const EXIT_INPUT: u8 = 1;
/// An engine post-condition failed.
const EXIT_INTERNAL: u8 = 2;

/// Entry point for the claudio-hooks binary.
///
/// Reads one Claude Code hook event from stdin, picks the most specific
/// sound the configured soundpack has for it, records the lookup, and starts
/// playback. Only malformed input (1) and internal invariant failures (2)
/// produce a non-zero exit; a missing sound, soundpack, player or database is
/// logged and otherwise ignored.
fn main() -> ExitCode {
    let mut input = Vec::new();
    let read = std::io::stdin().read_to_end(&mut input);
    let parsed = HookEvent::parse(&input);

    let project_dir = parsed
        .as_ref()
        .ok()
        .map(|event| PathBuf::from(&event.cwd))
        .or_else(|| std::env::current_dir().ok());

    // Config warnings are emitted before the real subscriber exists.
    let bootstrap = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::WARN)
        .compact()
        .finish();
    let config = tracing::subscriber::with_default(bootstrap, || {
        ClaudioConfig::load(project_dir.as_deref()).unwrap_or_else(|e| {
            tracing::warn!("failed to load config, using defaults: {e}");
            ClaudioConfig::default_config()
        })
    });

    init_logging(&config.logging.level);

    if let Err(e) = read {
        tracing::error!("failed to read hook event from stdin: {e}");
        return ExitCode::from(EXIT_INPUT);
    }
    let event = match parsed {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("invalid hook event: {e}");
            return ExitCode::from(EXIT_INPUT);
        }
    };

    match run(&event, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<ClaudioError>() {
            Some(err) if err.is_fatal() => {
                tracing::error!("claudio-hooks: {e:#}");
                ExitCode::from(EXIT_INTERNAL)
            }
            _ => {
                tracing::warn!("claudio-hooks: {e:#}");
                ExitCode::SUCCESS
            }
        },
    }
}

/// stderr only: stdout belongs to the assistant. `CLAUDIO_LOG` wins over the
/// configured level.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env("CLAUDIO_LOG").unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .compact()
        .init();
}

fn run(event: &HookEvent, config: &ClaudioConfig) -> anyhow::Result<()> {
    if !config.enabled {
        tracing::debug!("claudio disabled, skipping");
        return Ok(());
    }

    let ctx = classify(event);

    let resolver: Box<dyn SoundResolver> =
        match locate_soundpack(&config.default_soundpack, &config.soundpack_search_dirs()) {
            Ok(resolver) => resolver,
            Err(e) => {
                tracing::warn!("no soundpack available, recording lookups only: {e}");
                Box::new(MissingSoundpack::new(&config.default_soundpack))
            }
        };
    tracing::debug!("using soundpack {}", resolver.describe());

    let mut tracker = open_tracker(config, event);
    let result = select(Some(&ctx), resolver.as_ref(), Some(&mut tracker))?;
    drop(tracker);

    let Some(path) = result.physical_path.as_deref() else {
        tracing::debug!(
            "no sound for {} after {} candidates",
            ctx.event_name,
            result.all_paths.len()
        );
        return Ok(());
    };
    play(path, config.volume);
    Ok(())
}

fn open_tracker(config: &ClaudioConfig, event: &HookEvent) -> Tracker {
    if !config.tracking.enabled {
        return Tracker::off();
    }
    match config.db_path() {
        Some(path) => Tracker::new(
            DbLocation::File(path),
            &event.session_id,
            &config.default_soundpack,
        ),
        None => {
            tracing::warn!("no cache directory for the sound database, tracking disabled");
            Tracker::off()
        }
    }
}

fn play(path: &Path, volume: f32) {
    if volume <= 0.0 {
        tracing::debug!("volume is 0, not playing {}", path.display());
        return;
    }
    let result = CommandPlayer::detect().and_then(|player| {
        tracing::debug!(backend = ?player.backend(), "playing {}", path.display());
        player.play(path, volume)
    });
    if let Err(e) = result {
        tracing::warn!("could not play {}: {e}", path.display());
    }
}
