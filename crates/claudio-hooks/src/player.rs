//! Hands a resolved sound file to a system audio player.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no audio player found (tried {0})")]
    NoPlayer(String),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

pub trait Player {
    /// Start playback of `path` at `volume` in `[0.0, 1.0]`. Must not block
    /// until playback finishes.
    fn play(&self, path: &Path, volume: f32) -> Result<(), PlayerError>;
}

/// Command-line players in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Afplay,
    PwPlay,
    Paplay,
    Aplay,
}

impl Backend {
    pub const ALL: [Backend; 4] = [Self::Afplay, Self::PwPlay, Self::Paplay, Self::Aplay];

    pub fn program(&self) -> &'static str {
        match self {
            Self::Afplay => "afplay",
            Self::PwPlay => "pw-play",
            Self::Paplay => "paplay",
            Self::Aplay => "aplay",
        }
    }

    /// Arguments for playing `path`. `aplay` has no volume control.
    pub fn args(&self, path: &Path, volume: f32) -> Vec<OsString> {
        let volume = volume.clamp(0.0, 1.0);
        let mut args: Vec<OsString> = match self {
            Self::Afplay => vec!["-v".into(), format!("{volume:.2}").into()],
            Self::PwPlay => vec![format!("--volume={volume:.2}").into()],
            // paplay volume is linear, 65536 = 100%
            Self::Paplay => vec![format!("--volume={}", (volume * 65536.0).round() as u32).into()],
            Self::Aplay => vec!["-q".into()],
        };
        args.push(path.as_os_str().to_owned());
        args
    }
}

/// Plays sounds by spawning a detached system player.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    backend: Backend,
    program: PathBuf,
}

impl CommandPlayer {
    /// First backend found on `PATH`.
    pub fn detect() -> Result<Self, PlayerError> {
        Backend::ALL
            .into_iter()
            .find_map(|backend| {
                which::which(backend.program())
                    .ok()
                    .map(|program| Self { backend, program })
            })
            .ok_or_else(|| {
                let tried: Vec<&str> = Backend::ALL.iter().map(Backend::program).collect();
                PlayerError::NoPlayer(tried.join(", "))
            })
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }
}

impl Player for CommandPlayer {
    fn play(&self, path: &Path, volume: f32) -> Result<(), PlayerError> {
        let child = Command::new(&self.program)
            .args(self.backend.args(path, volume))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| PlayerError::Spawn {
                program: self.backend.program().to_string(),
                source,
            })?;
        tracing::debug!(
            pid = child.id(),
            player = self.backend.program(),
            path = %path.display(),
            "playback started"
        );
        Ok(())
    }
}
