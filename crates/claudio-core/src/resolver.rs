//! Logical → physical sound path resolution.
//!
//! The engine only sees [`SoundResolver`]. Two soundpack layouts are
//! supported: a directory tree mirroring the logical paths, and a JSON file
//! mapping logical paths to arbitrary files.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("sound not found: {0}")]
    NotFound(String),

    #[error("failed to inspect {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid logical path: {0}")]
    InvalidPath(String),
}

impl ResolveError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Maps logical sound paths to files the player can open.
///
/// Implementations are expected to be pure with respect to the soundpack
/// contents for the duration of one hook invocation.
pub trait SoundResolver {
    fn resolve(&self, logical: &str) -> Result<PathBuf, ResolveError>;

    /// First candidate that resolves, or `NotFound` naming all of them.
    fn resolve_with_fallback(&self, logical: &[String]) -> Result<PathBuf, ResolveError> {
        for path in logical {
            match self.resolve(path) {
                Ok(found) => return Ok(found),
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    tracing::warn!("resolver error for {path}: {e}");
                    continue;
                }
            }
        }
        Err(ResolveError::NotFound(logical.join(", ")))
    }

    /// Short human-readable description, used by `claudio status`.
    fn describe(&self) -> String;
}

/// Soundpack stored as a directory: `<root>/<category>/<name>.wav`.
#[derive(Debug, Clone)]
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SoundResolver for DirectoryResolver {
    fn resolve(&self, logical: &str) -> Result<PathBuf, ResolveError> {
        let relative = checked_relative(logical)?;
        let candidate = self.root.join(relative);
        match std::fs::metadata(&candidate) {
            Ok(meta) if meta.is_file() => Ok(candidate),
            Ok(_) => Err(ResolveError::NotFound(logical.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResolveError::NotFound(logical.to_string()))
            }
            Err(e) => Err(ResolveError::Io {
                path: candidate,
                source: e,
            }),
        }
    }

    fn describe(&self) -> String {
        format!("directory {}", self.root.display())
    }
}

/// JSON soundpack file format.
#[derive(Debug, Clone, Deserialize)]
pub struct MappingSoundpack {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub mappings: HashMap<String, String>,
}

/// Soundpack stored as a JSON mapping of logical path → audio file.
#[derive(Debug, Clone)]
pub struct MappingResolver {
    pack: MappingSoundpack,
    base_dir: PathBuf,
}

impl MappingResolver {
    /// Load a JSON soundpack. Relative targets resolve against the file's
    /// directory.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::error::ClaudioError::Config(format!(
                "failed to read soundpack {}: {e}",
                path.display()
            ))
        })?;
        let pack: MappingSoundpack = serde_json::from_str(&contents)?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::from_pack(pack, base_dir))
    }

    pub fn from_pack(pack: MappingSoundpack, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            pack,
            base_dir: base_dir.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.pack.name
    }
}

impl SoundResolver for MappingResolver {
    fn resolve(&self, logical: &str) -> Result<PathBuf, ResolveError> {
        let target = self
            .pack
            .mappings
            .get(logical)
            .ok_or_else(|| ResolveError::NotFound(logical.to_string()))?;
        let target = Path::new(target);
        let physical = if target.is_absolute() {
            target.to_path_buf()
        } else {
            self.base_dir.join(target)
        };
        match std::fs::metadata(&physical) {
            Ok(meta) if meta.is_file() => Ok(physical),
            Ok(_) => Err(ResolveError::NotFound(logical.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ResolveError::NotFound(logical.to_string()))
            }
            Err(e) => Err(ResolveError::Io {
                path: physical,
                source: e,
            }),
        }
    }

    fn describe(&self) -> String {
        format!(
            "json soundpack '{}' ({} mappings)",
            self.pack.name,
            self.pack.mappings.len()
        )
    }
}

/// Stands in for a soundpack that could not be located. Every path is
/// `NotFound`, so selection and tracking still run and nothing plays.
#[derive(Debug, Clone)]
pub struct MissingSoundpack {
    name: String,
}

impl MissingSoundpack {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SoundResolver for MissingSoundpack {
    fn resolve(&self, logical: &str) -> Result<PathBuf, ResolveError> {
        Err(ResolveError::NotFound(logical.to_string()))
    }

    fn describe(&self) -> String {
        format!("missing soundpack '{}'", self.name)
    }
}

/// Reject absolute paths and `..` so a logical path cannot escape the pack.
fn checked_relative(logical: &str) -> Result<&Path, ResolveError> {
    let path = Path::new(logical);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if logical.is_empty() || escapes {
        return Err(ResolveError::InvalidPath(logical.to_string()));
    }
    Ok(path)
}

/// Find a soundpack by name or path and build the matching resolver.
///
/// `name_or_path` may be an existing directory, an existing `.json` file, or
/// a pack name looked up as `<dir>/<name>/` or `<dir>/<name>.json` in each
/// search directory, in order.
pub fn locate_soundpack(
    name_or_path: &str,
    search_dirs: &[PathBuf],
) -> crate::error::Result<Box<dyn SoundResolver>> {
    let direct = Path::new(name_or_path);
    if let Some(resolver) = resolver_for(direct)? {
        return Ok(resolver);
    }

    for dir in search_dirs {
        for candidate in [
            dir.join(name_or_path),
            dir.join(format!("{name_or_path}.json")),
        ] {
            if let Some(resolver) = resolver_for(&candidate)? {
                tracing::debug!("soundpack '{name_or_path}' found at {}", candidate.display());
                return Ok(resolver);
            }
        }
    }

    Err(crate::error::ClaudioError::NotFound(format!(
        "soundpack '{name_or_path}' (searched {} directories)",
        search_dirs.len()
    )))
}

fn resolver_for(path: &Path) -> crate::error::Result<Option<Box<dyn SoundResolver>>> {
    if path.is_dir() {
        return Ok(Some(Box::new(DirectoryResolver::new(path))));
    }
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json && path.is_file() {
        return Ok(Some(Box::new(MappingResolver::load(path)?)));
    }
    Ok(None)
}
