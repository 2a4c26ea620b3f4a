//! Per-invocation lookup recorder.
//!
//! Lookups arrive one at a time from the selection engine. They are buffered
//! per event group and written as one `hook_events` row plus its
//! `path_lookups` in a single transaction. Persistence never fails the hook:
//! the first error disables the tracker for the rest of the invocation.

use std::path::PathBuf;

use serde::Serialize;

use super::sqlite::{NewEvent, PathLookup, SoundDb};
use crate::chain::ChainType;
use crate::error::{ClaudioError, Result};
use crate::model::{EventCategory, EventContext};

/// Where the tracker's database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl DbLocation {
    fn open(&self) -> Result<SoundDb> {
        match self {
            Self::File(path) => SoundDb::open(path),
            Self::Memory => SoundDb::open_in_memory(),
        }
    }
}

/// Shape of the persisted `context` column.
#[derive(Serialize)]
struct StoredContext<'a> {
    #[serde(flatten)]
    context: &'a EventContext,
    chain_type: ChainType,
    soundpack: &'a str,
}

struct PendingEvent {
    key: (EventCategory, String, String),
    context: EventContext,
    chain_type: ChainType,
    timestamp: i64,
    lookups: Vec<PathLookup>,
}

impl PendingEvent {
    fn accepts(&self, ctx: &EventContext, sequence: i64) -> bool {
        let (category, tool, operation) = ctx.group_key();
        let same_key =
            self.key.0 == category && self.key.1 == tool && self.key.2 == operation;
        let increasing = self.lookups.last().map_or(true, |l| sequence > l.sequence);
        same_key && increasing
    }

    fn into_new_event(self, session_id: &str, soundpack: &str) -> Result<NewEvent> {
        let winner = self
            .lookups
            .iter()
            .find(|l| l.found)
            .or_else(|| self.lookups.last());
        let (selected_path, fallback_level) = winner
            .map(|l| (l.path.clone(), l.sequence))
            .unwrap_or_default();

        let context = serde_json::to_value(StoredContext {
            context: &self.context,
            chain_type: self.chain_type,
            soundpack,
        })?;

        Ok(NewEvent {
            timestamp: self.timestamp,
            session_id: session_id.to_string(),
            tool_name: Some(self.context.tool_name.clone()).filter(|t| !t.is_empty()),
            selected_path,
            fallback_level,
            context,
            lookups: self.lookups,
        })
    }
}

pub struct Tracker {
    location: DbLocation,
    db: Option<SoundDb>,
    session_id: String,
    soundpack: String,
    disabled: bool,
    pending: Option<PendingEvent>,
    written: Vec<i64>,
}

impl Tracker {
    /// Tracker that opens its database on the first flush.
    pub fn new(
        location: DbLocation,
        session_id: impl Into<String>,
        soundpack: impl Into<String>,
    ) -> Self {
        Self {
            location,
            db: None,
            session_id: session_id.into(),
            soundpack: soundpack.into(),
            disabled: false,
            pending: None,
            written: Vec::new(),
        }
    }

    /// Tracker over an already-open database.
    pub fn with_db(
        db: SoundDb,
        session_id: impl Into<String>,
        soundpack: impl Into<String>,
    ) -> Self {
        let location = DbLocation::File(db.path().to_path_buf());
        let mut tracker = Self::new(location, session_id, soundpack);
        tracker.db = Some(db);
        tracker
    }

    /// Tracker that records nothing.
    pub fn off() -> Self {
        let mut tracker = Self::new(DbLocation::Memory, "", "");
        tracker.disabled = true;
        tracker
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn db(&self) -> Option<&SoundDb> {
        self.db.as_ref()
    }

    /// Ids of the `hook_events` rows written so far.
    pub fn written_events(&self) -> &[i64] {
        &self.written
    }

    /// Record one lookup. `sequence` is the 1-based chain position.
    pub fn record_check(
        &mut self,
        ctx: &EventContext,
        chain_type: ChainType,
        path: &str,
        found: bool,
        sequence: usize,
    ) {
        if self.disabled {
            return;
        }
        let sequence = sequence as i64;

        if self
            .pending
            .as_ref()
            .is_some_and(|p| !p.accepts(ctx, sequence))
        {
            self.flush();
            if self.disabled {
                return;
            }
        }

        let pending = self.pending.get_or_insert_with(|| {
            let (category, tool, operation) = ctx.group_key();
            PendingEvent {
                key: (category, tool.to_string(), operation.to_string()),
                context: ctx.clone(),
                chain_type,
                timestamp: chrono::Utc::now().timestamp(),
                lookups: Vec::new(),
            }
        });
        pending.lookups.push(PathLookup {
            path: path.to_string(),
            sequence,
            found,
        });
    }

    /// Write the buffered event, if any.
    pub fn flush(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if self.disabled || pending.lookups.is_empty() {
            return;
        }
        if let Err(e) = self.write(pending) {
            tracing::warn!(
                "{}, tracking disabled for this invocation: {e}",
                failure_reason(&e)
            );
            self.disabled = true;
        }
    }

    fn write(&mut self, pending: PendingEvent) -> Result<()> {
        let event = pending.into_new_event(&self.session_id, &self.soundpack)?;
        if self.db.is_none() {
            self.db = Some(self.location.open()?);
        }
        let Some(db) = self.db.as_mut() else {
            return Ok(());
        };
        let id = db.insert_event(&event)?;
        tracing::debug!(
            event_id = id,
            selected = %event.selected_path,
            level = event.fallback_level,
            "recorded sound lookup"
        );
        self.written.push(id);
        Ok(())
    }
}

/// Lock contention that outlasted the busy timeout is reported apart from
/// other write failures.
fn failure_reason(e: &ClaudioError) -> &'static str {
    if e.is_busy() {
        "sound database busy"
    } else {
        "failed to record sound lookup"
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.flush();
    }
}
