//! Selection engine: walk a fallback chain against a resolver.

use std::path::PathBuf;

use serde::Serialize;

use crate::chain::{self, ChainType, FallbackChain};
use crate::error::{ClaudioError, Result};
use crate::model::EventContext;
use crate::resolver::SoundResolver;
use crate::storage::Tracker;

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupResult {
    /// First candidate that resolved, or the final candidate when none did.
    pub selected_path: String,
    /// Physical file for `selected_path`, when it resolved.
    pub physical_path: Option<PathBuf>,
    /// 1-based position of `selected_path` in `all_paths`.
    pub fallback_level: usize,
    pub all_paths: Vec<String>,
    pub per_candidate_exists: Vec<bool>,
    pub chain_type: ChainType,
}

impl LookupResult {
    pub fn found(&self) -> bool {
        self.physical_path.is_some()
    }
}

/// Generate the chain for `ctx` and select from it.
pub fn select(
    ctx: Option<&EventContext>,
    resolver: &dyn SoundResolver,
    tracker: Option<&mut Tracker>,
) -> Result<LookupResult> {
    let chain = chain::generate(ctx);
    let empty = EventContext::default();
    select_from_chain(&chain, ctx.unwrap_or(&empty), resolver, tracker)
}

/// Check every candidate in order. The first hit wins, but later candidates
/// are still checked and recorded.
pub fn select_from_chain(
    chain: &FallbackChain,
    ctx: &EventContext,
    resolver: &dyn SoundResolver,
    mut tracker: Option<&mut Tracker>,
) -> Result<LookupResult> {
    if chain.is_empty() {
        return Err(ClaudioError::Invariant("fallback chain is empty".into()));
    }

    let mut winner: Option<(usize, PathBuf)> = None;
    let mut per_candidate_exists = Vec::with_capacity(chain.len());

    for (index, logical) in chain.iter().enumerate() {
        let sequence = index + 1;
        let physical = match resolver.resolve(logical) {
            Ok(path) => Some(path),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                tracing::warn!("resolver failed for {logical}: {e}");
                None
            }
        };
        let found = physical.is_some();
        per_candidate_exists.push(found);

        if let Some(tracker) = tracker.as_deref_mut() {
            tracker.record_check(ctx, chain.chain_type(), logical, found, sequence);
        }
        if winner.is_none() {
            winner = physical.map(|p| (sequence, p));
        }
    }

    if let Some(tracker) = tracker {
        tracker.flush();
    }

    let all_paths = chain.paths().to_vec();
    let (fallback_level, physical_path) = match winner {
        Some((level, path)) => (level, Some(path)),
        None => (all_paths.len(), None),
    };
    let selected_path = all_paths[fallback_level - 1].clone();

    tracing::debug!(
        selected = %selected_path,
        level = fallback_level,
        chain_type = %chain.chain_type(),
        found = physical_path.is_some(),
        "sound selected"
    );

    Ok(LookupResult {
        selected_path,
        physical_path,
        fallback_level,
        all_paths,
        per_candidate_exists,
        chain_type: chain.chain_type(),
    })
}
