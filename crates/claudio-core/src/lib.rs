//! Hook event classification and soundpack fallback selection.
//!
//! A hook event flows through [`model::HookEvent::parse`], [`classify::classify`],
//! [`chain::generate`] and [`select::select`], which checks each candidate
//! through a [`resolver::SoundResolver`] and records the lookups with a
//! [`storage::Tracker`].

pub mod chain;
pub mod classify;
pub mod command;
pub mod config;
pub mod error;
pub mod model;
pub mod resolver;
pub mod select;
pub mod storage;

pub use error::{ClaudioError, ParseError, Result};
