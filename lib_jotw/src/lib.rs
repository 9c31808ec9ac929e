//! # lib_jotw
//!
//! The poll lifecycle and vote-tallying engine behind the weekly joke contest.
//! Members submit jokes per community, a scheduled cycle turns the pending
//! jokes into a reaction poll, and the collected reactions are tallied into a
//! ranked announcement.
//!
//! Modules are gated per folder, the same way across the workspace:
//!
//! - **`core`**: symbol pool, community registry, submission gate, tallying,
//!   poll cycle controller and the weekly scheduler.
//! - **`connections`**: concrete collaborators (JSON file store, loopback transport).
//! - **`configs`**: validated poll settings.

#![forbid(unsafe_code)]

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "connections")]
pub mod connections;

#[cfg(feature = "configs")]
pub mod configs;

// --- Public API Re-exports ---
#[cfg(feature = "core")]
pub use crate::core::{
    Community, CommunityRegistry, CycleReport, Entry, PollCycleController, PollScheduler,
    RankedSymbol, ReactionEvent, RoundOutcome, SubmissionError, SubmissionGate, SymbolPool,
};
