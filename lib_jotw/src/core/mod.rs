//! # Core Engine Module
//!
//! The contest engine proper. Everything here is independent of any concrete
//! chat platform: the outside world is reached through the [`Transport`],
//! [`IdentityResolver`] and [`Persistence`] traits.
//!
//! ## Core Components:
//!
//! - **`symbols`**: the fixed, ordered emoji pool. Its size caps the number of
//!   jokes a community may collect per cycle.
//! - **`registry`**: per-community destination and pending jokes, safe for
//!   concurrent submissions and drains.
//! - **`submission`**: the thin gate the command layer talks to.
//! - **`tally`**: one-vote-per-voter deduplication and stable ranking.
//! - **`poll_cycle`**: the `Idle -> Seeding -> Collecting -> Tallying -> Announced`
//!   state machine, run concurrently per community.
//! - **`scheduler`**: the weekly cron trigger for a full cycle.

/// Communities, jokes and identifiers.
pub mod model;
/// The ordered pool of reaction symbols.
pub mod symbols;
/// Concurrency-safe store of communities and their pending jokes.
pub mod registry;
/// Validation wrapper used by the command layer.
pub mod submission;
/// Reaction deduplication and ranking.
pub mod tally;
/// Chat platform seam.
pub mod transport;
/// Storage seam.
pub mod persistence;
/// Plain-text rendering of polls, confirmations and results.
pub mod render;
/// Per-community round state machine.
pub mod poll_cycle;
/// Weekly cron trigger.
pub mod scheduler;

// --- Public API Re-exports ---
pub use model::{ChannelId, Community, CommunityId, Entry, EntryAuthor, UserId};
pub use symbols::{DEFAULT_SYMBOLS, SymbolPool};
pub use registry::{CommunityRegistry, SubmissionError};
pub use submission::SubmissionGate;
pub use tally::{RankedSymbol, ReactionEvent, VoteTally, tally};
pub use transport::{IdentityResolver, MessageHandle, Transport, TransportError};
pub use persistence::{Persistence, PersistenceError};
pub use poll_cycle::{CyclePhase, CycleReport, PollCycleController, PollRound, RoundOutcome};
pub use scheduler::{PollScheduler, SchedulerError};
