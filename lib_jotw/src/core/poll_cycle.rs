//! # Poll Cycle Controller
//!
//! Runs one contest round per community:
//!
//! `Idle -> Seeding -> Collecting -> Tallying -> Announced -> Idle`
//!
//! - **Seeding**: drain the pending jokes, pair them with pool symbols, publish
//!   the poll and seed one reaction per symbol. Communities with no jokes are
//!   skipped without publishing anything.
//! - **Collecting**: starts when the poll is published and lasts the
//!   configured window. The task suspends on the transport meanwhile.
//! - **Tallying**: one vote per voter, bot reactions excluded.
//! - **Announced**: the ranking is published to the same channel.
//!
//! Every community runs in its own task, so a slow or broken channel never
//! holds up another community. A community whose previous round is still in
//! flight is skipped for this cycle and keeps its pending jokes. If the
//! process stops mid-round the round is simply lost.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::model::{ChannelId, CommunityId, Entry};
use super::registry::CommunityRegistry;
use super::render;
use super::tally::{RankedSymbol, VoteTally};
use super::transport::{IdentityResolver, MessageHandle, StoredNames, Transport, TransportError};

/// Where a community currently is in its round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CyclePhase {
    /// Waiting for the next scheduled cycle.
    Idle,
    /// Draining jokes and publishing the poll.
    Seeding,
    /// Poll is live, reactions are being gathered.
    Collecting,
    /// Window closed, counting votes.
    Tallying,
    /// Publishing the results.
    Announced,
}

/// # Poll Round
///
/// One live poll. The assignment order is the symbol pool order truncated to
/// the number of drained jokes.
#[derive(Debug, Clone)]
pub struct PollRound {
    community: CommunityId,
    assignment: Vec<(String, Entry)>,
    opened_at: DateTime<Utc>,
    closes_at: DateTime<Utc>,
}

impl PollRound {
    pub fn open(community: CommunityId, assignment: Vec<(String, Entry)>, window: Duration) -> Self {
        let opened_at = Utc::now();
        let closes_at = opened_at + TimeDelta::from_std(window).unwrap_or(TimeDelta::zero());
        Self {
            community,
            assignment,
            opened_at,
            closes_at,
        }
    }

    pub fn community(&self) -> &str {
        &self.community
    }

    pub fn assignment(&self) -> &[(String, Entry)] {
        &self.assignment
    }

    pub fn symbols(&self) -> Vec<String> {
        self.assignment.iter().map(|(symbol, _)| symbol.clone()).collect()
    }

    pub fn entry_for(&self, symbol: &str) -> Option<&Entry> {
        self.assignment
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, entry)| entry)
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn closes_at(&self) -> DateTime<Utc> {
        self.closes_at
    }
}

/// How a community's round ended in a given cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    Announced {
        poll: MessageHandle,
        ranking: Vec<RankedSymbol>,
    },
    /// No pending jokes: nothing published.
    SkippedEmpty,
    /// Previous round still in flight.
    SkippedBusy,
    /// Community record exists but has no channel.
    NoDestination,
    /// Publishing or collecting failed; logged, not retried this cycle.
    Failed(TransportError),
    /// The round task panicked or was cancelled.
    Aborted(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub outcomes: BTreeMap<CommunityId, RoundOutcome>,
}

impl CycleReport {
    pub fn announced(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, RoundOutcome::Announced { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| matches!(o, RoundOutcome::Failed(_) | RoundOutcome::Aborted(_)))
            .count()
    }

    pub fn get(&self, community_id: &str) -> Option<&RoundOutcome> {
        self.outcomes.get(community_id)
    }
}

type PhaseMap = Arc<Mutex<HashMap<CommunityId, CyclePhase>>>;

/// Busy flag for one community. Present in the map means a round is in
/// flight; dropping the guard (normally, on error, or on cancellation) puts
/// the community back to `Idle`.
struct RoundGuard {
    phases: PhaseMap,
    community: CommunityId,
}

impl RoundGuard {
    fn try_acquire(phases: &PhaseMap, community: &str) -> Option<Self> {
        let mut map = phases.lock().unwrap_or_else(PoisonError::into_inner);
        if map.contains_key(community) {
            return None;
        }
        map.insert(community.to_string(), CyclePhase::Seeding);
        Some(Self {
            phases: Arc::clone(phases),
            community: community.to_string(),
        })
    }

    fn set(&self, phase: CyclePhase) {
        let mut map = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
        map.insert(self.community.clone(), phase);
        debug!(community = %self.community, ?phase, "Round phase changed");
    }
}

impl Drop for RoundGuard {
    fn drop(&mut self) {
        let mut map = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
        map.remove(&self.community);
    }
}

pub struct PollCycleController {
    registry: Arc<CommunityRegistry>,
    transport: Arc<dyn Transport>,
    identity: Arc<dyn IdentityResolver>,
    window: Duration,
    phases: PhaseMap,
}

impl PollCycleController {
    /// Polls are tagged with the registry's own symbol pool.
    pub fn new(registry: Arc<CommunityRegistry>, transport: Arc<dyn Transport>, window: Duration) -> Self {
        Self {
            registry,
            transport,
            identity: Arc::new(StoredNames),
            window,
            phases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolves fresh display names when rendering.
    pub fn with_identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    pub fn registry(&self) -> &Arc<CommunityRegistry> {
        &self.registry
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn phase(&self, community_id: &str) -> CyclePhase {
        let map = self.phases.lock().unwrap_or_else(PoisonError::into_inner);
        map.get(community_id).copied().unwrap_or(CyclePhase::Idle)
    }

    /// # Run Cycle
    ///
    /// Starts a round for every known community and waits until all of them
    /// have finished. Per-community failures are logged and reported, never
    /// propagated.
    pub async fn run_cycle(self: &Arc<Self>) -> CycleReport {
        let ids = self.registry.community_ids();
        info!(communities = ids.len(), "Starting poll cycle");

        let mut report = CycleReport::default();
        let mut rounds = JoinSet::new();
        let mut task_communities = HashMap::new();

        for id in ids {
            let Some(guard) = RoundGuard::try_acquire(&self.phases, &id) else {
                warn!(community = %id, "Previous round still in flight, skipping this cycle");
                report.outcomes.insert(id, RoundOutcome::SkippedBusy);
                continue;
            };
            let controller = Arc::clone(self);
            let community = id.clone();
            let handle = rounds.spawn(async move {
                let outcome = controller.run_round(&community, &guard).await;
                drop(guard);
                (community, outcome)
            });
            task_communities.insert(handle.id(), id);
        }

        while let Some(joined) = rounds.join_next_with_id().await {
            match joined {
                Ok((_, (community, outcome))) => {
                    report.outcomes.insert(community, outcome);
                }
                Err(e) => {
                    let community = task_communities.remove(&e.id()).unwrap_or_default();
                    error!(community = %community, error = %e, "Round task did not complete");
                    report.outcomes.insert(community, RoundOutcome::Aborted(e.to_string()));
                }
            }
        }

        info!(
            announced = report.announced(),
            failed = report.failed(),
            "Poll cycle finished"
        );
        report
    }

    async fn run_round(&self, community_id: &str, guard: &RoundGuard) -> RoundOutcome {
        // --- Seeding ---
        let Some(community) = self.registry.get(community_id) else {
            return RoundOutcome::SkippedEmpty;
        };
        let Some(destination) = community.destination else {
            debug!(community = %community_id, "No poll channel configured");
            return RoundOutcome::NoDestination;
        };

        // The drain saves a snapshot when a store is attached.
        let registry = Arc::clone(&self.registry);
        let id = community_id.to_string();
        let entries = match tokio::task::spawn_blocking(move || registry.drain_entries(&id)).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(community = %community_id, error = %e, "Draining pending jokes failed");
                return RoundOutcome::Aborted(e.to_string());
            }
        };
        if entries.is_empty() {
            debug!(community = %community_id, "No jokes submitted, no poll this cycle");
            return RoundOutcome::SkippedEmpty;
        }

        let (assignment, overflow) = self.registry.symbols().assign(entries);
        debug_assert!(overflow.is_empty(), "registry holds at most one joke per symbol");
        let round = PollRound::open(community_id.to_string(), assignment, self.window);
        let poll = match self.publish(&destination, &render::poll(&round, self.identity.as_ref())).await {
            Ok(handle) => handle,
            Err(e) => return RoundOutcome::Failed(e),
        };

        // --- Collecting ---
        guard.set(CyclePhase::Collecting);
        info!(
            community = %community_id,
            jokes = round.assignment().len(),
            closes_at = %round.closes_at(),
            "Poll published"
        );
        let symbols = round.symbols();
        for symbol in &symbols {
            if let Err(e) = self.transport.attach_reaction(&poll, symbol).await {
                warn!(community = %community_id, symbol = %symbol, error = %e, "Failed to seed reaction");
            }
        }

        let events = match self.transport.collect_reactions(&poll, self.window, &symbols).await {
            Ok(events) => events,
            Err(e) => {
                error!(community = %community_id, error = %e, "Reaction collection failed, round abandoned");
                return RoundOutcome::Failed(e);
            }
        };

        // --- Tallying ---
        guard.set(CyclePhase::Tallying);
        let mut tally = VoteTally::new(self.transport.own_account_id()).with_symbol_order(symbols.iter().cloned());
        let mut received = 0usize;
        for event in events.into_iter().filter(|e| round.entry_for(&e.symbol).is_some()) {
            received += 1;
            tally.record(event);
        }
        let ranking = tally.finalize();
        debug!(community = %community_id, reactions = received, ranked = ranking.len(), "Votes tallied");

        // --- Announced ---
        guard.set(CyclePhase::Announced);
        let results = render::results(&round, &ranking, self.identity.as_ref());
        if let Err(e) = self.publish(&destination, &results).await {
            return RoundOutcome::Failed(e);
        }
        info!(
            community = %community_id,
            winner = ranking.first().map(|r| r.symbol.as_str()).unwrap_or("-"),
            votes = ranking.first().map(|r| r.votes).unwrap_or(0),
            "Results announced"
        );

        RoundOutcome::Announced { poll, ranking }
    }

    async fn publish(&self, destination: &ChannelId, content: &str) -> Result<MessageHandle, TransportError> {
        self.transport.publish(destination, content).await.inspect_err(|e| {
            error!(channel = %destination, error = %e, "Publish failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::SubmissionError;
    use crate::core::symbols::SymbolPool;
    use crate::core::tally::ReactionEvent;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport with canned reactions and an optional broken channel.
    #[derive(Default)]
    struct ScriptedTransport {
        next_id: AtomicUsize,
        published: Mutex<Vec<(ChannelId, String)>>,
        seeded: Mutex<Vec<String>>,
        reactions: Mutex<HashMap<ChannelId, Vec<ReactionEvent>>>,
        broken_channel: Option<ChannelId>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        fn own_account_id(&self) -> String {
            "bot".to_string()
        }

        async fn publish(&self, destination: &ChannelId, content: &str) -> Result<MessageHandle, TransportError> {
            if self.broken_channel.as_ref() == Some(destination) {
                return Err(TransportError::PublishFailure {
                    channel: destination.clone(),
                    reason: "unknown channel".to_string(),
                });
            }
            self.published.lock().unwrap().push((destination.clone(), content.to_string()));
            Ok(MessageHandle {
                channel: destination.clone(),
                message_id: self.next_id.fetch_add(1, Ordering::SeqCst).to_string(),
            })
        }

        async fn attach_reaction(&self, _message: &MessageHandle, symbol: &str) -> Result<(), TransportError> {
            self.seeded.lock().unwrap().push(symbol.to_string());
            Ok(())
        }

        async fn collect_reactions(
            &self,
            message: &MessageHandle,
            _window: Duration,
            _allowed_symbols: &[String],
        ) -> Result<Vec<ReactionEvent>, TransportError> {
            let mut events: Vec<ReactionEvent> = self
                .seeded
                .lock()
                .unwrap()
                .iter()
                .map(|s| ReactionEvent::new(s.clone(), "bot"))
                .collect();
            events.extend(
                self.reactions
                    .lock()
                    .unwrap()
                    .get(&message.channel)
                    .cloned()
                    .unwrap_or_default(),
            );
            Ok(events)
        }
    }

    fn setup(transport: Arc<ScriptedTransport>) -> Arc<PollCycleController> {
        let registry = Arc::new(CommunityRegistry::new(SymbolPool::parse("A,B,C").unwrap()));
        Arc::new(PollCycleController::new(registry, transport, Duration::from_secs(600)))
    }

    #[test]
    fn test_round_assignment_lookup() {
        let round = PollRound::open(
            "g1".to_string(),
            vec![("A".to_string(), Entry::new("u1", "a", "x"))],
            Duration::from_secs(600),
        );
        assert_eq!(round.symbols(), vec!["A".to_string()]);
        assert_eq!(round.entry_for("A").unwrap().text, "x");
        assert!(round.entry_for("B").is_none());
        assert_eq!((round.closes_at() - round.opened_at()).num_seconds(), 600);
    }

    #[tokio::test]
    async fn test_cycle_announces_ranked_results() {
        let transport = Arc::new(ScriptedTransport::default());
        transport.reactions.lock().unwrap().insert(
            "c1".to_string(),
            vec![
                ReactionEvent::new("B", "u1"),
                ReactionEvent::new("B", "u3"),
                ReactionEvent::new("A", "u2"),
                // A is scanned first, so u2's vote already went there.
                ReactionEvent::new("B", "u2"),
                ReactionEvent::new("Z", "u4"),
            ],
        );
        let controller = setup(transport.clone());
        let registry = controller.registry().clone();
        registry.set_destination("g1", "c1".to_string());
        registry.record_entry("g1", Entry::new("a1", "ann", "x")).unwrap();
        registry.record_entry("g1", Entry::new("a2", "ben", "y")).unwrap();

        let report = controller.run_cycle().await;

        match report.get("g1") {
            Some(RoundOutcome::Announced { ranking, .. }) => {
                assert_eq!(
                    ranking,
                    &vec![
                        RankedSymbol { symbol: "B".to_string(), votes: 2 },
                        RankedSymbol { symbol: "A".to_string(), votes: 1 },
                    ]
                );
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(registry.get("g1").unwrap().entries.is_empty());
        assert_eq!(*transport.seeded.lock().unwrap(), vec!["A".to_string(), "B".to_string()]);
        let published = transport.published.lock().unwrap();
        assert_eq!(published.len(), 2);
        assert!(published[1].1.contains("2 votes\nB y - ben"));
        assert_eq!(controller.phase("g1"), CyclePhase::Idle);
    }

    #[tokio::test]
    async fn test_every_accepted_joke_gets_a_symbol() {
        let transport = Arc::new(ScriptedTransport::default());
        let registry = Arc::new(CommunityRegistry::new(SymbolPool::parse("A").unwrap()));
        let controller = Arc::new(PollCycleController::new(
            registry.clone(),
            transport.clone(),
            Duration::from_secs(600),
        ));
        registry.set_destination("g1", "c1".to_string());
        registry.record_entry("g1", Entry::new("n", "n", "j0")).unwrap();
        for text in ["j1", "j2"] {
            assert_eq!(
                registry.record_entry("g1", Entry::new("n", "n", text)),
                Err(SubmissionError::CapacityExceeded { community: "g1".to_string(), capacity: 1 })
            );
        }

        let report = controller.run_cycle().await;

        assert!(matches!(report.get("g1"), Some(RoundOutcome::Announced { .. })));
        let published = transport.published.lock().unwrap();
        assert!(published[0].1.contains("A n\nj0"));
        assert!(!published[0].1.contains("j1"));
        assert!(registry.get("g1").unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn test_empty_community_publishes_nothing() {
        let transport = Arc::new(ScriptedTransport::default());
        let controller = setup(transport.clone());
        controller.registry().set_destination("g1", "c1".to_string());

        let report = controller.run_cycle().await;

        assert_eq!(report.get("g1"), Some(&RoundOutcome::SkippedEmpty));
        assert!(transport.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_does_not_block_other_communities() {
        let transport = Arc::new(ScriptedTransport {
            broken_channel: Some("dead".to_string()),
            ..Default::default()
        });
        let controller = setup(transport.clone());
        let registry = controller.registry().clone();
        registry.set_destination("broken", "dead".to_string());
        registry.set_destination("healthy", "c2".to_string());
        registry.record_entry("broken", Entry::new("u1", "a", "lost")).unwrap();
        registry.record_entry("healthy", Entry::new("u2", "b", "kept")).unwrap();

        let report = controller.run_cycle().await;

        assert!(matches!(
            report.get("broken"),
            Some(RoundOutcome::Failed(TransportError::PublishFailure { .. }))
        ));
        assert!(matches!(report.get("healthy"), Some(RoundOutcome::Announced { .. })));
        assert_eq!(report.announced(), 1);
        assert_eq!(report.failed(), 1);
        assert!(registry.get("broken").unwrap().entries.is_empty());
    }

    #[tokio::test]
    async fn test_busy_community_is_skipped_and_keeps_jokes() {
        let transport = Arc::new(ScriptedTransport::default());
        let controller = setup(transport.clone());
        let registry = controller.registry().clone();
        registry.set_destination("g1", "c1".to_string());
        registry.record_entry("g1", Entry::new("u1", "a", "pending")).unwrap();

        let guard = RoundGuard::try_acquire(&controller.phases, "g1").unwrap();
        guard.set(CyclePhase::Collecting);
        assert_eq!(controller.phase("g1"), CyclePhase::Collecting);

        let report = controller.run_cycle().await;
        assert_eq!(report.get("g1"), Some(&RoundOutcome::SkippedBusy));
        assert_eq!(registry.get("g1").unwrap().entries.len(), 1);

        drop(guard);
        assert_eq!(controller.phase("g1"), CyclePhase::Idle);
        let report = controller.run_cycle().await;
        assert!(matches!(report.get("g1"), Some(RoundOutcome::Announced { .. })));
    }
}
