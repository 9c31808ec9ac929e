//! # Vote Tallying Engine
//!
//! Turns the reactions collected during a round into a ranking.
//!
//! ## Rules:
//!
//! 1.  Reactions by the bot's own account (placed while seeding the poll) are
//!     discarded.
//! 2.  Reactions are grouped by symbol. Symbols are scanned in their seeded
//!     order (assignment order when known, otherwise first occurrence), and
//!     each symbol's voters in arrival order. The first time a voter is seen,
//!     for any symbol, that symbol gets the vote and the voter is consumed.
//!     Every later reaction by that voter is ignored. One effective vote per
//!     person per round.
//! 3.  Symbols that end with zero votes are left out of the ranking.
//! 4.  The ranking is sorted by votes, descending, with a stable sort so ties
//!     keep the scan order.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::model::UserId;

/// One reaction as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionEvent {
    pub symbol: String,
    pub voter_id: UserId,
}

impl ReactionEvent {
    pub fn new(symbol: impl Into<String>, voter_id: impl Into<UserId>) -> Self {
        Self {
            symbol: symbol.into(),
            voter_id: voter_id.into(),
        }
    }
}

/// One line of the final ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedSymbol {
    pub symbol: String,
    pub votes: u32,
}

/// Incremental tally for a single round. Fed with [`VoteTally::record`] while
/// reactions arrive, then consumed once by [`VoteTally::finalize`].
#[derive(Debug)]
pub struct VoteTally {
    own_account_id: UserId,
    order: Vec<String>,
    voters: HashMap<String, Vec<UserId>>,
}

impl VoteTally {
    pub fn new(own_account_id: impl Into<UserId>) -> Self {
        Self {
            own_account_id: own_account_id.into(),
            order: Vec::new(),
            voters: HashMap::new(),
        }
    }

    /// Fixes the scan order up front, normally to the round's assignment
    /// order. Symbols first seen later are appended after these.
    pub fn with_symbol_order<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for symbol in symbols {
            self.ensure_symbol(symbol.into());
        }
        self
    }

    pub fn record(&mut self, event: ReactionEvent) {
        if event.voter_id == self.own_account_id {
            return;
        }
        self.ensure_symbol(event.symbol.clone());
        if let Some(voters) = self.voters.get_mut(&event.symbol) {
            voters.push(event.voter_id);
        }
    }

    pub fn finalize(self) -> Vec<RankedSymbol> {
        let mut counted: HashSet<&str> = HashSet::new();
        let mut ranking = Vec::new();

        for symbol in &self.order {
            let mut votes = 0u32;
            for voter in self.voters.get(symbol).into_iter().flatten() {
                if counted.insert(voter.as_str()) {
                    votes += 1;
                }
            }
            if votes > 0 {
                ranking.push(RankedSymbol {
                    symbol: symbol.clone(),
                    votes,
                });
            }
        }

        // `sort_by` is stable: ties keep scan order.
        ranking.sort_by(|a, b| b.votes.cmp(&a.votes));
        ranking
    }

    fn ensure_symbol(&mut self, symbol: String) {
        if !self.voters.contains_key(&symbol) {
            self.order.push(symbol.clone());
            self.voters.insert(symbol, Vec::new());
        }
    }
}

/// One-shot tally in first-occurrence symbol order.
pub fn tally<I>(events: I, own_account_id: &str) -> Vec<RankedSymbol>
where
    I: IntoIterator<Item = ReactionEvent>,
{
    let mut tally = VoteTally::new(own_account_id);
    for event in events {
        tally.record(event);
    }
    tally.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(symbol: &str, voter: &str) -> ReactionEvent {
        ReactionEvent::new(symbol, voter)
    }

    fn ranked(symbol: &str, votes: u32) -> RankedSymbol {
        RankedSymbol {
            symbol: symbol.to_string(),
            votes,
        }
    }

    #[test]
    fn test_empty_events_give_empty_ranking() {
        assert!(tally(Vec::new(), "bot").is_empty());
    }

    #[test]
    fn test_voter_counts_once_across_symbols() {
        let result = tally(vec![ev("😆", "u1"), ev("😍", "u1"), ev("😆", "u2")], "bot");
        assert_eq!(result, vec![ranked("😆", 2)]);
    }

    #[test]
    fn test_own_account_reactions_never_count() {
        let result = tally(
            vec![ev("😆", "bot"), ev("😍", "bot"), ev("😍", "u1")],
            "bot",
        );
        assert_eq!(result, vec![ranked("😍", 1)]);
    }

    #[test]
    fn test_only_bot_reactions_give_empty_ranking() {
        assert!(tally(vec![ev("😆", "bot"), ev("😍", "bot")], "bot").is_empty());
    }

    #[test]
    fn test_grouping_scans_whole_symbol_before_the_next() {
        // u1 reacted to B before A in time, but A is scanned first.
        let result = tally(vec![ev("A", "u2"), ev("B", "u1"), ev("A", "u1")], "bot");
        assert_eq!(result, vec![ranked("A", 2)]);
    }

    #[test]
    fn test_duplicate_reaction_on_same_symbol_counts_once() {
        let result = tally(vec![ev("A", "u1"), ev("A", "u1")], "bot");
        assert_eq!(result, vec![ranked("A", 1)]);
    }

    #[test]
    fn test_ties_keep_assignment_order() {
        let mut tally = VoteTally::new("bot").with_symbol_order(["A", "B", "C"]);
        // C arrives first but was assigned last.
        for event in [ev("C", "u1"), ev("B", "u2"), ev("A", "u3"), ev("B", "u4")] {
            tally.record(event);
        }
        assert_eq!(
            tally.finalize(),
            vec![ranked("B", 2), ranked("A", 1), ranked("C", 1)]
        );
    }

    #[test]
    fn test_ranking_sorted_by_votes_descending() {
        let result = tally(
            vec![
                ev("A", "u1"),
                ev("B", "u2"),
                ev("B", "u3"),
                ev("C", "u4"),
                ev("C", "u5"),
                ev("C", "u6"),
            ],
            "bot",
        );
        assert_eq!(result, vec![ranked("C", 3), ranked("B", 2), ranked("A", 1)]);
    }
}
