use std::sync::Arc;

use tracing::info;

use super::model::{ChannelId, Entry};
use super::registry::{CommunityRegistry, SubmissionError};

/// # Submission Gate
///
/// What the command layer calls. Captures author and text exactly once per
/// call and hands the registry's failures back unchanged so they can be shown
/// to the user. Nothing is retried: a failed submission must be re-invoked.
#[derive(Clone)]
pub struct SubmissionGate {
    registry: Arc<CommunityRegistry>,
}

impl SubmissionGate {
    pub fn new(registry: Arc<CommunityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<CommunityRegistry> {
        &self.registry
    }

    /// Records a joke for the next cycle and returns its zero-based index.
    pub fn submit(
        &self,
        community_id: &str,
        author_id: &str,
        author_display_name: &str,
        text: &str,
    ) -> Result<usize, SubmissionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmissionError::EmptyEntry);
        }
        let index = self
            .registry
            .record_entry(community_id, Entry::new(author_id, author_display_name, text))?;
        info!(community = %community_id, author = %author_id, index, "Joke submitted");
        Ok(index)
    }

    /// Points the community's polls at `destination`. The caller has already
    /// checked that it is a text channel.
    pub fn set_destination(&self, community_id: &str, destination: ChannelId) {
        info!(community = %community_id, channel = %destination, "Polls will now be posted in channel");
        self.registry.set_destination(community_id, destination);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::symbols::SymbolPool;

    fn gate(symbols: &str) -> SubmissionGate {
        SubmissionGate::new(Arc::new(CommunityRegistry::new(SymbolPool::parse(symbols).unwrap())))
    }

    #[test]
    fn test_submit_requires_destination() {
        let gate = gate("😆,😍,😎");
        assert_eq!(
            gate.submit("g1", "u1", "alice", "why did the chicken"),
            Err(SubmissionError::NoDestinationConfigured("g1".to_string()))
        );
        assert!(gate.registry().get("g1").is_none());
    }

    #[test]
    fn test_submit_captures_author_and_trimmed_text() {
        let gate = gate("😆,😍,😎");
        gate.set_destination("g1", "c1".to_string());
        assert_eq!(gate.submit("g1", "u1", "alice", "  pun intended \n"), Ok(0));
        assert_eq!(gate.submit("g1", "u2", "bob", "another"), Ok(1));

        let entries = gate.registry().get("g1").unwrap().entries;
        assert_eq!(entries[0], Entry::new("u1", "alice", "pun intended"));
        assert_eq!(entries[1].author_display_name(), "bob");
    }

    #[test]
    fn test_submit_rejects_blank_text() {
        let gate = gate("😆,😍,😎");
        gate.set_destination("g1", "c1".to_string());
        assert_eq!(gate.submit("g1", "u1", "alice", "   "), Err(SubmissionError::EmptyEntry));
        assert!(gate.registry().get("g1").unwrap().entries.is_empty());
    }

    #[test]
    fn test_submission_past_pool_size_fails() {
        let gate = gate("😆,😍");
        gate.set_destination("g1", "c1".to_string());
        gate.submit("g1", "u1", "a", "one").unwrap();
        gate.submit("g1", "u2", "b", "two").unwrap();
        assert!(matches!(
            gate.submit("g1", "u3", "c", "three"),
            Err(SubmissionError::CapacityExceeded { capacity: 2, .. })
        ));
        assert_eq!(gate.registry().get("g1").unwrap().entries.len(), 2);
    }
}
