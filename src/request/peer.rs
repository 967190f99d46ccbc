//! Who is driving a request, and the membership data reconfig requests carry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Handle for the follower or observer connection a forwarded request
/// arrived on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerHandle {
    /// Server id of the learner.
    pub sid: u64,
    /// Peer address, for diagnostics.
    pub address: String,
}

impl LearnerHandle {
    pub fn new(sid: u64, address: impl Into<String>) -> Self {
        Self {
            sid,
            address: address.into(),
        }
    }
}

/// The stage that took responsibility for completing a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOwner {
    /// Submitted by a client connected to this server.
    Local,
    /// Forwarded by a learner for this server to drive through agreement.
    Learner(Arc<LearnerHandle>),
}

impl RequestOwner {
    /// Whether the request came in over replication rather than a client.
    pub fn is_replication_origin(&self) -> bool {
        matches!(self, Self::Learner(_))
    }

    /// The learner, when replication-originated.
    pub fn learner(&self) -> Option<&LearnerHandle> {
        match self {
            Self::Learner(handle) => Some(handle),
            Self::Local => None,
        }
    }
}

/// Proposed or active voting membership carried by reconfig requests.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuorumVerifier {
    /// Configuration version (the zxid that committed it).
    pub version: i64,
    /// Voting members keyed by server id.
    pub voters: BTreeMap<u64, String>,
}

impl QuorumVerifier {
    pub fn new(version: i64) -> Self {
        Self {
            version,
            voters: BTreeMap::new(),
        }
    }

    /// Add a voting member.
    pub fn with_voter(mut self, sid: u64, address: impl Into<String>) -> Self {
        self.voters.insert(sid, address.into());
        self
    }

    /// Majority size for this membership.
    pub fn quorum_size(&self) -> usize {
        self.voters.len() / 2 + 1
    }

    /// Whether a set of acknowledging servers forms a majority.
    pub fn contains_quorum<'a>(&self, acks: impl IntoIterator<Item = &'a u64>) -> bool {
        let votes = acks
            .into_iter()
            .filter(|sid| self.voters.contains_key(sid))
            .count();
        votes >= self.quorum_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn learner_owner_is_replication_origin() {
        let learner = RequestOwner::Learner(Arc::new(LearnerHandle::new(3, "10.0.0.3:2888")));
        assert!(learner.is_replication_origin());
        assert_eq!(learner.learner().map(|l| l.sid), Some(3));
        assert!(!RequestOwner::Local.is_replication_origin());
        assert!(RequestOwner::Local.learner().is_none());
    }

    #[test]
    fn majority_counts_only_voters() {
        let qv = QuorumVerifier::new(0x1_0000_0000)
            .with_voter(1, "a:2888")
            .with_voter(2, "b:2888")
            .with_voter(3, "c:2888");
        assert_eq!(qv.quorum_size(), 2);

        let acks: BTreeSet<u64> = [1, 9].into_iter().collect();
        assert!(!qv.contains_quorum(&acks));

        let acks: BTreeSet<u64> = [1, 3].into_iter().collect();
        assert!(qv.contains_quorum(&acks));
    }
}
