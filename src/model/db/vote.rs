use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use mongodb::{
    bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::{FindOneOptions, FindOptions, SessionOptions},
    Client, ClientSession,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::model::{
    common::election::{CandidateId, ContestId, ElectionId},
    mongodb::{Coll, Id},
};

/// The `previous_vote_hash` of the first record ever committed: the hex
/// encoding of 32 zero bytes.
pub const CHAIN_SENTINEL: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One committed (contest, candidate) pick. A ballot selecting K candidates
/// across its contests produces K of these, sharing a `ballot_id`. Records
/// are append-only: they are never updated or deleted once committed, and
/// each is chained to its predecessor in global `seq` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Groups all records of one ballot submission.
    pub ballot_id: Id,
    /// Global insertion order, allocated from the vote sequence counter.
    pub seq: u64,
    pub election_id: ElectionId,
    pub contest_id: ContestId,
    pub voter_id: Id,
    pub candidate: CandidateId,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub cast_at: DateTime<Utc>,
    /// SHA-256 over this record's content, including `previous_vote_hash`.
    pub vote_hash: String,
    /// The `vote_hash` of the record with `seq - 1`, or [`CHAIN_SENTINEL`].
    pub previous_vote_hash: String,
}

impl VoteRecord {
    /// Create a record chained onto the given previous hash.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        seq: u64,
        ballot_id: Id,
        election_id: ElectionId,
        contest_id: ContestId,
        voter_id: Id,
        candidate: CandidateId,
        cast_at: DateTime<Utc>,
        previous_vote_hash: String,
    ) -> Self {
        let mut record = Self {
            id: Id::new(),
            ballot_id,
            seq,
            election_id,
            contest_id,
            voter_id,
            candidate,
            cast_at,
            vote_hash: String::new(),
            previous_vote_hash,
        };
        record.vote_hash = record.compute_hash();
        record
    }

    /// Recompute this record's hash from its content. Timestamps hash at
    /// millisecond precision, matching what BSON round-trips.
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.seq.to_le_bytes());
        hasher.update(self.election_id.to_le_bytes());
        hasher.update(self.contest_id.to_le_bytes());
        hasher.update(self.voter_id.to_bytes());
        hasher.update(self.candidate.as_bytes());
        hasher.update(self.cast_at.timestamp_millis().to_le_bytes());
        hasher.update(self.previous_vote_hash.as_bytes());
        HEXLOWER.encode(&hasher.finalize())
    }

    /// Get the most recently committed record, i.e. the chain tail, inside
    /// the given session. `None` iff the ledger is empty.
    pub async fn chain_tail(
        votes: &Coll<VoteRecord>,
        session: &mut ClientSession,
    ) -> Result<Option<VoteRecord>> {
        let options = FindOneOptions::builder().sort(doc! {"seq": -1}).build();
        let tail = votes.find_one_with_session(None, options, session).await?;
        Ok(tail)
    }
}

/// The result of a full chain audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainAudit {
    /// How many records were checked.
    pub records: u64,
    /// Whether every link and every stored hash checked out.
    pub valid: bool,
}

/// Walk the entire ledger in insertion order, confirming that every record's
/// stored hash matches recomputation and that every `previous_vote_hash`
/// equals the predecessor's hash (the sentinel for the first record).
///
/// Reads a consistent snapshot; not intended for the voting hot path.
pub async fn verify_chain(votes: &Coll<VoteRecord>, db_client: &Client) -> Result<ChainAudit> {
    let session_options = SessionOptions::builder().snapshot(true).build();
    let mut session = db_client.start_session(Some(session_options)).await?;

    let options = FindOptions::builder().sort(doc! {"seq": 1}).build();
    let mut cursor = votes.find_with_session(None, options, &mut session).await?;

    let mut records = 0;
    let mut previous_hash = CHAIN_SENTINEL.to_string();
    while let Some(record) = cursor.next(&mut session).await {
        let record = record?;
        if record.previous_vote_hash != previous_hash
            || record.vote_hash != record.compute_hash()
        {
            warn!(
                "Vote chain broken at seq {} (record {})",
                record.seq, record.id
            );
            return Ok(ChainAudit {
                records,
                valid: false,
            });
        }
        previous_hash = record.vote_hash;
        records += 1;
    }

    Ok(ChainAudit {
        records,
        valid: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_chain_and_verify() {
        let voter_id = Id::new();
        let ballot_id = Id::new();
        let now = Utc::now();

        let first = VoteRecord::new(
            1,
            ballot_id,
            1,
            1,
            voter_id,
            "Alice Allen".to_string(),
            now,
            CHAIN_SENTINEL.to_string(),
        );
        let second = VoteRecord::new(
            2,
            ballot_id,
            1,
            2,
            voter_id,
            "Bob Brown".to_string(),
            now,
            first.vote_hash.clone(),
        );

        assert_eq!(first.vote_hash.len(), 64);
        assert_eq!(first.vote_hash, first.compute_hash());
        assert_eq!(second.previous_vote_hash, first.vote_hash);
        assert_ne!(first.vote_hash, second.vote_hash);
    }

    #[test]
    fn hash_covers_previous_link() {
        let voter_id = Id::new();
        let ballot_id = Id::new();
        let now = Utc::now();

        let mut record = VoteRecord::new(
            1,
            ballot_id,
            1,
            1,
            voter_id,
            "Alice Allen".to_string(),
            now,
            CHAIN_SENTINEL.to_string(),
        );
        let original = record.vote_hash.clone();

        // Re-linking the record must change its hash.
        record.previous_vote_hash = "f".repeat(64);
        assert_ne!(record.compute_hash(), original);
    }
}
