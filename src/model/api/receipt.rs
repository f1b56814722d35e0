use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// The receipt returned to a voter once their ballot has committed. The
/// `vote_hash` is the hash of the last ledger record the ballot produced,
/// so it pins the entire ballot into the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    /// The ID shared by all of this ballot's ledger records.
    pub ballot_id: Id,
    /// The chain hash covering this ballot.
    pub vote_hash: String,
    /// When the ballot was committed.
    pub cast_at: DateTime<Utc>,
}
