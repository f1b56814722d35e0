use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// The voting state of a single (election, voter) pair. A voter with no
/// record at all is simply not eligible; a record never returns from
/// `Voted` to `Eligible`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EligibilityStatus {
    /// May cast exactly one ballot.
    Eligible,
    /// Has cast their ballot.
    Voted,
}

impl From<EligibilityStatus> for Bson {
    fn from(status: EligibilityStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}
