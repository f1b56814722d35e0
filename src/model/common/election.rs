use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// Our election IDs are integers.
pub type ElectionId = u32;
/// Our contest IDs are integers.
pub type ContestId = u32;
/// Our candidate IDs (display names) are strings.
pub type CandidateId = String;

/// States in the Election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionState {
    /// Under construction, only visible to admins.
    Draft,
    /// Open for voting within its time window. Visible to all.
    Active,
    /// Finished normally. Visible to all, accepts no votes.
    Completed,
    /// Abandoned before completion. Only visible to admins.
    Cancelled,
}

impl From<ElectionState> for Bson {
    fn from(state: ElectionState) -> Self {
        to_bson(&state).expect("Serialisation is infallible")
    }
}
