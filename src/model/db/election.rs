use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{CandidateId, ContestId, ElectionId, ElectionState},
    mongodb::serde_string_map,
};

/// An election as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    /// Unique ID, allocated from the global election counter.
    #[serde(rename = "_id")]
    pub id: ElectionId,
    /// Top-level metadata.
    #[serde(flatten)]
    pub metadata: ElectionMetadata,
    /// Election contests by ID.
    #[serde(with = "serde_string_map")]
    pub contests: HashMap<ContestId, Contest>,
}

impl Election {
    /// Look up a contest by ID.
    pub fn contest(&self, contest_id: ContestId) -> Option<&Contest> {
        self.contests.get(&contest_id)
    }

    /// Does this election accept votes at the given instant?
    /// Requires both the `Active` state and the time window.
    pub fn is_votable_at(&self, now: DateTime<Utc>) -> bool {
        self.metadata.state == ElectionState::Active
            && self.metadata.start_time <= now
            && now <= self.metadata.end_time
    }
}

/// A view on just the election's top-level metadata.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionMetadata {
    /// Election name.
    pub name: String,
    /// Election state.
    pub state: ElectionState,
    /// Election start time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Election end time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
}

/// A single contest within an election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    /// Unique ID within the election.
    pub id: ContestId,
    /// Contest title.
    pub title: String,
    /// Maximum number of candidates one ballot may select; at least 1.
    pub max_selections: u32,
    /// The candidates standing in this contest.
    pub candidates: Vec<Candidate>,
}

impl Contest {
    /// Look up a candidate by name (names are unique within a contest).
    pub fn candidate(&self, name: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.name == name)
    }
}

/// A candidate standing in a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Display name, unique case-insensitively within the contest.
    pub name: CandidateId,
    /// Optional party label.
    pub party: Option<String>,
}
