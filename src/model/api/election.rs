use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        election::{CandidateId, ContestId, ElectionId, ElectionState},
        eligibility::EligibilityStatus,
    },
    db::election::{Candidate, Contest, Election, ElectionMetadata},
    mongodb::serde_string_map,
};

/// An election specification, as submitted by an admin to create or modify
/// an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election name.
    pub name: String,
    /// Election start time.
    pub start_time: DateTime<Utc>,
    /// Election end time.
    pub end_time: DateTime<Utc>,
    /// Contest specifications, in ballot order.
    pub contests: Vec<ContestSpec>,
}

impl ElectionSpec {
    /// Check the internal consistency rules that cannot be expressed in the
    /// type system. Rejects with `400 Bad Request` on the first violation.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(bad_spec("Election name must not be empty"));
        }
        if self.end_time <= self.start_time {
            return Err(bad_spec("Election must end after it starts"));
        }
        if self.contests.is_empty() {
            return Err(bad_spec("Election must have at least one contest"));
        }
        for contest in &self.contests {
            contest.validate()?;
        }
        Ok(())
    }

    /// Convert this spec into a proper Election with unique contest IDs,
    /// starting in the `Draft` state.
    pub fn into_election(self, election_id: ElectionId) -> Election {
        let contests = self
            .contests
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let contest_id = 1 + ContestId::try_from(i).expect("usize to u32");
                (contest_id, c.clone().into_contest(contest_id))
            })
            .collect();
        Election {
            id: election_id,
            metadata: self.into(),
            contests,
        }
    }
}

impl From<ElectionSpec> for ElectionMetadata {
    fn from(spec: ElectionSpec) -> Self {
        Self {
            name: spec.name,
            state: ElectionState::Draft,
            start_time: spec.start_time,
            end_time: spec.end_time,
        }
    }
}

/// A contest specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestSpec {
    /// Contest title.
    pub title: String,
    /// How many candidates one ballot may pick.
    #[serde(flatten)]
    pub contest_type: ContestType,
    /// Candidates standing in this contest.
    pub candidates: Vec<CandidateSpec>,
}

/// The selection rule for a contest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContestType {
    /// Exactly one selection allowed.
    ChooseOne,
    /// Up to `max_selections` selections allowed.
    ChooseMany { max_selections: u32 },
}

impl ContestType {
    /// The upper bound on selections this rule allows.
    pub fn max_selections(&self) -> u32 {
        match self {
            Self::ChooseOne => 1,
            Self::ChooseMany { max_selections } => *max_selections,
        }
    }
}

impl ContestSpec {
    fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(bad_spec("Contest title must not be empty"));
        }
        if self.contest_type.max_selections() == 0 {
            return Err(bad_spec(format!(
                "Contest '{}' must allow at least one selection",
                self.title
            )));
        }
        if self.candidates.is_empty() {
            return Err(bad_spec(format!(
                "Contest '{}' must have at least one candidate",
                self.title
            )));
        }
        // Candidate names identify selections, so they must be unique
        // within the contest, ignoring case.
        let mut seen = HashSet::new();
        for candidate in &self.candidates {
            if candidate.name.trim().is_empty() {
                return Err(bad_spec(format!(
                    "Contest '{}' has a candidate with an empty name",
                    self.title
                )));
            }
            if !seen.insert(candidate.name.to_lowercase()) {
                return Err(bad_spec(format!(
                    "Contest '{}' has duplicate candidate '{}'",
                    self.title, candidate.name
                )));
            }
        }
        Ok(())
    }

    /// Convert this spec into a contest with the given unique ID.
    pub fn into_contest(self, id: ContestId) -> Contest {
        Contest {
            id,
            title: self.title,
            max_selections: self.contest_type.max_selections(),
            candidates: self
                .candidates
                .into_iter()
                .map(|c| Candidate {
                    name: c.name,
                    party: c.party,
                })
                .collect(),
        }
    }
}

/// A candidate specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub party: Option<String>,
}

fn bad_spec(msg: impl Into<String>) -> Error {
    Error::Status(Status::BadRequest, msg.into())
}

/// An API-friendly election description, with standard datetime formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    /// Election unique ID.
    pub id: ElectionId,
    /// Election name.
    pub name: String,
    /// Election state.
    pub state: ElectionState,
    /// Election start time.
    pub start_time: DateTime<Utc>,
    /// Election end time.
    pub end_time: DateTime<Utc>,
    /// Election contests by ID.
    #[serde(with = "serde_string_map")]
    pub contests: HashMap<ContestId, Contest>,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            name: election.metadata.name,
            state: election.metadata.state,
            start_time: election.metadata.start_time,
            end_time: election.metadata.end_time,
            contests: election.contests,
        }
    }
}

/// A summary of an election, shorter than the full [`ElectionDescription`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    /// Election unique ID.
    pub id: ElectionId,
    /// Election name.
    pub name: String,
    /// Election state.
    pub state: ElectionState,
    /// Election start time.
    pub start_time: DateTime<Utc>,
    /// Election end time.
    pub end_time: DateTime<Utc>,
}

impl From<Election> for ElectionSummary {
    fn from(election: Election) -> Self {
        Self {
            id: election.id,
            name: election.metadata.name,
            state: election.metadata.state,
            start_time: election.metadata.start_time,
            end_time: election.metadata.end_time,
        }
    }
}

/// What a voter sees when fetching an election's contests: the contests
/// themselves, their own standing, and any selections they already cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterBallotView {
    /// Election contests by ID.
    #[serde(with = "serde_string_map")]
    pub contests: HashMap<ContestId, Contest>,
    /// The voter's eligibility, or `None` if they were never granted any.
    pub eligibility: Option<EligibilityStatus>,
    /// Selections already committed by this voter, by contest.
    #[serde(with = "serde_string_map")]
    pub cast: HashMap<ContestId, Vec<CandidateId>>,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use chrono::{Duration, Timelike, Utc};

    macro_rules! midnight_today {
        () => {{
            Utc::now()
                .with_hour(0)
                .and_then(|t| t.with_minute(0))
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_nanosecond(0))
                .unwrap()
        }};
    }

    impl ElectionSpec {
        pub fn current_example() -> Self {
            let start_time = midnight_today!();
            let end_time = start_time + Duration::days(30);
            Self {
                name: "Test Election 1".to_string(),
                start_time,
                end_time,
                contests: vec![ContestSpec::example1(), ContestSpec::example2()],
            }
        }

        pub fn future_example() -> Self {
            let start_time = midnight_today!() + Duration::days(30);
            let end_time = start_time + Duration::days(30);
            Self {
                name: "Test Election 2".to_string(),
                start_time,
                end_time,
                contests: vec![ContestSpec::example1()],
            }
        }

        pub fn past_example() -> Self {
            let start_time = midnight_today!() - Duration::days(30);
            let end_time = start_time + Duration::days(7);
            Self {
                name: "Test Election 3".to_string(),
                start_time,
                end_time,
                contests: vec![ContestSpec::example1()],
            }
        }
    }

    impl ContestSpec {
        pub fn example1() -> Self {
            Self {
                title: "President".to_string(),
                contest_type: ContestType::ChooseOne,
                candidates: vec![
                    CandidateSpec {
                        name: "Alice Allen".to_string(),
                        party: Some("Unity Party".to_string()),
                    },
                    CandidateSpec {
                        name: "Bob Brown".to_string(),
                        party: Some("Progress Party".to_string()),
                    },
                ],
            }
        }

        pub fn example2() -> Self {
            Self {
                title: "Committee Members".to_string(),
                contest_type: ContestType::ChooseMany { max_selections: 2 },
                candidates: vec![
                    CandidateSpec {
                        name: "Carol Clark".to_string(),
                        party: None,
                    },
                    CandidateSpec {
                        name: "Dan Davis".to_string(),
                        party: None,
                    },
                    CandidateSpec {
                        name: "Erin Evans".to_string(),
                        party: None,
                    },
                ],
            }
        }
    }
}
