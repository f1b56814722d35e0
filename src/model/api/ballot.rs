use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::BallotError;
use crate::model::{
    common::election::{CandidateId, ContestId},
    db::election::Election,
};

/// A ballot as submitted by a voter: selections for one or more of the
/// election's contests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BallotSpec {
    pub selections: Vec<ContestSelection>,
}

/// The selections for a single contest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContestSelection {
    pub contest_id: ContestId,
    pub candidate_ids: Vec<CandidateId>,
}

impl BallotSpec {
    /// Check this ballot against the election's contest definitions.
    /// Validation is all-or-nothing: any violation rejects the whole ballot.
    pub fn validate(&self, election: &Election) -> Result<(), BallotError> {
        let mut seen_contests = HashSet::new();
        for selection in &self.selections {
            let contest = election
                .contest(selection.contest_id)
                .ok_or(BallotError::UnknownContest(selection.contest_id))?;

            // Two selection blocks for the same contest are a duplicate
            // selection, even if they name different candidates.
            if !seen_contests.insert(contest.id) {
                return Err(BallotError::DuplicateSelection {
                    contest: contest.id,
                    candidate: selection
                        .candidate_ids
                        .first()
                        .cloned()
                        .unwrap_or_default(),
                });
            }

            if selection.candidate_ids.len() > contest.max_selections as usize {
                return Err(BallotError::TooManySelections {
                    contest: contest.id,
                    max: contest.max_selections,
                    got: selection.candidate_ids.len(),
                });
            }

            let mut seen_candidates = HashSet::new();
            for candidate_id in &selection.candidate_ids {
                if contest.candidate(candidate_id).is_none() {
                    return Err(BallotError::UnknownCandidate {
                        contest: contest.id,
                        candidate: candidate_id.clone(),
                    });
                }
                if !seen_candidates.insert(candidate_id.as_str()) {
                    return Err(BallotError::DuplicateSelection {
                        contest: contest.id,
                        candidate: candidate_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The total number of (contest, candidate) picks across all contests.
    pub fn total_selections(&self) -> usize {
        self.selections.iter().map(|s| s.candidate_ids.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(contest_id: ContestId, candidate: &str) -> BallotSpec {
        BallotSpec {
            selections: vec![ContestSelection {
                contest_id,
                candidate_ids: vec![candidate.to_string()],
            }],
        }
    }

    #[test]
    fn accepts_valid_ballots() {
        let election = Election::active_example();

        assert!(single(1, "Alice Allen").validate(&election).is_ok());
        let multi = BallotSpec {
            selections: vec![
                ContestSelection {
                    contest_id: 1,
                    candidate_ids: vec!["Bob Brown".to_string()],
                },
                ContestSelection {
                    contest_id: 2,
                    candidate_ids: vec!["Carol Clark".to_string(), "Erin Evans".to_string()],
                },
            ],
        };
        assert!(multi.validate(&election).is_ok());
        assert_eq!(multi.total_selections(), 3);
    }

    #[test]
    fn rejects_unknown_contest() {
        let election = Election::active_example();
        assert_eq!(
            single(99, "Alice Allen").validate(&election),
            Err(BallotError::UnknownContest(99))
        );
    }

    #[test]
    fn rejects_unknown_candidate() {
        let election = Election::active_example();
        assert_eq!(
            single(1, "Zara Zilch").validate(&election),
            Err(BallotError::UnknownCandidate {
                contest: 1,
                candidate: "Zara Zilch".to_string(),
            })
        );
    }

    #[test]
    fn rejects_candidate_from_other_contest() {
        let election = Election::active_example();
        // Carol stands in contest 2, not contest 1.
        assert_eq!(
            single(1, "Carol Clark").validate(&election),
            Err(BallotError::UnknownCandidate {
                contest: 1,
                candidate: "Carol Clark".to_string(),
            })
        );
    }

    #[test]
    fn rejects_too_many_selections() {
        let election = Election::active_example();
        let ballot = BallotSpec {
            selections: vec![ContestSelection {
                contest_id: 2,
                candidate_ids: vec![
                    "Carol Clark".to_string(),
                    "Dan Davis".to_string(),
                    "Erin Evans".to_string(),
                ],
            }],
        };
        assert_eq!(
            ballot.validate(&election),
            Err(BallotError::TooManySelections {
                contest: 2,
                max: 2,
                got: 3,
            })
        );
    }

    #[test]
    fn rejects_duplicate_candidate() {
        let election = Election::active_example();
        let ballot = BallotSpec {
            selections: vec![ContestSelection {
                contest_id: 2,
                candidate_ids: vec!["Carol Clark".to_string(), "Carol Clark".to_string()],
            }],
        };
        assert_eq!(
            ballot.validate(&election),
            Err(BallotError::DuplicateSelection {
                contest: 2,
                candidate: "Carol Clark".to_string(),
            })
        );
    }

    #[test]
    fn rejects_repeated_contest_block() {
        let election = Election::active_example();
        let ballot = BallotSpec {
            selections: vec![
                ContestSelection {
                    contest_id: 1,
                    candidate_ids: vec!["Alice Allen".to_string()],
                },
                ContestSelection {
                    contest_id: 1,
                    candidate_ids: vec!["Bob Brown".to_string()],
                },
            ],
        };
        assert_eq!(
            ballot.validate(&election),
            Err(BallotError::DuplicateSelection {
                contest: 1,
                candidate: "Bob Brown".to_string(),
            })
        );
    }
}
