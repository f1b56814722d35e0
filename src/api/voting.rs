use chrono::Utc;
use mongodb::{bson::doc, Client, ClientSession};
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{BallotError, Error, Result};
use crate::model::{
    api::{auth::AuthToken, ballot::BallotSpec, receipt::BallotReceipt},
    common::{election::ElectionId, eligibility::EligibilityStatus},
    db::{
        election::Election,
        eligibility::EligibilityRecord,
        vote::{VoteRecord, CHAIN_SENTINEL},
        voter::Voter,
    },
    mongodb::{
        errors::is_transient_transaction_error, u32_id_filter, Coll, Counter, Id,
        VOTE_SEQ_COUNTER_ID,
    },
};

/// Concurrent ballots conflict on the sequence counter and the chain tail,
/// so losing transactions are retried up to this many times.
const MAX_CAST_ATTEMPTS: u32 = 8;

pub fn routes() -> Vec<Route> {
    routes![cast_ballot, cast_ballot_unauthenticated]
}

/// Cast a ballot. The whole ballot commits atomically: the eligibility
/// transition, the sequence reservation, and every ledger record succeed
/// together or not at all.
#[post("/elections/<election_id>/vote", data = "<ballot>", format = "json", rank = 1)]
async fn cast_ballot(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    ballot: Json<BallotSpec>,
    elections: Coll<Election>,
    eligibility: Coll<EligibilityRecord>,
    votes: Coll<VoteRecord>,
    counters: Coll<Counter>,
    db_client: &State<Client>,
) -> Result<(Status, Json<BallotReceipt>)> {
    // The election must exist, be active, and be inside its voting window.
    let election = elections
        .find_one(u32_id_filter(election_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;
    if !election.is_votable_at(Utc::now()) {
        return Err(BallotError::ElectionNotVotable.into());
    }

    // Reject structurally invalid ballots before touching any state.
    let ballot = ballot.into_inner();
    if ballot.total_selections() == 0 {
        return Err(Error::Status(
            Status::BadRequest,
            "Ballot must contain at least one selection".to_string(),
        ));
    }
    ballot.validate(&election)?;

    let mut attempts = 0;
    let receipt = loop {
        attempts += 1;
        match try_cast(
            db_client,
            &election,
            &ballot,
            token.id,
            &eligibility,
            &votes,
            &counters,
        )
        .await
        {
            Ok(receipt) => break receipt,
            Err(Error::Db(err))
                if is_transient_transaction_error(&err) && attempts < MAX_CAST_ATTEMPTS =>
            {
                // Another ballot won the conflict; re-run against the new
                // state. A voter racing themselves will find their
                // eligibility consumed and fail cleanly.
                debug!("Retrying ballot transaction, attempt {}", attempts);
            }
            Err(err) => return Err(err),
        }
    };

    Ok((Status::Created, Json(receipt)))
}

#[post("/elections/<_election_id>/vote", data = "<_ballot>", format = "json", rank = 2)]
fn cast_ballot_unauthenticated(_election_id: ElectionId, _ballot: Json<BallotSpec>) -> Error {
    Error::Status(
        Status::Unauthorized,
        "A voter login is required to vote.".to_string(),
    )
}

/// Run one attempt at the casting transaction.
async fn try_cast(
    db_client: &Client,
    election: &Election,
    ballot: &BallotSpec,
    voter_id: Id,
    eligibility: &Coll<EligibilityRecord>,
    votes: &Coll<VoteRecord>,
    counters: &Coll<Counter>,
) -> Result<BallotReceipt> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    match cast_in_session(
        &mut session,
        election,
        ballot,
        voter_id,
        eligibility,
        votes,
        counters,
    )
    .await
    {
        Ok(receipt) => {
            session.commit_transaction().await?;
            Ok(receipt)
        }
        Err(err) => {
            let _ = session.abort_transaction().await;
            Err(err)
        }
    }
}

async fn cast_in_session(
    session: &mut ClientSession,
    election: &Election,
    ballot: &BallotSpec,
    voter_id: Id,
    eligibility: &Coll<EligibilityRecord>,
    votes: &Coll<VoteRecord>,
    counters: &Coll<Counter>,
) -> Result<BallotReceipt> {
    // Consume the voter's single vote for this election. The filtered
    // update only succeeds from the `Eligible` state, so exactly one
    // concurrent ballot per voter can get past this point.
    if !EligibilityRecord::mark_voted(eligibility, election.id, voter_id, session).await? {
        let status =
            EligibilityRecord::status_with_session(eligibility, election.id, voter_id, session)
                .await?;
        return Err(match status {
            Some(EligibilityStatus::Voted) => BallotError::AlreadyVoted.into(),
            _ => BallotError::NotEligible.into(),
        });
    }

    // The eligibility row and the ledger must agree; if they ever diverge,
    // existing records for this voter mean the ballot was already cast.
    let prior_records = votes
        .count_documents_with_session(
            doc! {"election_id": election.id, "voter_id": *voter_id},
            None,
            session,
        )
        .await?;
    if prior_records > 0 {
        return Err(BallotError::AlreadyVoted.into());
    }

    // Reserve a contiguous range of sequence numbers. Writing the counter
    // inside the transaction serialises concurrent ballots, so the chain
    // tail read below cannot be forked.
    let count = ballot.total_selections() as u64;
    let first_seq = Counter::next_batch(counters, VOTE_SEQ_COUNTER_ID, count, session).await?;

    let mut previous_hash = VoteRecord::chain_tail(votes, session)
        .await?
        .map(|tail| tail.vote_hash)
        .unwrap_or_else(|| CHAIN_SENTINEL.to_string());

    let ballot_id = Id::new();
    let cast_at = Utc::now();
    let mut records = Vec::with_capacity(count as usize);
    let mut seq = first_seq;
    for selection in &ballot.selections {
        for candidate in &selection.candidate_ids {
            let record = VoteRecord::new(
                seq,
                ballot_id,
                election.id,
                selection.contest_id,
                voter_id,
                candidate.clone(),
                cast_at,
                previous_hash.clone(),
            );
            previous_hash = record.vote_hash.clone();
            seq += 1;
            records.push(record);
        }
    }

    votes
        .insert_many_with_session(&records, None, session)
        .await?;

    Ok(BallotReceipt {
        ballot_id,
        vote_hash: previous_hash,
        cast_at,
    })
}
