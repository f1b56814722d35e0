use std::collections::HashMap;

use mongodb::bson::doc;
use rocket::{
    futures::TryStreamExt,
    serde::json::Json,
    Route,
};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        election::{ElectionDescription, ElectionSummary, VoterBallotView},
    },
    common::election::{CandidateId, ContestId, ElectionId, ElectionState},
    db::{
        admin::Admin, election::Election, eligibility::EligibilityRecord, vote::VoteRecord,
        voter::Voter,
    },
    mongodb::{u32_id_filter, Coll},
};

pub fn routes() -> Vec<Route> {
    routes![
        elections_admin,
        elections_non_admin,
        election_admin,
        election_non_admin,
        election_contests,
    ]
}

#[get("/elections", rank = 1)]
async fn elections_admin(
    _token: AuthToken<Admin>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionSummary>>> {
    summaries(elections, true).await
}

#[get("/elections", rank = 2)]
async fn elections_non_admin(elections: Coll<Election>) -> Result<Json<Vec<ElectionSummary>>> {
    summaries(elections, false).await
}

#[get("/elections/<election_id>", rank = 1)]
async fn election_admin(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = elections
        .find_one(u32_id_filter(election_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{}'", election_id)))?;
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>", rank = 2)]
async fn election_non_admin(
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = elections
        .find_one(visible_filter(election_id), None)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("Non-admin election with ID '{}'", election_id))
        })?;

    Ok(Json(election.into()))
}

/// Get an election's contests together with the requesting voter's own
/// standing: their eligibility and any selections they already cast.
#[get("/elections/<election_id>/contests")]
async fn election_contests(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    elections: Coll<Election>,
    eligibility: Coll<EligibilityRecord>,
    votes: Coll<VoteRecord>,
) -> Result<Json<VoterBallotView>> {
    // Drafts are invisible to voters.
    let election = elections
        .find_one(visible_filter(election_id), None)
        .await?
        .ok_or_else(|| {
            Error::not_found(format!("Non-admin election with ID '{}'", election_id))
        })?;

    let status = EligibilityRecord::status(&eligibility, election_id, token.id).await?;

    let filter = doc! {
        "election_id": election_id,
        "voter_id": *token.id,
    };
    let records: Vec<VoteRecord> = votes.find(filter, None).await?.try_collect().await?;
    let mut cast: HashMap<ContestId, Vec<CandidateId>> = HashMap::new();
    for record in records {
        cast.entry(record.contest_id).or_default().push(record.candidate);
    }

    Ok(Json(VoterBallotView {
        contests: election.contests,
        eligibility: status,
        cast,
    }))
}

/// Elections in a voter-visible state with the given ID.
fn visible_filter(election_id: ElectionId) -> mongodb::bson::Document {
    doc! {
        "_id": election_id,
        "$or": [{"state": ElectionState::Active}, {"state": ElectionState::Completed}],
    }
}

async fn summaries(
    elections: Coll<Election>,
    is_admin: bool,
) -> Result<Json<Vec<ElectionSummary>>> {
    let filter = if is_admin {
        doc! {}
    } else {
        doc! {
            "$or": [{"state": ElectionState::Active}, {"state": ElectionState::Completed}],
        }
    };

    let elections: Vec<Election> = elections.find(filter, None).await?.try_collect().await?;
    Ok(Json(elections.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{http::Status, local::asynchronous::Client, serde::json::serde_json};

    use crate::model::{
        api::voter::VoterCredentials,
        common::eligibility::EligibilityStatus,
        mongodb::Id,
    };

    use super::*;

    #[backend_test(admin)]
    async fn admin_sees_all_elections(client: Client, db: Database) {
        insert_elections(&db).await;

        let response = client.get(uri!(elections_admin)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let summaries: Vec<ElectionSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(summaries.len(), 3);
    }

    #[backend_test]
    async fn non_admin_sees_only_visible_elections(client: Client, db: Database) {
        let (draft, active, completed) = insert_elections(&db).await;

        let response = client.get(uri!(elections_non_admin)).dispatch().await;
        assert_eq!(Status::Ok, response.status());
        let summaries: Vec<ElectionSummary> =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        let ids: Vec<ElectionId> = summaries.iter().map(|s| s.id).collect();
        assert!(ids.contains(&active.id));
        assert!(ids.contains(&completed.id));
        assert!(!ids.contains(&draft.id));

        // The draft is also hidden when fetched directly.
        let response = client
            .get(uri!(election_non_admin(draft.id)))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());

        let response = client
            .get(uri!(election_non_admin(active.id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        let description: ElectionDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(description, active.into());
    }

    #[backend_test(voter)]
    async fn contests_include_voter_standing(client: Client, db: Database) {
        let (_, active, _) = insert_elections(&db).await;
        let voter_id = voter_id(&db).await;

        // With no eligibility record at all.
        let view = get_contests(&client, active.id).await;
        assert_eq!(view.contests, active.contests);
        assert_eq!(view.eligibility, None);
        assert!(view.cast.is_empty());

        // Grant eligibility.
        EligibilityRecord::grant(
            &Coll::<EligibilityRecord>::from_db(&db),
            active.id,
            voter_id,
        )
        .await
        .unwrap();
        let view = get_contests(&client, active.id).await;
        assert_eq!(view.eligibility, Some(EligibilityStatus::Eligible));
        assert!(view.cast.is_empty());
    }

    #[backend_test(voter)]
    async fn contests_hidden_for_drafts(client: Client, db: Database) {
        let (draft, _, _) = insert_elections(&db).await;

        let response = client
            .get(uri!(election_contests(draft.id)))
            .dispatch()
            .await;
        assert_eq!(Status::NotFound, response.status());
    }

    async fn insert_elections(db: &Database) -> (Election, Election, Election) {
        let draft = Election::draft_example();
        let active = Election::active_example();
        let completed = Election::completed_example();
        Coll::<Election>::from_db(db)
            .insert_many(vec![&draft, &active, &completed], None)
            .await
            .unwrap();
        (draft, active, completed)
    }

    async fn voter_id(db: &Database) -> Id {
        Coll::<Voter>::from_db(db)
            .find_one(doc! {"username": VoterCredentials::example().username}, None)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    async fn get_contests(client: &Client, election_id: ElectionId) -> VoterBallotView {
        let response = client
            .get(uri!(election_contests(election_id)))
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        serde_json::from_str(&response.into_string().await.unwrap()).unwrap()
    }
}
