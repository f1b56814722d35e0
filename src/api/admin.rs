use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::{
    error::{Error, Result},
    model::{
        api::{
            admin::AdminCredentials,
            auth::AuthToken,
            election::{ElectionDescription, ElectionSpec},
        },
        common::election::{ElectionId, ElectionState},
        db::{
            admin::{Admin, NewAdmin},
            election::Election,
            eligibility::EligibilityRecord,
            vote::{verify_chain, ChainAudit, VoteRecord},
            voter::Voter,
        },
        mongodb::{u32_id_filter, Coll, Counter, ELECTION_ID_COUNTER_ID},
    },
};

pub fn routes() -> Vec<Route> {
    routes![
        get_admins,
        create_admin,
        delete_admin,
        create_election,
        modify_election,
        activate_election,
        complete_election,
        cancel_election,
        add_eligible_voter,
        remove_eligible_voter,
        audit_chain,
    ]
}

#[get("/admins")]
async fn get_admins(_token: AuthToken<Admin>, admins: Coll<Admin>) -> Result<Json<Vec<String>>> {
    let admin_list: Vec<Admin> = admins.find(None, None).await?.try_collect().await?;
    let admin_names = admin_list
        .into_iter()
        .map(|admin| admin.admin.username)
        .collect();
    Ok(Json(admin_names))
}

#[post("/admins", data = "<new_admin>", format = "json")]
async fn create_admin(
    _token: AuthToken<Admin>,
    new_admin: Json<AdminCredentials>,
    admins: Coll<NewAdmin>,
) -> Result<()> {
    // Check username uniqueness.
    let filter = doc! {
        "username": &new_admin.username,
    };
    let existing = admins.find_one(filter, None).await?;
    if existing.is_some() {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Admin username already in use: {}", new_admin.username),
        ));
    }

    // Create and insert the admin.
    let admin: NewAdmin = new_admin
        .0
        .try_into()
        .map_err(|_| Error::Status(Status::BadRequest, "Illegal admin credentials".to_string()))?;
    admins.insert_one(admin, None).await?;
    Ok(())
}

#[delete("/admins", data = "<username>", format = "json")]
async fn delete_admin(
    _token: AuthToken<Admin>,
    username: String,
    admins: Coll<Admin>,
) -> Result<()> {
    // Prevent deleting the last admin.
    let count = admins.count_documents(None, None).await?;
    if count == 1 {
        return Err(Error::Status(
            Status::UnprocessableEntity,
            "Cannot delete last admin!".to_string(),
        ));
    }

    let filter = doc! {
        "username": &username,
    };
    let result = admins.delete_one(filter, None).await?;
    if result.deleted_count == 0 {
        Err(Error::not_found(format!("Admin {}", username)))
    } else {
        Ok(())
    }
}

#[post("/elections", data = "<spec>", format = "json")]
async fn create_election(
    _token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
    counters: Coll<Counter>,
) -> Result<Json<ElectionDescription>> {
    let spec = spec.into_inner();
    spec.validate()?;

    let next = Counter::next(&counters, ELECTION_ID_COUNTER_ID).await?;
    let election_id = ElectionId::try_from(next).map_err(|_| {
        Error::Status(
            Status::InternalServerError,
            "Election ID space exhausted".to_string(),
        )
    })?;

    let election = spec.into_election(election_id);
    elections.insert_one(&election, None).await?;

    Ok(Json(election.into()))
}

#[put("/elections/<election_id>", data = "<spec>", format = "json")]
async fn modify_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<ElectionSpec>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let spec = spec.into_inner();
    spec.validate()?;

    // Get the existing election.
    let election = elections
        .find_one(u32_id_filter(election_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    // Only drafts may be modified; once activated, the contest definitions
    // are fixed for the lifetime of the election.
    if election.metadata.state != ElectionState::Draft {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Cannot modify election {} after leaving draft", election_id),
        ));
    }

    // Replace with the new spec, keeping the ID.
    let new_election = spec.into_election(election_id);
    // A content-identical replacement reports zero modified documents, so
    // only the match counts.
    let result = elections
        .replace_one(u32_id_filter(election_id), &new_election, None)
        .await?;
    assert_eq!(result.matched_count, 1);

    Ok(Json(new_election.into()))
}

#[post("/elections/<election_id>/activate")]
async fn activate_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<()> {
    transition_election(
        &elections,
        election_id,
        doc! {"state": ElectionState::Draft},
        ElectionState::Active,
        "doesn't exist or isn't a draft; cannot activate",
    )
    .await
}

#[post("/elections/<election_id>/complete")]
async fn complete_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<()> {
    transition_election(
        &elections,
        election_id,
        doc! {"state": ElectionState::Active},
        ElectionState::Completed,
        "doesn't exist or isn't active; cannot complete",
    )
    .await
}

#[post("/elections/<election_id>/cancel")]
async fn cancel_election(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    elections: Coll<Election>,
) -> Result<()> {
    transition_election(
        &elections,
        election_id,
        doc! {"$or": [{"state": ElectionState::Draft}, {"state": ElectionState::Active}]},
        ElectionState::Cancelled,
        "doesn't exist or is already finished; cannot cancel",
    )
    .await
}

/// Atomically apply a state transition, where `state_filter` describes the
/// states the transition is valid from.
async fn transition_election(
    elections: &Coll<Election>,
    election_id: ElectionId,
    mut state_filter: mongodb::bson::Document,
    to: ElectionState,
    failure_msg: &str,
) -> Result<()> {
    state_filter.insert("_id", election_id);
    let update = doc! {
        "$set": {
            "state": to,
        }
    };
    let result = elections.update_one(state_filter, update, None).await?;
    if result.modified_count != 1 {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Election {} {}", election_id, failure_msg),
        ));
    }
    Ok(())
}

/// Grant a voter eligibility for an election. Idempotent.
#[post("/elections/<election_id>/voters", data = "<username>", format = "json")]
async fn add_eligible_voter(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    username: String,
    elections: Coll<Election>,
    voters: Coll<Voter>,
    eligibility: Coll<EligibilityRecord>,
) -> Result<()> {
    let election = elections
        .find_one(u32_id_filter(election_id), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {}", election_id)))?;

    // Eligibility is fixed once the election has finished.
    if matches!(
        election.metadata.state,
        ElectionState::Completed | ElectionState::Cancelled
    ) {
        return Err(Error::Status(
            Status::BadRequest,
            format!("Election {} has finished; cannot change voters", election_id),
        ));
    }

    let voter = voters
        .find_one(doc! {"username": &username}, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", username)))?;

    EligibilityRecord::grant(&eligibility, election_id, voter.id).await
}

/// Revoke a voter's eligibility. Fails with `409 Conflict` if they have
/// already voted.
#[delete("/elections/<election_id>/voters", data = "<username>", format = "json")]
async fn remove_eligible_voter(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    username: String,
    voters: Coll<Voter>,
    eligibility: Coll<EligibilityRecord>,
) -> Result<()> {
    let voter = voters
        .find_one(doc! {"username": &username}, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {}", username)))?;

    EligibilityRecord::revoke(&eligibility, election_id, voter.id).await
}

/// Walk the whole vote ledger and check every hash link.
#[get("/votes/audit")]
async fn audit_chain(
    _token: AuthToken<Admin>,
    votes: Coll<VoteRecord>,
    db_client: &State<Client>,
) -> Result<Json<ChainAudit>> {
    let audit = verify_chain(&votes, db_client).await?;
    Ok(Json(audit))
}
