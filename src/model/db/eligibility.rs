use mongodb::{bson::doc, options::UpdateOptions, ClientSession};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{election::ElectionId, eligibility::EligibilityStatus},
    mongodb::{Coll, Id},
};

/// The eligibility ledger entry for one (election, voter) pair.
/// Absence of a record means the voter is not eligible at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityRecord {
    #[serde(rename = "_id")]
    pub id: Id,
    pub election_id: ElectionId,
    pub voter_id: Id,
    pub status: EligibilityStatus,
}

impl EligibilityRecord {
    /// A filter document matching the given (election, voter) pair.
    fn key_filter(election_id: ElectionId, voter_id: Id) -> mongodb::bson::Document {
        doc! {
            "election_id": election_id,
            "voter_id": *voter_id,
        }
    }

    /// Get the voter's status for the election, or `None` if they have no record.
    pub async fn status(
        records: &Coll<EligibilityRecord>,
        election_id: ElectionId,
        voter_id: Id,
    ) -> Result<Option<EligibilityStatus>> {
        let record = records
            .find_one(Self::key_filter(election_id, voter_id), None)
            .await?;
        Ok(record.map(|r| r.status))
    }

    /// As [`Self::status`], but inside the given session.
    pub async fn status_with_session(
        records: &Coll<EligibilityRecord>,
        election_id: ElectionId,
        voter_id: Id,
        session: &mut ClientSession,
    ) -> Result<Option<EligibilityStatus>> {
        let record = records
            .find_one_with_session(Self::key_filter(election_id, voter_id), None, session)
            .await?;
        Ok(record.map(|r| r.status))
    }

    /// Grant eligibility. Idempotent: a voter who already has a record keeps
    /// it unchanged, so granting can never revert a `Voted` status.
    pub async fn grant(
        records: &Coll<EligibilityRecord>,
        election_id: ElectionId,
        voter_id: Id,
    ) -> Result<()> {
        let update = doc! {
            "$setOnInsert": {
                "status": EligibilityStatus::Eligible,
            }
        };
        let options = UpdateOptions::builder().upsert(true).build();
        records
            .update_one(Self::key_filter(election_id, voter_id), update, options)
            .await?;
        Ok(())
    }

    /// Revoke eligibility. Fails with `409 Conflict` if the voter has
    /// already voted, and `404` if they have no record to revoke.
    pub async fn revoke(
        records: &Coll<EligibilityRecord>,
        election_id: ElectionId,
        voter_id: Id,
    ) -> Result<()> {
        let mut filter = Self::key_filter(election_id, voter_id);
        filter.insert("status", EligibilityStatus::Eligible);
        let result = records.delete_one(filter, None).await?;
        if result.deleted_count == 1 {
            return Ok(());
        }

        // Nothing was deleted: distinguish "already voted" from "no record".
        match Self::status(records, election_id, voter_id).await? {
            Some(EligibilityStatus::Voted) => Err(Error::Status(
                Status::Conflict,
                "Cannot remove a voter who has already voted".to_string(),
            )),
            _ => Err(Error::not_found(format!(
                "Eligibility for voter {voter_id} in election {election_id}"
            ))),
        }
    }

    /// Transition `Eligible -> Voted` inside the given session, as a
    /// compare-and-set. Returns false if the record was not in the
    /// `Eligible` state (including not existing at all), in which case the
    /// caller must abort its transaction.
    pub async fn mark_voted(
        records: &Coll<EligibilityRecord>,
        election_id: ElectionId,
        voter_id: Id,
        session: &mut ClientSession,
    ) -> Result<bool> {
        let mut filter = Self::key_filter(election_id, voter_id);
        filter.insert("status", EligibilityStatus::Eligible);
        let update = doc! {
            "$set": {
                "status": EligibilityStatus::Voted,
            }
        };
        let result = records
            .update_one_with_session(filter, update, None, session)
            .await?;
        Ok(result.modified_count == 1)
    }
}
