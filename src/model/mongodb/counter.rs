use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
    ClientSession,
};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Coll;

/// Counter that allocates election IDs.
pub const ELECTION_ID_COUNTER_ID: &str = "election_id";
/// Counter that allocates the global vote sequence numbers.
pub const VOTE_SEQ_COUNTER_ID: &str = "vote_seq";

/// A counter object used to implement auto-increment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u64,
}

impl Counter {
    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> Result<u64> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| {
                Error::Status(
                    Status::InternalServerError,
                    format!("Failed to find counter with ID {id}"),
                )
            })?;
        Ok(counter.next)
    }

    /// Atomically reserve `count` consecutive values of the counter within
    /// the given session, returning the first value of the reserved range.
    pub async fn next_batch(
        counters: &Coll<Counter>,
        id: &str,
        count: u64,
        session: &mut ClientSession,
    ) -> Result<u64> {
        let update = doc! {
            "$inc": { "next": count as i64 }
        };
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update_with_session(doc! { "_id": id }, update, options, session)
            .await?
            .ok_or_else(|| {
                Error::Status(
                    Status::InternalServerError,
                    format!("Failed to find counter with ID {id}"),
                )
            })?;
        Ok(counter.next)
    }
}

/// Ensure the election ID and vote sequence counters exist, starting at 1.
///
/// This operation is idempotent.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> std::result::Result<(), DbError> {
    debug!("Ensuring ID counters exist");
    for id in [ELECTION_ID_COUNTER_ID, VOTE_SEQ_COUNTER_ID] {
        let update = doc! {
            "$setOnInsert": { "next": 1_i64 }
        };
        let options = UpdateOptions::builder().upsert(true).build();
        counters
            .update_one(doc! { "_id": id }, update, options)
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::Database;

    #[backend_test]
    async fn counter_increment(db: Database) {
        let counters = Coll::<Counter>::from_db(&db);

        // The launch setup created the counters starting at 1.
        let next = Counter::next(&counters, ELECTION_ID_COUNTER_ID)
            .await
            .unwrap();
        assert_eq!(next, 1);

        // Check the counter was incremented.
        let counter = counters
            .find_one(doc! { "_id": ELECTION_ID_COUNTER_ID }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, 2);

        // Re-running the setup must not reset it.
        ensure_counters_exist(&counters).await.unwrap();
        let counter = counters
            .find_one(doc! { "_id": ELECTION_ID_COUNTER_ID }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counter.next, 2);
    }
}
