use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::{Admin, NewAdmin},
    election::{Election, ElectionMetadata},
    eligibility::EligibilityRecord,
    vote::VoteRecord,
    voter::{NewVoter, Voter},
};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Admin collections
const ADMINS: &str = "admins";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINS;
}
impl MongoCollection for NewAdmin {
    const NAME: &'static str = ADMINS;
}

// Voter collections
const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}
impl MongoCollection for NewVoter {
    const NAME: &'static str = VOTERS;
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for ElectionMetadata {
    const NAME: &'static str = ELECTIONS;
}

// Eligibility collection
const ELIGIBILITY: &str = "eligibility";
impl MongoCollection for EligibilityRecord {
    const NAME: &'static str = ELIGIBILITY;
}

// Vote ledger collection
const VOTES: &str = "votes";
impl MongoCollection for VoteRecord {
    const NAME: &'static str = VOTES;
}

// Counter collection
const COUNTERS: &str = "counters";
impl MongoCollection for Counter {
    const NAME: &'static str = COUNTERS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter collection.
    let voter_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Admin collection.
    let admin_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique.clone())
        .build();
    Coll::<Admin>::from_db(db)
        .create_index(admin_index, None)
        .await?;

    // Eligibility collection: at most one record per (election, voter).
    let eligibility_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "voter_id": 1})
        .options(unique.clone())
        .build();
    Coll::<EligibilityRecord>::from_db(db)
        .create_index(eligibility_index, None)
        .await?;

    // Vote ledger: the global sequence is strictly unique, and a voter can
    // pick a given candidate in a given contest at most once.
    let vote_seq_index = IndexModel::builder()
        .keys(doc! {"seq": 1})
        .options(unique.clone())
        .build();
    let vote_pick_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "voter_id": 1, "contest_id": 1, "candidate": 1})
        .options(unique.clone())
        .build();
    let votes = Coll::<VoteRecord>::from_db(db);
    votes.create_index(vote_seq_index, None).await?;
    votes.create_index(vote_pick_index, None).await?;

    Ok(())
}
