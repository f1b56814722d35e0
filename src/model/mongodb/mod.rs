mod bson;
mod collection;
mod counter;
pub mod errors;

pub use bson::{serde_string_map, u32_id_filter, Id};
pub use collection::{ensure_indexes_exist, Coll, MongoCollection};
pub use counter::{
    ensure_counters_exist, Counter, ELECTION_ID_COUNTER_ID, VOTE_SEQ_COUNTER_ID,
};
