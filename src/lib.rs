#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::Config;

use rocket::{Build, Rocket};

/// Construct the server: load the config, connect to the database, and
/// mount all API routes. The fairings report their own errors on failure.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(logging::LoggerFairing)
        .attach(config::ConfigFairing)
        .attach(config::DatabaseFairing)
}

/// Get a database client for tests, using the `db_uri` from the usual config.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let figment = rocket::build().figment().clone();
    let db_uri = figment
        .extract_inner::<String>("db_uri")
        .expect("`db_uri` not set");
    mongodb::Client::with_uri_str(&db_uri)
        .await
        .expect("Failed to connect to the database")
}

/// Get a fresh database name for a test, avoiding collisions between tests.
#[cfg(test)]
pub(crate) fn database() -> String {
    let random: u32 = rand::random();
    format!("test{random}")
}

/// Construct a rocket instance for tests against the given database,
/// performing the same launch-time setup as the `DatabaseFairing`.
#[cfg(test)]
pub(crate) async fn rocket_for_db(client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use model::{db::admin::ensure_admin_exists, mongodb::{ensure_counters_exist, ensure_indexes_exist, Coll}};

    let db = client.database(db_name);
    ensure_indexes_exist(&db).await.unwrap();
    ensure_admin_exists(&Coll::from_db(&db)).await.unwrap();
    ensure_counters_exist(&Coll::from_db(&db)).await.unwrap();

    rocket::build()
        .mount("/", api::routes())
        .attach(config::ConfigFairing)
        .manage(client)
        .manage(db)
}
