use std::ops::{Deref, DerefMut};

use mongodb::{bson::doc, error::Error as DbError};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};

use crate::model::mongodb::{Coll, Id};

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because the only way to create an AdminCore is via
        // TryFrom<AdminCredentials>, so the hash is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// Ensure there is at least one admin to log in as, creating the default
/// admin with a random password (written to the log) if needed.
pub async fn ensure_admin_exists(admins: &Coll<NewAdmin>) -> Result<(), DbError> {
    let count = admins.count_documents(None, None).await?;
    if count > 0 {
        return Ok(());
    }

    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect();
    let salt: [u8; 16] = rand::random();
    let password_hash =
        argon2::hash_encoded(password.as_bytes(), &salt, &argon2::Config::default())
            .expect("Hashing with default settings is infallible");

    admins
        .insert_one(
            NewAdmin {
                username: DEFAULT_ADMIN_USERNAME.to_string(),
                password_hash,
            },
            None,
        )
        .await?;
    warn!("Created default admin '{DEFAULT_ADMIN_USERNAME}' with password '{password}'");
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::api::admin::AdminCredentials;

    impl AdminCore {
        pub fn example() -> Self {
            AdminCredentials::example1().try_into().unwrap()
        }

        pub fn example2() -> Self {
            AdminCredentials::example2().try_into().unwrap()
        }
    }
}
