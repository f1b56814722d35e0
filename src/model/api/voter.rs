use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::model::db::voter::NewVoter;

use super::admin::MIN_PASSWORD_LENGTH;

/// Raw voter credentials, used both to register and to log in.
/// Never stored directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct VoterCredentials {
    pub username: String,
    pub password: String,
}

impl TryFrom<VoterCredentials> for NewVoter {
    type Error = ();

    /// Convert [`VoterCredentials`] to a new [`Voter`](crate::model::db::voter::Voter)
    /// by hashing the password. The same username and password rules apply
    /// as for admins.
    fn try_from(cred: VoterCredentials) -> Result<Self, Self::Error> {
        if cred.username.is_empty() || cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(());
        }

        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default()).unwrap(); // Safe because the default `Config` is valid.
        Ok(Self {
            username: cred.username,
            password_hash,
        })
    }
}
