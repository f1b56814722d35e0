use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    config::Config,
    error::{Error, Result},
    model::{
        api::{
            admin::AdminCredentials,
            auth::{AuthToken, AUTH_TOKEN_COOKIE},
            voter::VoterCredentials,
        },
        db::{
            admin::Admin,
            voter::{NewVoter, Voter},
        },
        mongodb::{errors::is_duplicate_key_error, Coll, Id},
    },
};

pub fn routes() -> Vec<Route> {
    routes![authenticate, register_voter, login_voter, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let with_username = doc! {
        "username": &credentials.username
    };

    let admin = admins
        .find_one(with_username, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No admin found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config));

    Ok(())
}

/// Register a new voter account and log them in. The username is claimed
/// atomically by the unique index, so a race between two registrations
/// produces exactly one account.
#[post("/auth/voter/register", data = "<credentials>", format = "json")]
pub async fn register_voter(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterCredentials>,
    voters: Coll<Voter>,
    new_voters: Coll<NewVoter>,
    config: &State<Config>,
) -> Result<()> {
    let new_voter: NewVoter = credentials.into_inner().try_into().map_err(|_| {
        Error::Status(
            Status::BadRequest,
            "Voter credentials do not meet the username and password requirements.".to_string(),
        )
    })?;

    let new_id: Id = match new_voters.insert_one(&new_voter, None).await {
        Ok(result) => result
            .inserted_id
            .as_object_id()
            .unwrap() // Safe because the ID comes directly from the database.
            .into(),
        Err(err) if is_duplicate_key_error(&err) => {
            return Err(Error::Status(
                Status::Conflict,
                format!("Username '{}' is already taken.", new_voter.username),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    // Unwrap safe because we just inserted this voter.
    let voter = voters.find_one(new_id.as_doc(), None).await?.unwrap();
    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config));

    Ok(())
}

#[post("/auth/voter", data = "<credentials>", format = "json")]
pub async fn login_voter(
    cookies: &CookieJar<'_>,
    credentials: Json<VoterCredentials>,
    voters: Coll<Voter>,
    config: &State<Config>,
) -> Result<()> {
    let with_username = doc! {
        "username": &credentials.username
    };

    let voter = voters
        .find_one(with_username, None)
        .await?
        .filter(|voter| voter.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No voter found with the provided username and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&voter);
    cookies.add(token.into_cookie(config));

    Ok(())
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

#[cfg(test)]
mod tests {
    use rocket::{http::ContentType, local::asynchronous::Client, serde::json::serde_json::json};

    use crate::model::db::admin::NewAdmin;

    use super::*;

    #[backend_test]
    async fn admin_authenticate_valid(client: Client, admins: Coll<NewAdmin>) {
        // Ensure there is an admin to login as
        admins.insert_one(NewAdmin::example(), None).await.unwrap();

        // Use valid credentials to attempt admin login
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::example1()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn admin_authenticate_invalid(client: Client, admins: Coll<NewAdmin>) {
        // Ensure there is an admin to fail to login as
        admins.insert_one(NewAdmin::example(), None).await.unwrap();

        // Use invalid username to attempt admin login
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(json!(AdminCredentials::empty()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        // Use invalid password to attempt admin login
        let response = client
            .post(uri!(authenticate))
            .header(ContentType::JSON)
            .body(
                json! ({
                    "username": &NewAdmin::example().username,
                    "password": "",
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn voter_register_and_login(client: Client, voters: Coll<Voter>) {
        // Register a new voter
        let response = client
            .post(uri!(register_voter))
            .header(ContentType::JSON)
            .body(json!(VoterCredentials::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());

        // Check the voter was inserted
        let voter = voters
            .find_one(doc! { "username": &VoterCredentials::example().username }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(voter.verify_password(&VoterCredentials::example().password));

        // Log out and back in
        client.delete(uri!(logout)).dispatch().await;
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));

        let response = client
            .post(uri!(login_voter))
            .header(ContentType::JSON)
            .body(json!(VoterCredentials::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Ok, response.status());
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn voter_register_duplicate_username(client: Client) {
        let response = client
            .post(uri!(register_voter))
            .header(ContentType::JSON)
            .body(json!(VoterCredentials::example()).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());

        // Same username again must be rejected.
        let response = client
            .post(uri!(register_voter))
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": &VoterCredentials::example().username,
                    "password": "anotherpassword",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(Status::Conflict, response.status());
    }

    #[backend_test]
    async fn voter_register_invalid_credentials(client: Client) {
        let response = client
            .post(uri!(register_voter))
            .header(ContentType::JSON)
            .body(json!(VoterCredentials::empty()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn voter_login_invalid(client: Client) {
        let response = client
            .post(uri!(login_voter))
            .header(ContentType::JSON)
            .body(json!(VoterCredentials::example()).to_string())
            .dispatch()
            .await;

        assert_eq!(Status::Unauthorized, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test(admin)]
    async fn logout_admin(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
        assert_eq!(None, client.cookies().get(AUTH_TOKEN_COOKIE));
    }

    #[backend_test]
    async fn logout_not_logged_in(client: Client) {
        let response = client.delete(uri!(logout)).dispatch().await;

        assert_eq!(Status::Ok, response.status());
    }
}
