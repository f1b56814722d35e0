use rocket::Route;

mod admin;
pub mod auth;
mod elections;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(admin::routes());
    routes.extend(elections::routes());
    routes.extend(voting::routes());
    routes
}
