pub mod admin;
pub mod auth;
pub mod ballot;
pub mod election;
pub mod receipt;
pub mod voter;
