pub mod admin;
pub mod election;
pub mod eligibility;
pub mod vote;
pub mod voter;
