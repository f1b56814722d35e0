pub mod election;
pub mod eligibility;
