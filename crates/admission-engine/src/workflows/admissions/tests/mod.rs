mod common;
mod eligibility;
mod publication;
