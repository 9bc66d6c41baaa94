pub mod health;
pub mod hub;
pub mod negotiate;
pub mod sprint_plans;
