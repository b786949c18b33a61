pub mod admin;
pub mod compare;
pub mod health;
pub mod metrics;
pub mod project;
pub mod search;
