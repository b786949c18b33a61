//! Cast and crew comparison across TMDB productions.

pub mod cache;
pub mod compare;
pub mod config;
pub mod credits;
pub mod enrich;
pub mod error;
pub mod http_retry;
pub mod metrics;
pub mod models;
pub mod provider;
pub mod search;
pub mod server;
pub mod tmdb;
