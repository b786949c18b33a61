//! TMDB v3 upstream client and its wire models.

mod client;
pub mod models;

pub use client::TmdbClient;
