//! BuchWart - Backend zur Verwaltung einer Bibliotheksausleihe.
//!
//! A token-authenticated REST API over SQLite: a book catalogue, physical
//! copies at shelf locations, borrow/return bookkeeping and user reviews.
//! Staff accounts manage the inventory; regular accounts browse and review.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
