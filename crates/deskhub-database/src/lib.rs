//! # deskhub-database
//!
//! PostgreSQL database connection management and concrete store
//! implementations for the DeskHub relay.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
