//! # deskhub-entity
//!
//! Domain entity models for DeskHub. Every struct in this crate represents
//! a database table row or a domain value object. All database entities
//! derive `Debug`, `Clone`, `Serialize`, `Deserialize`, and
//! `sqlx::FromRow`; enums map to PostgreSQL enum types via `sqlx::Type`.

pub mod chatbot;
pub mod conversation;
pub mod notification;
pub mod session;
pub mod subscription;
pub mod team;
pub mod ticket;
pub mod user;
pub mod widget;
