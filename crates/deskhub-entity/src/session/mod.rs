//! Widget contact session domain entities.

pub mod model;

pub use model::{ContactSession, SessionContext};
