//! Chat widget domain entities.

pub mod model;

pub use model::Widget;
