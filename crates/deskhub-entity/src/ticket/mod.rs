//! Ticket domain entities.

pub mod model;
pub mod status;

pub use model::{CreateTicket, Ticket};
pub use status::TicketStatus;
