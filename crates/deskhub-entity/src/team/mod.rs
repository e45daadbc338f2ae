//! Team domain entities.

pub mod model;
pub mod routing;

pub use model::{Team, TeamMember};
pub use routing::RoutingStrategy;
