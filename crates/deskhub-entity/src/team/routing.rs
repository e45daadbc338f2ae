//! Ticket routing strategy enumeration.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Per-team policy governing automatic ticket assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "routing_strategy", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// No automatic assignment; an agent picks the ticket up manually.
    Manual,
    /// Assign to the eligible agent with the fewest open tickets.
    LoadBalanced,
    /// Rotate through eligible agents in id order.
    RoundRobin,
}

impl RoutingStrategy {
    /// Return the strategy as its wire/database string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::LoadBalanced => "load_balanced",
            Self::RoundRobin => "round_robin",
        }
    }
}

impl FromStr for RoutingStrategy {
    type Err = deskhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "load_balanced" => Ok(Self::LoadBalanced),
            "round_robin" => Ok(Self::RoundRobin),
            _ => Err(deskhub_core::AppError::validation(format!(
                "Invalid routing strategy: '{s}'. Expected one of: manual, load_balanced, round_robin"
            ))),
        }
    }
}

impl Default for RoutingStrategy {
    fn default() -> Self {
        Self::Manual
    }
}
