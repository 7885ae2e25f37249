//! Application services: cached player queries and error mapping.

pub mod error;
pub mod players;
