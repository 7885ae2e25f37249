//! Chess.com statistics API with a stale-while-revalidate response cache.

pub mod application;
pub mod cache;
pub mod config;
pub mod infra;
pub mod upstream;
