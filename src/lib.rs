//! prim_engine: participant records over HTTP, keyed by opaque external ids.

pub mod api;
pub mod auth;
pub mod config;
pub mod db_migration;
pub mod domains;
pub mod errors;
pub mod server;
pub mod validation;

pub use config::Config;
pub use server::{AppState, Server};
