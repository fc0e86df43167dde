//! API server for GreenHop.
//!
//! Provides the REST endpoints polled by the dashboard and used by the CLI.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
