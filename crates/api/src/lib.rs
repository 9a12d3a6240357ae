//! Herald HTTP surface.
//!
//! Exposes config, state, error handling and routes so the binary and the
//! integration tests build the same router.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
