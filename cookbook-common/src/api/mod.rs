//! API module for the query gateway
//!
//! Provides the wire types exchanged with the gateway and the signed session
//! cookie scheme it uses to carry identity.
//!
//! # Design Principle
//!
//! This module contains ONLY pure functions and shared types. HTTP clients
//! live in the crates that talk to the gateway.

pub mod session;
pub mod types;

pub use session::{KeyRing, SESSION_COOKIE};
pub use types::{QueryError, QueryRequest, QueryResponse};
