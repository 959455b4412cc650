//! # Cookbook Common Library
//!
//! Shared code for the cookbook workspace including:
//! - Error types
//! - Event types (RecipeEvent enum) and the EventBus
//! - Query-gateway request/response types and session cookie signing
//! - Configuration loading
//! - Time and identifier helpers

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod time;

pub use error::{Error, Result};
