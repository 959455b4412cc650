//! cookbook-sync library - client-side recipe synchronization engine
//!
//! Keeps a local recipe collection in step with the remote query gateway:
//! local mutations are batched into "save all" calls, images go straight to
//! object storage through single-use write capabilities, and the display
//! order is derived from the collection plus the current view state.
//!
//! [`RecipeBook`] is the entry point; the other modules are its parts.

pub mod engine;
pub mod error;
pub mod gateway;
pub mod http;
pub mod projector;
pub mod record;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod upload;
pub mod view;

pub use engine::{BookOptions, BookStatus, RecipeBook};
pub use error::{Result, SyncError};
pub use gateway::RecipeGateway;
pub use record::{Recipe, RecipePatch};
pub use upload::{CredentialIssuer, ObjectStore, UploadFile, WriteCapability};
pub use view::{SortDirection, SortKey, ViewState, Visibility};
