//! Gateway seam for loading and persisting recipes
//!
//! The query gateway is an external service; the engine only needs the two
//! recipe operations below. [`crate::http::HttpGateway`] implements them over
//! HTTP, tests use in-memory implementations.

use async_trait::async_trait;

use crate::error::Result;
use crate::record::Recipe;

#[async_trait]
pub trait RecipeGateway: Send + Sync {
    /// Load every recipe visible to the current identity
    async fn load_recipes(&self) -> Result<Vec<Recipe>>;

    /// Overwrite the identity's recipe collection with `recipes`, in order
    ///
    /// Saving the same payload twice must leave the same state.
    async fn save_recipes(&self, recipes: &[Recipe]) -> Result<()>;
}
