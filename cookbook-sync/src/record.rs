//! Recipe records
//!
//! A record's identifier is fixed at creation. Everything else can change
//! through a [`RecipePatch`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recipe entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Opaque client-generated identifier
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Ordinal difficulty, higher is harder
    #[serde(default = "default_difficulty")]
    pub difficulty: i64,
    /// Creation time
    pub created: DateTime<Utc>,
    /// Owner identity (email of the creating user)
    #[serde(default)]
    pub creator: Option<String>,
    /// Public link of the uploaded image, absent until an upload completes
    #[serde(default)]
    pub image: Option<String>,
    /// Recipe body (ingredients and steps)
    #[serde(default)]
    pub content: String,
}

pub(crate) fn default_difficulty() -> i64 {
    1
}

impl Recipe {
    /// Blank recipe as produced by the "create" action
    pub fn blank(id: String, creator: Option<String>, created: DateTime<Utc>) -> Self {
        Self {
            id,
            name: String::new(),
            difficulty: default_difficulty(),
            created,
            creator,
            image: None,
            content: String::new(),
        }
    }

    /// Whether `owner` created this record
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.creator.as_deref() == Some(owner)
    }
}

/// Partial update of a recipe
///
/// `None` leaves a field untouched. The identifier is deliberately not
/// patchable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipePatch {
    pub name: Option<String>,
    pub difficulty: Option<i64>,
    pub image: Option<String>,
    pub content: Option<String>,
}

impl RecipePatch {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn difficulty(difficulty: i64) -> Self {
        Self {
            difficulty: Some(difficulty),
            ..Self::default()
        }
    }

    pub fn image(link: impl Into<String>) -> Self {
        Self {
            image: Some(link.into()),
            ..Self::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn with_difficulty(mut self, difficulty: i64) -> Self {
        self.difficulty = Some(difficulty);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.difficulty.is_none()
            && self.image.is_none()
            && self.content.is_none()
    }

    /// Apply onto a record in place
    pub fn apply(&self, recipe: &mut Recipe) {
        if let Some(name) = &self.name {
            recipe.name = name.clone();
        }
        if let Some(difficulty) = self.difficulty {
            recipe.difficulty = difficulty;
        }
        if let Some(image) = &self.image {
            recipe.image = Some(image.clone());
        }
        if let Some(content) = &self.content {
            recipe.content = content.clone();
        }
    }
}
