//! Query/view state
//!
//! Sort key, direction and visibility filter. The state lives in the URL query
//! string so it survives reloads and can be shared as a link:
//!
//! | parameter   | values                          | default   |
//! |-------------|---------------------------------|-----------|
//! | `sort`      | `created`, `difficulty`, `name` | `created` |
//! | `direction` | `asc`, `desc`                   | `desc`    |
//! | `show`      | `my-recipes`                    | (all)     |
//!
//! Unknown values fall back to the default. Defaults are omitted when
//! serializing.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Created,
    Difficulty,
    Name,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Created, SortKey::Difficulty, SortKey::Name];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Created => "created",
            SortKey::Difficulty => "difficulty",
            SortKey::Name => "name",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(SortDirection::Asc),
            "desc" => Some(SortDirection::Desc),
            _ => None,
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Which records are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    All,
    /// Only records created by the current identity
    OnlyMine,
}

const SHOW_MINE: &str = "my-recipes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewState {
    pub sort: SortKey,
    pub direction: SortDirection,
    pub visibility: Visibility,
}

impl ViewState {
    /// Read view state from a query string (with or without leading `?`)
    ///
    /// # Examples
    ///
    /// ```
    /// use cookbook_sync::view::{SortDirection, SortKey, ViewState, Visibility};
    ///
    /// let view = ViewState::from_query("?sort=name&direction=asc&show=my-recipes");
    /// assert_eq!(view.sort, SortKey::Name);
    /// assert_eq!(view.direction, SortDirection::Asc);
    /// assert_eq!(view.visibility, Visibility::OnlyMine);
    /// ```
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut view = ViewState::default();

        // Parsed through a dummy base so percent-decoding matches browsers.
        let Ok(url) = Url::parse(&format!("http://view.local/?{}", query)) else {
            return view;
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "sort" => view.sort = SortKey::parse(&value).unwrap_or_default(),
                "direction" => view.direction = SortDirection::parse(&value).unwrap_or_default(),
                "show" => {
                    view.visibility = if value == SHOW_MINE {
                        Visibility::OnlyMine
                    } else {
                        Visibility::All
                    }
                }
                _ => {}
            }
        }

        view
    }

    /// Read view state from a full URL
    pub fn from_url(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| SyncError::InvalidInput(format!("Invalid URL: {}", e)))?;
        Ok(Self::from_query(url.query().unwrap_or("")))
    }

    /// Serialize to a query string without leading `?`, omitting defaults
    pub fn to_query(&self) -> String {
        // Every value is a fixed ASCII token, so no escaping is needed.
        let mut pairs = Vec::new();
        if self.sort != SortKey::default() {
            pairs.push(format!("sort={}", self.sort.as_str()));
        }
        if self.direction != SortDirection::default() {
            pairs.push(format!("direction={}", self.direction.as_str()));
        }
        if self.visibility == Visibility::OnlyMine {
            pairs.push(format!("show={}", SHOW_MINE));
        }
        pairs.join("&")
    }

    /// Sort button behavior: the active key flips direction, another key is
    /// selected keeping the current direction
    pub fn select_sort(&mut self, key: SortKey) {
        if self.sort == key {
            self.direction = self.direction.toggled();
        } else {
            self.sort = key;
        }
    }

    pub fn set_only_mine(&mut self, only_mine: bool) {
        self.visibility = if only_mine {
            Visibility::OnlyMine
        } else {
            Visibility::All
        };
    }
}
