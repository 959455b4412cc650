//! Sort/View Projector
//!
//! Derives the display order of the record store. The projection is a
//! rebuildable cache; the store stays the source of truth.
//!
//! While a record is being edited, positions are frozen so the edited record
//! does not jump around as its sort key changes (renaming "Soup" to
//! "Zucchini Soup" under name ordering keeps it where it was). Slot contents
//! are still refreshed from the store by identifier.
//!
//! The owner-only filter is applied on read and never feeds back into the
//! cached order.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::record::Recipe;
use crate::view::{SortDirection, SortKey, ViewState, Visibility};

#[derive(Debug, Default)]
pub struct Projector {
    cache: Vec<Recipe>,
}

impl Projector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the projection after a store or view change
    pub fn project(
        &mut self,
        records: &[Recipe],
        view: &ViewState,
        edit_target: Option<&str>,
    ) -> &[Recipe] {
        match edit_target {
            Some(target) if self.cache.iter().any(|r| r.id == target) => {
                self.refresh_frozen(records);
            }
            _ => {
                self.cache = sorted(records, view.sort, view.direction);
            }
        }
        &self.cache
    }

    /// Last computed projection
    pub fn projection(&self) -> &[Recipe] {
        &self.cache
    }

    /// Position of a record in the last projection
    pub fn position(&self, id: &str) -> Option<usize> {
        self.cache.iter().position(|r| r.id == id)
    }

    /// Records to render under a visibility filter
    ///
    /// With [`Visibility::OnlyMine`] and no signed-in owner nothing is visible.
    pub fn visible<'a>(
        &'a self,
        visibility: Visibility,
        owner: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Recipe> + 'a {
        self.cache.iter().filter(move |recipe| match visibility {
            Visibility::All => true,
            Visibility::OnlyMine => owner.is_some_and(|o| recipe.is_owned_by(o)),
        })
    }

    /// Keep cached positions, refresh contents by id
    ///
    /// Records removed from the store drop out; records new to the store are
    /// appended in store order.
    fn refresh_frozen(&mut self, records: &[Recipe]) {
        let by_id: HashMap<&str, &Recipe> = records.iter().map(|r| (r.id.as_str(), r)).collect();

        let mut refreshed: Vec<Recipe> = self
            .cache
            .iter()
            .filter_map(|cached| by_id.get(cached.id.as_str()).map(|r| (*r).clone()))
            .collect();

        let known: HashSet<&str> = self.cache.iter().map(|r| r.id.as_str()).collect();
        refreshed.extend(records.iter().filter(|r| !known.contains(r.id.as_str())).cloned());

        self.cache = refreshed;
    }
}

/// Full stable sort of a record set
pub fn sorted(records: &[Recipe], key: SortKey, direction: SortDirection) -> Vec<Recipe> {
    let mut out = records.to_vec();
    out.sort_by(|a, b| compare(a, b, key, direction));
    out
}

/// Compare two records under a sort key and direction
///
/// Equal keys compare `Equal` in both directions, so the stable sort keeps
/// store order among ties.
pub fn compare(a: &Recipe, b: &Recipe, key: SortKey, direction: SortDirection) -> Ordering {
    let ordering = match key {
        SortKey::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
        SortKey::Difficulty => a.difficulty.cmp(&b.difficulty),
        SortKey::Created => a.created.cmp(&b.created),
    };

    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecipePatch;
    use chrono::{Duration, TimeZone, Utc};

    fn recipe(id: &str, name: &str, difficulty: i64, age_days: i64) -> Recipe {
        let base = Utc.with_ymd_and_hms(2021, 6, 1, 12, 0, 0).unwrap();
        Recipe {
            name: name.to_string(),
            difficulty,
            ..Recipe::blank(id.to_string(), None, base - Duration::days(age_days))
        }
    }

    fn ids(records: &[Recipe]) -> Vec<&str> {
        records.iter().map(|r| r.id.as_str()).collect()
    }

    fn sample() -> Vec<Recipe> {
        vec![
            recipe("r1", "soup", 2, 3),
            recipe("r2", "Apple pie", 3, 1),
            recipe("r3", "bread", 1, 2),
        ]
    }

    fn view(sort: SortKey, direction: SortDirection) -> ViewState {
        ViewState {
            sort,
            direction,
            ..ViewState::default()
        }
    }

    #[test]
    fn test_default_view_is_newest_first() {
        let mut projector = Projector::new();
        let projected = projector.project(&sample(), &ViewState::default(), None);
        assert_eq!(ids(projected), vec!["r2", "r3", "r1"]);
    }

    #[test]
    fn test_name_sort_is_case_insensitive() {
        let mut projector = Projector::new();
        let projected = projector.project(&sample(), &view(SortKey::Name, SortDirection::Asc), None);
        assert_eq!(ids(projected), vec!["r2", "r3", "r1"]);

        let projected = projector.project(&sample(), &view(SortKey::Name, SortDirection::Desc), None);
        assert_eq!(ids(projected), vec!["r1", "r3", "r2"]);
    }

    #[test]
    fn test_difficulty_sort_both_directions() {
        let mut projector = Projector::new();
        let asc = projector
            .project(&sample(), &view(SortKey::Difficulty, SortDirection::Asc), None)
            .to_vec();
        assert_eq!(ids(&asc), vec!["r3", "r1", "r2"]);

        let desc = projector.project(&sample(), &view(SortKey::Difficulty, SortDirection::Desc), None);
        assert_eq!(ids(desc), vec!["r2", "r1", "r3"]);
    }

    #[test]
    fn test_projection_is_deterministic_for_every_key_and_direction() {
        let mut records = sample();
        records.push(recipe("r4", "Soup", 2, 3));
        records.push(recipe("r5", "BREAD", 1, 2));

        for key in SortKey::ALL {
            for direction in [SortDirection::Asc, SortDirection::Desc] {
                let mut first = Projector::new();
                let mut second = Projector::new();
                let a = first.project(&records, &view(key, direction), None).to_vec();
                let b = second.project(&records, &view(key, direction), None).to_vec();
                assert_eq!(ids(&a), ids(&b), "{:?} {:?}", key, direction);
            }
        }
    }

    #[test]
    fn test_equal_names_keep_store_order_in_both_directions() {
        let records = vec![recipe("a", "Soup", 1, 0), recipe("b", "soup", 1, 0)];
        let mut projector = Projector::new();

        let asc = projector
            .project(&records, &view(SortKey::Name, SortDirection::Asc), None)
            .to_vec();
        assert_eq!(ids(&asc), vec!["a", "b"]);

        let desc = projector.project(&records, &view(SortKey::Name, SortDirection::Desc), None);
        assert_eq!(ids(desc), vec!["a", "b"]);
    }

    #[test]
    fn test_edit_freezes_positions() {
        let mut records = sample();
        let by_name = view(SortKey::Name, SortDirection::Asc);
        let mut projector = Projector::new();
        let before = ids(projector.project(&records, &by_name, None))
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        // "Apple pie" renamed to sort last alphabetically
        for name in ["Z", "Zu", "Zucchini Soup"] {
            RecipePatch::name(name).apply(&mut records[1]);
            let projected = projector.project(&records, &by_name, Some("r2"));
            assert_eq!(ids(projected), before.iter().map(String::as_str).collect::<Vec<_>>());
        }

        assert_eq!(projector.projection()[0].name, "Zucchini Soup");

        let after = projector.project(&records, &by_name, None);
        assert_eq!(ids(after), vec!["r3", "r1", "r2"]);
    }

    #[test]
    fn test_edit_ignores_sort_changes() {
        let records = sample();
        let mut projector = Projector::new();
        projector.project(&records, &ViewState::default(), None);

        let projected = projector.project(&records, &view(SortKey::Name, SortDirection::Asc), Some("r1"));
        assert_eq!(ids(projected), vec!["r2", "r3", "r1"]);
    }

    #[test]
    fn test_frozen_projection_tracks_additions_and_removals() {
        let mut records = sample();
        let mut projector = Projector::new();
        projector.project(&records, &ViewState::default(), None);

        records.retain(|r| r.id != "r3");
        records.push(recipe("r9", "new", 1, 0));
        let projected = projector.project(&records, &ViewState::default(), Some("r1"));
        assert_eq!(ids(projected), vec!["r2", "r1", "r9"]);
    }

    #[test]
    fn test_unknown_edit_target_falls_back_to_full_sort() {
        let records = sample();
        let mut projector = Projector::new();
        let projected = projector.project(&records, &ViewState::default(), Some("missing"));
        assert_eq!(ids(projected), vec!["r2", "r3", "r1"]);
    }

    #[test]
    fn test_visibility_filter_does_not_touch_order() {
        let mut records = sample();
        records[0].creator = Some("me@x".to_string());
        records[2].creator = Some("me@x".to_string());

        let mut projector = Projector::new();
        projector.project(&records, &ViewState::default(), None);
        let before = ids(projector.projection())
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mine: Vec<&str> = projector
            .visible(Visibility::OnlyMine, Some("me@x"))
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(mine, vec!["r3", "r1"]);

        let all = projector.visible(Visibility::All, Some("me@x")).count();
        assert_eq!(all, 3);
        assert_eq!(
            ids(projector.projection()),
            before.iter().map(String::as_str).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_only_mine_without_owner_is_empty() {
        let mut projector = Projector::new();
        projector.project(&sample(), &ViewState::default(), None);
        assert_eq!(projector.visible(Visibility::OnlyMine, None).count(), 0);
    }
}
