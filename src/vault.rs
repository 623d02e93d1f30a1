//! The Vault: library derivation engine.
//!
//! Pure function of the library snapshot, the classification labels, the
//! blacklist, the metadata cache and the search state, producing the
//! ordered, filtered, optionally grouped view the shell renders. No network
//! or storage access; safe to call on every input change; identical inputs
//! always yield identical output.
//!
//! Pipeline:
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        VAULT                             │
//! ├──────────────────────────────────────────────────────────┤
//! │  Filter   name query → genre selection → category        │
//! ├──────────────────────────────────────────────────────────┤
//! │  Sort     stable, appid tie-break                        │
//! ├──────────────────────────────────────────────────────────┤
//! │  Group    none │ first letter │ completion status        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The blacklist never narrows a non-blacklist filter: it affects
//! presentation and launch eligibility, not inclusion.

use crate::mastery::Classification;
use crate::model::{AppId, Game, GameMetadata};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

// ============================================================================
// SEARCH STATE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Lifetime playtime, most played first.
    #[default]
    Engagement,
    /// Case-folded name, A first.
    Alpha,
    /// Two-week playtime, most recent first.
    Recency,
    /// Install size, largest first; unsized games last.
    Size,
    /// Review score, best first; unscored games last.
    Quality,
    /// Release date, newest first; undated games last.
    ReleaseDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterKey {
    #[default]
    All,
    Mastered,
    Active,
    Hunter,
    Blacklisted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupKey {
    #[default]
    None,
    Alpha,
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tab {
    #[default]
    Overview,
    Library,
    Stats,
    Discover,
    Blacklist,
}

/// Externally-owned search state; the engine only consumes it. Serializes
/// in kebab-case so it can bind to navigable application state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultState {
    pub query: String,
    pub sort: SortKey,
    pub filter: FilterKey,
    pub group: GroupKey,
    pub genres: BTreeSet<String>,
    pub selected: Option<AppId>,
    pub tab: Tab,
}

// ============================================================================
// VIEW MODEL
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaultGroup<'a> {
    /// `None` for the single implicit group when grouping is off.
    pub label: Option<String>,
    pub games: Vec<&'a Game>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VaultView<'a> {
    /// Post-filter, pre-group count, exposed for display.
    pub total: usize,
    pub groups: Vec<VaultGroup<'a>>,
    /// Resolved against the full library, not the filtered set.
    pub selected: Option<&'a Game>,
}

impl<'a> VaultView<'a> {
    /// All games in view order, across groups.
    pub fn games(&self) -> impl Iterator<Item = &'a Game> + '_ {
        self.groups.iter().flat_map(|g| g.games.iter().copied())
    }
}

// ============================================================================
// DERIVATION
// ============================================================================

pub fn derive<'a>(
    library: &'a [Game],
    classification: &Classification,
    blacklist: &BTreeSet<AppId>,
    metadata: &HashMap<AppId, GameMetadata>,
    state: &VaultState,
) -> VaultView<'a> {
    let needle = state.query.to_lowercase();

    let mut result: Vec<&Game> = library
        .iter()
        .filter(|g| needle.is_empty() || g.name.to_lowercase().contains(&needle))
        .filter(|g| genre_match(g, metadata, &state.genres))
        .filter(|g| match state.filter {
            FilterKey::All => true,
            FilterKey::Mastered => classification.is_mastered(g.appid),
            FilterKey::Active => g.recently_played(),
            FilterKey::Hunter => classification.is_hunter(g.appid),
            FilterKey::Blacklisted => blacklist.contains(&g.appid),
        })
        .collect();

    let total = result.len();
    sort_games(&mut result, state.sort, metadata);

    VaultView {
        total,
        groups: group_games(result, state.group, classification),
        selected: state.selected.and_then(|id| library.iter().find(|g| g.appid == id)),
    }
}

/// An empty selection matches everything; a non-empty one requires cached
/// metadata whose genre list intersects it.
fn genre_match(game: &Game, metadata: &HashMap<AppId, GameMetadata>, selected: &BTreeSet<String>) -> bool {
    if selected.is_empty() {
        return true;
    }
    metadata
        .get(&game.appid)
        .map(|meta| meta.genres.iter().any(|g| selected.contains(g)))
        .unwrap_or(false)
}

fn sort_games(games: &mut [&Game], key: SortKey, metadata: &HashMap<AppId, GameMetadata>) {
    match key {
        SortKey::Engagement => games.sort_by(|a, b| {
            b.playtime_forever.cmp(&a.playtime_forever).then(a.appid.cmp(&b.appid))
        }),
        SortKey::Alpha => games.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then(a.appid.cmp(&b.appid))
        }),
        SortKey::Recency => games.sort_by(|a, b| {
            b.playtime_2weeks
                .unwrap_or(0)
                .cmp(&a.playtime_2weeks.unwrap_or(0))
                .then(a.appid.cmp(&b.appid))
        }),
        SortKey::Size => sort_by_field(games, metadata, |m| m.size_mb),
        SortKey::Quality => sort_by_field(games, metadata, |m| m.metacritic_score),
        SortKey::ReleaseDate => sort_by_field(games, metadata, |m| m.release_date),
    }
}

/// Descending by a metadata field. Games lacking the field sort after those
/// with it and keep their prior stable order among themselves, so no appid
/// tie-break applies to that tail.
fn sort_by_field<T, F>(games: &mut [&Game], metadata: &HashMap<AppId, GameMetadata>, field: F)
where
    T: Ord,
    F: Fn(&GameMetadata) -> Option<T>,
{
    games.sort_by(|a, b| {
        let fa = metadata.get(&a.appid).and_then(&field);
        let fb = metadata.get(&b.appid).and_then(&field);
        match (fa, fb) {
            (Some(x), Some(y)) => y.cmp(&x).then(a.appid.cmp(&b.appid)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
}

fn group_games<'a>(
    games: Vec<&'a Game>,
    key: GroupKey,
    classification: &Classification,
) -> Vec<VaultGroup<'a>> {
    match key {
        GroupKey::None => vec![VaultGroup { label: None, games }],
        GroupKey::Alpha => {
            let mut letters: BTreeMap<char, Vec<&Game>> = BTreeMap::new();
            let mut other: Vec<&Game> = Vec::new();
            for game in games {
                match first_letter(&game.name) {
                    Some(letter) => letters.entry(letter).or_default().push(game),
                    None => other.push(game),
                }
            }
            let mut groups: Vec<VaultGroup<'a>> = letters
                .into_iter()
                .map(|(letter, games)| VaultGroup { label: Some(letter.to_string()), games })
                .collect();
            if !other.is_empty() {
                groups.push(VaultGroup { label: Some("#".to_string()), games: other });
            }
            groups
        }
        GroupKey::Status => {
            let mut mastered = Vec::new();
            let mut in_progress = Vec::new();
            let mut untouched = Vec::new();
            for game in games {
                // mastered takes precedence over recent play
                if classification.is_mastered(game.appid) {
                    mastered.push(game);
                } else if game.recently_played() {
                    in_progress.push(game);
                } else {
                    untouched.push(game);
                }
            }
            [("Mastered", mastered), ("In Progress", in_progress), ("Untouched", untouched)]
                .into_iter()
                .filter(|(_, games)| !games.is_empty())
                .map(|(label, games)| VaultGroup { label: Some(label.to_string()), games })
                .collect()
        }
    }
}

fn first_letter(name: &str) -> Option<char> {
    let first = name.chars().next()?;
    first.is_ascii_alphabetic().then(|| first.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn game(appid: AppId, name: &str, forever: u32, recent: Option<u32>) -> Game {
        Game {
            appid,
            name: name.to_string(),
            playtime_forever: forever,
            playtime_2weeks: recent,
            ..Game::default()
        }
    }

    fn meta(appid: AppId, genres: &[&str]) -> GameMetadata {
        GameMetadata {
            appid,
            genres: genres.iter().map(|g| g.to_string()).collect(),
            ..GameMetadata::default()
        }
    }

    fn classification(mastered: &[AppId], hunter: &[AppId]) -> Classification {
        Classification {
            mastered: mastered.iter().copied().collect(),
            hunter: hunter.iter().copied().collect(),
        }
    }

    fn ids(view: &VaultView<'_>) -> Vec<AppId> {
        view.games().map(|g| g.appid).collect()
    }

    #[test]
    fn empty_query_and_all_filter_keep_everything() {
        let library = vec![game(10, "Alpha", 1, None), game(20, "Beta", 2, None)];
        let view = derive(
            &library,
            &Classification::default(),
            &BTreeSet::new(),
            &HashMap::new(),
            &VaultState::default(),
        );
        assert_eq!(view.total, library.len());
    }

    #[test]
    fn engagement_sort_orders_by_lifetime_playtime() {
        let library = vec![game(10, "Alpha", 600, None), game(20, "Beta", 6000, None)];
        let view = derive(
            &library,
            &Classification::default(),
            &BTreeSet::new(),
            &HashMap::new(),
            &VaultState::default(),
        );
        assert_eq!(ids(&view), vec![20, 10]);
    }

    #[test]
    fn name_filter_is_case_insensitive_substring() {
        let library = vec![game(10, "Elden Ring", 0, None), game(20, "Sekiro", 0, None)];
        let state = VaultState { query: "ring".to_string(), ..VaultState::default() };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &HashMap::new(), &state);
        assert_eq!(ids(&view), vec![10]);
    }

    #[test]
    fn alpha_sort_breaks_name_ties_by_appid() {
        let library = vec![game(20, "Same", 0, None), game(10, "Same", 0, None)];
        let state = VaultState { sort: SortKey::Alpha, ..VaultState::default() };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &HashMap::new(), &state);
        assert_eq!(ids(&view), vec![10, 20]);
    }

    #[test]
    fn derive_is_deterministic() {
        let library = vec![
            game(30, "Gamma", 50, Some(5)),
            game(10, "Alpha", 100, None),
            game(20, "Beta", 100, Some(1)),
        ];
        let classification = classification(&[10], &[20]);
        let metadata: HashMap<AppId, GameMetadata> =
            [(10, meta(10, &["RPG"]))].into_iter().collect();
        let state = VaultState { group: GroupKey::Status, ..VaultState::default() };

        let first = derive(&library, &classification, &BTreeSet::new(), &metadata, &state);
        let second = derive(&library, &classification, &BTreeSet::new(), &metadata, &state);
        assert_eq!(first, second);
    }

    #[test]
    fn blacklist_does_not_narrow_other_filters() {
        let library = vec![game(10, "Alpha", 100, Some(30))];
        let blacklist: BTreeSet<AppId> = [10].into_iter().collect();

        let active = VaultState { filter: FilterKey::Active, ..VaultState::default() };
        let view = derive(&library, &Classification::default(), &blacklist, &HashMap::new(), &active);
        assert_eq!(ids(&view), vec![10]);

        let listed = VaultState { filter: FilterKey::Blacklisted, ..VaultState::default() };
        let view = derive(&library, &Classification::default(), &blacklist, &HashMap::new(), &listed);
        assert_eq!(ids(&view), vec![10]);

        // mastered filter only admits it if it is actually mastered
        let mastered = VaultState { filter: FilterKey::Mastered, ..VaultState::default() };
        let view = derive(&library, &Classification::default(), &blacklist, &HashMap::new(), &mastered);
        assert!(ids(&view).is_empty());
        let view = derive(&library, &classification(&[10], &[]), &blacklist, &HashMap::new(), &mastered);
        assert_eq!(ids(&view), vec![10]);
    }

    #[test]
    fn genre_filter_without_cached_metadata_excludes_everything() {
        let library = vec![game(10, "Alpha", 0, None), game(20, "Beta", 0, None)];
        let state = VaultState {
            genres: ["RPG".to_string()].into_iter().collect(),
            ..VaultState::default()
        };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &HashMap::new(), &state);
        assert_eq!(view.total, 0);
    }

    #[test]
    fn genre_filter_intersects_cached_genres() {
        let library = vec![game(10, "Alpha", 0, None), game(20, "Beta", 0, None)];
        let metadata: HashMap<AppId, GameMetadata> = [
            (10, meta(10, &["RPG", "Action"])),
            (20, meta(20, &["Racing"])),
        ]
        .into_iter()
        .collect();
        let state = VaultState {
            genres: ["RPG".to_string()].into_iter().collect(),
            ..VaultState::default()
        };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &metadata, &state);
        assert_eq!(ids(&view), vec![10]);
    }

    #[test]
    fn hunter_filter_uses_classification_membership() {
        let library = vec![game(10, "Alpha", 0, None), game(20, "Beta", 0, None)];
        let state = VaultState { filter: FilterKey::Hunter, ..VaultState::default() };
        let view = derive(&library, &classification(&[], &[20]), &BTreeSet::new(), &HashMap::new(), &state);
        assert_eq!(ids(&view), vec![20]);
    }

    #[test]
    fn recency_sort_treats_missing_window_as_zero() {
        let library = vec![game(10, "Alpha", 0, None), game(20, "Beta", 0, Some(10))];
        let state = VaultState { sort: SortKey::Recency, ..VaultState::default() };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &HashMap::new(), &state);
        assert_eq!(ids(&view), vec![20, 10]);
    }

    #[test]
    fn metadata_sort_puts_field_less_games_last_in_prior_order() {
        let library = vec![
            game(40, "Delta", 0, None),
            game(10, "Alpha", 0, None),
            game(20, "Beta", 0, None),
            game(30, "Gamma", 0, None),
        ];
        let metadata: HashMap<AppId, GameMetadata> = [
            (10, GameMetadata { appid: 10, metacritic_score: Some(70), ..GameMetadata::default() }),
            (30, GameMetadata { appid: 30, metacritic_score: Some(95), ..GameMetadata::default() }),
        ]
        .into_iter()
        .collect();
        let state = VaultState { sort: SortKey::Quality, ..VaultState::default() };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &metadata, &state);
        // scored games first (descending), the rest keep library order
        assert_eq!(ids(&view), vec![30, 10, 40, 20]);
    }

    #[test]
    fn release_date_sort_is_newest_first() {
        let library = vec![game(10, "Alpha", 0, None), game(20, "Beta", 0, None)];
        let metadata: HashMap<AppId, GameMetadata> = [
            (10, GameMetadata {
                appid: 10,
                release_date: NaiveDate::from_ymd_opt(2015, 3, 1),
                ..GameMetadata::default()
            }),
            (20, GameMetadata {
                appid: 20,
                release_date: NaiveDate::from_ymd_opt(2022, 2, 25),
                ..GameMetadata::default()
            }),
        ]
        .into_iter()
        .collect();
        let state = VaultState { sort: SortKey::ReleaseDate, ..VaultState::default() };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &metadata, &state);
        assert_eq!(ids(&view), vec![20, 10]);
    }

    #[test]
    fn status_grouping_gives_mastered_precedence() {
        let library = vec![
            game(10, "Alpha", 100, Some(30)),
            game(20, "Beta", 50, Some(10)),
            game(30, "Gamma", 10, None),
        ];
        let state = VaultState { group: GroupKey::Status, ..VaultState::default() };
        let view = derive(&library, &classification(&[10], &[]), &BTreeSet::new(), &HashMap::new(), &state);

        let labels: Vec<_> = view.groups.iter().map(|g| g.label.as_deref().unwrap()).collect();
        assert_eq!(labels, ["Mastered", "In Progress", "Untouched"]);
        assert_eq!(view.groups[0].games[0].appid, 10);
        // mastered-and-recent game 10 must not reappear under In Progress
        assert!(view.groups[1].games.iter().all(|g| g.appid != 10));
        assert_eq!(view.groups[1].games[0].appid, 20);
        assert_eq!(view.groups[2].games[0].appid, 30);
    }

    #[test]
    fn alpha_grouping_buckets_by_first_letter_with_catch_all() {
        let library = vec![
            game(10, "zebra", 0, None),
            game(20, "Apple", 0, None),
            game(30, "avocado", 0, None),
            game(40, "428 Shibuya", 0, None),
        ];
        let state = VaultState {
            sort: SortKey::Alpha,
            group: GroupKey::Alpha,
            ..VaultState::default()
        };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &HashMap::new(), &state);

        let labels: Vec<_> = view.groups.iter().map(|g| g.label.as_deref().unwrap()).collect();
        assert_eq!(labels, ["A", "Z", "#"]);
        let a_group: Vec<_> = view.groups[0].games.iter().map(|g| g.appid).collect();
        assert_eq!(a_group, vec![20, 30]);
    }

    #[test]
    fn selected_game_resolves_against_the_full_library() {
        let library = vec![game(10, "Alpha", 0, None), game(20, "Beta", 0, None)];
        let state = VaultState {
            query: "alpha".to_string(),
            selected: Some(20),
            ..VaultState::default()
        };
        let view = derive(&library, &Classification::default(), &BTreeSet::new(), &HashMap::new(), &state);
        assert_eq!(ids(&view), vec![10]);
        assert_eq!(view.selected.map(|g| g.appid), Some(20));
    }

    #[test]
    fn state_round_trips_through_kebab_case_serde() {
        let state = VaultState {
            sort: SortKey::ReleaseDate,
            filter: FilterKey::Blacklisted,
            group: GroupKey::Status,
            tab: Tab::Library,
            ..VaultState::default()
        };
        let raw = serde_json::to_string(&state).unwrap();
        assert!(raw.contains("release-date"));
        let back: VaultState = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, state);
    }
}
