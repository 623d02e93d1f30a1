//! Domain types shared by every component: the library snapshot, the
//! player profile, cached store metadata, and the two-source merge that
//! produces a library snapshot from the owned-games and recently-played
//! feeds.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stable upstream identifier for a game in the catalog.
pub type AppId = u32;

/// Titles that are always folded into the library from the recently-played
/// feed even when the owned-games feed omits them (non-store titles show up
/// only in the recent feed).
const FORCED_INCLUDES: &[(AppId, &str)] = &[(480, "Spacewar")];

/// Presentation aliases for games shipped as a reskin of another appid.
/// The alias only changes the display name; achievement and store lookups
/// go through [`Game::lookup_appid`].
const ALIASES: &[(AppId, &str)] = &[(480, "ELDEN RING COOP")];

// ============================================================================
// LIBRARY
// ============================================================================

/// One game in the library snapshot.
///
/// A snapshot is immutable once produced by a fetch cycle: callers replace
/// the whole `Vec<Game>`, they never mutate it in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub appid: AppId,
    /// Override used for achievement/store lookups when the game is
    /// presented under an alias (co-op reskins and the like).
    pub display_appid: Option<AppId>,
    /// Override header image, when the user has set one.
    pub custom_header: Option<String>,
    pub name: String,
    /// Lifetime playtime in minutes. Monotonically non-decreasing; merged
    /// from the two upstream feeds by taking the maximum.
    #[serde(default)]
    pub playtime_forever: u32,
    /// Two-week windowed playtime in minutes, replaced wholesale each fetch.
    pub playtime_2weeks: Option<u32>,
    pub img_icon_url: Option<String>,
}

impl Game {
    /// The appid to use for achievement and store endpoints.
    pub fn lookup_appid(&self) -> AppId {
        self.display_appid.unwrap_or(self.appid)
    }

    /// Whether the game saw any play in the recent window.
    pub fn recently_played(&self) -> bool {
        self.playtime_2weeks.unwrap_or(0) > 0
    }
}

/// Merge the owned-games and recently-played feeds into one snapshot.
///
/// - `playtime_forever` takes the per-game maximum of the two feeds.
/// - `playtime_2weeks` is replaced wholesale from the recent feed; games
///   absent from it lose any previous windowed value.
/// - Forced-include titles are appended from the recent feed (or with zero
///   playtime) when the owned feed lacks them.
/// - Aliases are applied last, so they cover forced includes too.
pub fn merge_library(owned: Vec<Game>, recent: Vec<Game>) -> Vec<Game> {
    let recent_map: HashMap<AppId, &Game> = recent.iter().map(|g| (g.appid, g)).collect();

    let mut games = owned;
    for game in games.iter_mut() {
        match recent_map.get(&game.appid) {
            Some(r) => {
                game.playtime_forever = game.playtime_forever.max(r.playtime_forever);
                game.playtime_2weeks = r.playtime_2weeks;
            }
            None => game.playtime_2weeks = None,
        }
    }

    for &(appid, name) in FORCED_INCLUDES {
        if games.iter().any(|g| g.appid == appid) {
            continue;
        }
        let base = recent_map.get(&appid);
        games.push(Game {
            appid,
            name: name.to_string(),
            playtime_forever: base.map(|g| g.playtime_forever).unwrap_or(0),
            playtime_2weeks: base.and_then(|g| g.playtime_2weeks),
            ..Game::default()
        });
    }

    for game in games.iter_mut() {
        if let Some(&(_, alias)) = ALIASES.iter().find(|(id, _)| *id == game.appid) {
            game.name = alias.to_string();
        }
    }

    games
}

// ============================================================================
// PROFILE & FRIENDS
// ============================================================================

/// Presence state as reported by the upstream platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum PersonaState {
    Offline,
    Online,
    Busy,
    Away,
    Snooze,
    LookingToTrade,
    LookingToPlay,
}

impl From<u8> for PersonaState {
    fn from(value: u8) -> Self {
        match value {
            1 => PersonaState::Online,
            2 => PersonaState::Busy,
            3 => PersonaState::Away,
            4 => PersonaState::Snooze,
            5 => PersonaState::LookingToTrade,
            6 => PersonaState::LookingToPlay,
            _ => PersonaState::Offline,
        }
    }
}

impl From<PersonaState> for u8 {
    fn from(value: PersonaState) -> Self {
        value as u8
    }
}

impl PersonaState {
    pub fn is_online(&self) -> bool {
        !matches!(self, PersonaState::Offline)
    }
}

/// The authenticated player's public profile. Absent until a successful
/// auth; refetched on session change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub avatarfull: String,
    pub personaname: String,
    pub personastate: PersonaState,
    pub profileurl: String,
}

/// A friends-list entry with presence and current-game fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub steamid: String,
    pub personaname: String,
    #[serde(default)]
    pub avatarmedium: String,
    #[serde(default)]
    pub profileurl: String,
    pub personastate: PersonaState,
    /// Title of the game the friend is currently in, when any.
    pub gameextrainfo: Option<String>,
}

/// Sort friends the way the squadron widget presents them: in-game first,
/// then online, then by name.
pub fn squadron_order(friends: &mut [Friend]) {
    friends.sort_by(|a, b| {
        let rank = |f: &Friend| {
            let in_game = if f.gameextrainfo.is_some() { 2 } else { 0 };
            let online = if f.personastate.is_online() { 1 } else { 0 };
            in_game + online
        };
        rank(b)
            .cmp(&rank(a))
            .then_with(|| a.personaname.to_lowercase().cmp(&b.personaname.to_lowercase()))
    });
}

// ============================================================================
// ACHIEVEMENTS & STORE METADATA
// ============================================================================

/// Achievement completion counts for one game, from a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementReport {
    pub achieved: u32,
    pub total: u32,
}

/// Per-appid cached record of store attributes. Created on the first
/// successful store-metadata fetch and immutable afterwards; only a manual
/// cache clear makes a game eligible for a re-fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub appid: AppId,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    pub release_date: Option<NaiveDate>,
    pub metacritic_score: Option<u8>,
    pub size_mb: Option<u64>,
}

// ============================================================================
// DISPLAY HELPERS
// ============================================================================

/// Headline numbers for the overview dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryStats {
    pub total_minutes: u64,
    pub game_count: usize,
    pub top_game: Option<String>,
}

pub fn library_stats(library: &[Game]) -> LibraryStats {
    let top_game = library
        .iter()
        .max_by_key(|g| (g.playtime_forever, std::cmp::Reverse(g.appid)))
        .map(|g| g.name.clone());
    LibraryStats {
        total_minutes: library.iter().map(|g| u64::from(g.playtime_forever)).sum(),
        game_count: library.len(),
        top_game,
    }
}

/// Playtime formatting: `0M` for nothing, minutes below an hour, hours
/// above it, one decimal in both cases.
pub fn format_minutes(minutes: u32) -> String {
    if minutes == 0 {
        return "0M".to_string();
    }
    if minutes < 60 {
        return format!("{:.1} MIN", minutes as f64);
    }
    format!("{:.1}H", minutes as f64 / 60.0)
}
