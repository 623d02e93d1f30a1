//! Remote data client.
//!
//! Thin accessor over the companion proxy, which forwards to the upstream
//! platform Web API. Every method returns parsed domain types; failures are
//! mapped onto the four-way taxonomy in [`ClientError`] and never escape as
//! raw panics. The derived-state pipelines consume the client through the
//! [`AchievementSource`] and [`MetadataSource`] seams so they can be tested
//! against scripted fakes.

use crate::model::{merge_library, AchievementReport, AppId, Friend, Game, GameMetadata, Profile};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Per-request ceiling; the upstream publishes no SLA, so worst-case
/// pipeline latency is bounded here.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("achievement data hidden by the profile's privacy settings")]
    Privacy,

    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl ClientError {
    fn from_send(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => ClientError::Status(status.as_u16()),
            None => ClientError::Transport(e),
        }
    }

    /// Presentation rule: transport, HTTP and payload failures collapse into
    /// one generic message; the privacy case gets remediation steps since
    /// the user can fix it themselves.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Privacy => {
                "Achievement data is private. In your platform profile, set Game Details \
                 to Public, then refresh."
                    .to_string()
            }
            other => format!("Could not load data from the companion service ({other})."),
        }
    }
}

// ============================================================================
// FETCH SEAMS
// ============================================================================

/// Per-game achievement lookup, already scoped to a player.
#[async_trait]
pub trait AchievementSource {
    async fn fetch_achievements(&self, appid: AppId) -> Result<AchievementReport, ClientError>;
}

/// Per-game store-metadata lookup.
#[async_trait]
pub trait MetadataSource {
    async fn fetch_store_metadata(&self, appid: AppId) -> Result<GameMetadata, ClientError>;
}

// ============================================================================
// CLIENT
// ============================================================================

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(ApiClient { http, base: base.into().trim_end_matches('/').to_string() })
    }

    /// Scope achievement lookups to one player.
    pub fn for_player(&self, steam_id: &str) -> PlayerClient<'_> {
        PlayerClient { api: self, steam_id: steam_id.to_string() }
    }

    async fn get_value(&self, path: &str) -> Result<Value, ClientError> {
        let url = format!("{}/{}", self.base, path);
        let resp = self.http.get(&url).send().await.map_err(ClientError::from_send)?;
        if !resp.status().is_success() {
            return Err(ClientError::Status(resp.status().as_u16()));
        }
        resp.json()
            .await
            .map_err(|e| ClientError::Malformed(format!("response body is not valid JSON: {e}")))
    }

    /// `GET /profile/{id}`: the player's public profile, or `None` when the
    /// upstream returns an empty player list.
    pub async fn profile(&self, steam_id: &str) -> Result<Option<Profile>, ClientError> {
        #[derive(Deserialize, Default)]
        struct Players {
            #[serde(default)]
            players: Vec<Profile>,
        }
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            response: Players,
        }

        let value = self.get_value(&format!("profile/{steam_id}")).await?;
        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| ClientError::Malformed(format!("profile envelope: {e}")))?;
        Ok(envelope.response.players.into_iter().next())
    }

    /// `GET /games/{id}`: the owned-games list. An absent `games` field is
    /// an empty library, not an error.
    pub async fn owned_games(&self, steam_id: &str) -> Result<Vec<Game>, ClientError> {
        self.game_list(&format!("games/{steam_id}")).await
    }

    /// `GET /recent/{id}`: the recently-played subset.
    pub async fn recent_games(&self, steam_id: &str) -> Result<Vec<Game>, ClientError> {
        self.game_list(&format!("recent/{steam_id}")).await
    }

    async fn game_list(&self, path: &str) -> Result<Vec<Game>, ClientError> {
        #[derive(Deserialize, Default)]
        struct GamesBody {
            #[serde(default)]
            games: Vec<Game>,
        }
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            response: GamesBody,
        }

        let value = self.get_value(path).await?;
        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| ClientError::Malformed(format!("games envelope: {e}")))?;
        Ok(envelope.response.games)
    }

    /// Fetch both game feeds concurrently and merge them into one snapshot.
    pub async fn fetch_library(&self, steam_id: &str) -> Result<Vec<Game>, ClientError> {
        let (owned, recent) =
            tokio::try_join!(self.owned_games(steam_id), self.recent_games(steam_id))?;
        Ok(merge_library(owned, recent))
    }

    /// `GET /achievements/{id}/{appid}`: completion counts for one game.
    ///
    /// A `playerstats.error` field or `success: false` signals the player's
    /// own privacy settings, surfaced as [`ClientError::Privacy`]; a missing
    /// envelope is a malformed payload. A present-but-empty achievement list
    /// is a valid zero/zero report (the game has no achievements).
    pub async fn achievements(
        &self,
        steam_id: &str,
        appid: AppId,
    ) -> Result<AchievementReport, ClientError> {
        let value = self.get_value(&format!("achievements/{steam_id}/{appid}")).await?;
        parse_achievements(&value)
    }

    /// `GET /store/{appid}`: cached store attributes for one game.
    pub async fn store_metadata(&self, appid: AppId) -> Result<GameMetadata, ClientError> {
        let value = self.get_value(&format!("store/{appid}")).await?;
        parse_store_metadata(&value, appid)
    }

    /// `GET /friends/{id}`: friends with presence and current-game fields.
    pub async fn friends(&self, steam_id: &str) -> Result<Vec<Friend>, ClientError> {
        #[derive(Deserialize)]
        struct Envelope {
            #[serde(default)]
            friends: Vec<Friend>,
        }

        let value = self.get_value(&format!("friends/{steam_id}")).await?;
        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| ClientError::Malformed(format!("friends envelope: {e}")))?;
        Ok(envelope.friends)
    }

    /// `POST /config`: push the session credential to the proxy.
    /// Fire-and-forget: failures are logged and never propagated.
    pub async fn sync_credential(&self, api_key: &str) {
        let body = serde_json::json!({ "apiKey": api_key });
        match self.http.post(format!("{}/config", self.base)).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => debug!("session credential synced"),
            Ok(resp) => warn!("credential sync rejected: HTTP {}", resp.status()),
            Err(e) => warn!("credential sync failed: {e}"),
        }
    }
}

/// [`ApiClient`] scoped to one player for achievement lookups.
pub struct PlayerClient<'a> {
    api: &'a ApiClient,
    steam_id: String,
}

#[async_trait]
impl AchievementSource for PlayerClient<'_> {
    async fn fetch_achievements(&self, appid: AppId) -> Result<AchievementReport, ClientError> {
        self.api.achievements(&self.steam_id, appid).await
    }
}

#[async_trait]
impl MetadataSource for ApiClient {
    async fn fetch_store_metadata(&self, appid: AppId) -> Result<GameMetadata, ClientError> {
        ApiClient::store_metadata(self, appid).await
    }
}

// ============================================================================
// PAYLOAD PARSING
// ============================================================================

fn parse_achievements(value: &Value) -> Result<AchievementReport, ClientError> {
    let stats = value
        .get("achievements")
        .and_then(|a| a.get("playerstats"))
        .ok_or_else(|| ClientError::Malformed("missing playerstats envelope".into()))?;

    if stats.get("error").and_then(Value::as_str).is_some()
        || stats.get("success").and_then(Value::as_bool) == Some(false)
    {
        return Err(ClientError::Privacy);
    }

    let list = stats.get("achievements").and_then(Value::as_array);
    let (achieved, total) = match list {
        Some(entries) => {
            let achieved = entries
                .iter()
                .filter(|a| a.get("achieved").and_then(Value::as_u64) == Some(1))
                .count() as u32;
            (achieved, entries.len() as u32)
        }
        None => (0, 0),
    };
    Ok(AchievementReport { achieved, total })
}

fn parse_store_metadata(value: &Value, appid: AppId) -> Result<GameMetadata, ClientError> {
    // The proxy may forward the raw appdetails envelope
    // (`{"<appid>": {"success": ..., "data": {...}}}`) or a bare data object.
    let data = match value.get(appid.to_string()) {
        Some(entry) => {
            if entry.get("success").and_then(Value::as_bool) != Some(true) {
                return Err(ClientError::Malformed(format!("store lookup for {appid} unsuccessful")));
            }
            entry
                .get("data")
                .ok_or_else(|| ClientError::Malformed("store envelope missing data".into()))?
        }
        None => value,
    };

    let descriptions = |field: &str| -> Vec<String> {
        data.get(field)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("description").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    Ok(GameMetadata {
        appid,
        genres: descriptions("genres"),
        categories: descriptions("categories"),
        release_date: data
            .get("release_date")
            .and_then(|r| r.get("date"))
            .and_then(Value::as_str)
            .and_then(parse_store_date),
        metacritic_score: data
            .get("metacritic")
            .and_then(|m| m.get("score"))
            .and_then(Value::as_u64)
            .map(|s| s.min(100) as u8),
        size_mb: data.get("size_mb").and_then(Value::as_u64),
    })
}

/// The store reports dates as localized strings; unparseable ones degrade
/// to an absent date rather than failing the whole record.
fn parse_store_date(raw: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%d %b, %Y", "%b %d, %Y", "%Y-%m-%d"];
    FORMATS.iter().find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn achievements_count_unlocks() {
        let value = json!({
            "achievements": { "playerstats": { "success": true, "achievements": [
                { "apiname": "A", "achieved": 1, "unlocktime": 100 },
                { "apiname": "B", "achieved": 0, "unlocktime": 0 },
                { "apiname": "C", "achieved": 1, "unlocktime": 200 },
            ]}},
            "schema": {}
        });
        let report = parse_achievements(&value).unwrap();
        assert_eq!(report, AchievementReport { achieved: 2, total: 3 });
    }

    #[test]
    fn achievements_error_field_maps_to_privacy() {
        let value = json!({
            "achievements": { "playerstats": { "success": false, "error": "Private Profile" } }
        });
        assert!(matches!(parse_achievements(&value), Err(ClientError::Privacy)));
    }

    #[test]
    fn achievements_missing_envelope_is_malformed() {
        let value = json!({ "schema": {} });
        assert!(matches!(parse_achievements(&value), Err(ClientError::Malformed(_))));
    }

    #[test]
    fn achievements_missing_list_is_a_zero_report() {
        let value = json!({ "achievements": { "playerstats": { "success": true } } });
        let report = parse_achievements(&value).unwrap();
        assert_eq!(report, AchievementReport { achieved: 0, total: 0 });
    }

    #[test]
    fn store_metadata_parses_appdetails_envelope() {
        let value = json!({
            "1245620": { "success": true, "data": {
                "genres": [ { "id": "3", "description": "RPG" }, { "id": "1", "description": "Action" } ],
                "categories": [ { "id": "2", "description": "Single-player" } ],
                "release_date": { "coming_soon": false, "date": "25 Feb, 2022" },
                "metacritic": { "score": 94, "url": "" }
            }}
        });
        let meta = parse_store_metadata(&value, 1245620).unwrap();
        assert_eq!(meta.genres, vec!["RPG", "Action"]);
        assert_eq!(meta.categories, vec!["Single-player"]);
        assert_eq!(meta.metacritic_score, Some(94));
        assert_eq!(meta.release_date, NaiveDate::from_ymd_opt(2022, 2, 25));
    }

    #[test]
    fn store_metadata_accepts_bare_data_object() {
        let value = json!({
            "genres": [ { "description": "Indie" } ],
            "release_date": { "date": "not a date" }
        });
        let meta = parse_store_metadata(&value, 10).unwrap();
        assert_eq!(meta.genres, vec!["Indie"]);
        assert_eq!(meta.release_date, None);
    }

    #[test]
    fn store_metadata_unsuccessful_lookup_is_malformed() {
        let value = json!({ "10": { "success": false } });
        assert!(matches!(parse_store_metadata(&value, 10), Err(ClientError::Malformed(_))));
    }

    #[test]
    fn privacy_gets_a_distinct_user_message() {
        let generic = ClientError::Status(502).user_message();
        let privacy = ClientError::Privacy.user_message();
        assert!(generic.contains("companion service"));
        assert!(privacy.contains("privacy") || privacy.contains("Public"));
        assert_ne!(generic, privacy);
    }
}
