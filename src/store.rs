//! Persistent key-value cache.
//!
//! Everything the companion remembers between launches lives behind the
//! [`KvStore`] interface: session identity and credential, the blacklist,
//! per-game notes, per-game store metadata, the genre vocabulary, and UI
//! preferences. Values are JSON-serialized scalars and arrays; no component
//! above this module touches raw storage directly.

use crate::model::{AppId, Game, GameMetadata};
use directories::BaseDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("stored value is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not resolve a local data directory")]
    NoDataDir,
}

// ============================================================================
// KEYS
// ============================================================================

/// Logical key set. Per-appid keys are derived, everything else is fixed.
pub mod keys {
    use crate::model::AppId;

    pub const STEAM_ID: &str = "steam-id";
    pub const API_KEY: &str = "steam-key";
    pub const BLACKLIST: &str = "blacklist";
    pub const GENRES: &str = "genres";
    pub const THEME: &str = "theme";
    pub const MUTED: &str = "muted";

    pub fn note(appid: AppId) -> String {
        format!("note-{appid}")
    }

    pub fn metadata(appid: AppId) -> String {
        format!("meta-{appid}")
    }
}

// ============================================================================
// STORE INTERFACE
// ============================================================================

/// String-keyed persistence. Object-safe so pipelines can take `&dyn KvStore`
/// and tests can substitute [`MemStore`].
pub trait KvStore: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// JSON layer over [`KvStore`].
pub trait KvStoreExt: KvStore {
    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        self.set_raw(key, &serde_json::to_string(value)?)
    }
}

impl<S: KvStore + ?Sized> KvStoreExt for S {}

// ============================================================================
// BACKENDS
// ============================================================================

/// One file per key under the platform-local data directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open the store at the default location (`<data_local_dir>/vanguard`).
    pub fn open_default() -> Result<Self, StoreError> {
        let base = BaseDirs::new().ok_or(StoreError::NoDataDir)?;
        Self::open(base.data_local_dir().join("vanguard"))
    }

    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(FileStore { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{safe}.json"))
    }
}

impl KvStore for FileStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(fs::write(self.path_for(key), value)?)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.lock().expect("store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KvStore for MemStore {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.map.lock().expect("store lock poisoned").get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.map
            .lock()
            .expect("store lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.map.lock().expect("store lock poisoned").remove(key);
        Ok(())
    }
}

// ============================================================================
// TYPED VIEWS
// ============================================================================

/// The blacklist: user-toggled exclusion set, persisted on every toggle.
/// Membership only affects presentation and launch eligibility; the vault
/// keeps blacklisted games in every non-blacklist filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Blacklist {
    ids: BTreeSet<AppId>,
}

impl Blacklist {
    pub fn load(store: &dyn KvStore) -> Result<Self, StoreError> {
        let ids: Vec<AppId> = store.get(keys::BLACKLIST)?.unwrap_or_default();
        Ok(Blacklist { ids: ids.into_iter().collect() })
    }

    /// Flip membership for `appid` and persist. Returns the new membership.
    pub fn toggle(&mut self, store: &dyn KvStore, appid: AppId) -> Result<bool, StoreError> {
        let now_listed = if self.ids.remove(&appid) {
            false
        } else {
            self.ids.insert(appid);
            true
        };
        let as_vec: Vec<AppId> = self.ids.iter().copied().collect();
        store.set(keys::BLACKLIST, &as_vec)?;
        Ok(now_listed)
    }

    pub fn contains(&self, appid: AppId) -> bool {
        self.ids.contains(&appid)
    }

    pub fn ids(&self) -> &BTreeSet<AppId> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Collect the cached metadata records for a library snapshot.
pub fn load_metadata_cache(
    store: &dyn KvStore,
    library: &[Game],
) -> Result<HashMap<AppId, GameMetadata>, StoreError> {
    let mut cache = HashMap::new();
    for game in library {
        if let Some(meta) = store.get::<GameMetadata>(&keys::metadata(game.appid))? {
            cache.insert(game.appid, meta);
        }
    }
    Ok(cache)
}

pub fn load_vocabulary(store: &dyn KvStore) -> Result<BTreeSet<String>, StoreError> {
    let genres: Vec<String> = store.get(keys::GENRES)?.unwrap_or_default();
    Ok(genres.into_iter().collect())
}

pub fn save_vocabulary(store: &dyn KvStore, vocabulary: &BTreeSet<String>) -> Result<(), StoreError> {
    let as_vec: Vec<&String> = vocabulary.iter().collect();
    store.set(keys::GENRES, &as_vec)
}

/// Drop every cached metadata record for the given appids plus the genre
/// vocabulary. The next scan rebuilds both from scratch.
pub fn clear_metadata_cache(
    store: &dyn KvStore,
    appids: impl IntoIterator<Item = AppId>,
) -> Result<(), StoreError> {
    for appid in appids {
        store.remove(&keys::metadata(appid))?;
    }
    store.remove(keys::GENRES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Game;

    fn game(appid: AppId) -> Game {
        Game { appid, name: format!("game-{appid}"), ..Game::default() }
    }

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.set("blacklist", &vec![10u32, 20]).unwrap();
        let read: Vec<u32> = store.get("blacklist").unwrap().unwrap();
        assert_eq!(read, vec![10, 20]);

        store.remove("blacklist").unwrap();
        assert!(store.get_raw("blacklist").unwrap().is_none());
        // removing a missing key is not an error
        store.remove("blacklist").unwrap();
    }

    #[test]
    fn file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set_raw("../escape", "x").unwrap();
        assert_eq!(store.get_raw("../escape").unwrap().as_deref(), Some("x"));
        assert!(dir.path().join("___escape.json").exists());
    }

    #[test]
    fn blacklist_toggle_persists_each_change() {
        let store = MemStore::new();
        let mut blacklist = Blacklist::load(&store).unwrap();
        assert!(blacklist.is_empty());

        assert!(blacklist.toggle(&store, 42).unwrap());
        let persisted: Vec<AppId> = store.get(keys::BLACKLIST).unwrap().unwrap();
        assert_eq!(persisted, vec![42]);

        assert!(!blacklist.toggle(&store, 42).unwrap());
        let persisted: Vec<AppId> = store.get(keys::BLACKLIST).unwrap().unwrap();
        assert!(persisted.is_empty());
    }

    #[test]
    fn metadata_cache_loads_only_cached_entries() {
        let store = MemStore::new();
        let library = vec![game(10), game(20)];
        store
            .set(&keys::metadata(10), &GameMetadata { appid: 10, ..GameMetadata::default() })
            .unwrap();

        let cache = load_metadata_cache(&store, &library).unwrap();
        assert!(cache.contains_key(&10));
        assert!(!cache.contains_key(&20));
    }

    #[test]
    fn clear_metadata_cache_removes_records_and_vocabulary() {
        let store = MemStore::new();
        store
            .set(&keys::metadata(10), &GameMetadata { appid: 10, ..GameMetadata::default() })
            .unwrap();
        save_vocabulary(&store, &["RPG".to_string()].into_iter().collect()).unwrap();

        clear_metadata_cache(&store, [10]).unwrap();
        assert!(store.get_raw(&keys::metadata(10)).unwrap().is_none());
        assert!(load_vocabulary(&store).unwrap().is_empty());
    }
}
