//! Session identity, credential, and small UI preferences.

use crate::store::{keys, KvStore, KvStoreExt, StoreError};
use serde::{Deserialize, Serialize};

/// The authenticated session: platform identity plus the Web API key the
/// proxy needs. Both are persisted; either missing means signed out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub steam_id: String,
    pub api_key: String,
}

impl Session {
    pub fn load(store: &dyn KvStore) -> Result<Option<Session>, StoreError> {
        let steam_id: Option<String> = store.get(keys::STEAM_ID)?;
        let api_key: Option<String> = store.get(keys::API_KEY)?;
        Ok(match (steam_id, api_key) {
            (Some(steam_id), Some(api_key)) => Some(Session { steam_id, api_key }),
            _ => None,
        })
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<(), StoreError> {
        store.set(keys::STEAM_ID, &self.steam_id)?;
        store.set(keys::API_KEY, &self.api_key)
    }

    pub fn clear(store: &dyn KvStore) -> Result<(), StoreError> {
        store.remove(keys::STEAM_ID)?;
        store.remove(keys::API_KEY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Persisted UI preferences: theme selection and the sound mute flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prefs {
    pub theme: Theme,
    pub muted: bool,
}

impl Prefs {
    pub fn load(store: &dyn KvStore) -> Result<Prefs, StoreError> {
        Ok(Prefs {
            theme: store.get(keys::THEME)?.unwrap_or_default(),
            muted: store.get(keys::MUTED)?.unwrap_or_default(),
        })
    }

    pub fn save(&self, store: &dyn KvStore) -> Result<(), StoreError> {
        store.set(keys::THEME, &self.theme)?;
        store.set(keys::MUTED, &self.muted)
    }
}
