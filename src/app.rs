//! Application facade.
//!
//! Owns the client, the store, the pipelines and the current snapshot, and
//! routes shell commands to them: sign-in, refresh, vault queries, the
//! genre scan, blacklist toggles and notes. The shell (or the headless
//! binary) talks only to this type.

use crate::client::ApiClient;
use crate::discovery;
use crate::epoch::Generation;
use crate::mastery::{self, Classification, MasteryPolicy};
use crate::model::{self, AppId, Friend, Game, GameMetadata, LibraryStats, Profile};
use crate::notes::NoteBuffer;
use crate::scan::{GenreScanner, ScanOutcome, ScanPolicy};
use crate::session::{Prefs, Session};
use crate::store::{self, Blacklist, KvStore, StoreError};
use crate::vault::{self, VaultState, VaultView};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use rand::Rng;
use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

pub struct App {
    client: ApiClient,
    store: Box<dyn KvStore>,
    mastery_policy: MasteryPolicy,
    scanner: GenreScanner,
    generation: Generation,
    notes: NoteBuffer,

    session: Option<Session>,
    profile: Option<Profile>,
    library: Vec<Game>,
    classification: Classification,
    metadata: HashMap<AppId, GameMetadata>,
    vocabulary: BTreeSet<String>,
    blacklist: Blacklist,
}

impl App {
    /// Restore persisted state (session, blacklist, vocabulary); the library
    /// snapshot stays empty until the first [`App::refresh`].
    pub fn new(client: ApiClient, store: Box<dyn KvStore>) -> Result<Self, StoreError> {
        let session = Session::load(store.as_ref())?;
        let blacklist = Blacklist::load(store.as_ref())?;
        let vocabulary = store::load_vocabulary(store.as_ref())?;
        Ok(App {
            client,
            store,
            mastery_policy: MasteryPolicy::default(),
            scanner: GenreScanner::new(ScanPolicy::default()),
            generation: Generation::new(),
            notes: NoteBuffer::default(),
            session,
            profile: None,
            library: Vec::new(),
            classification: Classification::default(),
            metadata: HashMap::new(),
            vocabulary,
            blacklist,
        })
    }

    // ============================================================================
    // SESSION
    // ============================================================================

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    /// Persist the identity/credential pair, push the credential to the
    /// proxy, and invalidate any in-flight derived work.
    pub async fn sign_in(&mut self, steam_id: &str, api_key: &str) -> Result<(), StoreError> {
        let session = Session { steam_id: steam_id.to_string(), api_key: api_key.to_string() };
        session.save(self.store.as_ref())?;
        self.client.sync_credential(&session.api_key).await;
        self.session = Some(session);
        self.generation.advance();
        self.clear_snapshot();
        info!("signed in as {steam_id}");
        Ok(())
    }

    pub fn sign_out(&mut self) -> Result<(), StoreError> {
        Session::clear(self.store.as_ref())?;
        self.session = None;
        self.generation.advance();
        self.clear_snapshot();
        Ok(())
    }

    fn clear_snapshot(&mut self) {
        self.profile = None;
        self.library.clear();
        self.classification = Classification::default();
        self.metadata.clear();
    }

    // ============================================================================
    // DATA
    // ============================================================================

    /// Fetch profile and library, replace the snapshot wholesale, and
    /// rebuild the classification. A classification computed against a
    /// snapshot that was replaced mid-flight is discarded, not committed.
    pub async fn refresh(&mut self) -> Result<()> {
        let session = self.session.clone().context("not signed in")?;

        let (profile, library) = tokio::try_join!(
            self.client.profile(&session.steam_id),
            self.client.fetch_library(&session.steam_id),
        )
        .map_err(|e| anyhow!(e.user_message()))?;

        let epoch = self.generation.advance();
        self.profile = profile;
        self.library = library;
        self.metadata = store::load_metadata_cache(self.store.as_ref(), &self.library)?;
        info!("library refreshed: {} games", self.library.len());

        let scoped = self.client.for_player(&session.steam_id);
        let classification = mastery::classify(&self.library, &scoped, &self.mastery_policy).await;
        if self.generation.is_current(epoch) {
            self.classification = classification;
        } else {
            debug!("discarding classification for a stale library snapshot");
        }
        Ok(())
    }

    /// One user-triggered genre-scan invocation. `None` when a scan is
    /// already running.
    pub async fn scan_genres(&mut self) -> Option<ScanOutcome> {
        let outcome = self
            .scanner
            .scan(&self.library, &self.metadata, &self.client, self.store.as_ref())
            .await?;
        for meta in &outcome.fetched {
            self.metadata.insert(meta.appid, meta.clone());
        }
        self.vocabulary = outcome.vocabulary.clone();
        Some(outcome)
    }

    /// Friends with presence, in squadron display order.
    pub async fn squadron(&self) -> Result<Vec<Friend>> {
        let session = self.session.as_ref().context("not signed in")?;
        let mut friends = self
            .client
            .friends(&session.steam_id)
            .await
            .map_err(|e| anyhow!(e.user_message()))?;
        model::squadron_order(&mut friends);
        Ok(friends)
    }

    // ============================================================================
    // DERIVED VIEWS
    // ============================================================================

    pub fn vault(&self, state: &VaultState) -> VaultView<'_> {
        vault::derive(&self.library, &self.classification, self.blacklist.ids(), &self.metadata, state)
    }

    pub fn stats(&self) -> LibraryStats {
        model::library_stats(&self.library)
    }

    pub fn random_game<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Game> {
        discovery::random_pick(&self.library, self.blacklist.ids(), rng)
    }

    pub fn discovery_queue<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<&Game> {
        discovery::discovery_queue(&self.library, self.blacklist.ids(), rng)
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn library(&self) -> &[Game] {
        &self.library
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn vocabulary(&self) -> &BTreeSet<String> {
        &self.vocabulary
    }

    pub fn blacklist(&self) -> &Blacklist {
        &self.blacklist
    }

    // ============================================================================
    // MUTATIONS
    // ============================================================================

    pub fn toggle_blacklist(&mut self, appid: AppId) -> Result<bool, StoreError> {
        self.blacklist.toggle(self.store.as_ref(), appid)
    }

    /// Drop every cached metadata record and the vocabulary; the next scan
    /// rebuilds from scratch.
    pub fn clear_metadata_cache(&mut self) -> Result<(), StoreError> {
        store::clear_metadata_cache(self.store.as_ref(), self.library.iter().map(|g| g.appid))?;
        self.metadata.clear();
        self.vocabulary.clear();
        Ok(())
    }

    pub fn note(&self, appid: AppId) -> Result<String, StoreError> {
        NoteBuffer::load(self.store.as_ref(), appid)
    }

    pub fn edit_note(&mut self, appid: AppId, text: &str, now: Instant) -> Result<(), StoreError> {
        self.notes.edit(appid, text, now, self.store.as_ref())
    }

    pub fn flush_notes(&mut self, now: Instant) -> Result<bool, StoreError> {
        self.notes.flush_due(now, self.store.as_ref())
    }

    pub fn prefs(&self) -> Result<Prefs, StoreError> {
        Prefs::load(self.store.as_ref())
    }

    pub fn save_prefs(&self, prefs: Prefs) -> Result<(), StoreError> {
        prefs.save(self.store.as_ref())
    }
}
