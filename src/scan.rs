//! Genre scan pipeline.
//!
//! Incrementally enriches the library with store metadata, triggered
//! explicitly by the user. One invocation takes the first `max_per_scan`
//! uncached games in library order and fetches them in fixed-size batches,
//! all requests in a batch in flight together, with a fixed pause between
//! batches. The fixed window is a deliberately blunt rate limiter that
//! protects the store endpoint from bursts. Exhausting a large library
//! takes repeated triggers.
//!
//! Each successful record is written through to the persistent cache as it
//! arrives, so partial progress survives a mid-scan failure or app close;
//! the genre vocabulary is loaded once at scan start and persisted once at
//! the end.

use crate::client::MetadataSource;
use crate::model::{AppId, Game, GameMetadata};
use crate::store::{self, keys, KvStore, KvStoreExt};
use futures::future::join_all;
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// The fixed-window rate-limit policy: how many requests go out together,
/// how long to wait between windows, and how much of the backlog a single
/// trigger may consume.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub batch_size: usize,
    pub batch_pause: Duration,
    pub max_per_scan: usize,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        ScanPolicy { batch_size: 5, batch_pause: Duration::from_millis(500), max_per_scan: 50 }
    }
}

/// What one scan invocation produced. `fetched` holds the new records for
/// the caller to merge into its in-memory cache (the persistent cache was
/// already written during the scan); `vocabulary` is the full accumulated
/// genre set, previously known genres included.
#[derive(Debug)]
pub struct ScanOutcome {
    pub fetched: Vec<GameMetadata>,
    pub failed: Vec<AppId>,
    pub vocabulary: BTreeSet<String>,
}

pub struct GenreScanner {
    policy: ScanPolicy,
    running: AtomicBool,
}

/// Releases the re-entrancy flag however the scan exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl GenreScanner {
    pub fn new(policy: ScanPolicy) -> Self {
        GenreScanner { policy, running: AtomicBool::new(false) }
    }

    pub fn policy(&self) -> &ScanPolicy {
        &self.policy
    }

    pub fn is_scanning(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run one scan invocation. Returns `None` without side effects when a
    /// scan is already in progress.
    pub async fn scan<S>(
        &self,
        library: &[Game],
        cache: &HashMap<AppId, GameMetadata>,
        source: &S,
        store: &dyn KvStore,
    ) -> Option<ScanOutcome>
    where
        S: MetadataSource + Sync + ?Sized,
    {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("genre scan already in progress, ignoring trigger");
            return None;
        }
        let _guard = RunningGuard(&self.running);

        let pending: Vec<&Game> = library
            .iter()
            .filter(|g| !cache.contains_key(&g.appid))
            .take(self.policy.max_per_scan)
            .collect();
        info!("genre scan: {} uncached games queued", pending.len());

        let mut vocabulary = store::load_vocabulary(store).unwrap_or_else(|e| {
            warn!("could not load genre vocabulary, starting empty: {e}");
            BTreeSet::new()
        });
        let mut fetched = Vec::new();
        let mut failed = Vec::new();

        for (index, batch) in pending.chunks(self.policy.batch_size.max(1)).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.policy.batch_pause).await;
            }

            let results = join_all(batch.iter().map(|game| async move {
                (game.appid, source.fetch_store_metadata(game.lookup_appid()).await)
            }))
            .await;

            for (appid, result) in results {
                match result {
                    Ok(mut meta) => {
                        meta.appid = appid;
                        if let Err(e) = store.set(&keys::metadata(appid), &meta) {
                            warn!("could not persist metadata for {appid}: {e}");
                        }
                        vocabulary.extend(meta.genres.iter().cloned());
                        fetched.push(meta);
                    }
                    Err(e) => {
                        warn!("store metadata fetch failed for {appid}: {e}");
                        failed.push(appid);
                    }
                }
            }
        }

        if let Err(e) = store::save_vocabulary(store, &vocabulary) {
            warn!("could not persist genre vocabulary: {e}");
        }
        info!(
            "genre scan finished: {} fetched, {} failed, {} genres known",
            fetched.len(),
            failed.len(),
            vocabulary.len()
        );

        Some(ScanOutcome { fetched, failed, vocabulary })
    }
}

impl Default for GenreScanner {
    fn default() -> Self {
        Self::new(ScanPolicy::default())
    }
}
