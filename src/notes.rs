//! Mission log: per-game free-text notes with debounced write-through.
//!
//! Edits are buffered and committed one second after the last keystroke.
//! The deadline is explicit: callers pass `Instant::now()` in and poll
//! [`NoteBuffer::flush_due`], which keeps the behavior deterministic and
//! testable without timers. An empty note deletes the key rather than
//! storing an empty value.

use crate::model::AppId;
use crate::store::{keys, KvStore, KvStoreExt, StoreError};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

const COMMIT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct PendingNote {
    appid: AppId,
    text: String,
    due: Instant,
}

#[derive(Debug)]
pub struct NoteBuffer {
    delay: Duration,
    pending: Option<PendingNote>,
    last_saved: Option<DateTime<Utc>>,
}

impl NoteBuffer {
    pub fn new(delay: Duration) -> Self {
        NoteBuffer { delay, pending: None, last_saved: None }
    }

    /// Read a game's note; an absent key is an empty note.
    pub fn load(store: &dyn KvStore, appid: AppId) -> Result<String, StoreError> {
        Ok(store.get::<String>(&keys::note(appid))?.unwrap_or_default())
    }

    /// Buffer an edit and (re)schedule its commit at `now + delay`. An edit
    /// targeting a different game commits the pending note first so no text
    /// is lost when the user switches games mid-debounce.
    pub fn edit(
        &mut self,
        appid: AppId,
        text: impl Into<String>,
        now: Instant,
        store: &dyn KvStore,
    ) -> Result<(), StoreError> {
        if self.pending.as_ref().is_some_and(|p| p.appid != appid) {
            self.flush_now(store)?;
        }
        self.pending = Some(PendingNote { appid, text: text.into(), due: now + self.delay });
        Ok(())
    }

    /// Commit the pending note if its deadline has passed. Returns whether
    /// a commit happened.
    pub fn flush_due(&mut self, now: Instant, store: &dyn KvStore) -> Result<bool, StoreError> {
        match &self.pending {
            Some(p) if p.due <= now => self.flush_now(store),
            _ => Ok(false),
        }
    }

    /// Commit the pending note immediately, deadline or not.
    pub fn flush_now(&mut self, store: &dyn KvStore) -> Result<bool, StoreError> {
        let Some(p) = self.pending.take() else {
            return Ok(false);
        };
        let key = keys::note(p.appid);
        if p.text.is_empty() {
            store.remove(&key)?;
        } else {
            store.set(&key, &p.text)?;
        }
        self.last_saved = Some(Utc::now());
        Ok(true)
    }

    /// Drop the pending edit without committing (component teardown).
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }
}

impl Default for NoteBuffer {
    fn default() -> Self {
        Self::new(COMMIT_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;

    #[test]
    fn commit_waits_for_the_deadline_and_reschedules_on_edit() {
        let store = MemStore::new();
        let mut buffer = NoteBuffer::default();
        let t0 = Instant::now();

        buffer.edit(10, "beat the first boss", t0, &store).unwrap();
        assert!(!buffer.flush_due(t0 + Duration::from_millis(900), &store).unwrap());

        // a new keystroke pushes the deadline out
        buffer.edit(10, "beat the first two bosses", t0 + Duration::from_millis(900), &store).unwrap();
        assert!(!buffer.flush_due(t0 + Duration::from_millis(1500), &store).unwrap());
        assert!(buffer.flush_due(t0 + Duration::from_millis(1900), &store).unwrap());

        assert_eq!(NoteBuffer::load(&store, 10).unwrap(), "beat the first two bosses");
        assert!(!buffer.is_dirty());
        assert!(buffer.last_saved().is_some());
    }

    #[test]
    fn empty_text_removes_the_key() {
        let store = MemStore::new();
        let mut buffer = NoteBuffer::default();
        let t0 = Instant::now();

        buffer.edit(10, "something", t0, &store).unwrap();
        buffer.flush_now(&store).unwrap();
        assert!(store.get_raw(&keys::note(10)).unwrap().is_some());

        buffer.edit(10, "", t0, &store).unwrap();
        buffer.flush_now(&store).unwrap();
        assert!(store.get_raw(&keys::note(10)).unwrap().is_none());
        assert_eq!(NoteBuffer::load(&store, 10).unwrap(), "");
    }

    #[test]
    fn switching_games_commits_the_pending_note() {
        let store = MemStore::new();
        let mut buffer = NoteBuffer::default();
        let t0 = Instant::now();

        buffer.edit(10, "note for ten", t0, &store).unwrap();
        buffer.edit(20, "note for twenty", t0, &store).unwrap();

        assert_eq!(NoteBuffer::load(&store, 10).unwrap(), "note for ten");
        assert!(buffer.is_dirty()); // twenty still pending
    }

    #[test]
    fn cancel_discards_without_writing() {
        let store = MemStore::new();
        let mut buffer = NoteBuffer::default();

        buffer.edit(10, "unsaved", Instant::now(), &store).unwrap();
        buffer.cancel();
        assert!(!buffer.flush_now(&store).unwrap());
        assert!(store.get_raw(&keys::note(10)).unwrap().is_none());
    }
}
