//! Vanguard: Steam Library Companion Engine
//!
//! The headless core of the Vanguard desktop companion. It authenticates a
//! player against the companion proxy, fetches their library, playtime,
//! achievements and friends, and derives the filtered/sorted/grouped "Vault"
//! view the shell renders.
//!
//! Architecture:
//! ```text
//! Shell / CLI
//!     │
//!     ▼
//! App (facade) ◄──── src/app.rs
//!     │
//!     ├─────► ApiClient (companion proxy over the Steam Web API)
//!     │         │
//!     │         ├──► Mastery pipeline (achievement classification)
//!     │         └──► Genre scan pipeline (store metadata, rate-limited)
//!     │
//!     ├─────► KvStore (session, blacklist, notes, metadata, vocabulary)
//!     │
//!     └─────► Vault (pure derivation: filter → sort → group)
//! ```

pub mod app;
pub mod client;
pub mod discovery;
pub mod epoch;
pub mod mastery;
pub mod model;
pub mod notes;
pub mod scan;
pub mod session;
pub mod store;
pub mod vault;

pub use app::App;
pub use client::{ApiClient, ClientError};
pub use mastery::Classification;
pub use model::{AppId, Game, GameMetadata, Profile};
pub use scan::{GenreScanner, ScanOutcome, ScanPolicy};
pub use store::{FileStore, KvStore, KvStoreExt, MemStore};
pub use vault::{VaultState, VaultView};
