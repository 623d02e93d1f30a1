//! Classification pipeline: mastery and hunter detection.
//!
//! Samples a bounded candidate set from the library and queries achievement
//! completion per game, sequentially, against a rate-limited upstream. A
//! game with every achievement unlocked is "mastered"; one at 50–99% is a
//! "hunter" target. Per-game failures are logged and contribute no label.
//!
//! Results are rebuilt wholesale on every library or session change; the
//! caller guards the commit with an epoch token (see [`crate::epoch`]) so a
//! run started against a stale snapshot is discarded on completion.

use crate::client::AchievementSource;
use crate::model::{AppId, Game};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Candidate selection policy. The sample is deliberately small to bound
/// request volume; priority appids are curated titles that are always
/// checked regardless of playtime.
#[derive(Debug, Clone)]
pub struct MasteryPolicy {
    pub sample_size: usize,
    pub priority: Vec<AppId>,
}

impl Default for MasteryPolicy {
    fn default() -> Self {
        MasteryPolicy { sample_size: 15, priority: vec![1_245_620] }
    }
}

/// The two label sets, disjoint by construction. A game absent from both
/// has unknown or below-threshold status; absence says nothing about
/// whether the game has achievements at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub mastered: BTreeSet<AppId>,
    pub hunter: BTreeSet<AppId>,
}

impl Classification {
    pub fn is_mastered(&self, appid: AppId) -> bool {
        self.mastered.contains(&appid)
    }

    pub fn is_hunter(&self, appid: AppId) -> bool {
        self.hunter.contains(&appid)
    }
}

/// Top games by lifetime playtime, then the priority titles that are in the
/// library but missed the playtime cut. Bounded by
/// `sample_size + priority.len()`.
fn candidates<'a>(library: &'a [Game], policy: &MasteryPolicy) -> Vec<&'a Game> {
    let mut by_playtime: Vec<&Game> = library.iter().collect();
    by_playtime.sort_by(|a, b| {
        b.playtime_forever.cmp(&a.playtime_forever).then(a.appid.cmp(&b.appid))
    });
    by_playtime.truncate(policy.sample_size);

    for &appid in &policy.priority {
        if by_playtime.iter().any(|g| g.appid == appid) {
            continue;
        }
        if let Some(game) = library.iter().find(|g| g.appid == appid) {
            by_playtime.push(game);
        }
    }
    by_playtime
}

/// Run the pipeline: one request per candidate, strictly in candidate
/// order. Every failure is caught and treated as "no signal" for that game.
pub async fn classify<S>(
    library: &[Game],
    source: &S,
    policy: &MasteryPolicy,
) -> Classification
where
    S: AchievementSource + Sync + ?Sized,
{
    let mut result = Classification::default();

    for game in candidates(library, policy) {
        match source.fetch_achievements(game.lookup_appid()).await {
            Ok(report) if report.total > 0 => {
                if report.achieved == report.total {
                    result.mastered.insert(game.appid);
                } else if 2 * report.achieved >= report.total {
                    result.hunter.insert(game.appid);
                }
            }
            Ok(_) => debug!("{} has no achievements, skipping", game.appid),
            Err(e) => warn!("mastery check failed for {}: {e}", game.appid),
        }
    }

    debug!(
        "classification complete: {} mastered, {} hunter targets",
        result.mastered.len(),
        result.hunter.len()
    );
    result
}
