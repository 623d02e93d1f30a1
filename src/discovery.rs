//! Discovery: the randomizer and the shuffled recommendation queue.
//!
//! Both draw from the library minus blacklisted games. The rng is injected
//! so tests can seed it.

use crate::model::{AppId, Game};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeSet;

pub const QUEUE_LEN: usize = 5;

fn pool<'a>(library: &'a [Game], blacklist: &BTreeSet<AppId>) -> Vec<&'a Game> {
    library.iter().filter(|g| !blacklist.contains(&g.appid)).collect()
}

/// One uniformly random non-blacklisted game.
pub fn random_pick<'a, R: Rng + ?Sized>(
    library: &'a [Game],
    blacklist: &BTreeSet<AppId>,
    rng: &mut R,
) -> Option<&'a Game> {
    pool(library, blacklist).choose(rng).copied()
}

/// A shuffled queue of up to [`QUEUE_LEN`] non-blacklisted games.
pub fn discovery_queue<'a, R: Rng + ?Sized>(
    library: &'a [Game],
    blacklist: &BTreeSet<AppId>,
    rng: &mut R,
) -> Vec<&'a Game> {
    let mut pool = pool(library, blacklist);
    pool.shuffle(rng);
    pool.truncate(QUEUE_LEN);
    pool
}
