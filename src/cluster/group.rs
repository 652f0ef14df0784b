use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::types::{CollectiveReply, Contribution, RoundId};
use crate::reducer::LocalExtrema;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupError {
    #[error("group size mismatch: coordinator expects {expected}, participant claims {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("rank {rank} out of range for a group of {size}")]
    RankOutOfRange { rank: usize, size: usize },

    #[error("rank {rank} already contributed to round {round}")]
    DuplicateRank { rank: usize, round: RoundId },

    #[error("record count mismatch in round {round}: expected {expected}, got {got}")]
    RecordCountMismatch { round: RoundId, expected: usize, got: usize },

    #[error("round {0} was abandoned before completing")]
    Abandoned(RoundId),
}

struct Round {
    record_count: usize,
    slots: Vec<Option<LocalExtrema>>,
    arrived: usize,
    outcome: watch::Sender<Option<LocalExtrema>>,
}

impl Round {
    fn new(size: usize, record_count: usize) -> Self {
        let (outcome, _) = watch::channel(None);
        Self {
            record_count,
            slots: vec![None; size],
            arrived: 0,
            outcome,
        }
    }
}

/// Coordinator-side state of a process group.
///
/// Each round collects exactly one contribution per rank. Callers of
/// `contribute` block until the round is complete, then all of them get the
/// same merged tuple: an allreduce with min-loc and max-loc in one exchange.
/// There is no timeout; a missing rank keeps the round open.
///
/// A completed round is forgotten at once; waiting callers keep the merged
/// tuple through their own receiver. A caller dropped before completion
/// withdraws its contribution, so the rank may contribute again.
pub struct CollectiveGroup {
    size: usize,
    rounds: Mutex<HashMap<RoundId, Round>>,
}

impl CollectiveGroup {
    pub fn new(size: usize) -> Self {
        Self { size, rounds: Mutex::new(HashMap::new()) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn open_rounds(&self) -> usize {
        self.rounds.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub async fn contribute(&self, c: Contribution) -> Result<CollectiveReply, GroupError> {
        let (mut outcome, mut pending) = {
            let mut rounds = self.rounds.lock().unwrap_or_else(PoisonError::into_inner);

            if c.size != self.size {
                return Err(GroupError::SizeMismatch { expected: self.size, got: c.size });
            }
            if c.rank >= self.size {
                return Err(GroupError::RankOutOfRange { rank: c.rank, size: self.size });
            }

            let round = rounds.entry(c.round).or_insert_with(|| Round::new(self.size, c.record_count));
            if round.record_count != c.record_count {
                return Err(GroupError::RecordCountMismatch {
                    round: c.round,
                    expected: round.record_count,
                    got: c.record_count,
                });
            }
            if round.slots[c.rank].is_some() {
                return Err(GroupError::DuplicateRank { rank: c.rank, round: c.round });
            }

            round.slots[c.rank] = Some(c.local);
            round.arrived += 1;
            debug!(round = c.round, rank = c.rank, arrived = round.arrived, size = self.size, "contribution received");

            let receiver = round.outcome.subscribe();
            if round.arrived == self.size {
                // Rank order keeps the fold reproducible; the merge itself is order-free.
                let merged = round
                    .slots
                    .iter()
                    .flatten()
                    .fold(LocalExtrema::empty(), |acc, local| acc.merge(local));
                round.outcome.send_replace(Some(merged));
                rounds.remove(&c.round);
                info!(round = c.round, size = self.size, "allreduce round complete");
            }
            (receiver, Pending { group: self, round: c.round, rank: c.rank, armed: true })
        };

        let merged = (*outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| GroupError::Abandoned(c.round))?)
            .unwrap_or_default();
        pending.armed = false;

        Ok(CollectiveReply { round: c.round, participants: self.size, merged })
    }

    /// Takes back a contribution whose caller went away before its round
    /// completed. Completed rounds are already gone and are left alone.
    fn withdraw(&self, round_id: RoundId, rank: usize) {
        let mut rounds = self.rounds.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(round) = rounds.get_mut(&round_id) else { return };
        if round.slots[rank].take().is_none() {
            return;
        }
        round.arrived -= 1;
        warn!(round = round_id, rank, "caller left before the round completed, contribution withdrawn");
        if round.arrived == 0 {
            rounds.remove(&round_id);
        }
    }
}

/// Armed while a caller waits for its round; dropping it withdraws the
/// contribution.
struct Pending<'a> {
    group: &'a CollectiveGroup,
    round: RoundId,
    rank: usize,
    armed: bool,
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.group.withdraw(self.round, self.rank);
        }
    }
}
