// src/cluster/types.rs
use serde::{Deserialize, Serialize};

use crate::reducer::LocalExtrema;

pub type Rank = usize;
pub type RoundId = u64;

/// One participant's input to an allreduce round.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub round: RoundId,
    pub rank: Rank,
    /// Group size the participant believes in
    pub size: usize,
    /// Length of the participant's replica of the record set
    pub record_count: usize,
    pub local: LocalExtrema,
}

/// Sent to every participant once the whole group has contributed.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectiveReply {
    pub round: RoundId,
    pub participants: usize,
    pub merged: LocalExtrema,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectiveRejection {
    pub message: String,
}
