//! Distributed execution model.
//!
//! Every participant is an independent process (or task) holding its own
//! replica of the record set. It scans only its own partition and then joins
//! an allreduce round hosted by the coordinator, so all participants end up
//! with the same global result without sharing memory.

pub mod api;
pub mod group;
pub mod network;
pub mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::ReduceError;
use crate::model::{RecordSet, ReductionResult};
use crate::partition::partition_for;
use crate::reducer::{self, LocalExtrema};
use crate::scorer::Scorer;
use group::CollectiveGroup;
use network::CollectiveConnection;
use types::{Contribution, Rank, RoundId};

/// One member of a process group.
pub struct DistributedReducer {
    rank: Rank,
    size: usize,
    connection: CollectiveConnection,
}

impl DistributedReducer {
    pub fn new(rank: Rank, size: usize, coordinator: impl Into<String>) -> Result<Self, ReduceError> {
        if size < 1 {
            return Err(ReduceError::InvalidInput("worker count must be at least 1"));
        }
        if rank >= size {
            return Err(ReduceError::InvalidInput("rank must be below the group size"));
        }
        Ok(Self { rank, size, connection: CollectiveConnection::new(coordinator) })
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Scans this rank's partition and joins allreduce round `round`.
    /// Returns the same result on every rank of the group.
    pub async fn reduce<S>(
        &self,
        records: Arc<RecordSet>,
        scorer: Arc<S>,
        round: RoundId,
    ) -> Result<ReductionResult, ReduceError>
    where
    S: Scorer + ?Sized + 'static,
    {
        reducer::validate(&records, self.size)?;

        let part = partition_for(self.rank, records.len(), self.size);
        let scan_records = records.clone();
        let local = match tokio::task::spawn_blocking(move || LocalExtrema::scan(&scan_records, &part, scorer.as_ref())).await {
            Ok(local) => local,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(ReduceError::CommunicationFailure(format!("local scan cancelled: {e}"))),
        };
        debug!(
            rank = self.rank,
            start = part.start,
            end = part.end,
            coordinator = self.connection.addr(),
            "local extrema ready"
        );

        let contribution = Contribution {
            round,
            rank: self.rank,
            size: self.size,
            record_count: records.len(),
            local,
        };
        let reply = self.connection.allreduce(&contribution).await?;

        if reply.round != round || reply.participants != self.size {
            return Err(ReduceError::CommunicationFailure(format!(
                "coordinator answered round {} with {} participants, expected round {} with {}",
                reply.round, reply.participants, round, self.size
            )));
        }

        reply
        .merged
        .into_result()
        .ok_or_else(|| ReduceError::CommunicationFailure("allreduce produced no candidate".to_string()))
    }
}

/// Runs a coordinator and `size` participants inside this process. The
/// participants only talk to each other over loopback HTTP.
pub async fn reduce_over_loopback<S>(
    records: Arc<RecordSet>,
    scorer: Arc<S>,
    size: usize,
) -> Result<ReductionResult, ReduceError>
where
S: Scorer + ?Sized + 'static,
{
    reducer::validate(&records, size)?;

    let group = Arc::new(CollectiveGroup::new(size));
    let (addr, server) = api::bind_collective_api(group, SocketAddr::from(([127, 0, 0, 1], 0)))?;
    let server = tokio::spawn(server);
    info!(%addr, size, "loopback coordinator started");

    let mut members = JoinSet::new();
    for rank in 0..size {
        let member = DistributedReducer::new(rank, size, addr.to_string())?;
        let records = records.clone();
        let scorer = scorer.clone();
        members.spawn(async move { member.reduce(records, scorer, 0).await });
    }

    // The first failure ends the group: the remaining ranks would wait forever.
    let mut agreed: Option<ReductionResult> = None;
    let outcome = loop {
        let Some(joined) = members.join_next().await else {
            break agreed.ok_or_else(|| ReduceError::CommunicationFailure("no participant answered".to_string()));
        };
        let result = match joined {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => break Err(e),
            Err(e) => break Err(ReduceError::CommunicationFailure(format!("participant task failed: {e}"))),
        };
        match agreed {
            None => agreed = Some(result),
            Some(prev) if !prev.bit_identical(&result) => {
                break Err(ReduceError::CommunicationFailure("participants disagree on the result".to_string()));
            }
            Some(_) => {}
        }
    };

    members.abort_all();
    server.abort();
    if let Err(e) = &outcome {
        warn!(%addr, size, error = %e, "loopback group failed");
    }
    outcome
}
