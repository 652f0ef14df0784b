use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::warn;
use warp::http::StatusCode;
use warp::Filter;

use super::group::CollectiveGroup;
use super::types::{CollectiveRejection, Contribution};
use crate::error::ReduceError;

/// Routes of the collective coordinator.
///
/// `POST /allreduce` takes a `Contribution` and answers with a
/// `CollectiveReply` once every rank of the round has posted, or `409` with a
/// `CollectiveRejection` when the contribution does not fit the group.
pub fn collective_routes(
    group: Arc<CollectiveGroup>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::post()
    .and(warp::path("allreduce"))
    .and(warp::path::end())
    .and(warp::body::json())
    .and(with_group(group))
    .and_then(|contribution: Contribution, group: Arc<CollectiveGroup>| async move {
        let reply = match group.contribute(contribution).await {
            Ok(reply) => warp::reply::with_status(warp::reply::json(&reply), StatusCode::OK),
            Err(e) => {
                warn!(rank = contribution.rank, round = contribution.round, error = %e, "contribution rejected");
                let body = CollectiveRejection { message: e.to_string() };
                warp::reply::with_status(warp::reply::json(&body), StatusCode::CONFLICT)
            }
        };
        Ok::<_, warp::Rejection>(reply)
    })
}

/// Binds the coordinator (port 0 picks a free one) and returns the bound
/// address with the server future, which the caller must spawn.
pub fn bind_collective_api(
    group: Arc<CollectiveGroup>,
    addr: SocketAddr,
) -> Result<(SocketAddr, impl Future<Output = ()> + Send + 'static), ReduceError> {
    warp::serve(collective_routes(group))
    .try_bind_ephemeral(addr)
    .map_err(|e| ReduceError::CommunicationFailure(format!("cannot bind coordinator on {addr}: {e}")))
}

fn with_group(
    group: Arc<CollectiveGroup>,
) -> impl Filter<Extract = (Arc<CollectiveGroup>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || group.clone())
}
