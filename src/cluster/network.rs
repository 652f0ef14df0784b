use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{CollectiveRejection, CollectiveReply, Contribution};
use crate::error::ReduceError;

/// Participant-side HTTP connection to the collective coordinator.
pub struct CollectiveConnection {
    addr: String,
    client: reqwest::Client,
}

impl CollectiveConnection {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), client: reqwest::Client::new() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Blocks until the whole group has contributed to `contribution.round`.
    pub async fn allreduce(&self, contribution: &Contribution) -> Result<CollectiveReply, ReduceError> {
        self.send_post("allreduce", contribution).await
    }

    async fn send_post<Req, Resp>(&self, route: &str, req: &Req) -> Result<Resp, ReduceError>
    where
    Req: Serialize,
    Resp: DeserializeOwned,
    {
        let url = format!("http://{}/{}", self.addr, route);

        let resp = self
        .client
        .post(&url)
        .json(req)
        .send()
        .await
        .map_err(|e| ReduceError::CommunicationFailure(format!("{url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let reason = match resp.json::<CollectiveRejection>().await {
                Ok(rejection) => rejection.message,
                Err(_) => format!("HTTP error: {}", status),
            };
            return Err(ReduceError::CommunicationFailure(reason));
        }

        resp.json::<Resp>()
        .await
        .map_err(|e| ReduceError::CommunicationFailure(format!("malformed reply from {url}: {e}")))
    }
}
