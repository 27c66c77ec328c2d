//! Workload driver boundary: one unit of work per measured iteration.

pub mod sim;

use std::time::Duration;

use crate::error::HarnessError;

pub use sim::{SimProfile, SimWorkload, SocketRoundTrip};

/// A workload drives exactly one unit of work per call.
///
/// Units run serially from the measuring task; a unit that does not complete
/// successfully is fatal to the current phase.
pub trait Workload: Send + Sync {
    /// Executes one unit of work for the given input id.
    fn run_unit(
        &self,
        unit_id: u64,
    ) -> impl std::future::Future<Output = Result<(), HarnessError>> + Send;
}

/// HTTP workload issuing `GET {endpoint}/{prefix}{id}` per unit.
///
/// Any non-success status is a `Workload` failure: it means the system under
/// test is broken, which is distinct from a regression verdict.
pub struct HttpWorkload {
    client: reqwest::Client,
    endpoint: String,
    path_prefix: String,
}

impl HttpWorkload {
    /// Builds the workload with a bounded request timeout.
    ///
    /// `path_prefix` lets one scenario target a deliberately regressed route
    /// (e.g. `"with-io-regression/"`) while keeping the same endpoint.
    pub fn new(
        endpoint: impl Into<String>,
        path_prefix: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HarnessError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HarnessError::Configuration(format!("building http client: {e}")))?;

        let endpoint: String = endpoint.into();

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            path_prefix: path_prefix.into(),
        })
    }
}

impl Workload for HttpWorkload {
    async fn run_unit(&self, unit_id: u64) -> Result<(), HarnessError> {
        let url = format!("{}/{}{}", self.endpoint, self.path_prefix, unit_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| HarnessError::Workload {
                unit: unit_id,
                detail: format!("request to {url} failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(HarnessError::Workload {
                unit: unit_id,
                detail: format!("unexpected status {status} from {url}"),
            });
        }

        Ok(())
    }
}
